//! Peripheral controller: the single owner of all code lock state.
//!
//! Wires the GAP state machine, the GATT dispatcher and the verifier
//! together, and holds the secret and the two callback slots. Every
//! mutation goes through `&mut self`; on target the controller lives
//! behind one mutex, so a code write is always classified against one
//! consistent secret.

use log::info;

use super::events::LockEvent;
use super::ports::{AccessCallback, EventSink, GapPort, HostPort};
use crate::config::CodelockConfig;
use crate::error::{AttError, InitError, SecretError};
use crate::gap::{GapEvent, GapState, GapStateMachine};
use crate::gatt::{
    ATTRIBUTE_TABLE, AttrBuffer, AttrSink, CharacteristicId, GattAccessDispatcher, ReceivedCode,
    Registration,
    table::CODE_CHAR_UUID,
};
use crate::verifier::{AccessVerifier, Verdict};

pub struct PeripheralController<T, S> {
    transport: T,
    sink: S,
    gap: GapStateMachine,
    dispatcher: GattAccessDispatcher,
    verifier: AccessVerifier,
    device_name: heapless::String<32>,
    on_success: Option<AccessCallback>,
    on_failure: Option<AccessCallback>,
    code_handle: Option<u16>,
}

impl<T, S: EventSink> PeripheralController<T, S> {
    pub fn new(transport: T, sink: S, config: &CodelockConfig) -> Self {
        Self {
            transport,
            sink,
            gap: GapStateMachine::new(config.advertisement()),
            dispatcher: GattAccessDispatcher::new(config.device_info()),
            verifier: AccessVerifier::default(),
            device_name: config.device_name.clone(),
            on_success: None,
            on_failure: None,
            code_handle: None,
        }
    }

    // ── Setters ───────────────────────────────────────────────

    /// Replace the access code. Writes already classified are unaffected.
    pub fn set_secret(&mut self, code: &[u8]) -> Result<(), SecretError> {
        self.verifier.set_secret(code)
    }

    pub fn set_success_callback(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_success = Some(Box::new(callback));
    }

    pub fn set_failure_callback(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_failure = Some(Box::new(callback));
    }

    pub fn clear_success_callback(&mut self) {
        self.on_success = None;
    }

    pub fn clear_failure_callback(&mut self) {
        self.on_failure = None;
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn gap_state(&self) -> GapState {
        self.gap.state()
    }

    pub fn gap(&self) -> &GapStateMachine {
        &self.gap
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Last code value that passed the length and flattening checks.
    pub fn received(&self) -> &ReceivedCode {
        self.dispatcher.received()
    }

    /// Value handle the stack assigned to the code characteristic.
    pub fn code_handle(&self) -> Option<u16> {
        self.code_handle
    }

    // ── GATT access ───────────────────────────────────────────

    /// Stack assigned a handle during registration.
    pub fn on_registered(&mut self, registration: Registration) {
        registration.log();
        if let Registration::Characteristic { uuid, val_handle, .. } = registration {
            if uuid == CODE_CHAR_UUID {
                self.code_handle = Some(val_handle);
                self.sink.emit(&LockEvent::CodeHandleRegistered { val_handle });
            }
        }
    }

    /// Write access from a client. A write that passes the length and
    /// flattening checks fires exactly one of the two callbacks.
    pub fn on_write<B>(&mut self, id: CharacteristicId, buf: &B) -> Result<(), AttError>
    where
        B: AttrBuffer + ?Sized,
    {
        let verifier = &self.verifier;
        let sink = &mut self.sink;
        let on_success = &mut self.on_success;
        let on_failure = &mut self.on_failure;

        let result = self.dispatcher.handle_write(id, buf, |code| {
            sink.emit(&LockEvent::CodeReceived { len: code.len() });
            match verifier.check(code) {
                Verdict::Granted => {
                    sink.emit(&LockEvent::AccessGranted);
                    if let Some(cb) = on_success.as_mut() {
                        cb();
                    }
                }
                Verdict::Denied => {
                    sink.emit(&LockEvent::AccessDenied);
                    if let Some(cb) = on_failure.as_mut() {
                        cb();
                    }
                }
            }
        });

        if let Err(error) = result {
            self.sink.emit(&LockEvent::WriteRejected { error });
        }
        result
    }

    /// Read access from a client.
    pub fn on_read<W>(&self, id: CharacteristicId, out: &mut W) -> Result<(), AttError>
    where
        W: AttrSink + ?Sized,
    {
        self.dispatcher.handle_read(id, out)
    }
}

impl<T: GapPort, S: EventSink> PeripheralController<T, S> {
    // ── GAP events ────────────────────────────────────────────

    pub fn on_sync(&mut self) {
        self.gap.on_sync(&mut self.transport, &mut self.sink);
    }

    pub fn on_reset(&mut self, reason: i32) {
        self.gap.on_reset(reason, &mut self.sink);
    }

    pub fn on_gap_event(&mut self, event: GapEvent) {
        self.gap.handle(event, &mut self.transport, &mut self.sink);
    }
}

impl<T: HostPort, S: EventSink> PeripheralController<T, S> {
    /// One-time bring-up: store the initial code, initialise the stack,
    /// register the attribute table, set the device name and start the
    /// host task. The first failing step is returned; the caller treats
    /// any error as fatal.
    pub fn initialize(&mut self, initial_secret: &[u8]) -> Result<(), InitError> {
        self.set_secret(initial_secret)?;

        self.transport.init_stack().map_err(InitError::StackInit)?;
        self.transport
            .count_services(&ATTRIBUTE_TABLE)
            .map_err(InitError::ServiceCount)?;
        self.transport
            .add_services(&ATTRIBUTE_TABLE)
            .map_err(InitError::ServiceAdd)?;
        self.transport
            .set_device_name(&self.device_name)
            .map_err(InitError::DeviceName)?;
        self.transport.start_host_task().map_err(InitError::HostTask)?;

        info!(
            "Codelock: initialised as '{}' (code len={})",
            self.device_name,
            self.verifier.secret_len()
        );
        Ok(())
    }
}
