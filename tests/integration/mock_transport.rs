//! Mock BLE transport for integration tests.
//!
//! Records every stack call so tests can assert on the full bring-up and
//! advertising history, and fails a chosen call on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use codelock::app::events::LockEvent;
use codelock::app::ports::{EventSink, GapPort, HostPort};
use codelock::error::StackError;
use codelock::gap::advertising::{AddressType, AdvParams, AdvertisementData};
use codelock::gatt::AttributeTable;

// ── Stack call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCall {
    InitStack,
    CountServices,
    AddServices,
    SetDeviceName,
    StartHostTask,
    InferAddressType,
    SetAdvertisement,
    StartAdvertising,
}

// ── MockTransport ─────────────────────────────────────────────

pub struct MockTransport {
    pub calls: Vec<StackCall>,
    pub device_name: String,
    /// The next call of this kind fails with `fail_rc`.
    pub fail_on: Option<StackCall>,
    pub fail_rc: i32,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            device_name: String::new(),
            fail_on: None,
            fail_rc: 3,
        }
    }

    pub fn failing(call: StackCall) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::new()
        }
    }

    pub fn count(&self, call: StackCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    fn record(&mut self, call: StackCall) -> Result<(), StackError> {
        self.calls.push(call);
        if self.fail_on == Some(call) {
            self.fail_on = None;
            return Err(StackError(self.fail_rc));
        }
        Ok(())
    }
}

impl HostPort for MockTransport {
    fn init_stack(&mut self) -> Result<(), StackError> {
        self.record(StackCall::InitStack)
    }

    fn count_services(&mut self, _table: &AttributeTable) -> Result<(), StackError> {
        self.record(StackCall::CountServices)
    }

    fn add_services(&mut self, _table: &AttributeTable) -> Result<(), StackError> {
        self.record(StackCall::AddServices)
    }

    fn set_device_name(&mut self, name: &str) -> Result<(), StackError> {
        self.record(StackCall::SetDeviceName)?;
        self.device_name = name.to_owned();
        Ok(())
    }

    fn start_host_task(&mut self) -> Result<(), StackError> {
        self.record(StackCall::StartHostTask)
    }
}

impl GapPort for MockTransport {
    fn infer_address_type(&mut self) -> Result<AddressType, StackError> {
        self.record(StackCall::InferAddressType)?;
        Ok(AddressType::Random)
    }

    fn set_advertisement(&mut self, _data: &AdvertisementData) -> Result<(), StackError> {
        self.record(StackCall::SetAdvertisement)
    }

    fn start_advertising(
        &mut self,
        _own_addr: AddressType,
        _params: &AdvParams,
    ) -> Result<(), StackError> {
        self.record(StackCall::StartAdvertising)
    }
}

// ── Recording sink ────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<LockEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn contains(&self, event: &LockEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&LockEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &LockEvent) {
        self.events.push(*event);
    }
}

// ── Callback counter ──────────────────────────────────────────

/// Shared counter a `Send` callback can bump.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

#[allow(dead_code)]
impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl FnMut() + Send + 'static {
        let inner = Arc::clone(&self.0);
        move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
