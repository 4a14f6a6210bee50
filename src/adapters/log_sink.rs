//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`LockEvent`] as one line to
//! the ESP-IDF logger (UART / USB-CDC in production). Code bytes never
//! appear in the output, only their length.

use log::{error, info, warn};

use crate::app::events::LockEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`LockEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LockEvent) {
        match *event {
            LockEvent::Synced { addr_type } => {
                info!("GAP | synced, own_addr_type={:?}", addr_type);
            }
            LockEvent::HostReset { reason } => {
                error!("GAP | resetting state; reason={}", reason);
            }
            LockEvent::AdvertisingStarted => info!("GAP | advertising"),
            LockEvent::AdvertisingFailed { stage, error } => {
                error!("GAP | {} failed ({}); not connectable until next link event", stage, error);
            }
            LockEvent::Connected { conn_handle } => {
                info!("GAP | connection established; conn_handle={}", conn_handle);
            }
            LockEvent::ConnectFailed { status } => {
                warn!("GAP | connection failed; status={}", status);
            }
            LockEvent::Disconnected { conn_handle, reason } => {
                info!("GAP | disconnect; conn_handle={} reason={}", conn_handle, reason);
            }
            LockEvent::AdvertisingComplete { reason } => {
                info!("GAP | adv complete; reason={}", reason);
            }
            LockEvent::Subscribed { conn_handle, attr_handle, notify, indicate } => {
                info!(
                    "GAP | subscribe; conn_handle={} attr_handle={} notify={} indicate={}",
                    conn_handle, attr_handle, notify, indicate
                );
            }
            LockEvent::MtuUpdated { conn_handle, mtu } => {
                info!("GAP | mtu update; conn_handle={} mtu={}", conn_handle, mtu);
            }
            LockEvent::UnhandledGapEvent { kind } => {
                info!("GAP | ignored event type={}", kind);
            }
            LockEvent::CodeHandleRegistered { val_handle } => {
                info!("GATT | code characteristic val_handle={}", val_handle);
            }
            LockEvent::CodeReceived { len } => info!("LOCK | code received, len={}", len),
            LockEvent::AccessGranted => info!("LOCK | access granted"),
            LockEvent::AccessDenied => warn!("LOCK | access denied"),
            LockEvent::WriteRejected { error } => {
                warn!("LOCK | write rejected: {} (att=0x{:02x})", error, error.att_code());
            }
        }
    }
}
