//! Structured events emitted by the code lock core.

use crate::error::{AdvStage, AttError, StackError};
use crate::gap::advertising::AddressType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEvent {
    /// Host and controller are in sync; own address type resolved.
    Synced { addr_type: AddressType },
    /// The host stack reset itself.
    HostReset { reason: i32 },
    AdvertisingStarted,
    /// Advertising could not be started; the peripheral is not
    /// connectable until the next connect/disconnect event.
    AdvertisingFailed { stage: AdvStage, error: StackError },
    Connected { conn_handle: u16 },
    ConnectFailed { status: i32 },
    Disconnected { conn_handle: u16, reason: i32 },
    AdvertisingComplete { reason: i32 },
    Subscribed { conn_handle: u16, attr_handle: u16, notify: bool, indicate: bool },
    MtuUpdated { conn_handle: u16, mtu: u16 },
    /// A GAP event kind the core does not act on.
    UnhandledGapEvent { kind: u8 },
    /// Code characteristic assigned its value handle.
    CodeHandleRegistered { val_handle: u16 },
    CodeReceived { len: usize },
    AccessGranted,
    AccessDenied,
    WriteRejected { error: AttError },
}
