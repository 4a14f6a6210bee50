//! Port traits: the boundary between the code lock core and the BLE
//! host stack.
//!
//! ```text
//!   NimbleTransport ──▶ HostPort / GapPort ──▶ PeripheralController
//!   LogEventSink    ──▶ EventSink          ◀── GapStateMachine
//! ```
//!
//! All stack calls are non-blocking register/start calls that report a
//! status code; none of them wait for the peer.

use crate::error::StackError;
use crate::gap::advertising::{AddressType, AdvParams, AdvertisementData};
use crate::gatt::AttributeTable;

// ───────────────────────────────────────────────────────────────
// Host port (one-time bring-up)
// ───────────────────────────────────────────────────────────────

pub trait HostPort {
    /// Bring up the controller and the host stack.
    fn init_stack(&mut self) -> Result<(), StackError>;

    /// Reserve stack resources for every attribute in `table`.
    fn count_services(&mut self, table: &AttributeTable) -> Result<(), StackError>;

    /// Insert every service of `table` into the GATT server.
    fn add_services(&mut self, table: &AttributeTable) -> Result<(), StackError>;

    fn set_device_name(&mut self, name: &str) -> Result<(), StackError>;

    /// Start the stack's event processing loop. GAP and GATT events are
    /// delivered from that context afterwards.
    fn start_host_task(&mut self) -> Result<(), StackError>;
}

// ───────────────────────────────────────────────────────────────
// GAP port (advertising primitives)
// ───────────────────────────────────────────────────────────────

pub trait GapPort {
    fn infer_address_type(&mut self) -> Result<AddressType, StackError>;

    fn set_advertisement(&mut self, data: &AdvertisementData) -> Result<(), StackError>;

    fn start_advertising(
        &mut self,
        own_addr: AddressType,
        params: &AdvParams,
    ) -> Result<(), StackError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (observability)
// ───────────────────────────────────────────────────────────────

/// Receives every [`LockEvent`](super::events::LockEvent) the core
/// produces. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::LockEvent);
}

// ───────────────────────────────────────────────────────────────
// Access callbacks
// ───────────────────────────────────────────────────────────────

/// Called with no arguments, synchronously, at most once per code write.
/// Runs on the stack's event context while the controller is borrowed,
/// so it must not call back into the controller.
pub type AccessCallback = Box<dyn FnMut() + Send>;
