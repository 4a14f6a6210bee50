//! GAP events delivered by the host stack.

/// Connection lifecycle and link events. Kinds the core does not act on
/// arrive as [`GapEvent::Other`] and are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapEvent {
    /// A connection was established (`status == 0`) or the attempt failed.
    Connect { status: i32, conn_handle: u16 },
    Disconnect { reason: i32, conn_handle: u16 },
    AdvComplete { reason: i32 },
    Subscribe {
        conn_handle: u16,
        attr_handle: u16,
        cur_notify: bool,
        cur_indicate: bool,
    },
    Mtu { conn_handle: u16, mtu: u16 },
    Other { kind: u8 },
}
