//! Bluetooth UUIDs used by the attribute table.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uuid {
    /// SIG-assigned 16-bit UUID.
    Uuid16(u16),
    /// Vendor 128-bit UUID, most significant byte first.
    Uuid128(u128),
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Uuid16(v) => write!(f, "0x{v:04x}"),
            Self::Uuid128(v) => write!(
                f,
                "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
                (v >> 96) as u32,
                (v >> 80) as u16,
                (v >> 64) as u16,
                (v >> 48) as u16,
                v & 0xffff_ffff_ffff,
            ),
        }
    }
}
