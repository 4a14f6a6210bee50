//! Advertisement payload and parameters.

use bitflags::bitflags;

/// Legacy advertising PDUs carry at most 31 bytes of AD structures.
pub const MAX_ADV_DATA_LEN: usize = 31;

bitflags! {
    /// AD "Flags" field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdvFlags: u8 {
        const LE_GENERAL_DISCOVERABLE = 0x02;
        const BR_EDR_NOT_SUPPORTED = 0x04;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPower {
    /// Let the stack fill in the controller's current level.
    Auto,
    Dbm(i8),
}

/// Own address type resolved on host sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressType {
    Public = 0,
    Random = 1,
    RpaPublic = 2,
    RpaRandom = 3,
}

impl AddressType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Public),
            1 => Some(Self::Random),
            2 => Some(Self::RpaPublic),
            3 => Some(Self::RpaRandom),
            _ => None,
        }
    }
}

/// Data placed in every advertisement: flags, TX power and the complete
/// local name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementData {
    pub flags: AdvFlags,
    pub tx_power: TxPower,
    pub name: heapless::String<32>,
}

impl AdvertisementData {
    /// General-discoverable, LE-only advertisement for `name`. Names
    /// longer than 32 bytes are cut at the last whole character.
    pub fn new(name: &str) -> Self {
        let mut n = heapless::String::new();
        for c in name.chars() {
            if n.push(c).is_err() {
                break;
            }
        }
        Self {
            flags: AdvFlags::LE_GENERAL_DISCOVERABLE | AdvFlags::BR_EDR_NOT_SUPPORTED,
            tx_power: TxPower::Auto,
            name: n,
        }
    }

    /// Size of the encoded AD structures (length + type + value each).
    pub fn encoded_len(&self) -> usize {
        let flags = 3;
        let tx_power = 3;
        let name = 2 + self.name.len();
        flags + tx_power + name
    }

    pub fn fits(&self) -> bool {
        self.encoded_len() <= MAX_ADV_DATA_LEN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnMode {
    Undirected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscMode {
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvDuration {
    Forever,
    Millis(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvParams {
    pub conn_mode: ConnMode,
    pub disc_mode: DiscMode,
    pub duration: AdvDuration,
}

impl Default for AdvParams {
    fn default() -> Self {
        Self {
            conn_mode: ConnMode::Undirected,
            disc_mode: DiscMode::General,
            duration: AdvDuration::Forever,
        }
    }
}
