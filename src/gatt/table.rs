//! Static GATT attribute table.
//!
//! | Service            | Characteristic     | UUID                                   | Perms |
//! |--------------------|--------------------|----------------------------------------|-------|
//! | Code lock          | Code               | `0x2af6`                               | Write |
//! | Device Information | Manufacturer Name  | `0x2a29`                               | Read  |
//! | Device Information | Model Number       | `0x2a24`                               | Read  |
//!
//! The code lock service itself is `5c3a659e-897e-45e1-b016-007107c96df6`.
//! The table is fixed at build time; the transport walks it once during
//! registration and reports the handles it assigned through
//! [`Registration`] records.

use bitflags::bitflags;
use log::debug;

use super::uuid::Uuid;
use crate::verifier::MAX_SECRET_LEN;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const CODELOCK_SERVICE_UUID: Uuid = Uuid::Uuid128(0x5c3a659e_897e_45e1_b016_007107c96df6);
pub const CODE_CHAR_UUID: Uuid = Uuid::Uuid16(0x2af6);
pub const DEVICE_INFO_SERVICE_UUID: Uuid = Uuid::Uuid16(0x180A);
pub const MANUFACTURER_NAME_UUID: Uuid = Uuid::Uuid16(0x2A29);
pub const MODEL_NUMBER_UUID: Uuid = Uuid::Uuid16(0x2A24);

/// Shortest write accepted by the code characteristic.
pub const CODE_MIN_LEN: usize = 1;
/// Longest write accepted by the code characteristic.
pub const CODE_MAX_LEN: usize = MAX_SECRET_LEN;

bitflags! {
    /// Characteristic properties. Bit values follow NimBLE's
    /// `BLE_GATT_CHR_F_*` so they can be handed to the stack as-is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharFlags: u16 {
        const READ = 0x0002;
        const WRITE = 0x0008;
    }
}

// ───────────────────────────────────────────────────────────────
// Definitions
// ───────────────────────────────────────────────────────────────

/// Every characteristic the table exposes. Access handlers are keyed on
/// this, so an id outside the set cannot reach them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CharacteristicId {
    Code = 1,
    ManufacturerName = 2,
    ModelNumber = 3,
}

impl CharacteristicId {
    pub const ALL: [Self; 3] = [Self::Code, Self::ManufacturerName, Self::ModelNumber];

    /// Tag passed through the stack's opaque callback argument.
    pub const fn as_arg(self) -> usize {
        self as usize
    }

    pub fn from_arg(arg: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_arg() == arg)
    }

    pub fn def(self) -> &'static CharacteristicDef {
        ATTRIBUTE_TABLE
            .characteristics()
            .find(|c| c.id == self)
            .unwrap_or_else(|| unreachable!("{self:?} missing from attribute table"))
    }
}

#[derive(Debug)]
pub struct CharacteristicDef {
    pub id: CharacteristicId,
    pub uuid: Uuid,
    pub flags: CharFlags,
    /// Accepted write length range; unused for read-only characteristics.
    pub min_len: usize,
    pub max_len: usize,
}

#[derive(Debug)]
pub struct ServiceDef {
    pub uuid: Uuid,
    pub characteristics: &'static [CharacteristicDef],
}

/// Attribute counts used for the stack's size accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeCount {
    pub services: usize,
    pub characteristics: usize,
    /// Service declarations plus characteristic declaration/value pairs.
    pub attributes: usize,
}

#[derive(Debug)]
pub struct AttributeTable {
    services: &'static [ServiceDef],
}

impl AttributeTable {
    pub fn services(&self) -> &'static [ServiceDef] {
        self.services
    }

    pub fn characteristics(&self) -> impl Iterator<Item = &'static CharacteristicDef> + use<> {
        let services: &'static [ServiceDef] = self.services;
        services.iter().flat_map(|s| s.characteristics.iter())
    }

    pub fn count(&self) -> AttributeCount {
        let services = self.services.len();
        let characteristics = self.characteristics().count();
        AttributeCount {
            services,
            characteristics,
            attributes: services + 2 * characteristics,
        }
    }
}

static CODELOCK_CHARS: [CharacteristicDef; 1] = [CharacteristicDef {
    id: CharacteristicId::Code,
    uuid: CODE_CHAR_UUID,
    flags: CharFlags::WRITE,
    min_len: CODE_MIN_LEN,
    max_len: CODE_MAX_LEN,
}];

static DEVICE_INFO_CHARS: [CharacteristicDef; 2] = [
    CharacteristicDef {
        id: CharacteristicId::ManufacturerName,
        uuid: MANUFACTURER_NAME_UUID,
        flags: CharFlags::READ,
        min_len: 0,
        max_len: 0,
    },
    CharacteristicDef {
        id: CharacteristicId::ModelNumber,
        uuid: MODEL_NUMBER_UUID,
        flags: CharFlags::READ,
        min_len: 0,
        max_len: 0,
    },
];

static SERVICES: [ServiceDef; 2] = [
    ServiceDef {
        uuid: CODELOCK_SERVICE_UUID,
        characteristics: &CODELOCK_CHARS,
    },
    ServiceDef {
        uuid: DEVICE_INFO_SERVICE_UUID,
        characteristics: &DEVICE_INFO_CHARS,
    },
];

pub static ATTRIBUTE_TABLE: AttributeTable = AttributeTable { services: &SERVICES };

// ───────────────────────────────────────────────────────────────
// Registration trace
// ───────────────────────────────────────────────────────────────

/// One attribute assigned a handle by the stack during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Service { uuid: Uuid, handle: u16 },
    Characteristic { uuid: Uuid, def_handle: u16, val_handle: u16 },
    Descriptor { uuid: Uuid, handle: u16 },
}

impl Registration {
    pub fn log(&self) {
        match self {
            Self::Service { uuid, handle } => {
                debug!("registered service {} with handle={}", uuid, handle);
            }
            Self::Characteristic { uuid, def_handle, val_handle } => {
                debug!(
                    "registering characteristic {} with def_handle={} val_handle={}",
                    uuid, def_handle, val_handle
                );
            }
            Self::Descriptor { uuid, handle } => {
                debug!("registering descriptor {} with handle={}", uuid, handle);
            }
        }
    }
}
