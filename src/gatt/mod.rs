//! GATT server side: the attribute table and the access dispatcher.

pub mod dispatch;
pub mod table;
pub mod uuid;

pub use dispatch::{AttrBuffer, AttrSink, DeviceInfo, GattAccessDispatcher, ReceivedCode};
pub use table::{ATTRIBUTE_TABLE, AttributeTable, CharacteristicId, Registration};
pub use uuid::Uuid;
