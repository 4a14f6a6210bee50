//! Application core: the controller and its port boundary.
//!
//! Everything here is pure logic. The BLE host stack and the
//! observability sink are reached only through the traits in [`ports`],
//! so the whole access path runs on the host in tests.

pub mod controller;
pub mod events;
pub mod ports;
