//! Actuator drivers.

pub mod latch;
