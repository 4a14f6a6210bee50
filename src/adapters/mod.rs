//! Adapters: concrete implementations of the application ports.

pub mod log_sink;
pub mod nimble;
