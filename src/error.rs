//! Error types for the code lock firmware.
//!
//! All of them are `Copy`; they travel through the GATT access path and
//! the GAP state machine without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Host stack return codes
// ---------------------------------------------------------------------------

/// Nonzero status code returned by a BLE host stack call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackError(pub i32);

impl StackError {
    /// Map a raw stack return code to a `Result`.
    pub fn check(rc: i32) -> Result<(), StackError> {
        if rc == 0 { Ok(()) } else { Err(StackError(rc)) }
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack rc={}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Attribute protocol errors
// ---------------------------------------------------------------------------

/// Errors reported back to the GATT client for a characteristic access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttError {
    /// Write length outside the characteristic's accepted range.
    InvalidLength,
    /// The transport buffer could not be flattened.
    Unlikely,
    /// The read value could not be appended to the response.
    InsufficientResources,
}

impl AttError {
    /// ATT protocol error code sent to the client.
    pub const fn att_code(self) -> u8 {
        match self {
            Self::InvalidLength => 0x0D,
            Self::Unlikely => 0x0E,
            Self::InsufficientResources => 0x11,
        }
    }
}

impl fmt::Display for AttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength => write!(f, "invalid attribute value length"),
            Self::Unlikely => write!(f, "unlikely error"),
            Self::InsufficientResources => write!(f, "insufficient resources"),
        }
    }
}

// ---------------------------------------------------------------------------
// Secret errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretError {
    /// The code exceeds the characteristic's maximum length.
    TooLong { len: usize },
}

impl fmt::Display for SecretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong { len } => write!(
                f,
                "code is {len} bytes, max {}",
                crate::verifier::MAX_SECRET_LEN
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Bring-up errors
// ---------------------------------------------------------------------------

/// Failure of one step of [`PeripheralController::initialize`](crate::app::controller::PeripheralController::initialize).
///
/// None of these are recoverable: the device has no other way to be
/// reached, so the caller aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    Secret(SecretError),
    StackInit(StackError),
    ServiceCount(StackError),
    ServiceAdd(StackError),
    DeviceName(StackError),
    HostTask(StackError),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(e) => write!(f, "initial code rejected: {e}"),
            Self::StackInit(e) => write!(f, "host stack init failed ({e})"),
            Self::ServiceCount(e) => write!(f, "GATT size accounting failed ({e})"),
            Self::ServiceAdd(e) => write!(f, "GATT service registration failed ({e})"),
            Self::DeviceName(e) => write!(f, "setting device name failed ({e})"),
            Self::HostTask(e) => write!(f, "starting host task failed ({e})"),
        }
    }
}

impl From<SecretError> for InitError {
    fn from(e: SecretError) -> Self {
        Self::Secret(e)
    }
}

// ---------------------------------------------------------------------------
// Advertising failure stage
// ---------------------------------------------------------------------------

/// Which step of starting an advertisement failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvStage {
    AddressType,
    SetFields,
    Start,
}

impl fmt::Display for AdvStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressType => write!(f, "address type inference"),
            Self::SetFields => write!(f, "setting advertisement data"),
            Self::Start => write!(f, "enabling advertisement"),
        }
    }
}
