//! Access code verification.
//!
//! The secret is held in a fixed 24-byte buffer with an explicit length;
//! it is never NUL-terminated and its unused tail is always zero. The
//! buffer is scrubbed whenever the secret is replaced or dropped.
//!
//! Comparison goes through `subtle::ConstantTimeEq`, so the time taken
//! does not depend on the position of the first mismatching byte. The
//! length check is not hidden: code length is not considered secret.

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::SecretError;

/// Longest accepted access code, matching the code characteristic.
pub const MAX_SECRET_LEN: usize = 24;

/// The configured access code.
pub struct Secret {
    bytes: [u8; MAX_SECRET_LEN],
    len: usize,
}

impl Secret {
    /// An empty secret. Only an empty write would match it, and the
    /// code characteristic never accepts one.
    pub const fn empty() -> Self {
        Self {
            bytes: [0; MAX_SECRET_LEN],
            len: 0,
        }
    }

    pub fn new(code: &[u8]) -> Result<Self, SecretError> {
        let mut secret = Self::empty();
        secret.replace(code)?;
        Ok(secret)
    }

    /// Overwrite the secret in place. On error the previous value is kept.
    pub fn replace(&mut self, code: &[u8]) -> Result<(), SecretError> {
        if code.len() > MAX_SECRET_LEN {
            return Err(SecretError::TooLong { len: code.len() });
        }
        self.bytes.zeroize();
        self.bytes[..code.len()].copy_from_slice(code);
        self.len = code.len();
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Secret {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.bytes.zeroize();
        self.len = 0;
    }
}

impl core::fmt::Debug for Secret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Secret").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Outcome of one code check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Granted,
    Denied,
}

impl From<bool> for Verdict {
    fn from(matched: bool) -> Self {
        if matched { Self::Granted } else { Self::Denied }
    }
}

/// Returns `true` iff `received` has exactly the secret's length and the
/// same bytes. The length compared is the received length, so a strict
/// prefix of the secret never matches.
pub fn verify(received: &[u8], secret: &[u8]) -> bool {
    if received.len() != secret.len() {
        return false;
    }
    bool::from(received.ct_eq(secret))
}

/// Checks received codes against the configured [`Secret`].
#[derive(Debug, Default)]
pub struct AccessVerifier {
    secret: Secret,
}

impl AccessVerifier {
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }

    pub fn set_secret(&mut self, code: &[u8]) -> Result<(), SecretError> {
        self.secret.replace(code)
    }

    pub fn secret_len(&self) -> usize {
        self.secret.len()
    }

    pub fn check(&self, received: &[u8]) -> Verdict {
        verify(received, self.secret.as_bytes()).into()
    }
}
