//! GATT access dispatcher.
//!
//! Routes characteristic reads and writes coming from the stack to the
//! matching handler. Writes are length-checked against the attribute
//! table before the transport buffer is flattened into
//! [`ReceivedCode`]; only a fully extracted value reaches the verifier.
//!
//! Accessing a characteristic with an operation the table does not grant
//! it is a table/handler mismatch and panics. The stack enforces
//! permissions before calling in, so this never happens at runtime.

use log::{debug, warn};
use zeroize::Zeroize;

use super::table::{CODE_MAX_LEN, CharFlags, CharacteristicId};
use crate::error::{AttError, StackError};

// ───────────────────────────────────────────────────────────────
// Transport buffer seams
// ───────────────────────────────────────────────────────────────

/// Incoming attribute value as held by the transport (possibly chained).
pub trait AttrBuffer {
    /// Total length of the value in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the value into `dst`, returning the number of bytes written.
    fn flatten(&self, dst: &mut [u8]) -> Result<usize, StackError>;
}

impl AttrBuffer for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn flatten(&self, dst: &mut [u8]) -> Result<usize, StackError> {
        let n = <[u8]>::len(self);
        let dst = dst.get_mut(..n).ok_or(StackError(-1))?;
        dst.copy_from_slice(self);
        Ok(n)
    }
}

/// Outgoing attribute value being assembled for a read response.
pub trait AttrSink {
    fn append(&mut self, data: &[u8]) -> Result<(), StackError>;
}

impl AttrSink for Vec<u8> {
    fn append(&mut self, data: &[u8]) -> Result<(), StackError> {
        self.extend_from_slice(data);
        Ok(())
    }
}

impl<const N: usize> AttrSink for heapless::Vec<u8, N> {
    fn append(&mut self, data: &[u8]) -> Result<(), StackError> {
        self.extend_from_slice(data).map_err(|()| StackError(-1))
    }
}

// ───────────────────────────────────────────────────────────────
// Received code
// ───────────────────────────────────────────────────────────────

/// Bytes of the write to the code characteristic currently being checked.
/// The length is the one reported by the transport, never inferred from
/// the content. Scrubbed before every write and once verification is done.
pub struct ReceivedCode {
    bytes: [u8; CODE_MAX_LEN],
    len: usize,
}

impl ReceivedCode {
    pub const fn new() -> Self {
        Self {
            bytes: [0; CODE_MAX_LEN],
            len: 0,
        }
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

    fn scrub(&mut self) {
        self.bytes.zeroize();
        self.len = 0;
    }
}

impl Drop for ReceivedCode {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl Default for ReceivedCode {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ReceivedCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReceivedCode").field("len", &self.len).finish_non_exhaustive()
    }
}

// ───────────────────────────────────────────────────────────────
// Device information
// ───────────────────────────────────────────────────────────────

/// Fixed strings served by the Device Information service.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub manufacturer_name: heapless::String<32>,
    pub model_number: heapless::String<32>,
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct GattAccessDispatcher {
    received: ReceivedCode,
    device_info: DeviceInfo,
}

impl GattAccessDispatcher {
    pub fn new(device_info: DeviceInfo) -> Self {
        Self {
            received: ReceivedCode::new(),
            device_info,
        }
    }

    pub fn received(&self) -> &ReceivedCode {
        &self.received
    }

    /// Handle a write to `id`.
    ///
    /// Rejects lengths outside the characteristic's range with
    /// [`AttError::InvalidLength`] and flattening failures with
    /// [`AttError::Unlikely`]; in both cases `on_code` is not called.
    /// Otherwise the value is held in [`ReceivedCode`] just long enough
    /// for `on_code` to run exactly once with it, then scrubbed.
    pub fn handle_write<B, F>(
        &mut self,
        id: CharacteristicId,
        buf: &B,
        on_code: F,
    ) -> Result<(), AttError>
    where
        B: AttrBuffer + ?Sized,
        F: FnOnce(&[u8]),
    {
        let def = id.def();
        assert!(
            def.flags.contains(CharFlags::WRITE),
            "write access to non-writable characteristic {id:?}"
        );

        let len = buf.len();
        if len < def.min_len || len > def.max_len {
            debug!("GATT: {:?} write rejected, len={} not in {}..={}", id, len, def.min_len, def.max_len);
            return Err(AttError::InvalidLength);
        }

        self.received.scrub();
        let written = buf
            .flatten(&mut self.received.bytes[..def.max_len])
            .map_err(|e| {
                warn!("GATT: {:?} write could not be flattened ({})", id, e);
                AttError::Unlikely
            })?;
        if written != len {
            warn!("GATT: {:?} flattened {} of {} bytes", id, written, len);
            self.received.scrub();
            return Err(AttError::Unlikely);
        }
        self.received.len = written;

        on_code(self.received.as_bytes());
        self.received.scrub();
        Ok(())
    }

    /// Value served for a read of `id`.
    pub fn read_value(&self, id: CharacteristicId) -> &[u8] {
        match id {
            CharacteristicId::ManufacturerName => self.device_info.manufacturer_name.as_bytes(),
            CharacteristicId::ModelNumber => self.device_info.model_number.as_bytes(),
            CharacteristicId::Code => panic!("read access to write-only characteristic {id:?}"),
        }
    }

    /// Append the value of `id` to a read response.
    pub fn handle_read<S>(&self, id: CharacteristicId, out: &mut S) -> Result<(), AttError>
    where
        S: AttrSink + ?Sized,
    {
        out.append(self.read_value(id)).map_err(|e| {
            warn!("GATT: {:?} read response append failed ({})", id, e);
            AttError::InsufficientResources
        })
    }
}
