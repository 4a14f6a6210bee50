//! Code lock configuration parameters.
//!
//! Supplied once at boot. The access code is held in RAM only and is
//! never persisted by the firmware.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::gap::advertising::AdvertisementData;
use crate::gatt::DeviceInfo;
use crate::verifier::MAX_SECRET_LEN;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodelockConfig {
    // --- Identity ---
    /// GAP device name, also advertised as the complete local name.
    pub device_name: heapless::String<32>,
    /// Device Information: Manufacturer Name String.
    pub manufacturer_name: heapless::String<32>,
    /// Device Information: Model Number String.
    pub model_number: heapless::String<32>,

    // --- Access ---
    /// Initial access code (0-24 bytes).
    pub access_code: heapless::String<32>,
    /// How long the latch stays released after a correct code (ms).
    pub unlock_hold_ms: u32,
}

impl Default for CodelockConfig {
    fn default() -> Self {
        Self {
            device_name: fixed("ble_codelock"),
            manufacturer_name: fixed("Apache Mynewt ESP32 devkitC"),
            model_number: heapless::String::new(),
            access_code: fixed("1234"),
            unlock_hold_ms: 3000,
        }
    }
}

fn fixed(s: &str) -> heapless::String<32> {
    let mut out = heapless::String::new();
    let _ = out.push_str(s);
    out
}

impl CodelockConfig {
    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty() {
            return Err(ConfigError::Invalid("device_name is empty"));
        }
        if !self.advertisement().fits() {
            return Err(ConfigError::Invalid(
                "device_name too long for the advertisement (max 23 bytes)",
            ));
        }
        if self.access_code.len() > MAX_SECRET_LEN {
            return Err(ConfigError::Invalid("access_code longer than 24 bytes"));
        }
        if self.unlock_hold_ms == 0 {
            return Err(ConfigError::Invalid("unlock_hold_ms must be non-zero"));
        }
        Ok(())
    }

    pub fn advertisement(&self) -> AdvertisementData {
        AdvertisementData::new(&self.device_name)
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            manufacturer_name: self.manufacturer_name.clone(),
            model_number: self.model_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for this schema.
    Parse,
    /// A field failed validation; the message names it.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "config parse failed"),
            Self::Invalid(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
