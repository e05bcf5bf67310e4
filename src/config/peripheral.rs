//! Peripheral configuration data structures.
//!
//! Platform-independent types describing what the peripheral advertises and
//! serves. Everything here can be tested on the host machine.
//!
//! # Example
//!
//! ```
//! use ble_demo_esp32::config::{PeripheralConfig, DEVICE_NAME, SERVICE_UUID};
//!
//! let config = PeripheralConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.identity.device_name, DEVICE_NAME);
//! assert_eq!(config.identity.service_uuid, SERVICE_UUID);
//! ```

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Advertised device name.
pub const DEVICE_NAME: &str = "ESP32 BLE Demo";

/// UUID of the single GATT service.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x4fafc201_1fb5_459e_8fcc_c5c9c331914b);

/// UUID of the read/write/notify characteristic.
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26a8);

/// Placeholder value set on the characteristic at bootstrap.
pub const INITIAL_VALUE: &[u8] = b"Initial Value";

/// Payload written into the characteristic right before every read is served.
pub const READ_GREETING: &[u8] = b"Hello from ESP32!";

/// Maximum device name length when the name travels in the scan response.
///
/// 31-byte payload minus the 2-byte AD header.
pub const MAX_DEVICE_NAME_LEN: usize = 29;

/// Maximum device name length when the name shares the primary payload.
///
/// 31 bytes minus flags (3) minus the complete 128-bit UUID list (18) minus
/// the 2-byte AD header of the name itself.
pub const MAX_DEVICE_NAME_LEN_NO_SCAN_RESPONSE: usize = 8;

/// Lowest connection interval allowed by Bluetooth Core (7.5 ms).
pub const MIN_CONN_INTERVAL: u16 = 0x0006;

/// Highest connection interval allowed by Bluetooth Core (4 s).
pub const MAX_CONN_INTERVAL: u16 = 0x0C80;

/// Preferred connection interval hint. Short intervals help iOS connect faster.
pub const DEFAULT_PREFERRED_INTERVAL: ConnIntervalRange = ConnIntervalRange {
    min: 0x0006,
    max: 0x0012,
};

/// Poll interval for foreground loops that also watch a shutdown flag.
pub const FOREGROUND_TICK: Duration = Duration::from_millis(100);

/// Immutable identity of the peripheral: what scanners see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralIdentity {
    /// Human-readable device name.
    pub device_name: String,
    /// UUID of the advertised service.
    pub service_uuid: Uuid,
}

impl PeripheralIdentity {
    /// Create a new identity.
    pub fn new(device_name: impl Into<String>, service_uuid: Uuid) -> Self {
        Self {
            device_name: device_name.into(),
            service_uuid,
        }
    }
}

impl Default for PeripheralIdentity {
    fn default() -> Self {
        Self::new(DEVICE_NAME, SERVICE_UUID)
    }
}

/// Preferred connection interval range in units of 1.25 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnIntervalRange {
    /// Minimum interval.
    pub min: u16,
    /// Maximum interval.
    pub max: u16,
}

impl ConnIntervalRange {
    /// Create a new range. Call [`validate`](Self::validate) before use.
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Check ordering and Bluetooth Core bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_bounds = |v: u16| (MIN_CONN_INTERVAL..=MAX_CONN_INTERVAL).contains(&v);
        if self.min > self.max || !in_bounds(self.min) || !in_bounds(self.max) {
            return Err(ConfigError::InvalidConnInterval {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Minimum interval in milliseconds.
    pub fn min_ms(&self) -> f32 {
        self.min as f32 * 1.25
    }

    /// Maximum interval in milliseconds.
    pub fn max_ms(&self) -> f32 {
        self.max as f32 * 1.25
    }
}

impl Default for ConnIntervalRange {
    fn default() -> Self {
        DEFAULT_PREFERRED_INTERVAL
    }
}

/// Discoverability hints handed to the advertising controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingConfig {
    /// Answer scan requests (the device name moves into the scan response).
    pub scan_response: bool,
    /// Preferred connection interval range.
    pub preferred_interval: ConnIntervalRange,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            scan_response: true,
            preferred_interval: DEFAULT_PREFERRED_INTERVAL,
        }
    }
}

/// Everything needed to bootstrap the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralConfig {
    /// Device name and service UUID.
    pub identity: PeripheralIdentity,
    /// UUID of the single characteristic.
    pub characteristic_uuid: Uuid,
    /// Placeholder value set at bootstrap.
    pub initial_value: Vec<u8>,
    /// Value served on every read.
    pub read_greeting: Vec<u8>,
    /// Advertising parameters.
    pub advertising: AdvertisingConfig,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            identity: PeripheralIdentity::default(),
            characteristic_uuid: CHARACTERISTIC_UUID,
            initial_value: INITIAL_VALUE.to_vec(),
            read_greeting: READ_GREETING.to_vec(),
            advertising: AdvertisingConfig::default(),
        }
    }
}

impl PeripheralConfig {
    /// Replace the advertised device name.
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.identity.device_name = name.into();
        self
    }

    /// Replace the service and characteristic UUIDs.
    pub fn with_uuids(mut self, service: Uuid, characteristic: Uuid) -> Self {
        self.identity.service_uuid = service;
        self.characteristic_uuid = characteristic;
        self
    }

    /// Replace the advertising parameters.
    pub fn with_advertising(mut self, advertising: AdvertisingConfig) -> Self {
        self.advertising = advertising;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name_len = self.identity.device_name.len();
        if name_len == 0 {
            return Err(ConfigError::DeviceNameEmpty);
        }

        let max = if self.advertising.scan_response {
            MAX_DEVICE_NAME_LEN
        } else {
            MAX_DEVICE_NAME_LEN_NO_SCAN_RESPONSE
        };
        if name_len > max {
            return Err(ConfigError::DeviceNameTooLong { len: name_len, max });
        }

        if self.identity.service_uuid == self.characteristic_uuid {
            return Err(ConfigError::UuidCollision(self.characteristic_uuid));
        }

        self.advertising.preferred_interval.validate()
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Device name is empty.
    DeviceNameEmpty,
    /// Device name does not fit in the advertising payload.
    DeviceNameTooLong { len: usize, max: usize },
    /// Service and characteristic share a UUID.
    UuidCollision(Uuid),
    /// Connection interval range is inverted or out of bounds.
    InvalidConnInterval { min: u16, max: u16 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNameEmpty => write!(f, "device name cannot be empty"),
            Self::DeviceNameTooLong { len, max } => {
                write!(f, "device name too long: {} bytes (max {})", len, max)
            }
            Self::UuidCollision(uuid) => {
                write!(f, "service and characteristic share UUID {}", uuid)
            }
            Self::InvalidConnInterval { min, max } => write!(
                f,
                "invalid connection interval range {:#06x}..={:#06x}",
                min, max
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
