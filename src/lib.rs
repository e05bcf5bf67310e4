//! ESP32 BLE demo peripheral library.
//!
//! This library contains the platform-independent peripheral core, which can
//! be tested on the host machine against a simulated radio, plus the NimBLE
//! backend used on the device.

pub mod config;
pub mod console;
#[cfg(feature = "esp32")]
pub mod nimble;
pub mod peripheral;
pub mod sim;
pub mod status;

// Re-export commonly used items
pub use config::{ConfigError, PeripheralConfig, PeripheralIdentity};
pub use peripheral::{
    bootstrap, AdvertisingState, BootstrapError, Bootstrapped, ConnectionState, Peripheral,
    PeripheralCallbacks,
};
pub use status::{PeripheralStatus, StatusServer, DEFAULT_STATUS_PORT};
