//! Peripheral configuration.
//!
//! The wire-visible identity (device name, service UUID, characteristic
//! UUID) is a set of stable constants: any compatible client binds to them.
//! [`PeripheralConfig`] bundles those constants with the characteristic
//! payloads and advertising hints, and validates that they fit in a legacy
//! advertising payload.

mod peripheral;

pub use peripheral::{
    AdvertisingConfig, ConfigError, ConnIntervalRange, PeripheralConfig, PeripheralIdentity,
    CHARACTERISTIC_UUID, DEFAULT_PREFERRED_INTERVAL, DEVICE_NAME, FOREGROUND_TICK,
    INITIAL_VALUE, MAX_CONN_INTERVAL, MAX_DEVICE_NAME_LEN, MAX_DEVICE_NAME_LEN_NO_SCAN_RESPONSE,
    MIN_CONN_INTERVAL, READ_GREETING, SERVICE_UUID,
};
