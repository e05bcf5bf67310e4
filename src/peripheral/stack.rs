//! Radio stack abstraction.
//!
//! These traits are the seam between the platform-independent peripheral
//! core and a concrete BLE host stack:
//! - **ESP32** (`esp32` feature): NimBLE via `esp32-nimble`
//! - **Host**: the in-process [`crate::sim::SimulatedStack`]
//!
//! The bootstrap sequence drives a [`RadioStack`] once; afterwards the
//! peripheral only holds the [`Advertiser`] and [`Notifier`] handles it got
//! from the stack.

use super::advertising::AdvertisementPayload;
use super::characteristic::{CharacteristicSpec, Descriptor};
use super::events::EventSender;
use crate::config::PeripheralIdentity;
use std::fmt;
use uuid::Uuid;

/// Advertising half of a radio stack.
pub trait Advertiser {
    /// Install the advertisement (and scan response) data.
    fn set_data(&mut self, payload: &AdvertisementPayload) -> Result<(), StackError>;

    /// Begin advertising. Must tolerate being called while already active.
    fn start(&mut self) -> Result<(), StackError>;

    /// Whether the stack is currently advertising.
    ///
    /// The stack stops advertising by itself when a central connects, so
    /// this is the source of truth for [`super::AdvertisingState`].
    fn is_advertising(&self) -> bool;
}

/// Pushes the characteristic value to subscribed centrals.
pub trait Notifier {
    /// Set the stack-side value and notify subscribers.
    fn notify(&mut self, value: &[u8]) -> Result<(), StackError>;
}

/// One-shot GATT server construction, in bootstrap order.
///
/// Every method may fail; bootstrap treats any failure as fatal.
pub trait RadioStack {
    /// Advertising handle type.
    type Advertiser: Advertiser;
    /// Notification handle type.
    type Notifier: Notifier;

    /// Initialize the stack and set the device name.
    fn init(&mut self, identity: &PeripheralIdentity) -> Result<(), StackError>;

    /// Create the GATT server and route connect/disconnect callbacks to `events`.
    fn create_server(&mut self, events: EventSender) -> Result<(), StackError>;

    /// Create the primary service.
    fn create_service(&mut self, service_uuid: Uuid) -> Result<(), StackError>;

    /// Create the characteristic, set its initial value and route
    /// read/write callbacks to `events`.
    fn create_characteristic(
        &mut self,
        service_uuid: Uuid,
        spec: &CharacteristicSpec,
        events: EventSender,
    ) -> Result<Self::Notifier, StackError>;

    /// Attach a standard descriptor to a characteristic.
    fn add_descriptor(
        &mut self,
        characteristic_uuid: Uuid,
        descriptor: Descriptor,
    ) -> Result<(), StackError>;

    /// Make the service queryable by connected centrals.
    fn start_service(&mut self, service_uuid: Uuid) -> Result<(), StackError>;

    /// Hand out the advertising handle.
    fn advertiser(&mut self) -> Result<Self::Advertiser, StackError>;
}

/// A radio stack operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackError {
    /// Operation that failed.
    pub operation: &'static str,
    /// Stack-provided detail.
    pub message: String,
}

impl StackError {
    /// Create a new stack error.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}

impl std::error::Error for StackError {}
