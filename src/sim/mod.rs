//! Simulated BLE controller for host builds and tests.
//!
//! [`SimulatedStack`] implements [`RadioStack`](crate::peripheral::RadioStack)
//! entirely in memory. [`SimulatedCentral`] plays the phone: it scans,
//! connects, discovers, reads, writes and subscribes against the same shared
//! controller state, and its actions reach the peripheral through the event
//! queue exactly as NimBLE callbacks would.
//!
//! Faults can be injected at any bootstrap step with
//! [`SimulatedStack::fail_at`], and advertising restarts can be made to fail
//! with [`SimulatedStack::fail_advertising_start`].

mod central;
mod stack;

pub use central::{
    CentralError, DiscoveredCharacteristic, SimulatedCentral, REMOTE_USER_TERMINATED,
};
pub use stack::{SimAdvertiser, SimCharacteristic, SimNotifier, SimulatedStack};
