//! Peripheral status reporting.
//!
//! The peripheral publishes a [`PeripheralStatus`] snapshot after every
//! event it processes. [`StatusServer`] serves the latest one over HTTP.

mod server;
mod stats;

pub use server::{StatusServer, DEFAULT_STATUS_PORT};
pub use stats::{EventCounters, PeripheralStatus};
