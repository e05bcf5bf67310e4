//! Status snapshot published by the peripheral.

use crate::config::PeripheralConfig;
use crate::peripheral::{AdvertisingState, ConnectionState, PeerInfo};
use serde::Serialize;
use uuid::Uuid;

/// Cumulative event counts since bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventCounters {
    pub connections: u64,
    pub disconnections: u64,
    pub reads: u64,
    /// All writes, including zero-length ones.
    pub writes: u64,
    pub empty_writes: u64,
    pub notifications: u64,
    /// Disconnects that actually restarted advertising.
    pub advertising_restarts: u64,
    /// Disconnects after which advertising could not be restarted.
    /// Nonzero means the device may be undiscoverable until reset.
    pub advertising_failures: u64,
}

/// Point-in-time view of the peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralStatus {
    pub device_name: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub connection: ConnectionState,
    pub advertising: AdvertisingState,
    pub peer: Option<PeerInfo>,
    pub value_len: usize,
    pub counters: EventCounters,
}

impl PeripheralStatus {
    /// Snapshot of a peripheral that has not processed anything yet.
    pub fn initial(config: &PeripheralConfig) -> Self {
        Self {
            device_name: config.identity.device_name.clone(),
            service_uuid: config.identity.service_uuid,
            characteristic_uuid: config.characteristic_uuid,
            connection: ConnectionState::Disconnected,
            advertising: AdvertisingState::Stopped,
            peer: None,
            value_len: config.initial_value.len(),
            counters: EventCounters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status() {
        let status = PeripheralStatus::initial(&PeripheralConfig::default());
        assert_eq!(status.device_name, "ESP32 BLE Demo");
        assert_eq!(status.connection, ConnectionState::Disconnected);
        assert_eq!(status.value_len, b"Initial Value".len());
        assert_eq!(status.counters, EventCounters::default());
    }

    #[test]
    fn test_status_json() {
        let mut status = PeripheralStatus::initial(&PeripheralConfig::default());
        status.connection = ConnectionState::Connected;
        status.peer = Some(PeerInfo::new(1, "aa:bb"));
        status.counters.reads = 4;

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["connection"], "connected");
        assert_eq!(json["advertising"], "stopped");
        assert_eq!(json["service_uuid"], "4fafc201-1fb5-459e-8fcc-c5c9c331914b");
        assert_eq!(json["peer"]["address"], "aa:bb");
        assert_eq!(json["counters"]["reads"], 4);
    }
}
