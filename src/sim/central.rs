//! Simulated central (the phone side).

use super::stack::{lock, SimState, SimulatedStack};
use crate::peripheral::{AdvertisementPayload, Capabilities, PeerInfo, QueueClosed};
use log::{debug, info};
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Disconnect reason reported by the simulated controller.
pub const REMOTE_USER_TERMINATED: &str = "remote user terminated connection";

/// What a central learns from GATT discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Advertised GATT properties.
    pub capabilities: Capabilities,
    /// Whether notifications can be enabled.
    pub has_cccd: bool,
    /// Attribute value at discovery time.
    pub value: Vec<u8>,
}

/// A central talking to a [`SimulatedStack`].
#[derive(Debug, Clone)]
pub struct SimulatedCentral {
    state: Arc<Mutex<SimState>>,
    address: String,
}

impl SimulatedCentral {
    /// Create a central with the given address.
    pub fn new(stack: &SimulatedStack, address: impl Into<String>) -> Self {
        Self {
            state: stack.state.clone(),
            address: address.into(),
        }
    }

    /// Returns the advertisement if the peripheral is discoverable.
    pub fn scan(&self) -> Option<AdvertisementPayload> {
        let state = lock(&self.state);
        if state.advertising {
            state.advertisement.clone()
        } else {
            None
        }
    }

    /// Connect. The controller stops advertising, then reports the connection.
    pub fn connect(&self) -> Result<PeerInfo, CentralError> {
        let mut state = lock(&self.state);
        if state.connected.is_some() {
            return Err(CentralError::AlreadyConnected);
        }
        if !state.advertising {
            return Err(CentralError::NotAdvertising);
        }
        let events = state.server_events.clone().ok_or(CentralError::NotAdvertising)?;

        state.next_conn_handle = state.next_conn_handle.wrapping_add(1);
        let peer = PeerInfo::new(state.next_conn_handle, self.address.clone());
        state.advertising = false;
        state.subscribed = false;
        state.connected = Some(peer.clone());
        drop(state);

        debug!("Central {} connecting", self.address);
        events.connected(peer.clone())?;
        Ok(peer)
    }

    /// Disconnect and report it to the peripheral.
    pub fn disconnect(&self) -> Result<(), CentralError> {
        let mut state = lock(&self.state);
        let peer = state.connected.take().ok_or(CentralError::NotConnected)?;
        state.subscribed = false;
        let events = state.server_events.clone().ok_or(CentralError::NotConnected)?;
        drop(state);

        debug!("Central {} disconnecting", self.address);
        events.disconnected(peer, REMOTE_USER_TERMINATED)?;
        Ok(())
    }

    /// Look up the characteristic inside `service`.
    pub fn discover(&self, service: Uuid) -> Result<DiscoveredCharacteristic, CentralError> {
        let mut state = lock(&self.state);
        if state.connected.is_none() {
            return Err(CentralError::NotConnected);
        }
        let characteristic = state
            .service_mut(service)
            .filter(|s| s.started)
            .and_then(|s| s.characteristic.clone())
            .ok_or(CentralError::ServiceNotFound(service))?;
        Ok(DiscoveredCharacteristic {
            uuid: characteristic.uuid,
            capabilities: characteristic.capabilities,
            has_cccd: characteristic.has_cccd,
            value: characteristic.value,
        })
    }

    /// Write with response.
    pub fn write(&self, data: &[u8]) -> Result<(), CentralError> {
        let events = {
            let mut state = lock(&self.state);
            if state.connected.is_none() {
                return Err(CentralError::NotConnected);
            }
            if let Some(characteristic) = state.characteristic_mut() {
                characteristic.value = data.to_vec();
            }
            state.characteristic_events.clone().ok_or(CentralError::NotConnected)?
        };
        events.write(data.to_vec())?;
        Ok(())
    }

    /// Read the characteristic.
    ///
    /// Runs like NimBLE's read callback: under the stack lock, the attribute
    /// is set to the greeting and served at once, and the peripheral only
    /// hears about the read through its queue.
    pub fn read(&self) -> Result<Vec<u8>, CentralError> {
        let mut state = lock(&self.state);
        if state.connected.is_none() {
            return Err(CentralError::NotConnected);
        }
        let events = state
            .characteristic_events
            .clone()
            .ok_or(CentralError::NotConnected)?;
        let characteristic = state
            .characteristic_mut()
            .ok_or(CentralError::NotConnected)?;
        characteristic.value = characteristic.read_greeting.clone();
        let served = characteristic.value.clone();
        events.read()?;
        Ok(served)
    }

    /// Enable notifications through the CCCD.
    pub fn subscribe(&self) -> Result<(), CentralError> {
        let mut state = lock(&self.state);
        if state.connected.is_none() {
            return Err(CentralError::NotConnected);
        }
        let subscribable = state
            .characteristic_mut()
            .map(|c| c.has_cccd && c.capabilities.contains(Capabilities::NOTIFY))
            .unwrap_or(false);
        if !subscribable {
            return Err(CentralError::NotSubscribable);
        }
        state.subscribed = true;
        info!("Central {} subscribed to notifications", self.address);
        Ok(())
    }

    /// Notifications received so far.
    pub fn notifications(&self) -> Vec<Vec<u8>> {
        lock(&self.state).notifications.clone()
    }

    /// Whether this central holds the connection.
    pub fn is_connected(&self) -> bool {
        lock(&self.state)
            .connected
            .as_ref()
            .is_some_and(|p| p.address == self.address)
    }

    /// This central's address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Errors that can occur on the central side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralError {
    /// Peripheral is not discoverable.
    NotAdvertising,
    /// A central is already connected.
    AlreadyConnected,
    /// Operation needs a connection.
    NotConnected,
    /// Service not present or not started.
    ServiceNotFound(Uuid),
    /// Characteristic has no CCCD.
    NotSubscribable,
    /// Peripheral event queue is gone.
    QueueClosed,
}

impl From<QueueClosed> for CentralError {
    fn from(_: QueueClosed) -> Self {
        Self::QueueClosed
    }
}

impl fmt::Display for CentralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAdvertising => write!(f, "peripheral is not advertising"),
            Self::AlreadyConnected => write!(f, "a central is already connected"),
            Self::NotConnected => write!(f, "not connected"),
            Self::ServiceNotFound(uuid) => write!(f, "service {} not found", uuid),
            Self::NotSubscribable => write!(f, "characteristic does not support notifications"),
            Self::QueueClosed => write!(f, "peripheral event queue closed"),
        }
    }
}

impl std::error::Error for CentralError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PeripheralConfig, SERVICE_UUID};
    use crate::peripheral::{bootstrap, Bootstrapped};
    use crate::sim::{SimAdvertiser, SimNotifier};

    type Booted = Bootstrapped<SimAdvertiser, SimNotifier>;

    fn booted() -> (SimulatedStack, SimulatedCentral, Booted) {
        let mut stack = SimulatedStack::new();
        let booted = bootstrap(&mut stack, &PeripheralConfig::default()).unwrap();
        let central = SimulatedCentral::new(&stack, "central");
        (stack, central, booted)
    }

    #[test]
    fn test_connect_stops_advertising() {
        let (stack, central, _booted) = booted();
        assert!(central.scan().is_some());
        central.connect().unwrap();
        assert!(!stack.is_advertising());
        assert!(central.scan().is_none());
        assert!(central.is_connected());
    }

    #[test]
    fn test_second_central_rejected() {
        let (stack, central, _booted) = booted();
        central.connect().unwrap();
        let other = SimulatedCentral::new(&stack, "other");
        assert_eq!(other.connect(), Err(CentralError::AlreadyConnected));
        assert!(!other.is_connected());
    }

    #[test]
    fn test_operations_need_connection() {
        let (_stack, central, _booted) = booted();
        assert_eq!(central.write(b"x"), Err(CentralError::NotConnected));
        assert_eq!(central.read().err(), Some(CentralError::NotConnected));
        assert_eq!(central.subscribe(), Err(CentralError::NotConnected));
        assert_eq!(central.disconnect(), Err(CentralError::NotConnected));
    }

    #[test]
    fn test_discover_unknown_service() {
        let (_stack, central, _booted) = booted();
        central.connect().unwrap();
        let unknown = Uuid::from_u128(1);
        assert_eq!(
            central.discover(unknown),
            Err(CentralError::ServiceNotFound(unknown))
        );
        assert!(central.discover(SERVICE_UUID).is_ok());
    }

    #[test]
    fn test_events_reach_queue() {
        let (_stack, central, mut booted) = booted();
        central.connect().unwrap();
        central.write(b"abc").unwrap();
        central.read().unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| booted.events.try_recv())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["connected", "write", "read"]);
    }

    #[test]
    fn test_read_served_before_peripheral_runs() {
        let (_stack, central, mut booted) = booted();
        central.connect().unwrap();
        central.write(b"abc").unwrap();

        assert_eq!(central.read().unwrap(), b"Hello from ESP32!");
        assert_eq!(
            central.discover(SERVICE_UUID).unwrap().value,
            b"Hello from ESP32!"
        );
        // Consumer has not touched the queue yet
        assert_eq!(booted.peripheral.counters().reads, 0);
        assert_eq!(booted.peripheral.process_pending(&mut booted.events), 3);
        assert_eq!(booted.peripheral.counters().reads, 1);
    }

    #[test]
    fn test_read_after_peripheral_gone() {
        let (_stack, central, booted) = booted();
        central.connect().unwrap();
        drop(booted);
        assert_eq!(central.read(), Err(CentralError::QueueClosed));
    }
}
