//! Connection and advertising states.

use serde::Serialize;
use std::fmt;

/// Single-peer connection state. Mutated only by stack callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No central is connected.
    #[default]
    Disconnected,
    /// A central is connected.
    Connected,
}

impl ConnectionState {
    /// Returns true if a central is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Whether the peripheral is currently discoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvertisingState {
    /// Not discoverable (before bootstrap, or stopped by the stack on connect).
    #[default]
    Stopped,
    /// Broadcasting advertisements.
    Advertising,
}

impl fmt::Display for AdvertisingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Advertising => write!(f, "advertising"),
        }
    }
}

/// Identifies the connected central.
///
/// Only used for logging; the peripheral accepts a single connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerInfo {
    /// Stack connection handle.
    pub conn_handle: u16,
    /// Peer address as reported by the stack.
    pub address: String,
}

impl PeerInfo {
    /// Create a new peer descriptor.
    pub fn new(conn_handle: u16, address: impl Into<String>) -> Self {
        Self {
            conn_handle,
            address: address.into(),
        }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (handle {})", self.address, self.conn_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_states() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(AdvertisingState::default(), AdvertisingState::Stopped);
        assert!(!ConnectionState::default().is_connected());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ConnectionState::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
        let json = serde_json::to_string(&AdvertisingState::Advertising).unwrap();
        assert_eq!(json, "\"advertising\"");
    }

    #[test]
    fn test_peer_display() {
        let peer = PeerInfo::new(1, "aa:bb:cc:dd:ee:ff");
        assert_eq!(peer.to_string(), "aa:bb:cc:dd:ee:ff (handle 1)");
    }
}
