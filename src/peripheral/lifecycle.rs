//! Connection lifecycle handler.
//!
//! Tracks the single-peer [`ConnectionState`] and makes the peripheral
//! discoverable again after every disconnect. The restart is unconditional:
//! [`AdvertisingController::start`] is idempotent, and a missed restart would
//! leave the device undiscoverable until reset.

use super::advertising::{AdvertisingController, AdvertisingError, StartOutcome};
use super::stack::Advertiser;
use super::state::{ConnectionState, PeerInfo};
use log::{error, info, warn};

/// Owns the connection state. Driven only by stack callbacks.
#[derive(Debug, Default)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
    peer: Option<PeerInfo>,
}

impl ConnectionLifecycle {
    /// Create a handler in the `Disconnected` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// A central connected.
    pub fn on_connect(&mut self, peer: PeerInfo) {
        if let Some(current) = &self.peer {
            // Single-connection peripheral; the stack should not allow this
            warn!("Connect from {} while {} is still connected", peer, current);
        }
        info!("A client connected: {}", peer);
        self.state = ConnectionState::Connected;
        self.peer = Some(peer);
    }

    /// A central disconnected. Always restarts advertising.
    ///
    /// A restart failure is logged at error level and returned; the
    /// connection state is `Disconnected` either way.
    pub fn on_disconnect<A: Advertiser>(
        &mut self,
        peer: &PeerInfo,
        reason: &str,
        advertising: &mut AdvertisingController<A>,
    ) -> Result<StartOutcome, AdvertisingError> {
        self.state = ConnectionState::Disconnected;
        self.peer = None;

        let result = advertising.start();
        match &result {
            Ok(_) => info!(
                "Client {} disconnected ({}); advertising resumed",
                peer, reason
            ),
            Err(e) => error!(
                "Client {} disconnected ({}); failed to resume advertising: {}",
                peer, reason, e
            ),
        }
        result
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The connected peer, if any.
    pub fn peer(&self) -> Option<&PeerInfo> {
        self.peer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeripheralConfig;
    use crate::peripheral::advertising::tests::RecordingAdvertiser;
    use crate::peripheral::state::AdvertisingState;

    fn advertising() -> AdvertisingController<RecordingAdvertiser> {
        let config = PeripheralConfig::default();
        let mut controller = AdvertisingController::new(RecordingAdvertiser::default());
        controller
            .configure(&config.identity, &config.advertising)
            .unwrap();
        controller
    }

    #[test]
    fn test_connect_sets_connected() {
        let mut lifecycle = ConnectionLifecycle::new();
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

        lifecycle.on_connect(PeerInfo::new(1, "peer"));
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
        assert_eq!(lifecycle.peer().map(|p| p.conn_handle), Some(1));
    }

    #[test]
    fn test_disconnect_restarts_advertising() {
        let mut adv = advertising();
        let mut lifecycle = ConnectionLifecycle::new();
        let peer = PeerInfo::new(1, "peer");

        lifecycle.on_connect(peer.clone());
        let outcome = lifecycle.on_disconnect(&peer, "timeout", &mut adv);

        assert_eq!(outcome, Ok(StartOutcome::Started));
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
        assert!(lifecycle.peer().is_none());
        assert_eq!(adv.state(), AdvertisingState::Advertising);
        assert_eq!(adv.backend().start_calls, 1);
    }

    #[test]
    fn test_disconnect_while_advertising_is_tolerated() {
        let mut adv = advertising();
        adv.start().unwrap();
        let mut lifecycle = ConnectionLifecycle::new();

        // Spurious disconnect: restart is still requested, and is a no-op
        let outcome = lifecycle.on_disconnect(&PeerInfo::new(3, "peer"), "unknown", &mut adv);
        assert_eq!(outcome, Ok(StartOutcome::AlreadyAdvertising));
        assert_eq!(adv.backend().start_calls, 1);
    }

    #[test]
    fn test_restart_failure_still_disconnects() {
        let mut adv = advertising();
        let mut lifecycle = ConnectionLifecycle::new();
        let peer = PeerInfo::new(1, "peer");
        lifecycle.on_connect(peer.clone());

        adv_fail(&mut adv);
        let outcome = lifecycle.on_disconnect(&peer, "timeout", &mut adv);

        assert!(matches!(outcome, Err(AdvertisingError::Stack(_))));
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
        assert_eq!(adv.state(), AdvertisingState::Stopped);
    }

    fn adv_fail(adv: &mut AdvertisingController<RecordingAdvertiser>) {
        adv.backend_mut().fail_start = true;
    }
}
