//! The peripheral: lifecycle, characteristic and advertising wired together.
//!
//! [`Peripheral`] is the single consumer of the event queue. It owns the
//! connection state and the characteristic value outright, so the callbacks
//! in [`PeripheralCallbacks`] take `&mut self` and need no locking.

use super::advertising::{AdvertisingController, StartOutcome};
use super::characteristic::{CharacteristicHandler, WriteOutcome};
use super::events::{EventReceiver, PeripheralEvent};
use super::lifecycle::ConnectionLifecycle;
use super::stack::{Advertiser, Notifier, StackError};
use super::state::{AdvertisingState, ConnectionState, PeerInfo};
use crate::config::{PeripheralConfig, PeripheralIdentity};
use crate::status::{EventCounters, PeripheralStatus};
use log::{debug, error, info, warn};
use std::fmt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The four callbacks a radio stack drives.
pub trait PeripheralCallbacks {
    /// A central connected.
    fn on_connect(&mut self, peer: PeerInfo);

    /// The central disconnected. Implementations must resume advertising.
    fn on_disconnect(&mut self, peer: PeerInfo, reason: &str);

    /// A central read the characteristic. Returns the value now stored.
    fn on_read(&mut self) -> Vec<u8>;

    /// A central wrote `data` (possibly empty).
    fn on_write(&mut self, data: &[u8]);
}

/// Result of [`Peripheral::notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Handed to the stack for delivery to subscribers.
    Sent,
    /// No central connected; only the stored value changed.
    NoPeer,
}

/// Single-connection BLE peripheral.
pub struct Peripheral<A, N> {
    identity: PeripheralIdentity,
    characteristic_uuid: Uuid,
    lifecycle: ConnectionLifecycle,
    characteristic: CharacteristicHandler,
    advertising: AdvertisingController<A>,
    notifier: N,
    counters: EventCounters,
    status_tx: watch::Sender<PeripheralStatus>,
}

impl<A: Advertiser, N: Notifier> Peripheral<A, N> {
    /// Assemble a peripheral from bootstrapped stack handles.
    ///
    /// The advertising controller should already be configured.
    pub fn new(config: &PeripheralConfig, advertising: AdvertisingController<A>, notifier: N) -> Self {
        let (status_tx, _) = watch::channel(PeripheralStatus::initial(config));
        let peripheral = Self {
            identity: config.identity.clone(),
            characteristic_uuid: config.characteristic_uuid,
            lifecycle: ConnectionLifecycle::new(),
            characteristic: CharacteristicHandler::new(
                config.initial_value.clone(),
                config.read_greeting.clone(),
            ),
            advertising,
            notifier,
            counters: EventCounters::default(),
            status_tx,
        };
        peripheral.publish_status();
        peripheral
    }

    /// Apply one event. Publishes a fresh status snapshot afterwards.
    pub fn dispatch(&mut self, event: PeripheralEvent) {
        debug!("Dispatching {} event", event.kind());
        match event {
            PeripheralEvent::Connected { peer } => self.on_connect(peer),
            PeripheralEvent::Disconnected { peer, reason } => self.on_disconnect(peer, &reason),
            PeripheralEvent::Read => {
                let served = self.on_read();
                debug!("Read served {} bytes", served.len());
            }
            PeripheralEvent::Write { data } => self.on_write(&data),
            PeripheralEvent::Notify { data } => {
                if let Err(e) = self.notify(&data) {
                    error!("Notification failed: {}", e);
                }
            }
        }
        self.publish_status();
    }

    /// Apply every queued event without waiting. Returns how many were applied.
    pub fn process_pending(&mut self, events: &mut EventReceiver) -> usize {
        let mut applied = 0;
        while let Some(event) = events.try_recv() {
            self.dispatch(event);
            applied += 1;
        }
        applied
    }

    /// Consume events in arrival order until cancelled or every sender is gone.
    pub async fn run(&mut self, events: &mut EventReceiver, cancel: CancellationToken) {
        info!("Peripheral event loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Peripheral event loop shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => {
                        warn!("All event senders dropped, stopping event loop");
                        break;
                    }
                }
            }
        }
    }

    /// Replace the characteristic value and notify the connected central.
    ///
    /// Writes never call this; notifications are an application decision.
    pub fn notify(&mut self, payload: &[u8]) -> Result<NotifyOutcome, NotifyError> {
        self.characteristic.prepare_notification(payload);
        if !self.lifecycle.state().is_connected() {
            debug!("No client connected, notification not sent");
            return Ok(NotifyOutcome::NoPeer);
        }
        self.notifier.notify(payload)?;
        self.counters.notifications += 1;
        info!("Notified {} bytes", payload.len());
        Ok(NotifyOutcome::Sent)
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Current advertising state.
    pub fn advertising_state(&self) -> AdvertisingState {
        self.advertising.state()
    }

    /// Current characteristic value.
    pub fn value(&self) -> &[u8] {
        self.characteristic.value()
    }

    /// Advertised identity.
    pub fn identity(&self) -> &PeripheralIdentity {
        &self.identity
    }

    /// UUID of the exposed characteristic.
    pub fn characteristic_uuid(&self) -> Uuid {
        self.characteristic_uuid
    }

    /// The advertising controller.
    pub fn advertising(&self) -> &AdvertisingController<A> {
        &self.advertising
    }

    /// Event counters since bootstrap.
    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    /// Build a status snapshot.
    pub fn status(&self) -> PeripheralStatus {
        PeripheralStatus {
            device_name: self.identity.device_name.clone(),
            service_uuid: self.identity.service_uuid,
            characteristic_uuid: self.characteristic_uuid,
            connection: self.connection_state(),
            advertising: self.advertising_state(),
            peer: self.lifecycle.peer().cloned(),
            value_len: self.value().len(),
            counters: self.counters.clone(),
        }
    }

    /// Receive a snapshot after every processed event.
    pub fn subscribe_status(&self) -> watch::Receiver<PeripheralStatus> {
        self.status_tx.subscribe()
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status());
    }
}

impl<A: Advertiser, N: Notifier> PeripheralCallbacks for Peripheral<A, N> {
    fn on_connect(&mut self, peer: PeerInfo) {
        self.counters.connections += 1;
        self.lifecycle.on_connect(peer);
    }

    fn on_disconnect(&mut self, peer: PeerInfo, reason: &str) {
        self.counters.disconnections += 1;
        match self
            .lifecycle
            .on_disconnect(&peer, reason, &mut self.advertising)
        {
            Ok(StartOutcome::Started) => self.counters.advertising_restarts += 1,
            Ok(StartOutcome::AlreadyAdvertising) => {}
            Err(_) => self.counters.advertising_failures += 1,
        }
    }

    fn on_read(&mut self) -> Vec<u8> {
        self.counters.reads += 1;
        self.characteristic.on_read()
    }

    fn on_write(&mut self, data: &[u8]) {
        self.counters.writes += 1;
        if self.characteristic.on_write(data) == WriteOutcome::Empty {
            self.counters.empty_writes += 1;
        }
    }
}

/// Errors that can occur while notifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The stack refused the notification.
    Stack(StackError),
}

impl From<StackError> for NotifyError {
    fn from(e: StackError) -> Self {
        Self::Stack(e)
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stack(e) => write!(f, "notify stack error: {}", e),
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stack(e) => Some(e),
        }
    }
}
