//! Event queue between the radio stack and the peripheral.
//!
//! Stack callbacks fire on the stack's own task at arbitrary times. They do
//! not touch peripheral state directly: they enqueue a [`PeripheralEvent`]
//! and return. A single consumer applies events strictly in arrival order,
//! so no two handlers ever run concurrently.
//!
//! Enqueueing never waits on the consumer. A stack serves reads from its own
//! callback and only reports them here.

use super::state::PeerInfo;
use std::fmt;
use tokio::sync::mpsc;

/// Something the peripheral must react to.
#[derive(Debug)]
pub enum PeripheralEvent {
    /// A central connected (advertising was stopped by the stack).
    Connected { peer: PeerInfo },
    /// The central disconnected.
    Disconnected { peer: PeerInfo, reason: String },
    /// A central read the characteristic.
    Read,
    /// A central wrote the characteristic.
    Write { data: Vec<u8> },
    /// The application wants to notify subscribers.
    Notify { data: Vec<u8> },
}

impl PeripheralEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Read => "read",
            Self::Write { .. } => "write",
            Self::Notify { .. } => "notify",
        }
    }
}

/// Create a connected sender/receiver pair.
pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer side. Cheap to clone; one clone per stack callback.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PeripheralEvent>,
}

impl EventSender {
    /// Enqueue an event.
    pub fn send(&self, event: PeripheralEvent) -> Result<(), QueueClosed> {
        self.tx.send(event).map_err(|_| QueueClosed)
    }

    /// Enqueue a connect event.
    pub fn connected(&self, peer: PeerInfo) -> Result<(), QueueClosed> {
        self.send(PeripheralEvent::Connected { peer })
    }

    /// Enqueue a disconnect event.
    pub fn disconnected(&self, peer: PeerInfo, reason: impl Into<String>) -> Result<(), QueueClosed> {
        self.send(PeripheralEvent::Disconnected {
            peer,
            reason: reason.into(),
        })
    }

    /// Enqueue a write event.
    pub fn write(&self, data: Vec<u8>) -> Result<(), QueueClosed> {
        self.send(PeripheralEvent::Write { data })
    }

    /// Enqueue a notification request from the application.
    pub fn notify(&self, data: Vec<u8>) -> Result<(), QueueClosed> {
        self.send(PeripheralEvent::Notify { data })
    }

    /// Enqueue a read event. The stack has already served the value.
    pub fn read(&self) -> Result<(), QueueClosed> {
        self.send(PeripheralEvent::Read)
    }

    /// Returns true once the consumer is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side. Owned by whoever drives the peripheral.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<PeripheralEvent>,
}

impl EventReceiver {
    /// Wait for the next event. `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<PeripheralEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<PeripheralEvent> {
        self.rx.try_recv().ok()
    }
}

/// The event consumer has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peripheral event queue closed")
    }
}

impl std::error::Error for QueueClosed {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (tx, mut rx) = event_queue();
        tx.connected(PeerInfo::new(1, "a")).unwrap();
        tx.write(b"x".to_vec()).unwrap();
        tx.disconnected(PeerInfo::new(1, "a"), "bye").unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["connected", "write", "disconnected"]);
    }

    #[test]
    fn test_send_after_consumer_dropped() {
        let (tx, rx) = event_queue();
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.write(Vec::new()), Err(QueueClosed));
        assert_eq!(tx.read(), Err(QueueClosed));
    }

    #[test]
    fn test_send_never_waits_for_consumer() {
        let (tx, mut rx) = event_queue();
        for _ in 0..1000 {
            tx.read().unwrap();
        }
        tx.notify(b"tick".to_vec()).unwrap();

        assert_eq!(std::iter::from_fn(|| rx.try_recv()).count(), 1001);
    }
}
