//! GATT characteristic definition and event handler.
//!
//! # Read/write contract
//!
//! - **Write** overwrites the stored value (last write wins). A zero-length
//!   write is a no-op.
//! - **Read** is not a pure accessor: the stored value is reset to the
//!   greeting payload right before it is served. A written value is
//!   therefore never echoed back by a read.
//! - **Notify** is only triggered explicitly by the application, never by a
//!   write.

use super::value::{format_value, ValueStore};
use crate::config::PeripheralConfig;
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::ops::BitOr;
use uuid::Uuid;

/// Set of GATT properties a characteristic exposes. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Central may read the value.
    pub const READ: Self = Self(0x02);
    /// Central may write the value (with response).
    pub const WRITE: Self = Self(0x08);
    /// Central may subscribe to notifications.
    pub const NOTIFY: Self = Self(0x10);

    /// Read, write and notify.
    pub const READ_WRITE_NOTIFY: Self = Self(0x02 | 0x08 | 0x10);

    /// Returns true if every property in `other` is present.
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw GATT properties bitfield (Bluetooth Core Vol 3, Part G, 3.3.1.1).
    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::READ, "read"),
            (Self::WRITE, "write"),
            (Self::NOTIFY, "notify"),
        ]
        .iter()
        .filter(|(cap, _)| self.contains(*cap))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Standard descriptors the peripheral can attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    /// Client Characteristic Configuration; lets centrals enable notifications.
    ClientCharacteristicConfiguration,
}

impl Descriptor {
    /// Assigned 16-bit UUID.
    pub fn uuid16(&self) -> u16 {
        match self {
            Self::ClientCharacteristicConfiguration => 0x2902,
        }
    }
}

/// Static shape of the exposed characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicSpec {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// GATT properties.
    pub capabilities: Capabilities,
    /// Placeholder value set at creation.
    pub initial_value: Vec<u8>,
    /// Bytes the stack serves for every read, straight from its callback.
    pub read_greeting: Vec<u8>,
    /// Descriptors attached after creation.
    pub descriptors: Vec<Descriptor>,
}

impl CharacteristicSpec {
    /// The read/write/notify characteristic described by `config`.
    pub fn from_config(config: &PeripheralConfig) -> Self {
        Self {
            uuid: config.characteristic_uuid,
            capabilities: Capabilities::READ_WRITE_NOTIFY,
            initial_value: config.initial_value.clone(),
            read_greeting: config.read_greeting.clone(),
            descriptors: vec![Descriptor::ClientCharacteristicConfiguration],
        }
    }
}

/// Result of [`CharacteristicHandler::on_write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Zero-length write, value untouched.
    Empty,
    /// Value replaced with this many bytes.
    Stored(usize),
}

/// Mediates between the stack's read/write callbacks and the value store.
#[derive(Debug)]
pub struct CharacteristicHandler {
    store: ValueStore,
    greeting: Vec<u8>,
}

impl CharacteristicHandler {
    /// Create a handler holding `initial`, serving `greeting` on reads.
    pub fn new(initial: impl Into<Vec<u8>>, greeting: impl Into<Vec<u8>>) -> Self {
        Self {
            store: ValueStore::new(initial),
            greeting: greeting.into(),
        }
    }

    /// A central wrote `data`.
    pub fn on_write(&mut self, data: &[u8]) -> WriteOutcome {
        if data.is_empty() {
            debug!("Ignoring zero-length write");
            return WriteOutcome::Empty;
        }
        self.store.overwrite(data);
        info!("Received value: {}", format_value(data));
        WriteOutcome::Stored(data.len())
    }

    /// A central read the characteristic. Returns the bytes it was served.
    pub fn on_read(&mut self) -> Vec<u8> {
        self.store.overwrite(&self.greeting);
        info!("Characteristic was read by the client");
        self.store.current().to_vec()
    }

    /// The application is about to notify `payload`.
    pub fn prepare_notification(&mut self, payload: &[u8]) {
        self.store.overwrite(payload);
    }

    /// Current stored value.
    pub fn value(&self) -> &[u8] {
        self.store.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHARACTERISTIC_UUID, INITIAL_VALUE, READ_GREETING};

    fn handler() -> CharacteristicHandler {
        CharacteristicHandler::new(INITIAL_VALUE, READ_GREETING)
    }

    #[test]
    fn test_capabilities() {
        let caps = Capabilities::READ | Capabilities::WRITE;
        assert!(caps.contains(Capabilities::READ));
        assert!(!caps.contains(Capabilities::NOTIFY));
        assert_eq!(Capabilities::READ_WRITE_NOTIFY.bits(), 0x1a);
        assert_eq!(Capabilities::READ_WRITE_NOTIFY.to_string(), "read|write|notify");
    }

    #[test]
    fn test_spec_from_config() {
        let spec = CharacteristicSpec::from_config(&PeripheralConfig::default());
        assert_eq!(spec.uuid, CHARACTERISTIC_UUID);
        assert_eq!(spec.capabilities, Capabilities::READ_WRITE_NOTIFY);
        assert_eq!(spec.initial_value, b"Initial Value");
        assert_eq!(spec.read_greeting, b"Hello from ESP32!");
        assert_eq!(
            spec.descriptors,
            vec![Descriptor::ClientCharacteristicConfiguration]
        );
        assert_eq!(spec.descriptors[0].uuid16(), 0x2902);
    }

    #[test]
    fn test_write_stores_value() {
        let mut handler = handler();
        assert_eq!(handler.on_write(b"hello"), WriteOutcome::Stored(5));
        assert_eq!(handler.value(), b"hello");
    }

    #[test]
    fn test_empty_write_is_noop() {
        let mut handler = handler();
        assert_eq!(handler.on_write(b""), WriteOutcome::Empty);
        assert_eq!(handler.value(), b"Initial Value");
    }

    #[test]
    fn test_read_serves_greeting_not_written_value() {
        let mut handler = handler();
        handler.on_write(b"W1");
        handler.on_write(b"W2");
        assert_eq!(handler.on_read(), b"Hello from ESP32!");
        assert_eq!(handler.value(), b"Hello from ESP32!");
    }

    #[test]
    fn test_consecutive_reads_identical() {
        let mut handler = handler();
        let first = handler.on_read();
        let second = handler.on_read();
        assert_eq!(first, second);
    }

    #[test]
    fn test_binary_write() {
        let mut handler = handler();
        handler.on_write(&[0x00, 0xff, 0x10]);
        assert_eq!(handler.value(), &[0x00, 0xff, 0x10]);
    }
}
