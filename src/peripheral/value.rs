//! Characteristic value store.
//!
//! Holds the bytes a central reads back. Two writers touch it: the peer (via
//! GATT write) and the read handler (which resets it before serving). Both
//! run on the single event consumer, so no locking is needed here.

/// Current value of the exposed characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueStore {
    value: Vec<u8>,
}

impl ValueStore {
    /// Create a store holding `initial`.
    pub fn new(initial: impl Into<Vec<u8>>) -> Self {
        Self {
            value: initial.into(),
        }
    }

    /// Current value.
    pub fn current(&self) -> &[u8] {
        &self.value
    }

    /// Replace the value. Last write wins.
    pub fn overwrite(&mut self, bytes: &[u8]) {
        self.value.clear();
        self.value.extend_from_slice(bytes);
    }

    /// Length of the current value in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns true if the current value is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Format a characteristic value for log output.
pub fn format_value(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) => format!("{:?}", text),
        Err(_) => format!("<binary {} bytes>", value.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_value() {
        let store = ValueStore::new(b"Initial Value".to_vec());
        assert_eq!(store.current(), b"Initial Value");
        assert_eq!(store.len(), 13);
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = ValueStore::new(Vec::new());
        assert!(store.is_empty());
        store.overwrite(b"first, and longer");
        store.overwrite(b"second");
        // No merge with the longer previous value
        assert_eq!(store.current(), b"second");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(b"hello"), "\"hello\"");
        assert_eq!(format_value(&[0xff, 0xfe]), "<binary 2 bytes>");
        assert_eq!(format_value(b""), "\"\"");
    }
}
