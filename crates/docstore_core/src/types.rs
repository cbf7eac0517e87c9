//! Core type definitions for the access layer.

use docstore_kv::ReadOptions;
use std::fmt;

pub use docstore_kv::SequenceNumber;

/// Unique identifier for a transaction state.
///
/// Transaction IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// An encoded key inside a column family.
///
/// Keys are opaque to this layer. Equality and ordering are
/// byte-lexicographic, and a key never changes once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<u8>);

impl Key {
    /// Creates a key from encoded bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the encoded length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the key and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

/// A half-open key range `[start, end)` inside one column family.
///
/// An `end` of `None` means the range extends to the end of the keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBounds {
    start: Key,
    end: Option<Key>,
}

impl KeyBounds {
    /// Creates the range `[start, end)`.
    pub fn new(start: impl Into<Key>, end: impl Into<Key>) -> Self {
        Self {
            start: start.into(),
            end: Some(end.into()),
        }
    }

    /// Creates the range of all keys starting with `prefix`.
    #[must_use]
    pub fn prefix(prefix: &[u8]) -> Self {
        Self {
            start: Key::from(prefix),
            end: prefix_successor(prefix).map(Key::from),
        }
    }

    /// Returns the inclusive start key.
    #[must_use]
    pub fn start(&self) -> &Key {
        &self.start
    }

    /// Returns the exclusive end key, if bounded.
    #[must_use]
    pub fn end(&self) -> Option<&Key> {
        self.end.as_ref()
    }

    /// Returns true if `key` falls inside the range.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start.as_bytes() && self.end.as_ref().map_or(true, |end| key < end.as_bytes())
    }

    /// Applies the range as iterator bounds on top of `options`.
    #[must_use]
    pub fn apply(&self, mut options: ReadOptions) -> ReadOptions {
        options.iterate_lower_bound = Some(self.start.as_bytes().to_vec());
        options.iterate_upper_bound = self.end.as_ref().map(|end| end.as_bytes().to_vec());
        options
    }
}

/// Smallest key greater than every key with the given prefix, if one exists.
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// The logical document operation a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// A new document is inserted.
    Insert,
    /// An existing document is partially updated.
    Update,
    /// An existing document is replaced; its prior value must survive a rollback.
    Replace,
    /// A document is removed.
    Remove,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Remove => "remove",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_ordering() {
        let t1 = TransactionId::new(1);
        let t2 = TransactionId::new(2);
        assert!(t1 < t2);
        assert_eq!(format!("{t2}"), "txn:2");
    }

    #[test]
    fn keys_order_bytewise() {
        let a = Key::from("a");
        let ab = Key::from("ab");
        let b = Key::new(vec![b'b']);
        assert!(a < ab);
        assert!(ab < b);
        assert_eq!(b.as_bytes(), b"b");
        assert_eq!(b.into_bytes(), vec![b'b']);
    }

    #[test]
    fn prefix_bounds() {
        let bounds = KeyBounds::prefix(b"ab");
        assert_eq!(bounds.end(), Some(&Key::from("ac")));
        assert!(bounds.contains(b"ab"));
        assert!(bounds.contains(b"abzzz"));
        assert!(!bounds.contains(b"ac"));
        assert!(!bounds.contains(b"aa"));
    }

    #[test]
    fn prefix_bounds_carry_over_max_bytes() {
        let bounds = KeyBounds::prefix(&[0x01, 0xff]);
        assert_eq!(bounds.end(), Some(&Key::new(vec![0x02])));

        let unbounded = KeyBounds::prefix(&[0xff, 0xff]);
        assert!(unbounded.end().is_none());
        assert!(unbounded.contains(&[0xff, 0xff, 0x00]));
    }

    #[test]
    fn bounds_apply_to_read_options() {
        let options = KeyBounds::new("b", "d").apply(ReadOptions::new());
        assert_eq!(options.iterate_lower_bound, Some(b"b".to_vec()));
        assert_eq!(options.iterate_upper_bound, Some(b"d".to_vec()));
    }

    #[test]
    fn operation_type_display() {
        assert_eq!(OperationType::Replace.to_string(), "replace");
    }
}
