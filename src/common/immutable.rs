//! Bencoded DHT values and helper functions for immutable items.

use std::fmt::{self, Debug, Formatter};

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use serde_bencode::value::Value;
use sha1_smol::Sha1;

use crate::Id;

#[derive(Clone, PartialEq, Eq, Hash)]
/// An opaque DHT value, held in its canonical bencoded form.
///
/// The bytes are what gets stored on the DHT, what the target of an immutable
/// item is hashed from, and what follows `1:v` in a mutable item's signable.
pub struct Item(Bytes);

impl Item {
    /// Bencode any serializable value.
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self, ItemError> {
        let encoded = serde_bencode::to_bytes(value)?;

        Ok(Self(encoded.into()))
    }

    /// A bencoded byte string, the most common shape of a DHT value.
    pub fn bytes(value: &[u8]) -> Self {
        let mut encoded = Vec::with_capacity(value.len() + 6);
        encoded.extend(format!("{}:", value.len()).bytes());
        encoded.extend_from_slice(value);

        Self(encoded.into())
    }

    /// Wrap an already bencoded value.
    ///
    /// Returns an error if `encoded` is not exactly one canonically bencoded value,
    /// since a non canonical encoding would hash and sign differently on other nodes.
    pub fn from_bencoded<T: Into<Bytes>>(encoded: T) -> Result<Self, ItemError> {
        let encoded: Bytes = encoded.into();

        let value: Value = serde_bencode::from_bytes(&encoded)?;

        if serde_bencode::to_bytes(&value)?[..] != encoded[..] {
            return Err(ItemError::NonCanonical);
        }

        Ok(Self(encoded))
    }

    /// Deserialize the bencoded value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ItemError> {
        Ok(serde_bencode::from_bytes(&self.0)?)
    }

    /// The canonical bencoded bytes.
    pub fn encoded(&self) -> &[u8] {
        &self.0
    }

    /// Length of the bencoded value in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Target of this value stored as an immutable item.
    pub fn target(&self) -> Id {
        hash_immutable(&self.0)
    }
}

impl Debug for Item {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Item({})", String::from_utf8_lossy(&self.0))
    }
}

/// SHA-1 of a bencoded value, the target of an immutable item.
pub fn hash_immutable(encoded: &[u8]) -> Id {
    let mut hasher = Sha1::new();
    hasher.update(encoded);

    hasher.digest().bytes().into()
}

/// Check that `item` is the immutable value stored under `target`.
pub fn validate_immutable(item: &Item, target: &Id) -> bool {
    &item.target() == target
}

#[derive(thiserror::Error, Debug)]
/// Errors building an [Item].
pub enum ItemError {
    #[error("Failed to bencode or decode item: {0}")]
    Bencode(#[from] serde_bencode::Error),

    #[error("Item is not canonically bencoded")]
    NonCanonical,
}
