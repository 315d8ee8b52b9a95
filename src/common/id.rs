//! DHT lookup target, info_hash or item key.
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

/// The size of a target Id in bytes.
pub const ID_SIZE: usize = 20;

#[derive(Clone, Copy, PartialEq, Ord, PartialOrd, Eq, Hash)]
/// 160 bit DHT target: the SHA-1 of an immutable item, the key of a mutable
/// item, or the info_hash peers are announced on.
pub struct Id([u8; ID_SIZE]);

impl Id {
    /// Generate a random Id.
    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(random_bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id, DecodeIdError> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(DecodeIdError::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp[..ID_SIZE].clone_from_slice(&bytes[..ID_SIZE]);

        Ok(Id(tmp))
    }

    /// Returns a byte slice of this Id.
    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Id {
        Id(bytes)
    }
}

impl From<Id> for [u8; ID_SIZE] {
    fn from(value: Id) -> Self {
        value.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let hex_chars: String = self.0.iter().map(|byte| format!("{:02x}", byte)).collect();

        write!(f, "{}", hex_chars)
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

impl FromStr for Id {
    type Err = DecodeIdError;

    fn from_str(s: &str) -> Result<Id, DecodeIdError> {
        if s.len() % 2 != 0 {
            return Err(DecodeIdError::OddNumberOfCharacters);
        }

        let mut bytes = Vec::with_capacity(s.len() / 2);

        for i in 0..s.len() / 2 {
            let byte_str = s
                .get(i * 2..(i * 2) + 2)
                .ok_or_else(|| DecodeIdError::InvalidHexCharacter(s.into()))?;

            match u8::from_str_radix(byte_str, 16) {
                Ok(byte) => bytes.push(byte),
                Err(_) => return Err(DecodeIdError::InvalidHexCharacter(byte_str.into())),
            }
        }

        Id::from_bytes(bytes)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;

        Id::from_bytes(bytes).map_err(serde::de::Error::custom)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors decoding an [Id] from bytes or hex.
pub enum DecodeIdError {
    /// Id is expected to be 20 bytes.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    /// Hex encoding should have an even number of characters.
    #[error("Hex encoding should have an even number of characters")]
    OddNumberOfCharacters,

    /// Invalid hex character.
    #[error("Invalid Id encoding: {0}")]
    InvalidHexCharacter(String),
}
