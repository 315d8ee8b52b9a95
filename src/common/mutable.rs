//! Helper functions and structs for mutable items.

use ed25519_dalek::{
    hazmat::{raw_sign, ExpandedSecretKey},
    Signature, Verifier, VerifyingKey,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1_smol::Sha1;
use sha2::Sha512;

use super::{Item, KeyPair, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use crate::Id;

/// Largest signable a mutable item may have, bounded by the largest DHT value.
pub const MAX_CANONICAL_PAYLOAD_SIZE: usize = 1200;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// [BEP_0044](https://www.bittorrent.org/beps/bep_0044.html)'s Mutable item.
pub struct MutableItem {
    /// hash of the key and optional salt
    target: Id,
    /// ed25519 public key
    key: [u8; PUBLIC_KEY_SIZE],
    /// sequence number
    seq: i64,
    /// mutable value
    value: Item,
    /// ed25519 signature
    #[serde(with = "serde_bytes")]
    signature: [u8; SIGNATURE_SIZE],
    /// Optional salt
    salt: Option<Box<[u8]>>,
}

impl MutableItem {
    /// Sign `value` with `keypair` and build a new mutable item.
    ///
    /// Fails only if the signable would exceed [MAX_CANONICAL_PAYLOAD_SIZE].
    pub fn new(
        keypair: &KeyPair,
        value: Item,
        seq: i64,
        salt: Option<&[u8]>,
    ) -> Result<Self, MutableError> {
        let signable = canonical_payload(&value, seq, salt)?;
        let signature = sign_raw(&signable, keypair.public_key(), keypair.private_key())?;

        Ok(Self::new_signed_unchecked(
            *keypair.public_key(),
            signature,
            value,
            seq,
            salt,
        ))
    }

    /// Return the target of a [MutableItem] by hashing its `public_key` and an optional `salt`
    pub fn target_from_key(public_key: &[u8; PUBLIC_KEY_SIZE], salt: Option<&[u8]>) -> Id {
        let mut hasher = Sha1::new();
        hasher.update(public_key);

        if let Some(salt) = salt {
            hasher.update(salt);
        }

        hasher.digest().bytes().into()
    }

    /// Create a new mutable item from an already signed value.
    pub fn new_signed_unchecked(
        key: [u8; PUBLIC_KEY_SIZE],
        signature: [u8; SIGNATURE_SIZE],
        value: Item,
        seq: i64,
        salt: Option<&[u8]>,
    ) -> Self {
        let salt = non_empty(salt);

        Self {
            target: MutableItem::target_from_key(&key, salt),
            key,
            value,
            seq,
            signature,
            salt: salt.map(|s| s.into()),
        }
    }

    /// Build a mutable item from parts received from the network,
    /// verifying the key and signature.
    pub fn from_parts(
        key: &[u8],
        signature: &[u8],
        value: Item,
        seq: i64,
        salt: Option<&[u8]>,
    ) -> Result<Self, MutableError> {
        let key = VerifyingKey::try_from(key).map_err(|_| MutableError::InvalidMutablePublicKey)?;

        let signature =
            Signature::from_slice(signature).map_err(|_| MutableError::InvalidMutableSignature)?;

        key.verify(&canonical_payload(&value, seq, salt)?, &signature)
            .map_err(|_| MutableError::InvalidMutableSignature)?;

        Ok(Self::new_signed_unchecked(
            key.to_bytes(),
            signature.to_bytes(),
            value,
            seq,
            salt,
        ))
    }

    /// Returns `true` if the target matches the key and salt, and the signature
    /// verifies against the key.
    pub fn is_valid(&self) -> bool {
        self.target == MutableItem::target_from_key(&self.key, self.salt())
            && verify_mutable_item(
                &self.value,
                self.salt(),
                self.seq,
                &self.key,
                &self.signature,
            )
    }

    // === Getters ===

    pub fn target(&self) -> &Id {
        &self.target
    }

    pub fn key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.key
    }

    pub fn value(&self) -> &Item {
        &self.value
    }

    pub fn seq(&self) -> i64 {
        self.seq
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.signature
    }

    pub fn salt(&self) -> Option<&[u8]> {
        self.salt.as_deref()
    }
}

/// Encode the bytes a mutable item's signature covers:
///
/// `[4:salt<len>:<salt>]3:seqi<seq>e1:v<bencoded value>`
///
/// An empty salt is the same as no salt.
pub fn canonical_payload(
    value: &Item,
    seq: i64,
    salt: Option<&[u8]>,
) -> Result<Box<[u8]>, MutableError> {
    let mut signable = vec![];

    if let Some(salt) = non_empty(salt) {
        signable.extend(format!("4:salt{}:", salt.len()).into_bytes());
        signable.extend(salt);
    }

    signable.extend(format!("3:seqi{}e1:v", seq).into_bytes());
    signable.extend(value.encoded());

    if signable.len() > MAX_CANONICAL_PAYLOAD_SIZE {
        return Err(MutableError::PayloadTooLarge(signable.len()));
    }

    Ok(signable.into())
}

/// Write the [canonical_payload] into `out`, which must be exactly
/// [MAX_CANONICAL_PAYLOAD_SIZE] bytes long, and return the written length.
pub fn canonical_payload_into(
    value: &Item,
    seq: i64,
    salt: Option<&[u8]>,
    out: &mut [u8],
) -> Result<usize, MutableError> {
    if out.len() != MAX_CANONICAL_PAYLOAD_SIZE {
        return Err(MutableError::InvalidPayloadBuffer(out.len()));
    }

    let signable = canonical_payload(value, seq, salt)?;
    out[..signable.len()].copy_from_slice(&signable);

    Ok(signable.len())
}

/// Sign a value, its sequence number and optional salt.
///
/// `public_key` must be 32 bytes and `private_key` a 64 bytes expanded key.
pub fn sign_mutable_item(
    value: &Item,
    salt: Option<&[u8]>,
    seq: i64,
    public_key: &[u8],
    private_key: &[u8],
) -> Result<[u8; SIGNATURE_SIZE], MutableError> {
    let public_key: &[u8; PUBLIC_KEY_SIZE] = public_key
        .try_into()
        .map_err(|_| MutableError::InvalidPublicKeySize(public_key.len()))?;
    let private_key: &[u8; PRIVATE_KEY_SIZE] = private_key
        .try_into()
        .map_err(|_| MutableError::InvalidPrivateKeySize(private_key.len()))?;

    let signable = canonical_payload(value, seq, salt)?;

    sign_raw(&signable, public_key, private_key)
}

/// Same as [sign_mutable_item] but writes into `signature`,
/// which must be exactly 64 bytes long.
pub fn sign_mutable_item_into(
    value: &Item,
    salt: Option<&[u8]>,
    seq: i64,
    public_key: &[u8],
    private_key: &[u8],
    signature: &mut [u8],
) -> Result<(), MutableError> {
    if signature.len() != SIGNATURE_SIZE {
        return Err(MutableError::InvalidSignatureBuffer(signature.len()));
    }

    let signed = sign_mutable_item(value, salt, seq, public_key, private_key)?;
    signature.copy_from_slice(&signed);

    Ok(())
}

/// Check a mutable item's signature. Returns `false` on any malformed input.
pub fn verify_mutable_item(
    value: &Item,
    salt: Option<&[u8]>,
    seq: i64,
    public_key: &[u8],
    signature: &[u8],
) -> bool {
    let Ok(key) = VerifyingKey::try_from(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    let Ok(signable) = canonical_payload(value, seq, salt) else {
        return false;
    };

    key.verify(&signable, &signature).is_ok()
}

pub(crate) fn sign_raw(
    message: &[u8],
    public_key: &[u8; PUBLIC_KEY_SIZE],
    private_key: &[u8; PRIVATE_KEY_SIZE],
) -> Result<[u8; SIGNATURE_SIZE], MutableError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| MutableError::InvalidMutablePublicKey)?;
    let expanded = ExpandedSecretKey::from_bytes(private_key);

    Ok(raw_sign::<Sha512>(&expanded, message, &verifying_key).to_bytes())
}

fn non_empty(salt: Option<&[u8]>) -> Option<&[u8]> {
    salt.filter(|salt| !salt.is_empty())
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.encoded())
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = serde_bytes::ByteBuf::deserialize(deserializer)?;

        Item::from_bencoded(encoded.into_vec()).map_err(serde::de::Error::custom)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Malformed keys, buffers or payloads when signing or building mutable items.
pub enum MutableError {
    #[error("Invalid public key size, expected 32, got {0}")]
    InvalidPublicKeySize(usize),

    #[error("Invalid private key size, expected 64, got {0}")]
    InvalidPrivateKeySize(usize),

    #[error("Invalid signature buffer size, expected 64, got {0}")]
    InvalidSignatureBuffer(usize),

    #[error("Invalid canonical payload buffer size, expected 1200, got {0}")]
    InvalidPayloadBuffer(usize),

    #[error("Canonical payload is {0} bytes, more than 1200")]
    PayloadTooLarge(usize),

    #[error("Invalid mutable item signature")]
    InvalidMutableSignature,

    #[error("Invalid mutable item public key")]
    InvalidMutablePublicKey,
}
