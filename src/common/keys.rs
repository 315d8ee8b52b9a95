//! Ed25519 key material for signing mutable items.

use std::fmt::{self, Debug, Formatter};

use ed25519_dalek::SigningKey;
use rand::Rng;
use sha2::{Digest, Sha512};

/// Size of the random seed a [KeyPair] is derived from.
pub const SEED_SIZE: usize = 32;
/// Size of an ed25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of an expanded ed25519 private key.
pub const PRIVATE_KEY_SIZE: usize = 64;
/// Size of an ed25519 signature.
pub const SIGNATURE_SIZE: usize = 64;

#[derive(Clone, PartialEq, Eq)]
/// Ed25519 keypair used to sign [MutableItem](crate::MutableItem)s.
///
/// The private key is in the expanded form libtorrent and BEP44 test vectors use:
/// `SHA-512(seed)` with the scalar half clamped, followed by the nonce prefix.
pub struct KeyPair {
    public_key: [u8; PUBLIC_KEY_SIZE],
    private_key: [u8; PRIVATE_KEY_SIZE],
}

impl KeyPair {
    /// Generate a keypair from a fresh random seed.
    pub fn generate() -> Self {
        let seed: [u8; SEED_SIZE] = rand::thread_rng().gen();

        Self::from_seed(&seed)
    }

    /// Derive a keypair from a 32 bytes seed.
    ///
    /// The same seed always yields the same keypair.
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        let public_key = SigningKey::from_bytes(seed).verifying_key().to_bytes();

        let mut private_key = [0; PRIVATE_KEY_SIZE];
        private_key.copy_from_slice(&Sha512::digest(seed));

        private_key[0] &= 248;
        private_key[31] &= 63;
        private_key[31] |= 64;

        Self {
            public_key,
            private_key,
        }
    }

    /// Use an existing public and expanded private key pair.
    ///
    /// The keys are not checked against each other, a mismatched pair produces
    /// signatures that fail verification.
    pub fn from_keys(
        public_key: [u8; PUBLIC_KEY_SIZE],
        private_key: [u8; PRIVATE_KEY_SIZE],
    ) -> Self {
        Self {
            public_key,
            private_key,
        }
    }

    // === Getters ===

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    pub fn private_key(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.private_key
    }
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh `(public_key, private_key)` pair.
pub fn create_keypair() -> ([u8; PUBLIC_KEY_SIZE], [u8; PRIVATE_KEY_SIZE]) {
    let keypair = KeyPair::generate();

    (keypair.public_key, keypair.private_key)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_seed_is_deterministic() {
        let a = KeyPair::from_seed(&[0; SEED_SIZE]);
        let b = KeyPair::from_seed(&[0; SEED_SIZE]);

        assert_eq!(a, b);
        assert_eq!(
            a.public_key(),
            &SigningKey::from_bytes(&[0; SEED_SIZE])
                .verifying_key()
                .to_bytes()
        );
    }

    #[test]
    fn rfc8032_public_key() {
        let seed = [
            0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec,
            0x2c, 0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03,
            0x1c, 0xae, 0x7f, 0x60,
        ];
        let public_key = [
            0xd7, 0x5a, 0x98, 0x01, 0x82, 0xb1, 0x0a, 0xb7, 0xd5, 0x4b, 0xfe, 0xd3, 0xc9, 0x64,
            0x07, 0x3a, 0x0e, 0xe1, 0x72, 0xf3, 0xda, 0xa6, 0x23, 0x25, 0xaf, 0x02, 0x1a, 0x68,
            0xf7, 0x07, 0x51, 0x1a,
        ];

        assert_eq!(KeyPair::from_seed(&seed).public_key(), &public_key);
    }

    #[test]
    fn private_key_scalar_is_clamped() {
        let keypair = KeyPair::generate();
        let private_key = keypair.private_key();

        assert_eq!(private_key[0] & 7, 0);
        assert_eq!(private_key[31] & 128, 0);
        assert_eq!(private_key[31] & 64, 64);
    }

    #[test]
    fn generated_keypairs_differ() {
        let (public_a, private_a) = create_keypair();
        let (public_b, private_b) = create_keypair();

        assert_ne!(public_a, public_b);
        assert_ne!(private_a, private_b);
    }

    #[test]
    fn from_keys_matches_derived() {
        let derived = KeyPair::from_seed(&[9; SEED_SIZE]);
        let keypair = KeyPair::from_keys(*derived.public_key(), *derived.private_key());

        assert_eq!(keypair, derived);

        let (public_key, private_key) = create_keypair();
        let keypair = KeyPair::from_keys(public_key, private_key);

        assert_eq!(keypair.public_key(), &public_key);
        assert_eq!(keypair.private_key(), &private_key);
    }

    #[test]
    fn debug_hides_private_key() {
        let keypair = KeyPair::from_seed(&[1; SEED_SIZE]);
        let debug = format!("{:?}", keypair);

        assert!(debug.contains("public_key"));
        assert!(!debug.contains("private_key"));
    }
}
