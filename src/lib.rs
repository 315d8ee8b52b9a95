#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod common;
mod config;
pub mod correlation;
mod dht;
pub mod engine;
pub mod events;

#[cfg(feature = "local")]
pub mod local;

pub use crate::common::{
    canonical_payload, canonical_payload_into, create_keypair, hash_immutable,
    sign_mutable_item, sign_mutable_item_into, validate_immutable, verify_mutable_item, Id, Item,
    KeyPair, MutableItem, ID_SIZE, MAX_CANONICAL_PAYLOAD_SIZE, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE,
    SEED_SIZE, SIGNATURE_SIZE,
};
pub use bytes::Bytes;
pub use config::Config;
pub use dht::{Dht, DhtBuilder};
pub use engine::{AnnounceFlags, Engine};
pub use events::{Event, EventBus, EventKind};

pub mod errors {
    //! Exported errors
    pub use super::common::{DecodeIdError, ItemError, MutableError};
    pub use super::dht::DhtError;
}
