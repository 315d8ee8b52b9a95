//! The interface of the DHT routing engine the [Dht](crate::Dht) drives.

use std::{
    fmt::Debug,
    ops::{BitOr, BitOrAssign},
};

use crate::{Id, Item, MutableItem};

/// A DHT routing engine.
///
/// Requests are fire-and-forget: whatever the engine finds is published later,
/// from the engine's own threads, as [Event](crate::events::Event)s on the
/// [EventBus](crate::events::EventBus) it was given.
pub trait Engine: Send + Sync + Debug {
    /// Look up an immutable item, answered with
    /// [Event::ImmutableItem](crate::events::Event::ImmutableItem).
    fn get_item(&self, target: Id);

    /// Look up a mutable item, answered with
    /// [Event::MutableItem](crate::events::Event::MutableItem).
    fn get_mutable_item(&self, public_key: &[u8; 32], salt: Option<&[u8]>);

    /// Store an immutable item, returning its target.
    fn put_item(&self, item: &Item) -> Id;

    /// Store a signed mutable item.
    fn put_mutable_item(&self, item: &MutableItem);

    /// Look up peers announced on `info_hash`, answered with
    /// [Event::PeersFound](crate::events::Event::PeersFound).
    fn get_peers(&self, info_hash: Id);

    /// Announce this node as a peer for `info_hash`.
    fn announce(&self, info_hash: Id, port: u16, flags: AnnounceFlags);

    /// Enable or disable the DHT.
    fn set_dht_enabled(&self, enabled: bool);

    /// Whether the DHT is currently running.
    fn is_dht_running(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
/// Flags of an announce_peer request.
pub struct AnnounceFlags(u8);

impl AnnounceFlags {
    /// No flags.
    pub const NONE: AnnounceFlags = AnnounceFlags(0);
    /// Announce as a seed.
    pub const SEED: AnnounceFlags = AnnounceFlags(1);
    /// Let the storing nodes use the source port of the request instead of `port`.
    pub const IMPLIED_PORT: AnnounceFlags = AnnounceFlags(2);
    /// The announced port is an SSL torrent port.
    pub const SSL_TORRENT: AnnounceFlags = AnnounceFlags(4);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, other: AnnounceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AnnounceFlags {
    type Output = AnnounceFlags;

    fn bitor(self, rhs: AnnounceFlags) -> AnnounceFlags {
        AnnounceFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for AnnounceFlags {
    fn bitor_assign(&mut self, rhs: AnnounceFlags) {
        self.0 |= rhs.0;
    }
}
