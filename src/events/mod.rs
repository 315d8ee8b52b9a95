//! Events emitted by a DHT [Engine](crate::Engine), and the bus delivering them.

mod bus;

use std::net::SocketAddr;

use crate::{Id, Item, MutableItem};

pub use bus::{EventBus, Subscription};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Discriminant of an [Event], used to filter subscriptions.
pub enum EventKind {
    ImmutableItem,
    MutableItem,
    PeersFound,
}

#[derive(Clone, Debug, PartialEq)]
/// Something the engine found in response to an earlier request.
pub enum Event {
    /// An immutable item was found for `target`.
    ImmutableItem { target: Id, item: Item },
    /// A mutable item was found. Its target is [MutableItem::target].
    MutableItem(MutableItem),
    /// A get_peers query for `info_hash` replied with these peers, possibly none.
    PeersFound {
        info_hash: Id,
        peers: Vec<SocketAddr>,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ImmutableItem { .. } => EventKind::ImmutableItem,
            Event::MutableItem(_) => EventKind::MutableItem,
            Event::PeersFound { .. } => EventKind::PeersFound,
        }
    }

    /// The target or info_hash this event answers.
    pub fn target(&self) -> &Id {
        match self {
            Event::ImmutableItem { target, .. } => target,
            Event::MutableItem(item) => item.target(),
            Event::PeersFound { info_hash, .. } => info_hash,
        }
    }
}
