//! In-process [Engine] keeping everything in memory.
//!
//! Useful for tests and demos: it answers requests from its own thread by
//! publishing events, the same way a networked engine would, but it only ever
//! knows about what was put or announced through it.

mod peers;

use std::{
    io,
    net::SocketAddr,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use flume::{Receiver, Sender};
use lru::LruCache;
use tracing::{debug, error, info, trace};

use crate::{
    engine::{AnnounceFlags, Engine},
    events::{Event, EventBus},
    Id, Item, MutableItem,
};

use peers::PeersStore;

/// Default port announced when no explicit port is given.
pub const DEFAULT_PORT: u16 = 6881;

// Stored data.
pub const MAX_INFO_HASHES: usize = 2000;
pub const MAX_PEERS: usize = 100;
pub const MAX_VALUES: usize = 1000;

#[derive(Debug, Clone)]
/// [LocalEngine] configurations
pub struct LocalConfig {
    /// Port announced for implied port announcements.
    ///
    /// Defaults to [DEFAULT_PORT]
    pub port: u16,
    /// Maximum number of immutable and of mutable items kept.
    ///
    /// Defaults to [MAX_VALUES]
    pub max_values: NonZeroUsize,
    /// Maximum number of info_hashes peers are kept for.
    ///
    /// Defaults to [MAX_INFO_HASHES]
    pub max_info_hashes: NonZeroUsize,
    /// Maximum number of peers kept per info_hash.
    ///
    /// Defaults to [MAX_PEERS]
    pub max_peers: NonZeroUsize,
    /// Whether the DHT starts enabled.
    ///
    /// Defaults to `true`
    pub enabled: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_values: NonZeroUsize::new(MAX_VALUES).unwrap_or(NonZeroUsize::MIN),
            max_info_hashes: NonZeroUsize::new(MAX_INFO_HASHES).unwrap_or(NonZeroUsize::MIN),
            max_peers: NonZeroUsize::new(MAX_PEERS).unwrap_or(NonZeroUsize::MIN),
            enabled: true,
        }
    }
}

#[derive(Debug)]
/// Loopback [Engine] answering from in-memory stores on its own thread.
///
/// The thread exits once the engine is dropped.
pub struct LocalEngine {
    sender: Sender<ActorMessage>,
    enabled: Arc<AtomicBool>,
    port: u16,
}

impl LocalEngine {
    /// Create an engine publishing its answers on `events`.
    pub fn new(events: EventBus) -> Self {
        Self::with_config(events, LocalConfig::default())
    }

    pub fn with_config(events: EventBus, config: LocalConfig) -> Self {
        let (sender, receiver) = flume::unbounded();
        let enabled = Arc::new(AtomicBool::new(config.enabled));

        let actor = Actor {
            receiver,
            events,
            enabled: enabled.clone(),
            port: config.port,
            immutable_values: LruCache::new(config.max_values),
            mutable_values: LruCache::new(config.max_values),
            peers: PeersStore::new(config.max_info_hashes, config.max_peers),
        };

        let spawned = thread::Builder::new()
            .name("Local DHT engine".to_string())
            .spawn(move || actor.run());

        let engine = Self {
            sender,
            enabled,
            port: config.port,
        };
        engine.on_spawn(spawned);

        engine
    }

    /// Nothing answers without the actor thread: report the DHT as stopped.
    fn on_spawn(&self, spawned: io::Result<JoinHandle<()>>) {
        if let Err(error) = spawned {
            error!(?error, "Failed to spawn local engine");
            self.enabled.store(false, Ordering::SeqCst);
        }
    }

    /// Port announced for implied port announcements.
    pub fn port(&self) -> u16 {
        self.port
    }

    fn send(&self, message: ActorMessage) {
        // Only fails if the actor thread is gone, then nothing answers and requests time out.
        let _ = self.sender.send(message);
    }
}

impl Engine for LocalEngine {
    fn get_item(&self, target: Id) {
        self.send(ActorMessage::GetItem(target));
    }

    fn get_mutable_item(&self, public_key: &[u8; 32], salt: Option<&[u8]>) {
        self.send(ActorMessage::GetMutableItem(MutableItem::target_from_key(
            public_key, salt,
        )));
    }

    fn put_item(&self, item: &Item) -> Id {
        let target = item.target();

        self.send(ActorMessage::PutItem(target, item.clone()));

        target
    }

    fn put_mutable_item(&self, item: &MutableItem) {
        self.send(ActorMessage::PutMutableItem(item.clone()));
    }

    fn get_peers(&self, info_hash: Id) {
        self.send(ActorMessage::GetPeers(info_hash));
    }

    fn announce(&self, info_hash: Id, port: u16, flags: AnnounceFlags) {
        self.send(ActorMessage::Announce(info_hash, port, flags));
    }

    fn set_dht_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_dht_running(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
enum ActorMessage {
    GetItem(Id),
    GetMutableItem(Id),
    PutItem(Id, Item),
    PutMutableItem(MutableItem),
    GetPeers(Id),
    Announce(Id, u16, AnnounceFlags),
}

struct Actor {
    receiver: Receiver<ActorMessage>,
    events: EventBus,
    enabled: Arc<AtomicBool>,
    port: u16,
    immutable_values: LruCache<Id, Item>,
    mutable_values: LruCache<Id, MutableItem>,
    peers: PeersStore,
}

impl Actor {
    fn run(mut self) {
        info!(port = self.port, "Local DHT engine running");

        while let Ok(message) = self.receiver.recv() {
            if !self.enabled.load(Ordering::SeqCst) {
                debug!(?message, "DHT disabled, dropping request");
                continue;
            }

            self.handle(message);
        }

        debug!("Local DHT engine's thread was shutdown after Drop.");
    }

    fn handle(&mut self, message: ActorMessage) {
        trace!(?message, "Handling request");

        match message {
            ActorMessage::GetItem(target) => {
                if let Some(item) = self.immutable_values.get(&target).cloned() {
                    self.events.publish(Event::ImmutableItem { target, item });
                }
            }
            ActorMessage::GetMutableItem(target) => {
                if let Some(item) = self.mutable_values.get(&target).cloned() {
                    self.events.publish(Event::MutableItem(item));
                }
            }
            ActorMessage::PutItem(target, item) => {
                self.immutable_values.put(target, item);
            }
            ActorMessage::PutMutableItem(item) => self.put_mutable(item),
            ActorMessage::GetPeers(info_hash) => {
                let peers = self.peers.get_random_peers(&info_hash).unwrap_or_default();

                self.events.publish(Event::PeersFound { info_hash, peers });
            }
            ActorMessage::Announce(info_hash, port, flags) => {
                let port = if port == 0 || flags.contains(AnnounceFlags::IMPLIED_PORT) {
                    self.port
                } else {
                    port
                };

                self.peers
                    .add_peer(info_hash, SocketAddr::from(([127, 0, 0, 1], port)));
            }
        }
    }

    /// Keep the most recent valid item for each target.
    fn put_mutable(&mut self, item: MutableItem) {
        if !item.is_valid() {
            debug!(target = ?item.target(), "Rejected mutable item with invalid signature");
            return;
        }

        if let Some(existing) = self.mutable_values.peek(item.target()) {
            if existing.seq() > item.seq()
                || (existing.seq() == item.seq() && existing.value() != item.value())
            {
                debug!(
                    target = ?item.target(),
                    existing = existing.seq(),
                    incoming = item.seq(),
                    "Rejected mutable item with older sequence number"
                );
                return;
            }
        }

        self.mutable_values.put(*item.target(), item);
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{events::EventKind, KeyPair};

    fn engine() -> (LocalEngine, EventBus) {
        let events = EventBus::new();

        (LocalEngine::new(events.clone()), events)
    }

    fn next(subscription: &crate::events::Subscription) -> Option<Event> {
        subscription.recv_deadline(Instant::now() + Duration::from_secs(5))
    }

    #[test]
    fn put_get_item() {
        let (engine, events) = engine();
        let subscription = events.subscribe(&[EventKind::ImmutableItem]);

        let item = Item::bytes(b"Hello World!");
        let target = engine.put_item(&item);
        engine.get_item(target);

        assert_eq!(next(&subscription), Some(Event::ImmutableItem { target, item }));
    }

    #[test]
    fn get_peers_always_answers() {
        let (engine, events) = engine();
        let subscription = events.subscribe(&[EventKind::PeersFound]);

        let info_hash = Id::random();
        engine.get_peers(info_hash);

        assert_eq!(
            next(&subscription),
            Some(Event::PeersFound {
                info_hash,
                peers: vec![]
            })
        );
    }

    #[test]
    fn announce_implied_port() {
        let (engine, events) = engine();
        let subscription = events.subscribe(&[EventKind::PeersFound]);

        let info_hash = Id::random();
        engine.announce(info_hash, 45555, AnnounceFlags::IMPLIED_PORT);
        engine.get_peers(info_hash);

        assert_eq!(
            next(&subscription),
            Some(Event::PeersFound {
                info_hash,
                peers: vec![SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))]
            })
        );
    }

    #[test]
    fn mutable_keeps_most_recent() {
        let (engine, events) = engine();
        let subscription = events.subscribe(&[EventKind::MutableItem]);
        let keypair = KeyPair::generate();

        let newer = MutableItem::new(&keypair, Item::bytes(b"new"), 2, None).unwrap();
        let older = MutableItem::new(&keypair, Item::bytes(b"old"), 1, None).unwrap();

        engine.put_mutable_item(&newer);
        engine.put_mutable_item(&older);
        engine.get_mutable_item(keypair.public_key(), None);

        assert_eq!(next(&subscription), Some(Event::MutableItem(newer)));
    }

    #[test]
    fn disabled_engine_drops_requests() {
        let events = EventBus::new();
        let engine = LocalEngine::with_config(
            events.clone(),
            LocalConfig {
                enabled: false,
                ..Default::default()
            },
        );
        let subscription = events.subscribe(&[EventKind::PeersFound]);

        assert!(!engine.is_dht_running());

        engine.get_peers(Id::random());
        assert_eq!(
            subscription.recv_deadline(Instant::now() + Duration::from_millis(50)),
            None
        );

        engine.set_dht_enabled(true);
        assert!(engine.is_dht_running());

        engine.get_peers(Id::random());
        assert!(next(&subscription).is_some());
    }

    #[test]
    fn failed_spawn_stops_dht() {
        let (engine, events) = engine();
        assert!(engine.is_dht_running());

        engine.on_spawn(Err(io::Error::new(io::ErrorKind::Other, "no threads")));

        assert!(!engine.is_dht_running());

        let dht = crate::Dht::new(Arc::new(engine), events);
        assert_eq!(
            dht.get_peers(Id::random(), Duration::from_secs(10)),
            Err(crate::errors::DhtError::NotRunning)
        );
    }

    #[test]
    fn configured_port() {
        let events = EventBus::new();

        assert_eq!(LocalEngine::new(events.clone()).port(), DEFAULT_PORT);

        let engine = LocalEngine::with_config(
            events.clone(),
            LocalConfig {
                port: 45555,
                ..Default::default()
            },
        );
        assert_eq!(engine.port(), 45555);

        let subscription = events.subscribe(&[EventKind::PeersFound]);
        let info_hash = Id::random();
        engine.announce(info_hash, 0, AnnounceFlags::NONE);
        engine.get_peers(info_hash);

        assert_eq!(
            next(&subscription),
            Some(Event::PeersFound {
                info_hash,
                peers: vec![SocketAddr::from(([127, 0, 0, 1], engine.port()))]
            })
        );
    }
}
