//! Blocking request/response Dht client.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::{
    common::{validate_immutable, Id, Item, MutableError, MutableItem},
    config::Config,
    correlation::wait_for,
    engine::{AnnounceFlags, Engine},
    events::{Event, EventBus, EventKind},
};

#[derive(Debug, Clone)]
/// Request/response facade over an event driven DHT [Engine].
///
/// Every lookup registers interest in the engine's answer on the [EventBus],
/// sends the request, and blocks until a matching answer or the timeout.
/// A timeout is a normal outcome: an empty result, not an error.
pub struct Dht {
    engine: Arc<dyn Engine>,
    events: EventBus,
    config: Config,
}

impl Dht {
    /// Create a Dht over an `engine` publishing its answers on `events`.
    pub fn new(engine: Arc<dyn Engine>, events: EventBus) -> Self {
        Dht::builder(engine, events).build()
    }

    /// Returns a builder to edit settings before creating the Dht.
    pub fn builder(engine: Arc<dyn Engine>, events: EventBus) -> DhtBuilder {
        DhtBuilder {
            engine,
            events,
            config: Config::default(),
        }
    }

    /// Create a Dht over a new in-process [LocalEngine](crate::local::LocalEngine).
    #[cfg(feature = "local")]
    pub fn local() -> Self {
        let events = EventBus::new();
        let engine = crate::local::LocalEngine::new(events.clone());

        Dht::new(Arc::new(engine), events)
    }

    // === Getters ===

    /// The bus the engine publishes its answers on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // === Public Methods ===

    /// Enable the DHT. Calling it on a running DHT is a no-op.
    pub fn start(&self) {
        info!("Starting DHT");
        self.engine.set_dht_enabled(true);
    }

    /// Disable the DHT. Calling it on a stopped DHT is a no-op.
    pub fn stop(&self) {
        info!("Stopping DHT");
        self.engine.set_dht_enabled(false);
    }

    /// Whether the engine reports the DHT as running right now.
    pub fn running(&self) -> bool {
        self.engine.is_dht_running()
    }

    // === Immutable data ===

    /// Get an immutable item by its target, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` if nothing arrived in time. Items that don't hash to
    /// `target` are ignored.
    pub fn get_immutable(&self, target: Id, timeout: Duration) -> Result<Option<Item>, DhtError> {
        self.check_running()?;

        let item = wait_for(
            &self.events,
            &[EventKind::ImmutableItem],
            timeout,
            || self.engine.get_item(target),
            |event| match event {
                Event::ImmutableItem { target: found, item } if found == &target => {
                    let valid = validate_immutable(item, &target);
                    if !valid {
                        debug!(?target, "Ignored immutable item not matching its target");
                    }
                    valid
                }
                _ => false,
            },
            |event| match event {
                Event::ImmutableItem { item, .. } => Some(item),
                _ => None,
            },
        )
        .flatten();

        debug!(?target, found = item.is_some(), "get_immutable done");

        Ok(item)
    }

    /// Put an immutable item to the DHT, returning its target.
    ///
    /// Does not wait for the item to be stored.
    pub fn put_immutable(&self, item: &Item) -> Result<Id, DhtError> {
        self.check_running()?;

        let target = self.engine.put_item(item);

        debug!(?target, "put_immutable sent");

        Ok(target)
    }

    // === Mutable data ===

    /// Get a mutable item by its public key and optional salt, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` if nothing arrived in time. Items with invalid
    /// signatures are ignored.
    pub fn get_mutable(
        &self,
        public_key: &[u8; 32],
        salt: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Option<MutableItem>, DhtError> {
        self.check_running()?;

        let target = MutableItem::target_from_key(public_key, salt);

        let item = wait_for(
            &self.events,
            &[EventKind::MutableItem],
            timeout,
            || self.engine.get_mutable_item(public_key, salt),
            |event| match event {
                Event::MutableItem(item) if item.target() == &target => {
                    let valid = item.is_valid();
                    if !valid {
                        debug!(?target, "Ignored mutable item with invalid signature");
                    }
                    valid
                }
                _ => false,
            },
            |event| match event {
                Event::MutableItem(item) => Some(item),
                _ => None,
            },
        )
        .flatten();

        debug!(?target, seq = ?item.as_ref().map(|item| item.seq()), "get_mutable done");

        Ok(item)
    }

    /// Put a mutable item to the DHT, returning its target.
    ///
    /// Fails immediately if the item's signature doesn't verify.
    /// Does not wait for the item to be stored.
    pub fn put_mutable(&self, item: &MutableItem) -> Result<Id, DhtError> {
        self.check_running()?;

        if !item.is_valid() {
            return Err(MutableError::InvalidMutableSignature.into());
        }

        self.engine.put_mutable_item(item);

        debug!(target = ?item.target(), seq = item.seq(), "put_mutable sent");

        Ok(*item.target())
    }

    // === Peers ===

    /// Get peers announced on `info_hash`, waiting up to `timeout`.
    ///
    /// Returns an empty list if nothing arrived in time. Peers are unordered and
    /// may contain duplicates.
    pub fn get_peers(&self, info_hash: Id, timeout: Duration) -> Result<Vec<SocketAddr>, DhtError> {
        self.check_running()?;

        let peers = wait_for(
            &self.events,
            &[EventKind::PeersFound],
            timeout,
            || self.engine.get_peers(info_hash),
            |event| matches!(event, Event::PeersFound { info_hash: found, .. } if found == &info_hash),
            |event| match event {
                Event::PeersFound { peers, .. } => peers,
                _ => vec![],
            },
        )
        .unwrap_or_default();

        debug!(?info_hash, peers = peers.len(), "get_peers done");

        Ok(peers)
    }

    /// Announce a peer for `info_hash` on `port` with `flags`.
    ///
    /// Does not wait for the announcement to be stored.
    pub fn announce_peer(
        &self,
        info_hash: Id,
        port: u16,
        flags: AnnounceFlags,
    ) -> Result<(), DhtError> {
        self.check_running()?;

        self.engine.announce(info_hash, port, flags);

        debug!(?info_hash, port, flags = flags.bits(), "announce_peer sent");

        Ok(())
    }

    /// Announce a peer for `info_hash` with the configured
    /// [Config::announce_port] and [Config::announce_flags].
    pub fn announce(&self, info_hash: Id) -> Result<(), DhtError> {
        self.announce_peer(
            info_hash,
            self.config.announce_port,
            self.config.announce_flags,
        )
    }

    // === Private Methods ===

    fn check_running(&self) -> Result<(), DhtError> {
        if self.config.require_running && !self.engine.is_dht_running() {
            return Err(DhtError::NotRunning);
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Dht builder
pub struct DhtBuilder {
    engine: Arc<dyn Engine>,
    events: EventBus,
    config: Config,
}

impl DhtBuilder {
    /// Set [Config::announce_port].
    pub fn announce_port(mut self, port: u16) -> Self {
        self.config.announce_port = port;

        self
    }

    /// Set [Config::announce_flags].
    pub fn announce_flags(mut self, flags: AnnounceFlags) -> Self {
        self.config.announce_flags = flags;

        self
    }

    /// Set [Config::require_running].
    pub fn require_running(mut self, require_running: bool) -> Self {
        self.config.require_running = require_running;

        self
    }

    /// Replace the whole [Config].
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;

        self
    }

    pub fn build(self) -> Dht {
        Dht {
            engine: self.engine,
            events: self.events,
            config: self.config,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors of [Dht] requests. Not finding anything is not an error.
pub enum DhtError {
    /// The engine reported the DHT is not running.
    #[error("DHT is not running")]
    NotRunning,

    #[error(transparent)]
    /// Malformed mutable item.
    Mutable(#[from] MutableError),
}
