//! Subscription table fanning engine events out to interested listeners.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock, Weak,
    },
    time::Instant,
};

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use super::{Event, EventKind};

type Listeners = RwLock<HashMap<u64, Listener>>;

#[derive(Debug)]
struct Listener {
    kinds: Box<[EventKind]>,
    sender: Sender<Event>,
}

#[derive(Debug, Default)]
struct Inner {
    listeners: Listeners,
    next_id: AtomicU64,
}

#[derive(Debug, Clone, Default)]
/// Delivers [Event]s published by an engine to every live [Subscription]
/// interested in their [EventKind].
///
/// Cloning is cheap, all clones share the same subscription table.
pub struct EventBus(Arc<Inner>);

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kinds`. Dropping the returned [Subscription]
    /// unregisters it.
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = flume::unbounded();

        self.0
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Listener {
                    kinds: kinds.into(),
                    sender,
                },
            );

        debug!(id, ?kinds, "New subscription");

        Subscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.0),
        }
    }

    /// Send `event` to every subscription interested in its kind.
    ///
    /// Never blocks on a slow subscriber. Returns the number of subscriptions reached.
    pub fn publish(&self, event: Event) -> usize {
        let kind = event.kind();

        let listeners = self
            .0
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let delivered = listeners
            .values()
            .filter(|listener| listener.kinds.contains(&kind))
            .filter(|listener| listener.sender.send(event.clone()).is_ok())
            .count();

        trace!(?kind, target = %event.target(), delivered, "Published event");

        delivered
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.0
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug)]
/// A registered listener on an [EventBus].
///
/// When dropped, the listener is removed from the bus.
pub struct Subscription {
    id: u64,
    receiver: Receiver<Event>,
    bus: Weak<Inner>,
}

impl Subscription {
    /// Block until the next event or the `deadline`.
    ///
    /// Returns `None` at the deadline, or if the bus was dropped.
    pub fn recv_deadline(&self, deadline: Instant) -> Option<Event> {
        match self.receiver.recv_deadline(deadline) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until the next event, or `None` if the bus was dropped.
    pub fn recv(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    /// Next already delivered event, if any.
    pub fn try_recv(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };

        bus.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);

        debug!(id = self.id, "Subscription dropped");
    }
}
