//! One-shot request/response correlation over the [EventBus].
//!
//! An engine answers requests by publishing events for anyone listening, so a
//! caller has to listen _before_ asking, pick its own answer out of the stream,
//! and stop listening once answered or out of time.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::events::{Event, EventBus, EventKind, Subscription};

#[derive(Debug)]
/// A registered interest in the answer to a single request.
///
/// The underlying [Subscription] is removed from the bus when this is waited on
/// or dropped, whichever comes first.
pub struct PendingRequest {
    subscription: Subscription,
    deadline: Option<Instant>,
}

impl PendingRequest {
    /// Start listening for `kinds` on `events`. The `timeout` starts now.
    pub fn register(events: &EventBus, kinds: &[EventKind], timeout: Duration) -> Self {
        Self {
            subscription: events.subscribe(kinds),
            // Overflowing deadlines wait forever.
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Block until an event satisfying `matches` arrives and return `extract`ed
    /// from it, or return `None` once the deadline passes.
    ///
    /// Events that don't match are discarded.
    pub fn wait<T>(
        self,
        matches: impl Fn(&Event) -> bool,
        extract: impl FnOnce(Event) -> T,
    ) -> Option<T> {
        loop {
            let event = match self.deadline {
                Some(deadline) => self.subscription.recv_deadline(deadline),
                None => self.subscription.recv(),
            }?;

            if matches(&event) {
                return Some(extract(event));
            }

            trace!(kind = ?event.kind(), target = %event.target(), "Ignored unrelated event");
        }
    }
}

/// Listen for `kinds`, then `issue` the request, then wait up to `timeout` for
/// the first event satisfying `matches`.
///
/// The listener is registered before `issue` runs, so an answer delivered while
/// `issue` is still running is not lost. It is unregistered before returning.
pub fn wait_for<T>(
    events: &EventBus,
    kinds: &[EventKind],
    timeout: Duration,
    issue: impl FnOnce(),
    matches: impl Fn(&Event) -> bool,
    extract: impl FnOnce(Event) -> T,
) -> Option<T> {
    let pending = PendingRequest::register(events, kinds, timeout);

    issue();

    pending.wait(matches, extract)
}

#[cfg(test)]
mod test {
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;

    use super::*;
    use crate::{Id, Item};

    fn immutable_event(value: &[u8]) -> Event {
        let item = Item::bytes(value);

        Event::ImmutableItem {
            target: item.target(),
            item,
        }
    }

    fn item_of(event: Event) -> Option<Item> {
        match event {
            Event::ImmutableItem { item, .. } => Some(item),
            _ => None,
        }
    }

    #[test]
    fn answer_published_during_issue_is_not_lost() {
        let events = EventBus::new();
        let target = Item::bytes(b"sync").target();

        let result = wait_for(
            &events,
            &[EventKind::ImmutableItem],
            Duration::from_secs(1),
            || {
                events.publish(immutable_event(b"sync"));
            },
            |event| event.target() == &target,
            item_of,
        );

        assert_eq!(result, Some(Some(Item::bytes(b"sync"))));
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn timeout_returns_none_and_unsubscribes() {
        let events = EventBus::new();

        let start = Instant::now();
        let result = wait_for(
            &events,
            &[EventKind::ImmutableItem],
            Duration::from_millis(30),
            || {},
            |_| true,
            item_of,
        );

        assert_eq!(result, None);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn zero_timeout_still_sees_queued_answer() {
        let events = EventBus::new();

        let result = wait_for(
            &events,
            &[EventKind::ImmutableItem],
            Duration::ZERO,
            || {
                events.publish(immutable_event(b"now"));
            },
            |_| true,
            item_of,
        );

        assert_eq!(result, Some(Some(Item::bytes(b"now"))));
    }

    #[test]
    fn ignores_other_targets() {
        let events = EventBus::new();
        let wanted = Item::bytes(b"wanted").target();

        let publisher = {
            let events = events.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                events.publish(immutable_event(b"other"));
                events.publish(Event::PeersFound {
                    info_hash: wanted,
                    peers: vec![],
                });
                events.publish(immutable_event(b"wanted"));
            })
        };

        let result = wait_for(
            &events,
            &[EventKind::ImmutableItem],
            Duration::from_secs(5),
            || {},
            |event| event.target() == &wanted,
            item_of,
        );

        publisher.join().unwrap();

        assert_eq!(result, Some(Some(Item::bytes(b"wanted"))));
    }

    #[test]
    fn delivers_once() {
        let events = EventBus::new();

        let pending =
            PendingRequest::register(&events, &[EventKind::ImmutableItem], Duration::from_secs(1));

        events.publish(immutable_event(b"first"));
        events.publish(immutable_event(b"second"));

        let result = pending.wait(|_| true, item_of);

        assert_eq!(result, Some(Some(Item::bytes(b"first"))));
        assert_eq!(events.listener_count(), 0);
        assert_eq!(events.publish(immutable_event(b"third")), 0);
    }

    #[test]
    fn dropped_pending_request_unsubscribes() {
        let events = EventBus::new();

        let pending =
            PendingRequest::register(&events, &[EventKind::PeersFound], Duration::from_secs(1));
        assert_eq!(events.listener_count(), 1);

        drop(pending);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn panicking_matcher_unsubscribes() {
        let events = EventBus::new();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            wait_for(
                &events,
                &[EventKind::PeersFound],
                Duration::from_secs(1),
                || {
                    events.publish(Event::PeersFound {
                        info_hash: Id::random(),
                        peers: vec![],
                    });
                },
                |_| panic!("matcher failed"),
                |_| (),
            )
        }));

        assert!(result.is_err());
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn huge_timeout_does_not_overflow() {
        let events = EventBus::new();

        let result = wait_for(
            &events,
            &[EventKind::ImmutableItem],
            Duration::MAX,
            || {
                events.publish(immutable_event(b"forever"));
            },
            |_| true,
            |_| 42,
        );

        assert_eq!(result, Some(42));
    }
}
