//! Typed in-process publish/subscribe over [`clawbuds_proto::Event`].
//!
//! Publish is synchronous (returns once the event is queued to every
//! subscriber); each subscriber drains its own queue on a dedicated task, so
//! one subscriber blocking or panicking never affects another, and events
//! reach a given subscriber in publication order. There is no durability —
//! a subscriber registered after a publish never sees it, and nothing
//! survives process restart.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use clawbuds_proto::{Event, EventKind};
use futures_util::FutureExt;
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

#[async_trait]
pub trait Subscriber: Send + Sync + 'static {
    fn name(&self) -> &str;
    async fn handle(&self, event: &Event);
}

struct Registration {
    subscriber_name: String,
    sender: mpsc::UnboundedSender<Event>,
}

/// Synchronous-publish, isolated-dispatch event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Registration>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and spawns its drain loop. The subscriber
    /// receives every event published after this call, in order, regardless
    /// of `kind` filtering done inside `handle` — filtering by `EventKind`
    /// is the subscriber's job so one bus serves every kind uniformly.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let name = subscriber.name().to_string();
        self.subscribers.write().push(Registration { subscriber_name: name.clone(), sender: tx });

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let outcome = AssertUnwindSafe(subscriber.handle(&event)).catch_unwind().await;
                if outcome.is_err() {
                    error!(subscriber = name, kind = ?event.kind, "subscriber panicked handling event");
                }
            }
        });
    }

    /// Queues `event` to every subscriber's channel. Returns once queued —
    /// does not wait for any subscriber to actually process it.
    pub fn publish(&self, event: Event) {
        let subscribers = self.subscribers.read();
        for reg in subscribers.iter() {
            if reg.sender.send(event.clone()).is_err() {
                warn!(subscriber = reg.subscriber_name, kind = ?event.kind, "subscriber channel closed, dropping event");
            }
        }
    }

    pub fn publish_kind(&self, kind: EventKind, claw_id: impl Into<String>, data: serde_json::Value) {
        self.publish(Event::new(kind, claw_id, data));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    struct CountingSubscriber {
        name: String,
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    #[async_trait]
    impl Subscriber for CountingSubscriber {
        fn name(&self) -> &str {
            &self.name
        }
        async fn handle(&self, event: &Event) {
            self.seen.lock().await.push(event.kind);
        }
    }

    struct PanickingSubscriber {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscriber for PanickingSubscriber {
        fn name(&self) -> &str {
            "panicker"
        }
        async fn handle(&self, _event: &Event) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn subscriber_receives_events_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(CountingSubscriber { name: "counter".into(), seen: seen.clone() }));

        bus.publish_kind(EventKind::MessageNew, "alice", serde_json::json!({}));
        bus.publish_kind(EventKind::FriendAccepted, "alice", serde_json::json!({}));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let recorded = seen.lock().await;
        assert_eq!(*recorded, vec![EventKind::MessageNew, EventKind::FriendAccepted]);
    }

    #[tokio::test]
    async fn a_panicking_subscriber_does_not_affect_others() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(PanickingSubscriber { calls: calls.clone() }));

        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(CountingSubscriber { name: "survivor".into(), seen: seen.clone() }));

        bus.publish_kind(EventKind::MessageNew, "alice", serde_json::json!({}));
        bus.publish_kind(EventKind::MessageNew, "alice", serde_json::json!({}));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(seen.lock().await.len(), 2);
    }
}
