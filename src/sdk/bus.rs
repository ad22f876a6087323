//! Event bus - process-wide delivery of session events
//!
//! Every subscriber gets its own unbounded inbox so that delivery order within
//! one subscriber equals publish order. Subscribing returns a [`Subscription`]
//! handle; dropping the handle unregisters the inbox, so release happens on
//! every exit path of the owning surface.
//!
//! Publishing also wakes the dispatch loop through a shared [`Notify`], which
//! lets events emitted from another task be marshalled onto the UI loop.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Local;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use super::events::{EventEnvelope, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Listener {
    name: String,
    sender: mpsc::UnboundedSender<EventEnvelope>,
}

#[derive(Default)]
struct BusRegistry {
    next_id: u64,
    sequence: u64,
    listeners: BTreeMap<SubscriptionId, Listener>,
}

fn lock(registry: &Mutex<BusRegistry>) -> MutexGuard<'_, BusRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<BusRegistry>>,
    wake: Arc<Notify>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new listener and returns its handle and inbox
    pub fn subscribe(
        &self,
        name: impl Into<String>,
    ) -> (Subscription, mpsc::UnboundedReceiver<EventEnvelope>) {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut registry = lock(&self.registry);
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.insert(
            id,
            Listener {
                name: name.clone(),
                sender,
            },
        );
        debug!(
            "Subscribed {} as {:?} ({} listeners)",
            name,
            id,
            registry.listeners.len()
        );

        let subscription = Subscription {
            id,
            name,
            registry: Arc::downgrade(&self.registry),
        };
        (subscription, receiver)
    }

    /// Delivers an event to every registered listener
    ///
    /// Returns the number of listeners that received it. Listeners whose inbox
    /// was dropped without unsubscribing are pruned.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let mut registry = lock(&self.registry);
        registry.sequence += 1;
        let envelope = EventEnvelope {
            sequence: registry.sequence,
            published_at: Local::now(),
            event,
        };

        let mut stale = Vec::new();
        let mut delivered = 0;
        for (id, listener) in &registry.listeners {
            match listener.sender.send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    warn!(
                        "Inbox of {} closed without unsubscribing, pruning",
                        listener.name
                    );
                    stale.push(*id);
                }
            }
        }
        for id in stale {
            registry.listeners.remove(&id);
        }
        drop(registry);

        debug!(
            "Published {} #{} to {} listeners",
            envelope.event.name(),
            envelope.sequence,
            delivered
        );
        self.wake.notify_one();
        delivered
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    /// Resolves after the next publish (or immediately if one happened since the last wait)
    pub async fn notified(&self) {
        self.wake.notified().await
    }
}

/// Registration handle; unregisters on drop
pub struct Subscription {
    id: SubscriptionId,
    name: String,
    registry: Weak<Mutex<BusRegistry>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = lock(&registry);
            if registry.listeners.remove(&self.id).is_some() {
                debug!("Unsubscribed {} ({:?})", self.name, self.id);
            }
        }
    }
}
