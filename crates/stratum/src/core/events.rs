//! Publish/subscribe channel with deterministic delivery order
//!
//! Subscribers are called in the order they subscribed. A subscriber can be
//! removed with the [`SubscriptionId`] returned by [`EventBus::subscribe`].

use std::fmt;

/// Handle identifying one subscription on an [`EventBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Box<dyn FnMut(&E) + Send>;

/// An ordered list of callbacks receiving events of type `E`
pub struct EventBus<E> {
    subscribers: Vec<(SubscriptionId, Callback<E>)>,
    next_id: u64,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a callback; it runs after every callback registered before it
    pub fn subscribe(&mut self, callback: impl FnMut(&E) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Deliver `event` to every subscriber in subscription order
    pub fn publish(&mut self, event: &E) {
        for (_, callback) in &mut self.subscribers {
            callback(event);
        }
    }

    /// Move every subscriber into a new bus, leaving this one empty
    ///
    /// Ids handed out by either bus afterwards stay unique as long as the
    /// detached bus is given back with [`EventBus::restore`].
    pub fn detach(&mut self) -> EventBus<E> {
        EventBus {
            subscribers: std::mem::take(&mut self.subscribers),
            next_id: self.next_id,
        }
    }

    /// Put back subscribers taken with [`EventBus::detach`], ahead of any
    /// subscribed in the meantime
    pub fn restore(&mut self, mut detached: EventBus<E>) {
        detached.subscribers.append(&mut self.subscribers);
        self.subscribers = detached.subscribers;
        self.next_id = self.next_id.max(detached.next_id);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
