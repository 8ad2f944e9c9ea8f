use std::collections::BTreeMap;

/// Session lifecycle notifications published by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String },
    /// The remote snapshot landed and both push gates are open.
    Synced { user_id: String },
    SignedOut { user_id: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Box<dyn FnMut(&E) + Send>;

/// A small typed publish/subscribe bus. Handlers run synchronously in
/// subscription order; dropping the bus drops every handler.
pub struct EventBus<E> {
    next_id: u64,
    handlers: BTreeMap<SubscriptionId, Handler<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: BTreeMap::new(),
        }
    }
}

impl<E> EventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&E) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.insert(id, Box::new(handler));
        id
    }

    /// Returns false if the id was already unsubscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    pub fn publish(&mut self, event: &E) {
        for handler in self.handlers.values_mut() {
            handler(event);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}
