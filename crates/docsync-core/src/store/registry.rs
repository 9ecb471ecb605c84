// ── Subscription registry ──
//
// Live cancel handles keyed like the entity cache. Owned by the sync
// engine task; handles leave the registry at the moment they are
// cancelled, so none can be cancelled twice.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use docsync_api::{CancelHandle, CollectionId, DocumentId, DocumentKey};

struct Registration {
    handle: CancelHandle,
    /// Distinguishes this subscription from earlier ones on the same key.
    generation: u64,
}

/// Open push subscriptions, one per `(collection, doc)` at most.
#[derive(Default)]
pub struct SubscriptionRegistry {
    by_collection: HashMap<CollectionId, HashMap<DocumentId, Registration>>,
    next_generation: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the handle for `key` and return its generation number.
    ///
    /// A handle already registered for `key` is cancelled first.
    pub fn register(&mut self, key: &DocumentKey, handle: CancelHandle) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;

        let previous = self
            .by_collection
            .entry(key.collection.clone())
            .or_default()
            .insert(key.doc.clone(), Registration { handle, generation });

        if let Some(previous) = previous {
            warn!(%key, "replacing a live subscription");
            previous.handle.cancel();
        }
        trace!(%key, generation, "subscription registered");
        generation
    }

    /// Cancel and forget the handle for `key`.
    ///
    /// Returns `false` (and does nothing) when no handle is registered.
    pub fn cancel_and_remove(&mut self, key: &DocumentKey) -> bool {
        let Some(docs) = self.by_collection.get_mut(&key.collection) else {
            trace!(%key, "no subscription to cancel");
            return false;
        };
        let Some(registration) = docs.remove(&key.doc) else {
            trace!(%key, "no subscription to cancel");
            return false;
        };
        if docs.is_empty() {
            self.by_collection.remove(&key.collection);
        }

        registration.handle.cancel();
        debug!(%key, "subscription cancelled");
        true
    }

    /// Cancel every handle, then clear the registry. Returns how many were cancelled.
    pub fn cancel_and_remove_all(&mut self) -> usize {
        let mut cancelled = 0;
        for (_, docs) in self.by_collection.drain() {
            for (_, registration) in docs {
                registration.handle.cancel();
                cancelled += 1;
            }
        }
        debug!(cancelled, "all subscriptions cancelled");
        cancelled
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.generation(key).is_some()
    }

    /// Generation of the live subscription for `key`, if any.
    pub fn generation(&self, key: &DocumentKey) -> Option<u64> {
        self.by_collection
            .get(&key.collection)?
            .get(&key.doc)
            .map(|r| r.generation)
    }

    pub fn len(&self) -> usize {
        self.by_collection.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_collection.is_empty()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.cancel_and_remove_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn handle() -> (CancelHandle, CancellationToken) {
        let token = CancellationToken::new();
        (CancelHandle::new(token.clone()), token)
    }

    fn key(c: &str, d: &str) -> DocumentKey {
        DocumentKey::new(c, d)
    }

    #[test]
    fn cancel_and_remove_cancels_once_and_forgets() {
        let mut registry = SubscriptionRegistry::new();
        let (h, token) = handle();
        registry.register(&key("Parent", "p1"), h);
        assert!(registry.contains(&key("Parent", "p1")));

        assert!(registry.cancel_and_remove(&key("Parent", "p1")));
        assert!(token.is_cancelled());
        assert!(!registry.contains(&key("Parent", "p1")));
        assert!(registry.is_empty());

        // Second call is a silent no-op.
        assert!(!registry.cancel_and_remove(&key("Parent", "p1")));
    }

    #[test]
    fn cancel_and_remove_missing_is_noop() {
        let mut registry = SubscriptionRegistry::new();
        let (h, token) = handle();
        registry.register(&key("Parent", "p1"), h);

        assert!(!registry.cancel_and_remove(&key("Child", "p1")));
        assert!(!registry.cancel_and_remove(&key("Parent", "p2")));
        assert!(!token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cancel_and_remove_all_cancels_everything() {
        let mut registry = SubscriptionRegistry::new();
        let tokens: Vec<_> = [("Parent", "p1"), ("Child", "c1"), ("Child", "c2")]
            .into_iter()
            .map(|(c, d)| {
                let (h, token) = handle();
                registry.register(&key(c, d), h);
                token
            })
            .collect();

        assert_eq!(registry.cancel_and_remove_all(), 3);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert!(registry.is_empty());
        assert_eq!(registry.cancel_and_remove_all(), 0);
    }

    #[test]
    fn register_replaces_and_cancels_previous() {
        let mut registry = SubscriptionRegistry::new();
        let (first, first_token) = handle();
        let (second, second_token) = handle();

        let g1 = registry.register(&key("Parent", "p1"), first);
        let g2 = registry.register(&key("Parent", "p1"), second);

        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert_ne!(g1, g2);
        assert_eq!(registry.generation(&key("Parent", "p1")), Some(g2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn drop_cancels_leftovers() {
        let (h, token) = handle();
        {
            let mut registry = SubscriptionRegistry::new();
            registry.register(&key("Parent", "p1"), h);
        }
        assert!(token.is_cancelled());
    }
}
