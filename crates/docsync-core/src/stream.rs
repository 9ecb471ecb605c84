// ── Reactive entity streams ──
//
// Subscription type for consuming changes of one cache slot.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::EntityRecord;

type Slot = Option<Arc<EntityRecord>>;

/// A subscription to one `(collection, doc)` slot of the entity cache.
///
/// Provides both point-in-time access and reactive change notification
/// via [`changed()`](Self::changed) or by converting to a `Stream`.
/// `None` means the slot does not exist.
pub struct EntityStream {
    current: Slot,
    receiver: watch::Receiver<Slot>,
}

impl EntityStream {
    pub(crate) fn new(receiver: watch::Receiver<Slot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The slot value captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &Slot {
        &self.current
    }

    /// The latest slot value (may have changed since creation).
    pub fn latest(&self) -> Slot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new slot value.
    /// Returns `None` if the cache has been dropped.
    pub async fn changed(&mut self) -> Option<Slot> {
        self.receiver.changed().await.ok()?;
        let slot = self.receiver.borrow_and_update().clone();
        self.current.clone_from(&slot);
        Some(slot)
    }

    /// Wait until the slot satisfies `predicate`, returning that value.
    ///
    /// Checks the current value first. Returns `None` if the cache has been
    /// dropped before the predicate held.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&Slot) -> bool) -> Option<Slot> {
        let slot = self.receiver.wait_for(|s| predicate(s)).await.ok()?.clone();
        self.current.clone_from(&slot);
        Some(slot)
    }

    /// Wait until the slot holds loaded data.
    pub async fn loaded(&mut self) -> Option<Arc<EntityRecord>> {
        self.wait_for(|s| s.as_ref().is_some_and(|r| r.is_loaded()))
            .await
            .flatten()
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> EntityWatchStream {
        EntityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current slot value first, then a new value each time the
/// slot is mutated.
pub struct EntityWatchStream {
    inner: WatchStream<Slot>,
}

impl Stream for EntityWatchStream {
    type Item = Slot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // `Option<Arc<_>>` is Unpin, so the inner WatchStream is too.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
