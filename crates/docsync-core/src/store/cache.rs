// ── Reactive entity cache ──
//
// Two-level mirror `collection -> doc -> record` with push-based change
// notification via `watch` channels. Reads are lock-free from any task;
// mutation is reserved to the sync engine.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;

use docsync_api::{CollectionId, DocumentId, DocumentKey};

use crate::model::{EntityRecord, EntityState};
use crate::stream::EntityStream;

/// Returned by [`EntityCache::read`] for any missing path segment.
pub const EMPTY_FIELD: &str = "";

/// The local mirror of every entity the engine tracks.
///
/// Each mutation bumps a version counter and pushes the new slot value to
/// any [`EntityStream`] watching that `(collection, doc)` pair.
pub struct EntityCache {
    /// Primary storage. Collection maps are created on first insert and
    /// dropped when their last slot is removed.
    collections: DashMap<CollectionId, HashMap<DocumentId, Arc<EntityRecord>>>,

    /// Per-entity change channels, created lazily by [`watch`](Self::watch).
    watchers: DashMap<DocumentKey, watch::Sender<Option<Arc<EntityRecord>>>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            collections: DashMap::new(),
            watchers: DashMap::new(),
            version,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Field value at `collection/doc.data[field]`.
    ///
    /// Never fails: an absent collection, document, `data`, or field (or a
    /// JSON `null`) yields the [`EMPTY_FIELD`] sentinel.
    pub fn read(&self, collection: &str, doc: &str, field: &str) -> Value {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(doc).cloned())
            .and_then(|record| record.field(field).cloned())
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::String(EMPTY_FIELD.to_owned()))
    }

    /// The record in a slot, placeholder or live.
    pub fn get(&self, key: &DocumentKey) -> Option<Arc<EntityRecord>> {
        self.collections
            .get(&key.collection)
            .and_then(|docs| docs.get(&key.doc).cloned())
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.collections
            .get(&key.collection)
            .is_some_and(|docs| docs.contains_key(&key.doc))
    }

    /// Lifecycle state implied by the slot.
    pub fn state(&self, key: &DocumentKey) -> EntityState {
        match self.get(key) {
            None => EntityState::Unloaded,
            Some(record) if record.is_loaded() => EntityState::Live,
            Some(_) => EntityState::Subscribing,
        }
    }

    /// Subscribe to changes of one slot. `None` means "no slot".
    pub fn watch(&self, key: &DocumentKey) -> EntityStream {
        // The slot is read while the watcher shard is locked, so a concurrent
        // `notify` either sees the new sender or ran before this read.
        let receiver = self
            .watchers
            .entry(key.clone())
            .or_insert_with(|| watch::channel(self.get(key)).0)
            .subscribe();
        EntityStream::new(receiver)
    }

    /// Subscribe to the cache-wide version counter.
    pub fn subscribe_version(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Number of slots across all collections.
    pub fn len(&self) -> usize {
        self.collections.iter().map(|docs| docs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All occupied slots.
    pub fn keys(&self) -> Vec<DocumentKey> {
        self.collections
            .iter()
            .flat_map(|entry| {
                let collection = entry.key().clone();
                entry
                    .value()
                    .keys()
                    .map(|doc| DocumentKey {
                        collection: collection.clone(),
                        doc: doc.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    // ── Mutations (sync engine only) ─────────────────────────────────

    /// Insert or replace a slot. Returns `true` if the slot was new.
    pub(crate) fn put(&self, key: &DocumentKey, record: EntityRecord) -> bool {
        let record = Arc::new(record);
        let is_new = self
            .collections
            .entry(key.collection.clone())
            .or_default()
            .insert(key.doc.clone(), Arc::clone(&record))
            .is_none();

        self.notify(key, Some(record));
        self.bump_version();
        is_new
    }

    /// Remove a slot. Returns the removed record if it existed.
    pub(crate) fn remove(&self, key: &DocumentKey) -> Option<Arc<EntityRecord>> {
        let removed = self
            .collections
            .get_mut(&key.collection)
            .and_then(|mut docs| docs.remove(&key.doc));
        self.collections
            .remove_if(&key.collection, |_, docs| docs.is_empty());

        if removed.is_some() {
            self.notify(key, None);
            self.watchers
                .remove_if(key, |_, tx| tx.receiver_count() == 0);
            self.bump_version();
        }
        removed
    }

    /// Drop every slot.
    pub(crate) fn clear(&self) {
        self.collections.clear();
        for watcher in self.watchers.iter() {
            watcher.value().send_replace(None);
        }
        self.watchers.retain(|_, tx| tx.receiver_count() > 0);
        self.bump_version();
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn notify(&self, key: &DocumentKey, value: Option<Arc<EntityRecord>>) {
        if let Some(tx) = self.watchers.get(key) {
            // `send_replace` updates unconditionally, even with zero receivers.
            tx.send_replace(value);
        }
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}
