// ── In-process document store ──
//
// A `DocumentStore` held entirely in memory. Every write notifies the
// watchers of the touched document, so subscribers observe the same
// push semantics as against a real backend. Used by the test suites and
// by the CLI demo.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::Error;
use crate::ids::{CollectionId, DocumentId, DocumentKey};
use crate::store::{CancelHandle, Document, DocumentStore, Snapshot, Subscription};

/// A write observed by the store, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Add(DocumentKey),
    Update(DocumentKey),
    Delete(DocumentKey),
}

struct Watcher {
    tx: mpsc::UnboundedSender<Result<Snapshot, Error>>,
    cancel: CancellationToken,
}

impl Watcher {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tx.is_closed()
    }
}

/// In-memory [`DocumentStore`] with an operation log and fault injection.
#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<DocumentKey, Document>,
    /// Watchers per document. The entry lock is held across a write and its
    /// notification so subscribers see writes in the order they landed.
    watchers: DashMap<DocumentKey, Vec<Watcher>>,
    log: Mutex<Vec<Operation>>,
    fail_writes: AtomicBool,
    fail_subscriptions: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a document directly, bypassing the operation log.
    ///
    /// Watchers are notified as for any other write.
    pub fn seed(
        &self,
        collection: impl Into<CollectionId>,
        doc: impl Into<DocumentId>,
        data: Document,
    ) {
        let key = DocumentKey::new(collection, doc);
        self.write(&key, Some(data));
    }

    /// Current stored body of a document, if it exists.
    pub fn document(&self, collection: &str, doc: &str) -> Option<Document> {
        self.documents
            .get(&DocumentKey::new(collection, doc))
            .map(|d| d.value().clone())
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Every write applied through the [`DocumentStore`] trait, oldest first.
    pub fn operations(&self) -> Vec<Operation> {
        self.log.lock().expect("operation log lock poisoned").clone()
    }

    /// Open (not yet cancelled) subscriptions for one document.
    pub fn active_subscriptions(&self, collection: &str, doc: &str) -> usize {
        self.watchers
            .get(&DocumentKey::new(collection, doc))
            .map_or(0, |w| w.iter().filter(|w| w.is_live()).count())
    }

    /// Open subscriptions across the whole store.
    pub fn total_active_subscriptions(&self) -> usize {
        self.watchers
            .iter()
            .map(|entry| entry.value().iter().filter(|w| w.is_live()).count())
            .sum()
    }

    /// Make every subsequent `add`/`update`/`delete` fail with [`Error::Rejected`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent subscription deliver an error instead of a snapshot.
    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn check_writable(&self) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Rejected {
                message: "write rejected by store".into(),
            });
        }
        Ok(())
    }

    fn record(&self, op: Operation) {
        self.log.lock().expect("operation log lock poisoned").push(op);
    }

    /// Apply a write (or delete when `data` is `None`) and notify watchers.
    fn write(&self, key: &DocumentKey, data: Option<Document>) {
        let mut watchers = self.watchers.entry(key.clone()).or_default();
        match &data {
            Some(body) => {
                self.documents.insert(key.clone(), body.clone());
            }
            None => {
                self.documents.remove(key);
            }
        }

        watchers.retain(Watcher::is_live);
        let snapshot = Snapshot {
            id: key.doc.clone(),
            data,
        };
        for watcher in watchers.iter() {
            let _ = watcher.tx.send(Ok(snapshot.clone()));
        }
        trace!(%key, watchers = watchers.len(), "notified watchers");
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &CollectionId, doc: &DocumentId) -> Result<Snapshot, Error> {
        let key = DocumentKey::new(collection.clone(), doc.clone());
        Ok(Snapshot {
            id: doc.clone(),
            data: self.documents.get(&key).map(|d| d.value().clone()),
        })
    }

    fn subscribe(
        &self,
        collection: &CollectionId,
        doc: &DocumentId,
    ) -> Result<Subscription, Error> {
        let key = DocumentKey::new(collection.clone(), doc.clone());
        let (tx, updates) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        if self.fail_subscriptions.load(Ordering::SeqCst) {
            let _ = tx.send(Err(Error::Rejected {
                message: format!("subscription to {key} denied"),
            }));
            return Ok(Subscription {
                updates,
                handle: CancelHandle::new(cancel),
            });
        }

        let mut watchers = self.watchers.entry(key.clone()).or_default();
        let initial = Snapshot {
            id: doc.clone(),
            data: self.documents.get(&key).map(|d| d.value().clone()),
        };
        let _ = tx.send(Ok(initial));
        watchers.push(Watcher {
            tx,
            cancel: cancel.clone(),
        });
        debug!(%key, "subscription opened");

        Ok(Subscription {
            updates,
            handle: CancelHandle::new(cancel),
        })
    }

    async fn add(&self, collection: &CollectionId, seed: Document) -> Result<DocumentId, Error> {
        self.check_writable()?;
        let doc = DocumentId::new(uuid::Uuid::new_v4().simple().to_string());
        let key = DocumentKey::new(collection.clone(), doc.clone());
        self.write(&key, Some(seed));
        self.record(Operation::Add(key));
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &CollectionId,
        doc: &DocumentId,
        data: Document,
    ) -> Result<(), Error> {
        self.check_writable()?;
        let key = DocumentKey::new(collection.clone(), doc.clone());
        if !self.documents.contains_key(&key) {
            return Err(Error::NotFound {
                collection: collection.to_string(),
                doc: doc.to_string(),
            });
        }
        self.write(&key, Some(data));
        self.record(Operation::Update(key));
        Ok(())
    }

    async fn delete(&self, collection: &CollectionId, doc: &DocumentId) -> Result<(), Error> {
        self.check_writable()?;
        let key = DocumentKey::new(collection.clone(), doc.clone());
        self.write(&key, None);
        self.record(Operation::Delete(key));
        Ok(())
    }
}
