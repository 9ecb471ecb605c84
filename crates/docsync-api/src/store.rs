//! Remote document store contract.
//!
//! A store is a set of named collections, each holding JSON documents
//! addressed by an opaque id. Besides point reads and writes it offers a
//! push subscription per document: the full current document is delivered
//! on subscribe and after every change, until the subscriber cancels.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::ids::{CollectionId, DocumentId};

/// Body of a document: field name → JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// The state of one document as seen by the store at some instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: DocumentId,
    /// `None` when the document does not exist (never created, or deleted).
    pub data: Option<Document>,
}

// ── CancelHandle ────────────────────────────────────────────────────

/// Cancels one push subscription.
///
/// `cancel` takes `self`, so a handle can be invoked at most once.
/// Dropping a handle without cancelling leaves the subscription open.
#[derive(Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Close the subscription. The store stops delivering snapshots.
    pub fn cancel(self) {
        self.token.cancel();
    }

    /// A token that fires when this handle is cancelled.
    ///
    /// Forwarding tasks select on it to stop promptly.
    pub fn cancelled_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

// ── Subscription ────────────────────────────────────────────────────

/// A live push channel for one document.
///
/// `updates` yields every snapshot the store delivers. An `Err` item is
/// terminal: the store delivers nothing further on this channel.
#[derive(Debug)]
pub struct Subscription {
    pub updates: mpsc::UnboundedReceiver<Result<Snapshot, Error>>,
    pub handle: CancelHandle,
}

// ── DocumentStore ───────────────────────────────────────────────────

/// Operations consumed from the remote document store.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Point read of a single document.
    async fn get(&self, collection: &CollectionId, doc: &DocumentId) -> Result<Snapshot, Error>;

    /// Open a push subscription for a single document.
    fn subscribe(
        &self,
        collection: &CollectionId,
        doc: &DocumentId,
    ) -> Result<Subscription, Error>;

    /// Create a document with a store-generated id, seeded with `seed`.
    async fn add(&self, collection: &CollectionId, seed: Document) -> Result<DocumentId, Error>;

    /// Replace the stored body of an existing document.
    async fn update(
        &self,
        collection: &CollectionId,
        doc: &DocumentId,
        data: Document,
    ) -> Result<(), Error>;

    /// Delete a document. Deleting an absent document is not an error.
    async fn delete(&self, collection: &CollectionId, doc: &DocumentId) -> Result<(), Error>;
}
