// ── Synchronization engine ──
//
// Public handle to the engine task. Every mutation is a `Command` sent
// over a channel; reads go straight to the shared cache.

mod state;
mod writer;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use docsync_api::{CollectionId, Document, DocumentKey, DocumentStore, Snapshot};

use self::state::{EngineMessage, EngineState};
use self::writer::Writer;
use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::EntityState;
use crate::notice::Notice;
use crate::route::{Navigator, Redirect};
use crate::store::{EntityCache, SubscriptionRegistry};
use crate::stream::EntityStream;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Owns one engine task (the
/// only writer of cache and registry) and one remote-writer task.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    cache: Arc<EntityCache>,
    store: Arc<dyn DocumentStore>,
    navigator: Arc<dyn Navigator>,
    inbox: mpsc::Sender<EngineMessage>,
    notices: broadcast::Sender<Notice>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SyncEngine {
    /// Spawn the engine and writer tasks. Must be called inside a tokio runtime.
    pub fn start(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let cache = Arc::new(EntityCache::new());
        let (inbox, inbox_rx) = mpsc::channel(config.command_channel_size);
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(config.notice_channel_size);
        let cancel = CancellationToken::new();

        let state = EngineState {
            cache: Arc::clone(&cache),
            registry: SubscriptionRegistry::new(),
            store: Arc::clone(&store),
            navigator: Arc::clone(&navigator),
            notices: notices.clone(),
            writer: writer_tx,
            inbox: inbox.clone(),
        };
        let writer = Writer {
            store: Arc::clone(&store),
            navigator: Arc::clone(&navigator),
            inbox: inbox.clone(),
        };

        let handles = vec![
            tokio::spawn(state.run(inbox_rx, cancel.clone())),
            tokio::spawn(writer.run(writer_rx, cancel.clone())),
        ];
        debug!("sync engine started");

        Self {
            inner: Arc::new(EngineInner {
                config,
                cache,
                store,
                navigator,
                inbox,
                notices,
                cancel,
                task_handles: Mutex::new(handles),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The shared entity cache. Read-only outside the engine.
    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.inner.cache
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    // ── Command execution ────────────────────────────────────────

    /// Send a command to the engine task and await the result.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        self.request(|response_tx| {
            EngineMessage::Command(CommandEnvelope {
                command,
                response_tx,
            })
        })
        .await?
    }

    /// Post a message carrying a reply channel and wait for the answer.
    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> EngineMessage,
    ) -> Result<T, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::EngineStopped);
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .inbox
            .send(message(tx))
            .await
            .map_err(|_| CoreError::EngineStopped)?;

        rx.await.map_err(|_| CoreError::EngineStopped)
    }

    /// View/edit entry point. Opens (or re-opens) the subscription for
    /// `key`; a `doc` of `add` creates a new entity in `key.collection`.
    ///
    /// Returns once the subscription is open, before the first push.
    pub async fn open(&self, key: DocumentKey) -> Result<CommandResult, CoreError> {
        self.execute(Command::Open { key }).await
    }

    /// Create an entity in `collection`, linking it to the parent named
    /// by the current route if there is one. Returns the new key.
    pub async fn create(&self, collection: CollectionId) -> Result<DocumentKey, CoreError> {
        self.request(|reply| EngineMessage::Create { collection, reply })
            .await?
    }

    /// Merge `patch` into the cached entity and write it through.
    ///
    /// Resolves after the store acknowledges the write.
    pub async fn update(&self, key: DocumentKey, patch: Document) -> Result<(), CoreError> {
        self.execute(Command::Update { key, patch }).await.map(|_| ())
    }

    /// Write the cached data for `key` through. `Skipped` if the entity is gone.
    pub async fn commit(&self, key: DocumentKey) -> Result<CommandResult, CoreError> {
        self.execute(Command::Commit { key }).await
    }

    /// Delete `key` and everything nested under it, children first.
    pub async fn delete(
        &self,
        key: DocumentKey,
        redirect: Option<Redirect>,
    ) -> Result<(), CoreError> {
        self.execute(Command::Delete { key, redirect })
            .await
            .map(|_| ())
    }

    /// Remove `child` from `parent`'s nested collections and write it through.
    pub async fn unlink(
        &self,
        parent: DocumentKey,
        child: DocumentKey,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::Unlink { parent, child }).await
    }

    /// Cancel every subscription, then clear the cache.
    pub async fn teardown(&self) -> Result<(), CoreError> {
        self.execute(Command::Teardown).await.map(|_| ())
    }

    pub async fn subscription_count(&self) -> Result<usize, CoreError> {
        self.request(|reply| EngineMessage::SubscriptionCount { reply })
            .await
    }

    pub async fn is_subscribed(&self, key: DocumentKey) -> Result<bool, CoreError> {
        self.request(|reply| EngineMessage::IsSubscribed { key, reply })
            .await
    }

    // ── Direct reads ─────────────────────────────────────────────

    /// One-shot point read. Touches neither cache nor registry.
    pub async fn fetch(&self, key: &DocumentKey) -> Result<Snapshot, CoreError> {
        self.inner
            .store
            .get(&key.collection, &key.doc)
            .await
            .map_err(|source| {
                let err = CoreError::RemoteRead {
                    key: key.clone(),
                    source,
                };
                warn!(error = %err, "fetch failed");
                err
            })
    }

    /// Field value from the cache, or the empty-string sentinel.
    pub fn read(&self, collection: &str, doc: &str, field: &str) -> Value {
        self.inner.cache.read(collection, doc, field)
    }

    pub fn entity_state(&self, key: &DocumentKey) -> EntityState {
        self.inner.cache.state(key)
    }

    pub fn watch(&self, key: &DocumentKey) -> EntityStream {
        self.inner.cache.watch(key)
    }

    /// Subscribe to user-facing notices.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    pub(crate) fn publish(&self, notice: Notice) {
        let _ = self.inner.notices.send(notice);
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    /// Tear down, stop both tasks, and wait for them to finish.
    ///
    /// Writes still queued are dropped; their callers see `EngineStopped`.
    pub async fn shutdown(&self) {
        if let Err(e) = self.teardown().await {
            debug!(error = %e, "teardown skipped");
        }
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("sync engine shut down");
    }
}
