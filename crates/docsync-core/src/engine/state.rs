// ── Engine task ──
//
// The sole mutator of the entity cache and the subscription registry.
// Commands, subscription pushes, and create acknowledgements arrive as
// messages and are handled one at a time; nothing in here awaits, so a
// handler always runs to completion before the next message is seen.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use docsync_api::{
    CollectionId, Document, DocumentKey, DocumentStore, Snapshot, Subscription,
};

use super::writer::WriteOp;
use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::error::CoreError;
use crate::merge::{apply_update, remove_nested_child};
use crate::model::{EntityRecord, children_of, nested_patch, parent_seed};
use crate::notice::Notice;
use crate::route::{ADD_SEGMENT, Navigator, Redirect, created_path, parse_child_route};
use crate::store::{EntityCache, SubscriptionRegistry};

pub(super) type Reply = oneshot::Sender<Result<CommandResult, CoreError>>;

/// Who is waiting for a create to resolve.
pub(super) enum CreateReply {
    /// [`SyncEngine::create`](super::SyncEngine::create).
    Key(oneshot::Sender<Result<DocumentKey, CoreError>>),
    /// `Open` on an `add` route.
    Command(Reply),
}

impl CreateReply {
    pub(super) fn send(self, result: Result<DocumentKey, CoreError>) {
        match self {
            Self::Key(tx) => {
                let _ = tx.send(result);
            }
            Self::Command(tx) => {
                let _ = tx.send(result.map(CommandResult::Created));
            }
        }
    }
}

/// Everything the engine task reacts to.
pub(super) enum EngineMessage {
    Command(CommandEnvelope),
    Create {
        collection: CollectionId,
        reply: oneshot::Sender<Result<DocumentKey, CoreError>>,
    },
    SubscriptionCount {
        reply: oneshot::Sender<usize>,
    },
    IsSubscribed {
        key: DocumentKey,
        reply: oneshot::Sender<bool>,
    },
    /// A snapshot (or terminal error) from the subscription registered
    /// under `generation`.
    Push {
        key: DocumentKey,
        generation: u64,
        result: Result<Snapshot, docsync_api::Error>,
    },
    /// The store assigned an id to a document created on our behalf.
    Created {
        key: DocumentKey,
        parent: Option<DocumentKey>,
        reply: CreateReply,
    },
}

pub(super) struct EngineState {
    pub cache: Arc<EntityCache>,
    pub registry: SubscriptionRegistry,
    pub store: Arc<dyn DocumentStore>,
    pub navigator: Arc<dyn Navigator>,
    pub notices: broadcast::Sender<Notice>,
    pub writer: mpsc::UnboundedSender<WriteOp>,
    /// Handed to forwarding tasks so pushes re-enter this loop.
    pub inbox: mpsc::Sender<EngineMessage>,
}

impl EngineState {
    pub(super) async fn run(
        mut self,
        mut rx: mpsc::Receiver<EngineMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg);
                }
            }
        }

        let cancelled = self.registry.cancel_and_remove_all();
        debug!(cancelled, "sync engine stopped");
    }

    fn handle(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::Command(envelope) => self.handle_command(envelope),
            EngineMessage::Create { collection, reply } => {
                self.create(collection, CreateReply::Key(reply));
            }
            EngineMessage::SubscriptionCount { reply } => {
                let _ = reply.send(self.registry.len());
            }
            EngineMessage::IsSubscribed { key, reply } => {
                let _ = reply.send(self.registry.contains(&key));
            }
            EngineMessage::Push {
                key,
                generation,
                result,
            } => self.on_push(&key, generation, result),
            EngineMessage::Created { key, parent, reply } => self.on_created(key, parent, reply),
        }
    }

    fn handle_command(&mut self, envelope: CommandEnvelope) {
        let CommandEnvelope {
            command,
            response_tx,
        } = envelope;

        match command {
            Command::Open { key } if key.doc.as_str() == ADD_SEGMENT => {
                self.create(key.collection, CreateReply::Command(response_tx));
            }
            Command::Open { key } => {
                self.open(&key);
                let _ = response_tx.send(Ok(CommandResult::Ok));
            }
            Command::Update { key, patch } => self.update(key, patch, response_tx),
            Command::Commit { key } => self.commit(&key, Some(response_tx)),
            Command::Delete { key, redirect } => self.delete(&key, redirect, response_tx),
            Command::Unlink { parent, child } => self.unlink(&parent, &child, Some(response_tx)),
            Command::Teardown => {
                self.teardown();
                let _ = response_tx.send(Ok(CommandResult::Ok));
            }
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Start (or restart) tracking `key` from a placeholder.
    fn open(&mut self, key: &DocumentKey) {
        self.registry.cancel_and_remove(key);
        self.cache.put(key, EntityRecord::placeholder(key.doc.clone()));
        self.subscribe(key);
    }

    /// Open a subscription for `key` and spawn its forwarding task.
    ///
    /// A failure is logged and leaves the slot as it is.
    fn subscribe(&mut self, key: &DocumentKey) {
        let Subscription { updates, handle } =
            match self.store.subscribe(&key.collection, &key.doc) {
                Ok(subscription) => subscription,
                Err(source) => {
                    let err = CoreError::RemoteRead {
                        key: key.clone(),
                        source,
                    };
                    warn!(error = %err, "could not subscribe");
                    return;
                }
            };

        let stop = handle.cancelled_token();
        let generation = self.registry.register(key, handle);
        tokio::spawn(forward_pushes(
            key.clone(),
            generation,
            updates,
            stop,
            self.inbox.clone(),
        ));
    }

    /// Make sure every listed child is at least subscribing.
    ///
    /// Children already in the registry are skipped. This is also what
    /// stops discovery from looping on cyclic nested collections.
    fn track_children(&mut self, children: Vec<DocumentKey>) {
        for child in children {
            if self.registry.contains(&child) {
                continue;
            }
            if !self.cache.contains(&child) {
                self.cache
                    .put(&child, EntityRecord::placeholder(child.doc.clone()));
            }
            trace!(%child, "tracking nested entity");
            self.subscribe(&child);
        }
    }

    fn on_push(
        &mut self,
        key: &DocumentKey,
        generation: u64,
        result: Result<Snapshot, docsync_api::Error>,
    ) {
        if self.registry.generation(key) != Some(generation) {
            trace!(%key, generation, "discarding push from a closed subscription");
            return;
        }

        match result {
            Ok(Snapshot {
                id,
                data: Some(data),
            }) => {
                let children = children_of(&data);
                self.cache.put(key, EntityRecord::live(id, data));
                self.track_children(children);
            }
            Ok(Snapshot { data: None, .. }) => {
                debug!(%key, "document no longer exists");
                self.cache.remove(key);
                self.registry.cancel_and_remove(key);
            }
            Err(source) => {
                // The forwarding task has stopped; the slot keeps whatever
                // state it had and nothing retries.
                let err = CoreError::RemoteRead {
                    key: key.clone(),
                    source,
                };
                warn!(error = %err, "subscription failed");
            }
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    fn create(&mut self, collection: CollectionId, reply: CreateReply) {
        let parent = parse_child_route(&self.navigator.current_path(), &collection);
        let seed = parent.as_ref().map(parent_seed).unwrap_or_default();
        debug!(%collection, parent = ?parent, "creating entity");

        self.write(WriteOp::Add {
            collection,
            seed,
            parent,
            reply,
        });
    }

    fn on_created(&mut self, key: DocumentKey, parent: Option<DocumentKey>, reply: CreateReply) {
        info!(%key, "entity created");

        if let Some(parent) = parent {
            let mut record = self.cached_or_placeholder(&parent);
            match apply_update(&mut record, &parent, nested_patch(&key.collection, &key.doc)) {
                Ok(()) => {
                    self.cache.put(&parent, record);
                    self.commit(&parent, None);
                }
                Err(err) => {
                    warn!(error = %err, child = %key, "could not link new entity to its parent");
                    self.notify(Notice::EntityGone { key: parent });
                }
            }
        }

        self.track_children(vec![key.clone()]);

        let path = created_path(&self.navigator.current_path(), &key.collection, &key.doc);
        self.navigator.replace(&path);
        reply.send(Ok(key));
    }

    fn update(&mut self, key: DocumentKey, patch: Document, reply: Reply) {
        let mut record = self.cached_or_placeholder(&key);
        if let Err(err) = apply_update(&mut record, &key, patch) {
            warn!(error = %err, "update rejected");
            self.notify(Notice::EntityGone { key });
            let _ = reply.send(Err(err));
            return;
        }

        let children = record.children();
        self.cache.put(&key, record);
        self.track_children(children);
        self.commit(&key, Some(reply));
    }

    /// Write the cached data for `key` through, if there is any.
    fn commit(&mut self, key: &DocumentKey, reply: Option<Reply>) {
        let Some(data) = self.cache.get(key).and_then(|r| r.data.clone()) else {
            debug!(%key, "entity no longer exists, nothing to commit");
            if let Some(reply) = reply {
                let _ = reply.send(Ok(CommandResult::Skipped));
            }
            return;
        };

        self.write(WriteOp::Update {
            key: key.clone(),
            data,
            reply,
        });
    }

    fn delete(&mut self, key: &DocumentKey, redirect: Option<Redirect>, reply: Reply) {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.cascade(key, &mut visited, &mut order);
        info!(%key, count = order.len(), "deleting entity");

        self.write(WriteOp::DeleteBatch {
            keys: order,
            redirect,
            reply,
        });
    }

    /// Depth-first removal of `key` and everything nested under it.
    ///
    /// Children land in `order` before their parent. `visited` guards
    /// against cycles, and a child is never unlinked from a parent that
    /// is itself part of this cascade.
    fn cascade(
        &mut self,
        key: &DocumentKey,
        visited: &mut HashSet<DocumentKey>,
        order: &mut Vec<DocumentKey>,
    ) {
        if !visited.insert(key.clone()) {
            return;
        }

        let record = self.cache.get(key);
        for child in record.as_ref().map(|r| r.children()).unwrap_or_default() {
            self.cascade(&child, visited, order);
        }

        if let Some(parent) = record
            .as_ref()
            .and_then(|r| r.parent())
            .filter(|p| !visited.contains(p))
        {
            self.unlink(&parent, key, None);
        }

        self.cache.remove(key);
        self.registry.cancel_and_remove(key);
        order.push(key.clone());
    }

    fn unlink(&mut self, parent: &DocumentKey, child: &DocumentKey, reply: Option<Reply>) {
        let skip = |reply: Option<Reply>| {
            if let Some(reply) = reply {
                let _ = reply.send(Ok(CommandResult::Skipped));
            }
        };

        let Some(mut record) = self
            .cache
            .get(parent)
            .filter(|r| r.is_loaded())
            .map(|r| EntityRecord::clone(&r))
        else {
            debug!(%parent, %child, "parent not loaded, nothing to unlink");
            return skip(reply);
        };

        if !record
            .data
            .as_mut()
            .is_some_and(|data| remove_nested_child(data, child))
        {
            debug!(%parent, %child, "child not listed under parent");
            return skip(reply);
        }

        debug!(%parent, %child, "unlinking child");
        self.cache.put(parent, record);
        self.commit(parent, reply);
    }

    // ── Session ──────────────────────────────────────────────────────

    fn teardown(&mut self) {
        let cancelled = self.registry.cancel_and_remove_all();
        self.cache.clear();
        info!(cancelled, "sync session torn down");
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn cached_or_placeholder(&self, key: &DocumentKey) -> EntityRecord {
        self.cache
            .get(key)
            .map_or_else(|| EntityRecord::placeholder(key.doc.clone()), |r| EntityRecord::clone(&r))
    }

    /// Queue a remote write. A dropped reply reads as `EngineStopped`.
    fn write(&self, op: WriteOp) {
        if self.writer.send(op).is_err() {
            warn!("writer task is gone, dropping remote write");
        }
    }

    fn notify(&self, notice: Notice) {
        // No receivers just means nobody is showing notices.
        let _ = self.notices.send(notice);
    }
}

/// Bridge one store subscription into the engine inbox.
///
/// Stops when the handle is cancelled, the engine is gone, or after
/// forwarding a terminal error.
async fn forward_pushes(
    key: DocumentKey,
    generation: u64,
    mut updates: mpsc::UnboundedReceiver<Result<Snapshot, docsync_api::Error>>,
    stop: CancellationToken,
    inbox: mpsc::Sender<EngineMessage>,
) {
    loop {
        let result = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            item = updates.recv() => item.unwrap_or_else(|| {
                Err(docsync_api::Error::SubscriptionClosed {
                    collection: key.collection.to_string(),
                    doc: key.doc.to_string(),
                })
            }),
        };

        let terminal = result.is_err();
        let msg = EngineMessage::Push {
            key: key.clone(),
            generation,
            result,
        };
        if inbox.send(msg).await.is_err() || terminal {
            break;
        }
    }
    trace!(%key, generation, "push forwarding stopped");
}
