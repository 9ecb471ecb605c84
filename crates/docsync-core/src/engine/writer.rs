// ── Remote writer ──
//
// Executes remote writes strictly in submission order. Failures are
// logged and reported to the waiting caller; nothing is retried.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use docsync_api::{CollectionId, Document, DocumentKey, DocumentStore};

use super::state::{CreateReply, EngineMessage, Reply};
use crate::command::CommandResult;
use crate::error::{CoreError, WriteKind};
use crate::route::{Navigator, Redirect};

pub(super) enum WriteOp {
    /// Create a document; the engine links and tracks it once the id is known.
    Add {
        collection: CollectionId,
        seed: Document,
        parent: Option<DocumentKey>,
        reply: CreateReply,
    },
    /// Full-document write-through.
    Update {
        key: DocumentKey,
        data: Document,
        reply: Option<Reply>,
    },
    /// One cascade, children first. The root is the last key.
    DeleteBatch {
        keys: Vec<DocumentKey>,
        redirect: Option<Redirect>,
        reply: Reply,
    },
}

pub(super) struct Writer {
    pub store: Arc<dyn DocumentStore>,
    pub navigator: Arc<dyn Navigator>,
    pub inbox: mpsc::Sender<EngineMessage>,
}

impl Writer {
    pub(super) async fn run(self, mut rx: mpsc::UnboundedReceiver<WriteOp>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                op = rx.recv() => {
                    let Some(op) = op else { break };
                    self.execute(op).await;
                }
            }
        }
        debug!("writer stopped");
    }

    async fn execute(&self, op: WriteOp) {
        match op {
            WriteOp::Add {
                collection,
                seed,
                parent,
                reply,
            } => match self.store.add(&collection, seed).await {
                Ok(doc) => {
                    let msg = EngineMessage::Created {
                        key: DocumentKey { collection, doc },
                        parent,
                        reply,
                    };
                    // If the engine is gone the reply drops with the message.
                    let _ = self.inbox.send(msg).await;
                }
                Err(source) => {
                    let err = CoreError::remote_write(WriteKind::Create, &collection, source);
                    error!(error = %err, "create failed");
                    reply.send(Err(err));
                }
            },

            WriteOp::Update { key, data, reply } => {
                let result = match self.store.update(&key.collection, &key.doc, data).await {
                    Ok(()) => {
                        debug!(%key, "committed");
                        Ok(CommandResult::Ok)
                    }
                    Err(source) => {
                        let err = CoreError::remote_write(WriteKind::Update, &key, source);
                        error!(error = %err, "commit failed");
                        Err(err)
                    }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }

            WriteOp::DeleteBatch {
                keys,
                redirect,
                reply,
            } => {
                let mut first_error = None;
                let mut root_deleted = false;
                for key in &keys {
                    match self.store.delete(&key.collection, &key.doc).await {
                        Ok(()) => {
                            debug!(%key, "deleted");
                            root_deleted = true;
                        }
                        Err(source) => {
                            let err = CoreError::remote_write(WriteKind::Delete, key, source);
                            error!(error = %err, "delete failed");
                            root_deleted = false;
                            first_error.get_or_insert(err);
                        }
                    }
                }

                if let Some(redirect) = redirect.filter(|_| root_deleted) {
                    redirect.apply(self.navigator.as_ref());
                }
                let _ = reply.send(first_error.map_or(Ok(CommandResult::Ok), Err));
            }
        }
    }
}
