// ── Command API ──
//
// Cache and registry mutations flow through a unified `Command` enum.
// The engine task handles one command at a time, interleaved with
// subscription pushes. Create and the registry queries travel as their
// own engine messages so each gets a typed reply.

use tokio::sync::oneshot;

use docsync_api::{Document, DocumentKey};

use crate::error::CoreError;
use crate::route::Redirect;

/// A command envelope sent through the engine channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All operations the sync engine accepts.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Entity lifecycle ─────────────────────────────────────────────
    /// View/edit entry point. A `doc` of `add` means create.
    Open { key: DocumentKey },
    /// Merge a patch into the cached entity, then write it through.
    Update { key: DocumentKey, patch: Document },
    /// Write the cached data through to the store.
    Commit { key: DocumentKey },
    /// Cascade delete, with an optional redirect once the entity is gone.
    Delete {
        key: DocumentKey,
        redirect: Option<Redirect>,
    },
    /// Drop `child` from `parent`'s nested collections and write it through.
    Unlink {
        parent: DocumentKey,
        child: DocumentKey,
    },

    // ── Session ──────────────────────────────────────────────────────
    /// Cancel every subscription and clear the cache.
    Teardown,
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    /// A document was created at this key.
    Created(DocumentKey),
    /// Nothing to do: the target has no data.
    Skipped,
}
