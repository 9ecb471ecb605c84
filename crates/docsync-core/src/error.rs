// ── Core error types ──
//
// User-facing errors from docsync-core. Remote failures keep the
// underlying `docsync_api::Error` as their source but are classified
// by what the engine was doing when they happened.

use thiserror::Error;

use docsync_api::DocumentKey;

/// The remote write an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum WriteKind {
    Create,
    Update,
    Delete,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Entity errors ────────────────────────────────────────────────
    /// A patch targeted an entity whose cache slot has no data: it was
    /// deleted locally, remotely, or never loaded.
    #[error(
        "Sorry, this entity ({key}) no longer exists. Possibly it was deleted by someone else while you had it open."
    )]
    EntityGone { key: DocumentKey },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Remote {kind} of {target} failed: {source}")]
    RemoteWrite {
        kind: WriteKind,
        target: String,
        #[source]
        source: docsync_api::Error,
    },

    #[error("Remote read of {key} failed: {source}")]
    RemoteRead {
        key: DocumentKey,
        #[source]
        source: docsync_api::Error,
    },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Sync engine is not running")]
    EngineStopped,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn remote_write(
        kind: WriteKind,
        target: impl ToString,
        source: docsync_api::Error,
    ) -> Self {
        Self::RemoteWrite {
            kind,
            target: target.to_string(),
            source,
        }
    }

    /// Returns `true` for failures reported by the remote store.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteWrite { .. } | Self::RemoteRead { .. })
    }

    /// Returns `true` if the operation targeted an entity that is gone.
    pub fn is_entity_gone(&self) -> bool {
        matches!(self, Self::EntityGone { .. })
    }
}
