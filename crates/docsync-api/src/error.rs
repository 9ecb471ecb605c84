use thiserror::Error;

/// Top-level error type for the `docsync-api` crate.
///
/// Covers every failure mode at the remote boundary: document reads and
/// writes, push subscriptions, and the identity provider.
/// `docsync-core` maps these into its own error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Documents ───────────────────────────────────────────────────
    /// The addressed document does not exist.
    #[error("Document not found: {collection}/{doc}")]
    NotFound { collection: String, doc: String },

    /// The store refused the operation (permissions, validation, etc.)
    #[error("Rejected by store: {message}")]
    Rejected { message: String },

    // ── Subscriptions ───────────────────────────────────────────────
    /// The push channel ended without the subscriber cancelling it.
    #[error("Subscription to {collection}/{doc} closed by the store")]
    SubscriptionClosed { collection: String, doc: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Sign-in or sign-out failed (wrong credentials, locked account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }
}
