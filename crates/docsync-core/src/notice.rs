// ── User-facing notices ──
//
// Blocking messages for the UI layer. The engine and session publish
// them; whoever renders them subscribes. Nothing in the core shows them.

use docsync_api::DocumentKey;

/// A message the UI should show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A patch targeted an entity that no longer exists.
    EntityGone { key: DocumentKey },
    /// Sign-in or sign-out failed.
    AuthFailed { message: String },
}

impl Notice {
    /// Text suitable for an alert dialog.
    pub fn message(&self) -> String {
        match self {
            Self::EntityGone { key } => format!(
                "Sorry, this entity ({key}) no longer exists. Possibly it was deleted by someone else while you had it open."
            ),
            Self::AuthFailed { message } => message.clone(),
        }
    }
}
