//! Remote boundary for docsync.
//!
//! - **[`DocumentStore`]**: point reads, writes, and per-document push
//!   subscriptions against a hierarchical document store.
//! - **[`MemoryStore`]**: in-process implementation with an operation log
//!   and fault injection.
//! - **[`IdentityProvider`]**: sign-in / sign-out, with an HTTP
//!   implementation in [`HttpIdentityProvider`].

pub mod auth;
pub mod error;
pub mod ids;
pub mod memory;
pub mod store;

pub use auth::{AuthPaths, HttpIdentityProvider, IdentityProvider};
pub use error::Error;
pub use ids::{CollectionId, DocumentId, DocumentKey};
pub use memory::{MemoryStore, Operation};
pub use store::{CancelHandle, Document, DocumentStore, Snapshot, Subscription};
