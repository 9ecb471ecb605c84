//! Client-side mirror of a hierarchical document store.
//!
//! This crate owns the synchronization logic between a [`DocumentStore`]
//! and UI consumers:
//!
//! - **[`SyncEngine`]**: Central facade. Every mutation is a [`Command`]
//!   routed through an `mpsc` channel to a single engine task, which is the
//!   only writer of the cache and the subscription registry. Subscription
//!   pushes re-enter the same task as messages.
//!
//! - **[`EntityCache`]**: Lock-free reactive mirror built on `DashMap` +
//!   `tokio::sync::watch`. [`EntityCache::read`] never fails: a missing path
//!   yields the [`EMPTY_FIELD`] sentinel.
//!
//! - **[`EntityStream`]**: Per-entity subscription vended by the cache.
//!   Exposes `current()` / `latest()` / `changed()` for reactive rendering.
//!
//! - **Merge engine** ([`merge`]): Partial updates with union semantics for
//!   the `NestedCollections` field, so children added by other writers
//!   survive.
//!
//! - **Glue**: [`Navigator`] for route-driven parent inference and
//!   redirects, [`Session`] for sign-in/sign-out, [`Notice`] for
//!   user-facing alerts.
//!
//! [`DocumentStore`]: docsync_api::DocumentStore

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod model;
pub mod notice;
pub mod route;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{Credentials, EngineConfig, IdentityConfig, RouteConfig};
pub use engine::SyncEngine;
pub use error::{CoreError, WriteKind};
pub use model::{EntityRecord, EntityState};
pub use notice::Notice;
pub use route::{MemoryNavigator, NavigationEvent, Navigator, Redirect};
pub use session::Session;
pub use store::{EMPTY_FIELD, EntityCache, SubscriptionRegistry};
pub use stream::EntityStream;

// Re-export the store boundary so consumers need only one import.
pub use docsync_api::{CollectionId, Document, DocumentId, DocumentKey, DocumentStore, Snapshot};
