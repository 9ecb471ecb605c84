// ── Domain model ──

pub mod entity;

pub use entity::{
    EntityRecord, NESTED_COLLECTIONS, PARENT_COLLECTION_ID, PARENT_TYPE, children_of,
    nested_patch, parent_seed,
};

/// Where one `(collection, doc)` pair sits in the engine's lifecycle.
///
/// A pair the store reported gone (or that was deleted) reads as
/// [`Unloaded`](Self::Unloaded) again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum EntityState {
    /// No cache slot.
    Unloaded,
    /// Placeholder slot, waiting for the first push.
    Subscribing,
    /// Slot holds pushed or locally merged data.
    Live,
}
