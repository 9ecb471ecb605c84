// ── Local state ──
//
// The entity cache (shared, reactive) and the subscription registry
// (owned by the engine task).

mod cache;
mod registry;

pub use cache::{EMPTY_FIELD, EntityCache};
pub use registry::SubscriptionRegistry;
