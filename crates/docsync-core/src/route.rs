// ── Navigation glue ──
//
// The engine reads the current route to infer parent context on create
// and asks the router to move after create/delete. Route shapes:
//
//   /{ParentType}/{ParentId}/{Collection}/add   create a child
//   /{Collection}/add                           create a top-level entity
//   /{Collection}/{DocId}                       view/edit an entity

use std::sync::Mutex;

use docsync_api::{CollectionId, DocumentId, DocumentKey};

/// Reserved document id that turns an open request into a create.
pub const ADD_SEGMENT: &str = "add";

/// The application router, as seen by the engine.
pub trait Navigator: Send + Sync + 'static {
    /// Full path of the current route.
    fn current_path(&self) -> String;

    /// Navigate without leaving a history entry.
    fn replace(&self, path: &str);

    /// Navigate, leaving a history entry.
    fn push(&self, path: &str);
}

/// Where to navigate once an operation succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Replace(String),
    Push(String),
}

impl Redirect {
    pub(crate) fn apply(&self, navigator: &dyn Navigator) {
        match self {
            Self::Replace(path) => navigator.replace(path),
            Self::Push(path) => navigator.push(path),
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parent named by a child-create route, if `path` is one for `collection`.
///
/// Only the three segments immediately before the first `add` segment
/// are considered, and the third must equal `collection`.
pub fn parse_child_route(path: &str, collection: &CollectionId) -> Option<DocumentKey> {
    let parts = segments(path);
    let add = parts.iter().position(|s| *s == ADD_SEGMENT)?;
    let [parent_type, parent_id, child_collection] = parts.get(add.checked_sub(3)?..add)? else {
        return None;
    };
    (*child_collection == collection.as_str()).then(|| DocumentKey::new(*parent_type, *parent_id))
}

/// Route of a freshly created entity, given the route the create came from.
///
/// The first `add` segment is replaced by the new id. Without one, the
/// canonical `/{collection}/{id}` route is used.
pub fn created_path(current: &str, collection: &CollectionId, id: &DocumentId) -> String {
    let mut parts = segments(current);
    match parts.iter().position(|s| *s == ADD_SEGMENT) {
        Some(add) => {
            parts[add] = id.as_str();
            format!("/{}", parts.join("/"))
        }
        None => format!("/{collection}/{id}"),
    }
}

// ── In-memory navigator ──────────────────────────────────────────

/// One navigation recorded by [`MemoryNavigator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    Replace(String),
    Push(String),
}

/// A router with no UI: tracks the current path and records every move.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    current: Mutex<String>,
    history: Mutex<Vec<NavigationEvent>>,
}

impl MemoryNavigator {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(start.into()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Jump to `path` without recording a navigation event.
    pub fn set_path(&self, path: impl Into<String>) {
        *self.current.lock().expect("navigator lock poisoned") = path.into();
    }

    pub fn history(&self) -> Vec<NavigationEvent> {
        self.history.lock().expect("navigator lock poisoned").clone()
    }

    fn record(&self, path: &str, event: NavigationEvent) {
        *self.current.lock().expect("navigator lock poisoned") = path.to_owned();
        self.history
            .lock()
            .expect("navigator lock poisoned")
            .push(event);
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.current.lock().expect("navigator lock poisoned").clone()
    }

    fn replace(&self, path: &str) {
        self.record(path, NavigationEvent::Replace(path.to_owned()));
    }

    fn push(&self, path: &str) {
        self.record(path, NavigationEvent::Push(path.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child() -> CollectionId {
        CollectionId::from("Child")
    }

    #[test]
    fn child_route_yields_parent() {
        assert_eq!(
            parse_child_route("/Parent/P1/Child/add", &child()),
            Some(DocumentKey::new("Parent", "P1"))
        );
        // Leading segments and query strings don't matter.
        assert_eq!(
            parse_child_route("/app/Parent/P1/Child/add?tab=2", &child()),
            Some(DocumentKey::new("Parent", "P1"))
        );
    }

    #[test]
    fn non_child_routes_yield_nothing() {
        // Wrong collection.
        assert_eq!(parse_child_route("/Parent/P1/Pet/add", &child()), None);
        // Top-level create.
        assert_eq!(parse_child_route("/Child/add", &child()), None);
        // Not a create route.
        assert_eq!(parse_child_route("/Parent/P1/Child/c1", &child()), None);
        assert_eq!(parse_child_route("", &child()), None);
    }

    #[test]
    fn created_path_replaces_add_segment() {
        let id = DocumentId::from("c9");
        assert_eq!(
            created_path("/Parent/P1/Child/add", &child(), &id),
            "/Parent/P1/Child/c9"
        );
        assert_eq!(created_path("/Child/add", &child(), &id), "/Child/c9");
        assert_eq!(created_path("/dashboard", &child(), &id), "/Child/c9");
    }

    #[test]
    fn memory_navigator_records_moves() {
        let nav = MemoryNavigator::new("/login");
        nav.push("/dashboard");
        nav.replace("/Parent/P1");
        assert_eq!(nav.current_path(), "/Parent/P1");
        assert_eq!(
            nav.history(),
            vec![
                NavigationEvent::Push("/dashboard".into()),
                NavigationEvent::Replace("/Parent/P1".into()),
            ]
        );
    }
}
