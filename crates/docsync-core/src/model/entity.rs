// ── Entity domain type ──
//
// The cached form of one document plus accessors for the reserved
// fields that link documents into a parent/child graph.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use docsync_api::{CollectionId, Document, DocumentId, DocumentKey};

/// Child references: `{ "<collection>": ["<doc>", ...], ... }`.
pub const NESTED_COLLECTIONS: &str = "NestedCollections";
/// Collection of the parent document, set on child entities.
pub const PARENT_TYPE: &str = "ParentType";
/// Document id of the parent document, set on child entities.
pub const PARENT_COLLECTION_ID: &str = "ParentCollectionId";

/// One cached entity.
///
/// `data == None` marks a slot that is either waiting for its first push
/// or has been reported gone by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: DocumentId,
    pub data: Option<Document>,
}

impl EntityRecord {
    /// Slot created before the first push arrives.
    pub fn placeholder(id: DocumentId) -> Self {
        Self { id, data: None }
    }

    pub fn live(id: DocumentId, data: Document) -> Self {
        Self {
            id,
            data: Some(data),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref()?.get(name)
    }

    /// Every child referenced through `NestedCollections`, in listed order.
    pub fn children(&self) -> Vec<DocumentKey> {
        self.data.as_ref().map(children_of).unwrap_or_default()
    }

    /// The parent named by `ParentType` / `ParentCollectionId`, if both are set.
    pub fn parent(&self) -> Option<DocumentKey> {
        let data = self.data.as_ref()?;
        let collection = data.get(PARENT_TYPE)?.as_str()?;
        let doc = data.get(PARENT_COLLECTION_ID)?.as_str()?;
        Some(DocumentKey::new(collection, doc))
    }
}

/// Children listed in a document body. Entries that are not arrays of
/// strings are skipped.
pub fn children_of(data: &Document) -> Vec<DocumentKey> {
    let Some(Value::Object(nested)) = data.get(NESTED_COLLECTIONS) else {
        return Vec::new();
    };

    nested
        .iter()
        .filter_map(|(collection, docs)| Some((collection, docs.as_array()?)))
        .flat_map(|(collection, docs)| {
            docs.iter()
                .filter_map(Value::as_str)
                .map(move |doc| DocumentKey::new(collection.as_str(), doc))
        })
        .collect()
}

/// Seed fields that mark a new document as a child of `parent`.
pub fn parent_seed(parent: &DocumentKey) -> Document {
    let mut seed = Document::new();
    seed.insert(
        PARENT_TYPE.into(),
        Value::String(parent.collection.to_string()),
    );
    seed.insert(
        PARENT_COLLECTION_ID.into(),
        Value::String(parent.doc.to_string()),
    );
    seed
}

/// Patch that appends `child` to its collection's list in `NestedCollections`.
pub fn nested_patch(child_collection: &CollectionId, child: &DocumentId) -> Document {
    let mut nested = serde_json::Map::new();
    nested.insert(
        child_collection.to_string(),
        Value::Array(vec![Value::String(child.to_string())]),
    );
    let mut patch = Document::new();
    patch.insert(NESTED_COLLECTIONS.into(), Value::Object(nested));
    patch
}
