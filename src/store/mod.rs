//! Document store boundary.
//!
//! Entities live as documents in collections scoped by owner id, e.g.
//! `users/{uid}/lists/{list}/todos/{id}`. Everything above this module talks to
//! a [`DocumentStore`]; the backends are an in-process store and the Firestore
//! REST API.

pub(crate) mod firestore;
pub(crate) mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::errors::{StorageError, StorageResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Document fields as stored (camelCase keys).
pub type Fields = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Decode into an entity; the document id is injected as the `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), serde_json::Value::String(self.id.clone()));
        serde_json::from_value(serde_json::Value::Object(fields)).map_err(StorageError::decode)
    }
}

/// Serialize an entity (or partial entity) into a field map.
pub fn encode_fields<T: Serialize>(value: &T) -> StorageResult<Fields> {
    match serde_json::to_value(value).map_err(StorageError::decode)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StorageError::Decode(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Slash-separated collection path, e.g. `users/u1/todos`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(segments: &[&str]) -> Self {
        Self(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn doc(&self, id: &str) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.to_string(),
        }
    }

    /// Last path segment (the collection id Firestore queries by).
    pub fn collection_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Everything before the collection id (the query parent).
    pub fn parent(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[..i],
            None => "",
        }
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl DocPath {
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub collection: CollectionPath,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn ordered(collection: CollectionPath, field: &str, direction: Direction) -> Self {
        Self {
            collection,
            order_by: Some((field.to_string(), direction)),
        }
    }
}

/// One write inside an atomic batch.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchWrite {
    Update { doc: DocPath, fields: Fields },
    Delete { doc: DocPath },
}

impl BatchWrite {
    pub fn doc(&self) -> &DocPath {
        match self {
            BatchWrite::Update { doc, .. } | BatchWrite::Delete { doc } => doc,
        }
    }
}

pub type SnapshotCallback = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// Handle for a live query. Cancelling stops delivery; it is idempotent and also
/// happens on drop.
pub struct Subscription {
    active: Arc<AtomicBool>,
    on_cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn new(active: Arc<AtomicBool>, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            active,
            on_cancel: Mutex::new(Some(Box::new(on_cancel))),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
        let release = match self.on_cancel.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(release) = release {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[async_trait(?Send)]
pub trait DocumentStore: Send + Sync {
    /// Live query. The callback sees the current state first, then every change.
    fn listen(&self, query: Query, on_snapshot: SnapshotCallback) -> Subscription;

    async fn get(&self, doc: &DocPath) -> StorageResult<Option<Document>>;

    async fn query(&self, query: &Query) -> StorageResult<Vec<Document>>;

    /// Create a document with a store-assigned id.
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StorageResult<String>;

    /// Partial merge into an existing document.
    async fn update(&self, doc: &DocPath, fields: Fields) -> StorageResult<()>;

    /// Merge, creating the document when missing.
    async fn set_merge(&self, doc: &DocPath, fields: Fields) -> StorageResult<()>;

    async fn delete(&self, doc: &DocPath) -> StorageResult<()>;

    /// Apply every write or none of them.
    async fn commit(&self, writes: Vec<BatchWrite>) -> StorageResult<()>;
}

pub type SharedStore = Arc<dyn DocumentStore>;

/// Sort documents the way an ordered query returns them.
pub(crate) fn sort_documents(docs: &mut [Document], order_by: &Option<(String, Direction)>) {
    let Some((field, direction)) = order_by else {
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        return;
    };

    docs.sort_by(|a, b| {
        let ord = compare_values(a.fields.get(field), b.fields.get(field))
            .then_with(|| a.id.cmp(&b.id));
        match direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });
}

fn compare_values(
    a: Option<&serde_json::Value>,
    b: Option<&serde_json::Value>,
) -> std::cmp::Ordering {
    use serde_json::Value;
    use std::cmp::Ordering;

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, order: i64) -> Document {
        let mut fields = Fields::new();
        fields.insert("order".to_string(), json!(order));
        Document {
            id: id.to_string(),
            fields,
        }
    }

    #[test]
    fn test_collection_path_parts() {
        let c = CollectionPath::new(&["users", "u1", "lists", "l1", "todos"]);
        assert_eq!(c.as_str(), "users/u1/lists/l1/todos");
        assert_eq!(c.collection_id(), "todos");
        assert_eq!(c.parent(), "users/u1/lists/l1");
        assert_eq!(c.doc("t9").path(), "users/u1/lists/l1/todos/t9");
    }

    #[test]
    fn test_sort_documents_descending() {
        let mut docs = vec![doc("a", 1), doc("b", 3), doc("c", 2)];
        sort_documents(&mut docs, &Some(("order".to_string(), Direction::Descending)));
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_subscription_cancel_is_idempotent() {
        let released = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let r2 = released.clone();
        let sub = Subscription::new(Arc::new(AtomicBool::new(true)), move || {
            r2.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        sub.cancel();
        sub.cancel();
        assert!(!sub.is_active());
        drop(sub);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_document_decode_injects_id() {
        let d = doc("t1", 4);
        let v: serde_json::Value = d.decode().expect("should decode");
        assert_eq!(v["id"], "t1");
        assert_eq!(v["order"], 4);
    }
}
