use super::{
    sort_documents, BatchWrite, CollectionPath, DocPath, Document, DocumentStore, Fields, Query,
    SnapshotCallback, Subscription,
};
use crate::errors::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

struct Listener {
    id: u64,
    query: Query,
    callback: SnapshotCallback,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct MemoryInner {
    collections: BTreeMap<CollectionPath, BTreeMap<String, Fields>>,
    listeners: Vec<Listener>,
    next_listener_id: u64,
    next_doc_seq: u64,

    /// Number of mutating calls that reached the store.
    write_calls: usize,
    /// When set, every mutating call fails with a network error.
    fail_writes: bool,
}

impl MemoryInner {
    fn snapshot(&self, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .collections
            .get(&query.collection)
            .map(|c| {
                c.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        sort_documents(&mut docs, &query.order_by);
        docs
    }

    fn begin_write(&mut self) -> StorageResult<()> {
        self.write_calls += 1;
        if self.fail_writes {
            Err(StorageError::Network("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn doc_exists(&self, doc: &DocPath) -> bool {
        self.collections
            .get(&doc.collection)
            .is_some_and(|c| c.contains_key(&doc.id))
    }

    fn merge(&mut self, doc: &DocPath, fields: Fields) {
        let entry = self
            .collections
            .entry(doc.collection.clone())
            .or_default()
            .entry(doc.id.clone())
            .or_default();
        for (k, v) in fields {
            entry.insert(k, v);
        }
    }

    fn remove(&mut self, doc: &DocPath) {
        if let Some(c) = self.collections.get_mut(&doc.collection) {
            c.remove(&doc.id);
        }
    }

    fn new_doc_id(&mut self) -> String {
        self.next_doc_seq += 1;
        let mut buf = [0u8; 20];
        if getrandom::getrandom(&mut buf).is_err() {
            return format!("doc{:017}", self.next_doc_seq);
        }
        buf.iter()
            .map(|b| ID_ALPHABET[*b as usize % ID_ALPHABET.len()] as char)
            .collect()
    }

    /// Snapshots owed to listeners of the touched collections.
    fn pending_deliveries(
        &self,
        touched: &BTreeSet<CollectionPath>,
    ) -> Vec<(SnapshotCallback, Arc<AtomicBool>, Vec<Document>)> {
        self.listeners
            .iter()
            .filter(|l| touched.contains(&l.query.collection))
            .map(|l| (l.callback.clone(), l.active.clone(), self.snapshot(&l.query)))
            .collect()
    }
}

/// In-process document store with synchronous live notification.
///
/// Used as the local backend when no remote project is configured, and by tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Network("memory store poisoned".to_string()))
    }

    /// Mutating calls received so far, failed ones included.
    pub fn write_calls(&self) -> usize {
        self.lock().map(|i| i.write_calls).unwrap_or_default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_writes = fail;
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().map(|i| i.listeners.len()).unwrap_or_default()
    }

    /// Insert or merge a document as if another device had written it.
    pub fn put_external(&self, doc: &DocPath, fields: Fields) {
        let deliveries = match self.lock() {
            Ok(mut inner) => {
                inner.merge(doc, fields);
                inner.pending_deliveries(&BTreeSet::from([doc.collection.clone()]))
            }
            Err(_) => return,
        };
        deliver(deliveries);
    }

    /// Run one mutation under the lock, then notify listeners outside it.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut MemoryInner) -> StorageResult<(T, BTreeSet<CollectionPath>)>,
    ) -> StorageResult<T> {
        let (out, deliveries) = {
            let mut inner = self.lock()?;
            inner.begin_write()?;
            let (out, touched) = f(&mut inner)?;
            (out, inner.pending_deliveries(&touched))
        };
        deliver(deliveries);
        Ok(out)
    }
}

fn deliver(deliveries: Vec<(SnapshotCallback, Arc<AtomicBool>, Vec<Document>)>) {
    for (callback, active, docs) in deliveries {
        if active.load(Ordering::SeqCst) {
            callback(docs);
        }
    }
}

#[async_trait(?Send)]
impl DocumentStore for MemoryStore {
    fn listen(&self, query: Query, on_snapshot: SnapshotCallback) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));

        let (listener_id, initial) = match self.lock() {
            Ok(mut inner) => {
                inner.next_listener_id += 1;
                let id = inner.next_listener_id;
                let initial = inner.snapshot(&query);
                inner.listeners.push(Listener {
                    id,
                    query,
                    callback: on_snapshot.clone(),
                    active: active.clone(),
                });
                (Some(id), initial)
            }
            Err(_) => (None, vec![]),
        };

        on_snapshot(initial);

        let inner = self.inner.clone();
        Subscription::new(active, move || {
            let Some(listener_id) = listener_id else {
                return;
            };
            if let Ok(mut inner) = inner.lock() {
                inner.listeners.retain(|l| l.id != listener_id);
            }
        })
    }

    async fn get(&self, doc: &DocPath) -> StorageResult<Option<Document>> {
        let inner = self.lock()?;
        Ok(inner
            .collections
            .get(&doc.collection)
            .and_then(|c| c.get(&doc.id))
            .map(|fields| Document {
                id: doc.id.clone(),
                fields: fields.clone(),
            }))
    }

    async fn query(&self, query: &Query) -> StorageResult<Vec<Document>> {
        Ok(self.lock()?.snapshot(query))
    }

    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StorageResult<String> {
        self.mutate(|inner| {
            let id = inner.new_doc_id();
            inner.merge(&collection.doc(&id), fields);
            Ok((id, BTreeSet::from([collection.clone()])))
        })
    }

    async fn update(&self, doc: &DocPath, fields: Fields) -> StorageResult<()> {
        self.mutate(|inner| {
            if !inner.doc_exists(doc) {
                return Err(StorageError::NotFound(doc.path()));
            }
            inner.merge(doc, fields);
            Ok(((), BTreeSet::from([doc.collection.clone()])))
        })
    }

    async fn set_merge(&self, doc: &DocPath, fields: Fields) -> StorageResult<()> {
        self.mutate(|inner| {
            inner.merge(doc, fields);
            Ok(((), BTreeSet::from([doc.collection.clone()])))
        })
    }

    async fn delete(&self, doc: &DocPath) -> StorageResult<()> {
        self.mutate(|inner| {
            inner.remove(doc);
            Ok(((), BTreeSet::from([doc.collection.clone()])))
        })
    }

    async fn commit(&self, writes: Vec<BatchWrite>) -> StorageResult<()> {
        self.mutate(|inner| {
            // Validate the whole batch before touching anything.
            for w in &writes {
                if let BatchWrite::Update { doc, .. } = w {
                    if !inner.doc_exists(doc) {
                        return Err(StorageError::NotFound(doc.path()));
                    }
                }
            }

            let mut touched = BTreeSet::new();
            for w in writes {
                touched.insert(w.doc().collection.clone());
                match w {
                    BatchWrite::Update { doc, fields } => inner.merge(&doc, fields),
                    BatchWrite::Delete { doc } => inner.remove(&doc),
                }
            }
            Ok(((), touched))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Direction;
    use futures::executor::block_on;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap_or_default()
    }

    fn todos() -> CollectionPath {
        CollectionPath::new(&["users", "u1", "todos"])
    }

    fn recorder() -> (SnapshotCallback, Arc<StdMutex<Vec<Vec<String>>>>) {
        let seen: Arc<StdMutex<Vec<Vec<String>>>> = Arc::new(StdMutex::new(vec![]));
        let s2 = seen.clone();
        let cb: SnapshotCallback = Arc::new(move |docs: Vec<Document>| {
            s2.lock()
                .unwrap()
                .push(docs.into_iter().map(|d| d.id).collect());
        });
        (cb, seen)
    }

    #[test]
    fn test_listen_delivers_initial_state_then_changes() {
        let store = MemoryStore::new();
        let (cb, seen) = recorder();
        let _sub = store.listen(
            Query::ordered(todos(), "order", Direction::Ascending),
            cb,
        );

        let id = block_on(store.add(&todos(), fields(json!({"order": 0})))).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_empty());
        assert_eq!(seen[1], vec![id]);
    }

    #[test]
    fn test_cancelled_subscription_stops_delivery() {
        let store = MemoryStore::new();
        let (cb, seen) = recorder();
        let sub = store.listen(
            Query::ordered(todos(), "order", Direction::Ascending),
            cb,
        );
        sub.cancel();
        sub.cancel();
        assert_eq!(store.listener_count(), 0);

        block_on(store.add(&todos(), fields(json!({"order": 0})))).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = block_on(store.add(&todos(), fields(json!({"order": 5})))).unwrap();

        let res = block_on(store.commit(vec![
            BatchWrite::Update {
                doc: todos().doc(&a),
                fields: fields(json!({"order": 0})),
            },
            BatchWrite::Update {
                doc: todos().doc("missing"),
                fields: fields(json!({"order": 1})),
            },
        ]));
        assert!(matches!(res, Err(StorageError::NotFound(_))));

        let doc = block_on(store.get(&todos().doc(&a))).unwrap().unwrap();
        assert_eq!(doc.fields["order"], 5);
    }

    #[test]
    fn test_update_requires_existing_document() {
        let store = MemoryStore::new();
        let res = block_on(store.update(&todos().doc("nope"), fields(json!({"text": "x"}))));
        assert_eq!(res, Err(StorageError::NotFound("users/u1/todos/nope".to_string())));
    }

    #[test]
    fn test_failing_writes_are_counted_and_reported() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let res = block_on(store.add(&todos(), Fields::new()));
        assert!(matches!(res, Err(StorageError::Network(_))));
        assert_eq!(store.write_calls(), 1);
    }
}
