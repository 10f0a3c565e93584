use super::{
    BatchWrite, CollectionPath, DocPath, Document, DocumentStore, Fields, Query, SnapshotCallback,
    Subscription,
};
use super::Direction;
use crate::errors::{StorageError, StorageResult};
use async_trait::async_trait;
use leptos::logging::warn;
use leptos::task::spawn_local;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use wasm_bindgen::JsCast;

/// Live queries are refreshed on this interval, and immediately after local writes.
pub(crate) const POLL_INTERVAL_MS: i32 = 4000;

const FIRESTORE_HOST: &str = "https://firestore.googleapis.com/v1";

/// Per-listener delivery state: last issued ticket, last delivered ticket + snapshot.
#[derive(Default)]
struct Delivery {
    issued: u64,
    delivered: u64,
    last: Option<Vec<Document>>,
}

struct RemoteListener {
    id: u64,
    query: Query,
    callback: SnapshotCallback,
    active: Arc<AtomicBool>,
    delivery: Arc<Mutex<Delivery>>,
}

struct FirestoreInner {
    project_id: String,
    api_key: Option<String>,
    auth_token: Option<String>,
    listeners: Mutex<Vec<RemoteListener>>,
    next_listener_id: AtomicU64,
}

/// Firestore REST v1 document store.
///
/// Live queries poll `runQuery` and are kicked after every write this client
/// makes, so the writer sees its own change without waiting for the next poll.
#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<FirestoreInner>,
}

impl FirestoreStore {
    pub fn new(project_id: String, api_key: Option<String>, auth_token: Option<String>) -> Self {
        Self {
            inner: Arc::new(FirestoreInner {
                project_id,
                api_key,
                auth_token,
                listeners: Mutex::new(vec![]),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    fn documents_url(&self) -> String {
        format!(
            "{FIRESTORE_HOST}/projects/{}/databases/(default)/documents",
            self.inner.project_id
        )
    }

    fn doc_name(&self, doc: &DocPath) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}",
            self.inner.project_id,
            doc.path()
        )
    }

    /// Append the API key (if any) to a query string.
    fn with_key(&self, mut params: Vec<(String, String)>) -> String {
        if let Some(key) = &self.inner.api_key {
            params.push(("key".to_string(), key.clone()));
        }
        if params.is_empty() {
            return String::new();
        }
        let qs = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{qs}")
    }

    fn with_auth_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.inner.auth_token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> StorageResult<Value> {
        let res = self
            .with_auth_headers(req)
            .send()
            .await
            .map_err(StorageError::network)?;

        let status = res.status();
        if status.is_success() {
            let text = res.text().await.map_err(StorageError::network)?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(StorageError::decode)
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            Err(StorageError::Unauthorized)
        } else if status.as_u16() == 404 {
            Err(StorageError::NotFound(res.url().path().to_string()))
        } else {
            let body = res.text().await.unwrap_or_default();
            Err(StorageError::Http {
                status: status.as_u16(),
                message: body,
            })
        }
    }

    async fn run_query(&self, query: &Query) -> StorageResult<Vec<Document>> {
        let url = format!(
            "{}/{}:runQuery{}",
            self.documents_url(),
            query.collection.parent(),
            self.with_key(vec![])
        );
        let client = reqwest::Client::new();
        let data = self
            .send(client.post(url).json(&structured_query(query)))
            .await?;
        Ok(decode_query_response(&data))
    }

    fn mask_params(fields: &Fields, must_exist: bool) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths".to_string(), k.clone()))
            .collect();
        if must_exist {
            params.push(("currentDocument.exists".to_string(), "true".to_string()));
        }
        params
    }

    async fn patch(&self, doc: &DocPath, fields: Fields, must_exist: bool) -> StorageResult<()> {
        let url = format!(
            "{}/{}{}",
            self.documents_url(),
            doc.path(),
            self.with_key(Self::mask_params(&fields, must_exist))
        );
        let client = reqwest::Client::new();
        self.send(
            client
                .request(reqwest::Method::PATCH, url)
                .json(&json!({ "fields": encode_fields(&fields) })),
        )
        .await?;
        self.refresh_collection(&doc.collection);
        Ok(())
    }

    fn write_json(&self, write: &BatchWrite) -> Value {
        match write {
            BatchWrite::Update { doc, fields } => json!({
                "update": {
                    "name": self.doc_name(doc),
                    "fields": encode_fields(fields),
                },
                "updateMask": { "fieldPaths": fields.keys().cloned().collect::<Vec<_>>() },
                "currentDocument": { "exists": true },
            }),
            BatchWrite::Delete { doc } => json!({ "delete": self.doc_name(doc) }),
        }
    }

    /// Refresh every live query on a collection.
    fn refresh_collection(&self, collection: &CollectionPath) {
        let ids: Vec<u64> = match self.inner.listeners.lock() {
            Ok(ls) => ls
                .iter()
                .filter(|l| &l.query.collection == collection)
                .map(|l| l.id)
                .collect(),
            Err(_) => return,
        };
        for id in ids {
            self.refresh_listener(id);
        }
    }

    fn refresh_listener(&self, listener_id: u64) {
        let picked = match self.inner.listeners.lock() {
            Ok(ls) => ls.iter().find(|l| l.id == listener_id).map(|l| {
                (
                    l.query.clone(),
                    l.callback.clone(),
                    l.active.clone(),
                    l.delivery.clone(),
                )
            }),
            Err(_) => None,
        };
        let Some((query, callback, active, delivery)) = picked else {
            return;
        };

        let ticket = match delivery.lock() {
            Ok(mut d) => {
                d.issued += 1;
                d.issued
            }
            Err(_) => return,
        };

        let store = self.clone();
        spawn_local(async move {
            let docs = match store.run_query(&query).await {
                Ok(docs) => docs,
                Err(e) => {
                    // Background failures keep the last good snapshot on screen.
                    warn!("[Firestore] refresh of {} failed: {}", query.collection, e);
                    return;
                }
            };

            if !active.load(Ordering::SeqCst) {
                return;
            }

            let fresh = match delivery.lock() {
                Ok(mut d) => {
                    // Stale responses (older ticket) and unchanged snapshots are dropped.
                    if ticket <= d.delivered || d.last.as_ref() == Some(&docs) {
                        d.delivered = d.delivered.max(ticket);
                        false
                    } else {
                        d.delivered = ticket;
                        d.last = Some(docs.clone());
                        true
                    }
                }
                Err(_) => false,
            };

            if fresh {
                callback(docs);
            }
        });
    }
}

#[async_trait(?Send)]
impl DocumentStore for FirestoreStore {
    fn listen(&self, query: Query, on_snapshot: SnapshotCallback) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst) + 1;
        let active = Arc::new(AtomicBool::new(true));

        if let Ok(mut ls) = self.inner.listeners.lock() {
            ls.push(RemoteListener {
                id,
                query,
                callback: on_snapshot,
                active: active.clone(),
                delivery: Arc::new(Mutex::new(Delivery::default())),
            });
        }

        self.refresh_listener(id);

        let interval_id = web_sys::window().and_then(|win| {
            let s2 = self.clone();
            let active2 = active.clone();
            let cb = wasm_bindgen::closure::Closure::wrap(Box::new(move || {
                if active2.load(Ordering::SeqCst) {
                    s2.refresh_listener(id);
                }
            }) as Box<dyn FnMut()>);

            let tid = win
                .set_interval_with_callback_and_timeout_and_arguments_0(
                    cb.as_ref().unchecked_ref(),
                    POLL_INTERVAL_MS,
                )
                .ok();
            // The interval is cleared on cancel; the closure itself is tiny.
            cb.forget();
            tid
        });

        let inner = self.inner.clone();
        Subscription::new(active, move || {
            if let (Some(tid), Some(win)) = (interval_id, web_sys::window()) {
                win.clear_interval_with_handle(tid);
            }
            if let Ok(mut ls) = inner.listeners.lock() {
                ls.retain(|l| l.id != id);
            }
        })
    }

    async fn get(&self, doc: &DocPath) -> StorageResult<Option<Document>> {
        let url = format!(
            "{}/{}{}",
            self.documents_url(),
            doc.path(),
            self.with_key(vec![])
        );
        let client = reqwest::Client::new();
        match self.send(client.get(url)).await {
            Ok(data) => Ok(decode_document(&data)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn query(&self, query: &Query) -> StorageResult<Vec<Document>> {
        self.run_query(query).await
    }

    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StorageResult<String> {
        let url = format!(
            "{}/{}{}",
            self.documents_url(),
            collection,
            self.with_key(vec![])
        );
        let client = reqwest::Client::new();
        let data = self
            .send(client.post(url).json(&json!({ "fields": encode_fields(&fields) })))
            .await?;

        let id = decode_document(&data)
            .map(|d| d.id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                StorageError::Decode(format!("create response is missing a document name: {data}"))
            })?;

        self.refresh_collection(collection);
        Ok(id)
    }

    async fn update(&self, doc: &DocPath, fields: Fields) -> StorageResult<()> {
        self.patch(doc, fields, true).await
    }

    async fn set_merge(&self, doc: &DocPath, fields: Fields) -> StorageResult<()> {
        self.patch(doc, fields, false).await
    }

    async fn delete(&self, doc: &DocPath) -> StorageResult<()> {
        let url = format!(
            "{}/{}{}",
            self.documents_url(),
            doc.path(),
            self.with_key(vec![])
        );
        let client = reqwest::Client::new();
        self.send(client.request(reqwest::Method::DELETE, url))
            .await?;
        self.refresh_collection(&doc.collection);
        Ok(())
    }

    async fn commit(&self, writes: Vec<BatchWrite>) -> StorageResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let url = format!("{}:commit{}", self.documents_url(), self.with_key(vec![]));
        let body = json!({
            "writes": writes.iter().map(|w| self.write_json(w)).collect::<Vec<_>>(),
        });
        let client = reqwest::Client::new();
        self.send(client.post(url).json(&body)).await?;

        let mut touched: Vec<&CollectionPath> = writes.iter().map(|w| &w.doc().collection).collect();
        touched.sort();
        touched.dedup();
        for c in touched {
            self.refresh_collection(c);
        }
        Ok(())
    }
}

pub(crate) fn structured_query(query: &Query) -> Value {
    let mut sq = json!({
        "from": [{ "collectionId": query.collection.collection_id() }],
    });
    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        sq["orderBy"] = json!([{ "field": { "fieldPath": field }, "direction": direction }]);
    }
    json!({ "structuredQuery": sq })
}

/// JSON value -> Firestore typed value.
pub(crate) fn to_firestore_value(v: &Value) -> Value {
    match v {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // integerValue is a decimal string on the wire.
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Firestore typed value -> JSON value.
pub(crate) fn from_firestore_value(v: &Value) -> Value {
    let Some(obj) = v.as_object() else {
        return Value::Null;
    };

    if let Some(s) = obj.get("stringValue") {
        return s.clone();
    }
    if let Some(b) = obj.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = obj.get("integerValue") {
        let parsed = match i {
            Value::String(s) => s.parse::<i64>().ok(),
            other => other.as_i64(),
        };
        return parsed.map(Value::from).unwrap_or(Value::Null);
    }
    if let Some(d) = obj.get("doubleValue") {
        return d.clone();
    }
    if let Some(t) = obj.get("timestampValue") {
        return t.clone();
    }
    if let Some(arr) = obj.get("arrayValue") {
        let values = arr
            .get("values")
            .and_then(|v| v.as_array())
            .map(|vs| vs.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    if let Some(m) = obj.get("mapValue") {
        let fields = m.get("fields").map(decode_fields).unwrap_or_default();
        return Value::Object(fields);
    }
    Value::Null
}

pub(crate) fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), to_firestore_value(v)))
            .collect(),
    )
}

pub(crate) fn decode_fields(v: &Value) -> Fields {
    v.as_object()
        .map(|m| {
            m.iter()
                .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// `{ name, fields }` -> Document (id = last segment of the name).
pub(crate) fn decode_document(v: &Value) -> Option<Document> {
    let name = v.get("name")?.as_str()?;
    let id = name.rsplit('/').next()?.to_string();
    Some(Document {
        id,
        fields: v.get("fields").map(decode_fields).unwrap_or_default(),
    })
}

/// runQuery returns one element per result; elements without `document` carry only a read time.
pub(crate) fn decode_query_response(v: &Value) -> Vec<Document> {
    v.as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get("document"))
                .filter_map(decode_document)
                .collect()
        })
        .unwrap_or_default()
}
