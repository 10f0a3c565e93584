//! Typed per-entity access on top of a [`DocumentStore`].
//!
//! Every write goes through a narrow update enum; nothing here can move an item
//! to another scope.

use crate::errors::StorageResult;
use crate::models::{
    Goal, GoalUpdate, ListUpdate, NewGoal, NewTodo, NewTodoList, PersonalBrief, Todo, TodoList,
    TodoUpdate, UserPreferences,
};
use crate::store::{
    encode_fields, BatchWrite, CollectionPath, DocPath, Direction, Document, Fields, Query,
    SharedStore, Subscription,
};
use leptos::logging::warn;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

/// Where a set of todos lives: the legacy per-owner collection, or one list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TodoScope {
    pub owner: String,
    pub list_id: Option<String>,
}

impl TodoScope {
    pub fn legacy(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            list_id: None,
        }
    }

    pub fn list(owner: &str, list_id: &str) -> Self {
        Self {
            owner: owner.to_string(),
            list_id: Some(list_id.to_string()),
        }
    }

    pub fn collection(&self) -> CollectionPath {
        match &self.list_id {
            Some(list_id) => list_todos_collection(&self.owner, list_id),
            None => CollectionPath::new(&["users", &self.owner, "todos"]),
        }
    }
}

fn list_todos_collection(owner: &str, list_id: &str) -> CollectionPath {
    CollectionPath::new(&["users", owner, "lists", list_id, "todos"])
}

fn lists_collection(owner: &str) -> CollectionPath {
    CollectionPath::new(&["users", owner, "lists"])
}

fn goals_collection(owner: &str) -> CollectionPath {
    CollectionPath::new(&["users", owner, "goals"])
}

fn data_collection(owner: &str) -> CollectionPath {
    CollectionPath::new(&["users", owner, "data"])
}

/// Decode a snapshot, skipping documents that no longer match the model.
fn decode_all<T: DeserializeOwned>(docs: &[Document], kind: &str) -> Vec<T> {
    docs.iter()
        .filter_map(|d| match d.decode::<T>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("[Gateway] skipping {} {}: {}", kind, d.id, e);
                None
            }
        })
        .collect()
}

fn decode_singleton<T: DeserializeOwned + Default>(doc: Option<&Document>, kind: &str) -> T {
    match doc.map(|d| d.decode::<T>()) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!("[Gateway] unreadable {}: {}", kind, e);
            T::default()
        }
        None => T::default(),
    }
}

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Batch writes giving `ids` the ranks `0..k-1` in the given order.
fn reorder_writes(collection: &CollectionPath, ids: &[String]) -> Vec<BatchWrite> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| BatchWrite::Update {
            doc: collection.doc(id),
            fields: fields(json!({ "order": index as i64 })),
        })
        .collect()
}

impl TodoUpdate {
    fn into_fields(self) -> Fields {
        match self {
            TodoUpdate::Text(text) => fields(json!({ "text": text })),
            TodoUpdate::Color(color) => fields(json!({ "color": color })),
            TodoUpdate::Completion { done, order: None } => fields(json!({ "done": done })),
            TodoUpdate::Completion {
                done,
                order: Some(order),
            } => fields(json!({ "done": done, "order": order })),
        }
    }
}

impl ListUpdate {
    fn into_fields(self) -> Fields {
        match self {
            ListUpdate::Name(name) => fields(json!({ "name": name })),
            ListUpdate::Description(description) => fields(json!({ "description": description })),
        }
    }
}

impl GoalUpdate {
    fn into_fields(self) -> Fields {
        match self {
            GoalUpdate::Details { name, description } => {
                fields(json!({ "name": name, "description": description }))
            }
            GoalUpdate::Status(status) => fields(json!({ "status": status })),
            GoalUpdate::Category(category) => fields(json!({ "category": category })),
        }
    }
}

#[derive(Clone)]
pub struct TodoGateway {
    store: SharedStore,
}

impl TodoGateway {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Live todos of a scope, ordered by rank.
    pub fn subscribe(
        &self,
        scope: &TodoScope,
        on_change: impl Fn(Vec<Todo>) + Send + Sync + 'static,
    ) -> Subscription {
        let query = Query::ordered(scope.collection(), "order", Direction::Ascending);
        self.store.listen(
            query,
            Arc::new(move |docs: Vec<Document>| on_change(decode_all(&docs, "todo"))),
        )
    }

    pub async fn fetch(&self, scope: &TodoScope) -> StorageResult<Vec<Todo>> {
        let query = Query::ordered(scope.collection(), "order", Direction::Ascending);
        let docs = self.store.query(&query).await?;
        Ok(decode_all(&docs, "todo"))
    }

    pub async fn create(&self, scope: &TodoScope, todo: &NewTodo) -> StorageResult<String> {
        self.store
            .add(&scope.collection(), encode_fields(todo)?)
            .await
    }

    pub async fn update(&self, scope: &TodoScope, id: &str, update: TodoUpdate) -> StorageResult<()> {
        self.store
            .update(&scope.collection().doc(id), update.into_fields())
            .await
    }

    pub async fn delete(&self, scope: &TodoScope, id: &str) -> StorageResult<()> {
        self.store.delete(&scope.collection().doc(id)).await
    }

    /// Persist `ids` at ranks `0..k-1`; items not named keep their rank.
    pub async fn batch_reorder(&self, scope: &TodoScope, ids: &[String]) -> StorageResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store
            .commit(reorder_writes(&scope.collection(), ids))
            .await
    }
}

#[derive(Clone)]
pub struct ListGateway {
    store: SharedStore,
    owner: String,
}

impl ListGateway {
    pub fn new(store: SharedStore, owner: &str) -> Self {
        Self {
            store,
            owner: owner.to_string(),
        }
    }

    fn doc(&self, id: &str) -> DocPath {
        lists_collection(&self.owner).doc(id)
    }

    pub fn subscribe(
        &self,
        on_change: impl Fn(Vec<TodoList>) + Send + Sync + 'static,
    ) -> Subscription {
        let query = Query::ordered(lists_collection(&self.owner), "order", Direction::Ascending);
        self.store.listen(
            query,
            Arc::new(move |docs: Vec<Document>| on_change(decode_all(&docs, "list"))),
        )
    }

    pub async fn fetch(&self) -> StorageResult<Vec<TodoList>> {
        let query = Query::ordered(lists_collection(&self.owner), "order", Direction::Ascending);
        let docs = self.store.query(&query).await?;
        Ok(decode_all(&docs, "list"))
    }

    pub async fn create(&self, list: &NewTodoList) -> StorageResult<String> {
        self.store
            .add(&lists_collection(&self.owner), encode_fields(list)?)
            .await
    }

    pub async fn update(&self, id: &str, update: ListUpdate) -> StorageResult<()> {
        self.store.update(&self.doc(id), update.into_fields()).await
    }

    /// Delete a list and every todo scoped to it in one atomic batch.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        let todos = list_todos_collection(&self.owner, id);
        let children = self
            .store
            .query(&Query {
                collection: todos.clone(),
                order_by: None,
            })
            .await?;

        let mut writes: Vec<BatchWrite> = children
            .iter()
            .map(|d| BatchWrite::Delete {
                doc: todos.doc(&d.id),
            })
            .collect();
        writes.push(BatchWrite::Delete { doc: self.doc(id) });

        self.store.commit(writes).await
    }

    pub async fn batch_reorder(&self, ids: &[String]) -> StorageResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store
            .commit(reorder_writes(&lists_collection(&self.owner), ids))
            .await
    }
}

#[derive(Clone)]
pub struct GoalGateway {
    store: SharedStore,
    owner: String,
}

impl GoalGateway {
    pub fn new(store: SharedStore, owner: &str) -> Self {
        Self {
            store,
            owner: owner.to_string(),
        }
    }

    /// Live goals, newest first.
    pub fn subscribe(&self, on_change: impl Fn(Vec<Goal>) + Send + Sync + 'static) -> Subscription {
        let query = Query::ordered(goals_collection(&self.owner), "createdAt", Direction::Descending);
        self.store.listen(
            query,
            Arc::new(move |docs: Vec<Document>| on_change(decode_all(&docs, "goal"))),
        )
    }

    pub async fn create(&self, goal: &NewGoal) -> StorageResult<String> {
        self.store
            .add(&goals_collection(&self.owner), encode_fields(goal)?)
            .await
    }

    pub async fn update(&self, id: &str, update: GoalUpdate) -> StorageResult<()> {
        self.store
            .update(&goals_collection(&self.owner).doc(id), update.into_fields())
            .await
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.store
            .delete(&goals_collection(&self.owner).doc(id))
            .await
    }
}

/// A per-owner singleton document under `users/{owner}/data`.
#[derive(Clone)]
struct Singleton {
    store: SharedStore,
    owner: String,
    id: &'static str,
}

impl Singleton {
    fn doc(&self) -> DocPath {
        data_collection(&self.owner).doc(self.id)
    }

    fn subscribe<T: DeserializeOwned + Default>(
        &self,
        on_change: impl Fn(T) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.id;
        let query = Query {
            collection: data_collection(&self.owner),
            order_by: None,
        };
        self.store.listen(
            query,
            Arc::new(move |docs: Vec<Document>| {
                on_change(decode_singleton(docs.iter().find(|d| d.id == id), id))
            }),
        )
    }

    async fn get<T: DeserializeOwned + Default>(&self) -> StorageResult<T> {
        let doc = self.store.get(&self.doc()).await?;
        Ok(decode_singleton(doc.as_ref(), self.id))
    }

    async fn save<T: serde::Serialize>(&self, value: &T) -> StorageResult<()> {
        self.store.set_merge(&self.doc(), encode_fields(value)?).await
    }
}

#[derive(Clone)]
pub struct BriefGateway(Singleton);

impl BriefGateway {
    pub fn new(store: SharedStore, owner: &str) -> Self {
        Self(Singleton {
            store,
            owner: owner.to_string(),
            id: "brief",
        })
    }

    pub fn subscribe(
        &self,
        on_change: impl Fn(PersonalBrief) + Send + Sync + 'static,
    ) -> Subscription {
        self.0.subscribe(on_change)
    }

    /// The stored brief, or an empty one.
    pub async fn get(&self) -> StorageResult<PersonalBrief> {
        self.0.get().await
    }

    pub async fn save(&self, brief: &PersonalBrief) -> StorageResult<()> {
        self.0.save(brief).await
    }
}

#[derive(Clone)]
pub struct PreferencesGateway(Singleton);

impl PreferencesGateway {
    pub fn new(store: SharedStore, owner: &str) -> Self {
        Self(Singleton {
            store,
            owner: owner.to_string(),
            id: "preferences",
        })
    }

    pub fn subscribe(
        &self,
        on_change: impl Fn(UserPreferences) + Send + Sync + 'static,
    ) -> Subscription {
        self.0.subscribe(on_change)
    }

    pub async fn get(&self) -> StorageResult<UserPreferences> {
        self.0.get().await
    }

    pub async fn save(&self, prefs: &UserPreferences) -> StorageResult<()> {
        self.0.save(prefs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GoalCategory, GoalStatus, TodoColor};
    use crate::store::{DocumentStore, MemoryStore};
    use futures::executor::block_on;
    use std::sync::Mutex;

    fn setup() -> (MemoryStore, SharedStore) {
        let mem = MemoryStore::new();
        let shared: SharedStore = Arc::new(mem.clone());
        (mem, shared)
    }

    fn add_todo(gw: &TodoGateway, scope: &TodoScope, text: &str, order: i64) -> String {
        let mut t = NewTodo::blank(scope.list_id.clone(), 0, order);
        t.text = text.to_string();
        block_on(gw.create(scope, &t)).unwrap()
    }

    #[test]
    fn test_scope_collections() {
        assert_eq!(TodoScope::legacy("u1").collection().as_str(), "users/u1/todos");
        assert_eq!(
            TodoScope::list("u1", "l9").collection().as_str(),
            "users/u1/lists/l9/todos"
        );
    }

    #[test]
    fn test_batch_reorder_ranks_submitted_ids_and_leaves_others() {
        let (_, store) = setup();
        let gw = TodoGateway::new(store);
        let scope = TodoScope::list("u1", "l1");
        let a = add_todo(&gw, &scope, "a", 0);
        let b = add_todo(&gw, &scope, "b", 1);
        let hidden = add_todo(&gw, &scope, "hidden", 7);
        let c = add_todo(&gw, &scope, "c", 2);

        block_on(gw.batch_reorder(&scope, &[c.clone(), a.clone(), b.clone()])).unwrap();

        let todos = block_on(gw.fetch(&scope)).unwrap();
        let rank = |id: &str| todos.iter().find(|t| t.id == id).map(|t| t.order);
        assert_eq!(rank(&c), Some(0));
        assert_eq!(rank(&a), Some(1));
        assert_eq!(rank(&b), Some(2));
        assert_eq!(rank(&hidden), Some(7));
    }

    #[test]
    fn test_subscribe_decodes_and_orders() {
        let (_, store) = setup();
        let gw = TodoGateway::new(store);
        let scope = TodoScope::legacy("u1");
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(vec![]));
        let s2 = seen.clone();
        let _sub = gw.subscribe(&scope, move |todos| {
            s2.lock()
                .unwrap()
                .push(todos.into_iter().map(|t| t.text).collect());
        });

        add_todo(&gw, &scope, "second", 1);
        add_todo(&gw, &scope, "first", 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last().unwrap(), &vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_update_writes_only_named_fields() {
        let (mem, store) = setup();
        let gw = TodoGateway::new(store);
        let scope = TodoScope::list("u1", "l1");
        let id = add_todo(&gw, &scope, "x", 3);

        block_on(gw.update(&scope, &id, TodoUpdate::Color(TodoColor::Red))).unwrap();
        block_on(gw.update(
            &scope,
            &id,
            TodoUpdate::Completion {
                done: true,
                order: None,
            },
        ))
        .unwrap();

        let doc = block_on(mem.get(&scope.collection().doc(&id))).unwrap().unwrap();
        assert_eq!(doc.fields["color"], "red");
        assert_eq!(doc.fields["done"], true);
        assert_eq!(doc.fields["order"], 3);
        assert_eq!(doc.fields["listId"], "l1");
        assert!(doc.fields.get("id").is_none());
    }

    #[test]
    fn test_deleting_list_removes_its_todos() {
        let (_, store) = setup();
        let lists = ListGateway::new(store.clone(), "u1");
        let todos = TodoGateway::new(store);

        let keep = block_on(lists.create(&NewTodoList {
            name: "Keep".to_string(),
            description: String::new(),
            created_at: 0,
            order: 0,
        }))
        .unwrap();
        let gone = block_on(lists.create(&NewTodoList {
            name: "Gone".to_string(),
            description: String::new(),
            created_at: 0,
            order: 1,
        }))
        .unwrap();

        let gone_scope = TodoScope::list("u1", &gone);
        let keep_scope = TodoScope::list("u1", &keep);
        add_todo(&todos, &gone_scope, "a", 0);
        add_todo(&todos, &gone_scope, "b", 1);
        add_todo(&todos, &keep_scope, "c", 0);

        block_on(lists.delete(&gone)).unwrap();

        let remaining = block_on(lists.fetch()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep);
        assert!(block_on(todos.fetch(&gone_scope)).unwrap().is_empty());
        assert_eq!(block_on(todos.fetch(&keep_scope)).unwrap().len(), 1);
    }

    #[test]
    fn test_goals_newest_first_and_category_clear() {
        let (mem, store) = setup();
        let gw = GoalGateway::new(store, "u1");
        let old = block_on(gw.create(
            &NewGoal::new("Old", "", Some(GoalCategory::Health), 1).unwrap(),
        ))
        .unwrap();
        block_on(gw.create(&NewGoal::new("New", "", None, 2).unwrap())).unwrap();

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![]));
        let s2 = seen.clone();
        let _sub = gw.subscribe(move |goals| {
            *s2.lock().unwrap() = goals.into_iter().map(|g| g.name).collect();
        });
        assert_eq!(*seen.lock().unwrap(), vec!["New".to_string(), "Old".to_string()]);

        block_on(gw.update(&old, GoalUpdate::Category(None))).unwrap();
        block_on(gw.update(&old, GoalUpdate::Status(GoalStatus::OnHold))).unwrap();
        let doc = block_on(mem.get(&goals_collection("u1").doc(&old)))
            .unwrap()
            .unwrap();
        assert_eq!(doc.fields["category"], Value::Null);
        assert_eq!(doc.fields["status"], "on-hold");
    }

    #[test]
    fn test_brief_defaults_then_merges() {
        let (_, store) = setup();
        let gw = BriefGateway::new(store, "u1");
        assert_eq!(block_on(gw.get()).unwrap(), PersonalBrief::default());

        let brief = PersonalBrief {
            intro: "Hi".to_string(),
            who_you_are: "A runner".to_string(),
            what_you_want: String::new(),
        };
        block_on(gw.save(&brief)).unwrap();
        assert_eq!(block_on(gw.get()).unwrap(), brief);
    }

    #[test]
    fn test_preferences_subscription_ignores_other_singletons() {
        let (_, store) = setup();
        let prefs = PreferencesGateway::new(store.clone(), "u1");
        let brief = BriefGateway::new(store, "u1");

        let seen: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(vec![]));
        let s2 = seen.clone();
        let _sub = prefs.subscribe(move |p| s2.lock().unwrap().push(p.show_completed));

        block_on(brief.save(&PersonalBrief::default())).unwrap();
        block_on(prefs.save(&UserPreferences {
            show_completed: true,
        }))
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![false, false, true]);
    }
}
