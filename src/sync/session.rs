use super::reorder::{move_within, sort_by_added_time, sort_by_priority};
use super::TodoSync;
use crate::errors::StorageResult;
use crate::gateway::{TodoGateway, TodoScope};
use crate::models::{NewTodo, TodoColor, TodoUpdate};
use crate::store::Subscription;
use leptos::logging::{log, warn};
use std::sync::{Arc, Mutex, MutexGuard};

type Notify = Arc<dyn Fn() + Send + Sync>;

/// One scope's todos, live: snapshot delivery, text editing and ordering writes.
///
/// State changes call the `notify` hook so a view can re-render. The state lock
/// is never held across a gateway call.
#[derive(Clone)]
pub struct TodoSession {
    gateway: TodoGateway,
    scope: TodoScope,
    state: Arc<Mutex<TodoSync>>,
    subscription: Arc<Mutex<Option<Subscription>>>,
    notify: Notify,
}

impl TodoSession {
    pub fn new(
        gateway: TodoGateway,
        scope: TodoScope,
        notify: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            gateway,
            scope,
            state: Arc::new(Mutex::new(TodoSync::default())),
            subscription: Arc::new(Mutex::new(None)),
            notify: Arc::new(notify),
        }
    }

    pub fn scope(&self) -> &TodoScope {
        &self.scope
    }

    fn lock(&self) -> MutexGuard<'_, TodoSync> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Read the current state.
    pub fn read<R>(&self, f: impl FnOnce(&TodoSync) -> R) -> R {
        f(&self.lock())
    }

    fn update_state<R>(&self, f: impl FnOnce(&mut TodoSync) -> R) -> R {
        let out = f(&mut self.lock());
        (self.notify)();
        out
    }

    /// Start receiving snapshots. Replaces any previous subscription.
    pub fn attach(&self) {
        self.detach();

        let state = self.state.clone();
        let notify = self.notify.clone();
        let sub = self.gateway.subscribe(&self.scope, move |todos| {
            state
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .apply_snapshot(todos);
            notify();
        });

        if let Ok(mut slot) = self.subscription.lock() {
            *slot = Some(sub);
        }
    }

    pub fn detach(&self) {
        let previous = match self.subscription.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(sub) = previous {
            sub.cancel();
        }
    }

    pub fn focus(&self, id: &str) {
        self.update_state(|s| {
            let stored = s.stored_text(id).unwrap_or_default().to_string();
            s.edit_mut().focus(id, &stored);
        });
    }

    pub fn input(&self, id: &str, text: &str) {
        self.update_state(|s| s.edit_mut().input(id, text));
    }

    pub fn focused(&self) -> Option<String> {
        self.read(|s| s.edit().focused().map(str::to_string))
    }

    /// Autosave: write the focused item's buffer if it differs from the stored text.
    pub async fn tick(&self) -> StorageResult<bool> {
        let pending = self.read(|s| {
            let id = s.edit().focused()?.to_string();
            let text = s.edit().pending_write(&id, s.stored_text(&id))?;
            Some((id, text))
        });

        let Some((id, text)) = pending else {
            return Ok(false);
        };

        log!("[TodoSync] autosave {}", id);
        self.gateway
            .update(&self.scope, &id, TodoUpdate::Text(text))
            .await?;
        Ok(true)
    }

    /// Blur, Enter or Escape: leave the field, writing the buffer if it changed.
    ///
    /// The buffer keeps rendering while the write is in flight and is dropped
    /// once it lands. A failed write leaves it on screen until a snapshot
    /// with different text replaces it.
    pub async fn release(&self, id: &str) -> StorageResult<bool> {
        let pending = self.update_state(|s| {
            let pending = s.edit().pending_write(id, s.stored_text(id));
            match pending {
                Some(_) => s.edit_mut().begin_commit(id),
                None => {
                    s.edit_mut().release(id);
                }
            }
            pending
        });

        let Some(text) = pending else {
            return Ok(false);
        };

        let result = self
            .gateway
            .update(&self.scope, id, TodoUpdate::Text(text))
            .await;
        self.update_state(|s| s.edit_mut().finish_commit(id, result.is_ok()));

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("[TodoSync] save of {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    /// Append an empty item after every existing one; returns its id.
    pub async fn add_item(&self, created_at: i64) -> StorageResult<String> {
        let order = self.read(|s| s.next_order());
        let todo = NewTodo::blank(self.scope.list_id.clone(), created_at, order);
        self.gateway.create(&self.scope, &todo).await
    }

    pub async fn set_done(&self, id: &str, done: bool) -> StorageResult<()> {
        let order = if done {
            Some(self.read(|s| s.completion_order(id)))
        } else {
            None
        };
        self.gateway
            .update(&self.scope, id, TodoUpdate::Completion { done, order })
            .await
    }

    pub async fn set_color(&self, id: &str, color: TodoColor) -> StorageResult<()> {
        self.gateway
            .update(&self.scope, id, TodoUpdate::Color(color))
            .await
    }

    pub async fn remove(&self, id: &str) -> StorageResult<()> {
        self.update_state(|s| {
            s.edit_mut().release(id);
        });
        self.gateway.delete(&self.scope, id).await
    }

    /// Drop `source` onto `destination` within the visible items.
    ///
    /// Only the visible sequence is re-ranked; hidden items keep their ranks.
    pub async fn drag(
        &self,
        source: &str,
        destination: &str,
        show_completed: bool,
    ) -> StorageResult<bool> {
        let moved = self.read(|s| {
            let visible: Vec<String> = s
                .visible(show_completed)
                .into_iter()
                .map(|t| t.id)
                .collect();
            move_within(&visible, source, destination)
        });

        let Some(ids) = moved else {
            return Ok(false);
        };
        self.gateway.batch_reorder(&self.scope, &ids).await?;
        Ok(true)
    }

    pub async fn sort_by_priority(&self, show_completed: bool) -> StorageResult<()> {
        let ids = self.read(|s| {
            let (visible, hidden) = s.partition(show_completed);
            sort_by_priority(&visible, &hidden)
        });
        self.gateway.batch_reorder(&self.scope, &ids).await
    }

    pub async fn sort_by_added_time(&self, show_completed: bool) -> StorageResult<()> {
        let ids = self.read(|s| {
            let (visible, hidden) = s.partition(show_completed);
            sort_by_added_time(&visible, &hidden)
        });
        self.gateway.batch_reorder(&self.scope, &ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        BatchWrite, CollectionPath, DocPath, Document, DocumentStore, Fields, MemoryStore, Query,
        SharedStore, SnapshotCallback,
    };
    use futures::executor::block_on;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        mem: MemoryStore,
        session: TodoSession,
        renders: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            let mem = MemoryStore::new();
            let store: SharedStore = Arc::new(mem.clone());
            let renders = Arc::new(AtomicUsize::new(0));
            let r2 = renders.clone();
            let session = TodoSession::new(
                TodoGateway::new(store),
                TodoScope::list("u1", "l1"),
                move || {
                    r2.fetch_add(1, Ordering::SeqCst);
                },
            );
            session.attach();
            Self {
                mem,
                session,
                renders,
            }
        }

        fn seed(&self, text: &str, order: i64, done: bool, created_at: i64) -> String {
            let id = block_on(self.session.add_item(created_at)).unwrap();
            let mut f = Fields::new();
            f.insert("text".to_string(), json!(text));
            f.insert("order".to_string(), json!(order));
            f.insert("done".to_string(), json!(done));
            self.mem
                .put_external(&self.session.scope().collection().doc(&id), f);
            id
        }

        fn external_text(&self, id: &str, text: &str) {
            let mut f = Fields::new();
            f.insert("text".to_string(), json!(text));
            self.mem
                .put_external(&self.session.scope().collection().doc(id), f);
        }

        fn stored(&self, id: &str) -> Fields {
            block_on(self.mem.get(&self.session.scope().collection().doc(id)))
                .unwrap()
                .unwrap()
                .fields
        }

        fn rendered_text(&self, id: &str) -> String {
            self.session.read(|s| {
                s.rendered()
                    .into_iter()
                    .find(|t| t.id == id)
                    .map(|t| t.text)
                    .unwrap_or_default()
            })
        }
    }

    #[test]
    fn test_unchanged_buffer_never_writes() {
        let h = Harness::new();
        let a = h.seed("buy milk", 0, false, 1);
        let before = h.mem.write_calls();

        h.session.focus(&a);
        assert!(!block_on(h.session.tick()).unwrap());
        h.session.input(&a, "buy milk");
        assert!(!block_on(h.session.release(&a)).unwrap());

        assert_eq!(h.mem.write_calls(), before);
    }

    #[test]
    fn test_tick_saves_focused_buffer_and_keeps_editing() {
        let h = Harness::new();
        let a = h.seed("", 0, false, 1);

        h.session.focus(&a);
        h.session.input(&a, "call mom");
        assert!(block_on(h.session.tick()).unwrap());

        assert_eq!(h.stored(&a)["text"], "call mom");
        assert_eq!(h.session.focused(), Some(a.clone()));
        assert!(!block_on(h.session.tick()).unwrap());
    }

    #[test]
    fn test_focused_edit_wins_until_release() {
        let h = Harness::new();
        let a = h.seed("buy bread", 0, false, 1);

        h.session.focus(&a);
        h.session.input(&a, "buy milk");
        h.external_text(&a, "buy eggs");
        assert_eq!(h.rendered_text(&a), "buy milk");

        assert!(block_on(h.session.release(&a)).unwrap());
        assert_eq!(h.stored(&a)["text"], "buy milk");
        assert_eq!(h.rendered_text(&a), "buy milk");
        assert_eq!(h.session.focused(), None);
    }

    /// Memory store that records what the session renders for an item at
    /// the moment its text update reaches the store.
    struct WatchingStore {
        inner: MemoryStore,
        session: Mutex<Option<TodoSession>>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait(?Send)]
    impl DocumentStore for WatchingStore {
        fn listen(&self, query: Query, on_snapshot: SnapshotCallback) -> Subscription {
            self.inner.listen(query, on_snapshot)
        }

        async fn get(&self, doc: &DocPath) -> StorageResult<Option<Document>> {
            self.inner.get(doc).await
        }

        async fn query(&self, query: &Query) -> StorageResult<Vec<Document>> {
            self.inner.query(query).await
        }

        async fn add(&self, collection: &CollectionPath, fields: Fields) -> StorageResult<String> {
            self.inner.add(collection, fields).await
        }

        async fn update(&self, doc: &DocPath, fields: Fields) -> StorageResult<()> {
            let session = self.session.lock().unwrap().clone();
            if let Some(session) = session {
                let text = session.read(|s| {
                    s.rendered()
                        .into_iter()
                        .find(|t| t.id == doc.id)
                        .map(|t| t.text)
                        .unwrap_or_default()
                });
                self.seen.lock().unwrap().push(text);
            }
            self.inner.update(doc, fields).await
        }

        async fn set_merge(&self, doc: &DocPath, fields: Fields) -> StorageResult<()> {
            self.inner.set_merge(doc, fields).await
        }

        async fn delete(&self, doc: &DocPath) -> StorageResult<()> {
            self.inner.delete(doc).await
        }

        async fn commit(&self, writes: Vec<BatchWrite>) -> StorageResult<()> {
            self.inner.commit(writes).await
        }
    }

    #[test]
    fn test_release_renders_buffer_while_write_is_in_flight() {
        let mem = MemoryStore::new();
        let store = Arc::new(WatchingStore {
            inner: mem.clone(),
            session: Mutex::new(None),
            seen: Mutex::new(vec![]),
        });
        let session = TodoSession::new(
            TodoGateway::new(store.clone()),
            TodoScope::list("u1", "l1"),
            || {},
        );
        session.attach();
        *store.session.lock().unwrap() = Some(session.clone());

        let a = block_on(session.add_item(1)).unwrap();
        let mut f = Fields::new();
        f.insert("text".to_string(), json!("old"));
        mem.put_external(&session.scope().collection().doc(&a), f);

        session.focus(&a);
        session.input(&a, "new");
        assert!(block_on(session.release(&a)).unwrap());

        assert_eq!(*store.seen.lock().unwrap(), vec!["new".to_string()]);
        assert_eq!(session.focused(), None);
        assert!(!session.read(|s| s.edit().has_buffers()));

        session.detach();
        store.session.lock().unwrap().take();
    }

    #[test]
    fn test_failed_release_keeps_typed_text() {
        let h = Harness::new();
        let a = h.seed("old", 0, false, 1);

        h.session.focus(&a);
        h.session.input(&a, "new");
        h.mem.set_fail_writes(true);

        assert!(block_on(h.session.release(&a)).is_err());
        assert_eq!(h.rendered_text(&a), "new");
        assert_eq!(h.session.focused(), None);
    }

    #[test]
    fn test_drag_last_to_front_persists_ranks() {
        let h = Harness::new();
        let a = h.seed("A", 0, false, 1);
        let b = h.seed("B", 1, false, 2);
        let c = h.seed("C", 2, false, 3);

        assert!(block_on(h.session.drag(&c, &a, false)).unwrap());

        assert_eq!(h.stored(&c)["order"], 0);
        assert_eq!(h.stored(&a)["order"], 1);
        assert_eq!(h.stored(&b)["order"], 2);
        let texts = h
            .session
            .read(|s| s.rendered().into_iter().map(|t| t.text).collect::<Vec<_>>());
        assert_eq!(texts, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_drag_leaves_hidden_ranks_alone() {
        let h = Harness::new();
        let a = h.seed("A", 0, false, 1);
        let done = h.seed("done", 1, true, 2);
        let b = h.seed("B", 2, false, 3);

        assert!(block_on(h.session.drag(&b, &a, false)).unwrap());
        assert_eq!(h.stored(&b)["order"], 0);
        assert_eq!(h.stored(&a)["order"], 1);
        assert_eq!(h.stored(&done)["order"], 1);

        let before = h.mem.write_calls();
        assert!(!block_on(h.session.drag(&a, &a, false)).unwrap());
        assert!(!block_on(h.session.drag(&a, &done, false)).unwrap());
        assert_eq!(h.mem.write_calls(), before);
    }

    #[test]
    fn test_sort_by_priority_persists_visible_then_hidden() {
        let h = Harness::new();
        let blue = h.seed("blue", 0, false, 5);
        let red = h.seed("red", 1, false, 5);
        let hidden = h.seed("hidden", 2, true, 5);
        let none = h.seed("none", 3, false, 5);
        let yellow = h.seed("yellow", 4, false, 5);
        block_on(h.session.set_color(&blue, TodoColor::Blue)).unwrap();
        block_on(h.session.set_color(&red, TodoColor::Red)).unwrap();
        block_on(h.session.set_color(&yellow, TodoColor::Yellow)).unwrap();

        block_on(h.session.sort_by_priority(false)).unwrap();

        assert_eq!(h.stored(&red)["order"], 0);
        assert_eq!(h.stored(&yellow)["order"], 1);
        assert_eq!(h.stored(&blue)["order"], 2);
        assert_eq!(h.stored(&none)["order"], 3);
        assert_eq!(h.stored(&hidden)["order"], 4);
    }

    #[test]
    fn test_add_item_appends_blank_in_scope() {
        let h = Harness::new();
        h.seed("a", 7, false, 1);
        let id = block_on(h.session.add_item(99)).unwrap();

        let f = h.stored(&id);
        assert_eq!(f["order"], 8);
        assert_eq!(f["text"], "");
        assert_eq!(f["color"], "none");
        assert_eq!(f["listId"], "l1");
        assert_eq!(f["createdAt"], 99);
    }

    #[test]
    fn test_completing_moves_after_last_open_item() {
        let h = Harness::new();
        let a = h.seed("a", 0, false, 1);
        let b = h.seed("b", 1, false, 2);
        let old_done = h.seed("old", 5, true, 3);
        assert_eq!(h.stored(&b)["order"], 1);

        block_on(h.session.set_done(&a, true)).unwrap();
        assert_eq!(h.stored(&a)["done"], true);
        assert_eq!(h.stored(&a)["order"], 2);

        block_on(h.session.set_done(&old_done, false)).unwrap();
        assert_eq!(h.stored(&old_done)["done"], false);
        assert_eq!(h.stored(&old_done)["order"], 5);
        assert_eq!(h.stored(&b)["done"], false);
    }

    #[test]
    fn test_remove_drops_edit_state() {
        let h = Harness::new();
        let a = h.seed("a", 0, false, 1);
        h.session.focus(&a);
        block_on(h.session.remove(&a)).unwrap();

        assert_eq!(h.session.focused(), None);
        assert!(h.session.read(|s| s.base().is_empty()));
    }

    #[test]
    fn test_detach_stops_snapshots() {
        let h = Harness::new();
        let a = h.seed("a", 0, false, 1);
        h.session.detach();
        h.session.detach();
        let renders = h.renders.load(Ordering::SeqCst);

        h.external_text(&a, "changed");
        assert_eq!(h.renders.load(Ordering::SeqCst), renders);
        assert_eq!(h.rendered_text(&a), "a");
        assert_eq!(h.mem.listener_count(), 0);
    }
}
