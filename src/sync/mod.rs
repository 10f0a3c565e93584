//! Client-side synchronization of an ordered todo collection.
//!
//! [`TodoSync`] is the pure state: last remote snapshot plus local edit state.
//! [`TodoSession`] drives it against a gateway.

pub mod edit;
pub mod reorder;
pub mod session;

pub use edit::{key_action, AutosaveSlot, EditState, KeyAction, AUTOSAVE_INTERVAL_MS};
pub use reorder::{arrange_by, move_within};
pub use session::TodoSession;

use crate::models::Todo;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TodoSync {
    base: Vec<Todo>,
    edit: EditState,
    loaded: bool,
}

impl TodoSync {
    /// Replace the base sequence with a remote snapshot and reconcile buffers.
    pub fn apply_snapshot(&mut self, todos: Vec<Todo>) {
        self.base = todos;
        self.loaded = true;
        self.edit.reconcile(&self.base);
    }

    /// Whether a first snapshot has arrived.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn base(&self) -> &[Todo] {
        &self.base
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.base.iter().find(|t| t.id == id)
    }

    pub fn stored_text(&self, id: &str) -> Option<&str> {
        self.get(id).map(|t| t.text.as_str())
    }

    pub fn edit(&self) -> &EditState {
        &self.edit
    }

    pub fn edit_mut(&mut self) -> &mut EditState {
        &mut self.edit
    }

    /// Snapshot order, with buffered text shown in place of the stored text.
    pub fn rendered(&self) -> Vec<Todo> {
        self.base
            .iter()
            .map(|t| match self.edit.buffer(&t.id) {
                Some(buffer) => Todo {
                    text: buffer.to_string(),
                    ..t.clone()
                },
                None => t.clone(),
            })
            .collect()
    }

    /// Rendered items split into (visible, hidden). Done items hide unless shown.
    pub fn partition(&self, show_completed: bool) -> (Vec<Todo>, Vec<Todo>) {
        self.rendered()
            .into_iter()
            .partition(|t| show_completed || !t.done)
    }

    pub fn visible(&self, show_completed: bool) -> Vec<Todo> {
        self.partition(show_completed).0
    }

    pub fn completed_count(&self) -> usize {
        self.base.iter().filter(|t| t.done).count()
    }

    /// Rank for a newly added item: after every existing one.
    pub fn next_order(&self) -> i64 {
        self.base.iter().map(|t| t.order).max().map_or(0, |m| m + 1)
    }

    /// Rank for an item being marked done: right after the last other undone item.
    pub fn completion_order(&self, id: &str) -> i64 {
        self.base
            .iter()
            .filter(|t| !t.done && t.id != id)
            .map(|t| t.order)
            .max()
            .map_or(0, |m| m + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: &str, text: &str, done: bool, order: i64) -> Todo {
        Todo {
            id: id.to_string(),
            text: text.to_string(),
            done,
            color: Default::default(),
            category: None,
            created_at: 0,
            order,
            list_id: None,
        }
    }

    fn texts(todos: &[Todo]) -> Vec<&str> {
        todos.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_focused_edit_survives_remote_change() {
        let mut sync = TodoSync::default();
        sync.apply_snapshot(vec![todo("a", "buy bread", false, 0)]);
        sync.edit_mut().focus("a", "buy bread");
        sync.edit_mut().input("a", "buy milk");

        sync.apply_snapshot(vec![todo("a", "buy eggs", false, 0)]);

        assert_eq!(texts(&sync.rendered()), vec!["buy milk"]);
        assert_eq!(sync.stored_text("a"), Some("buy eggs"));
    }

    #[test]
    fn test_unfocused_stale_buffer_yields_to_remote() {
        let mut sync = TodoSync::default();
        sync.apply_snapshot(vec![todo("a", "old", false, 0)]);
        sync.edit_mut().input("a", "local draft");

        sync.apply_snapshot(vec![todo("a", "remote", false, 0)]);

        assert_eq!(texts(&sync.rendered()), vec!["remote"]);
        assert_eq!(sync.edit().buffer("a"), None);
    }

    #[test]
    fn test_rendered_preserves_snapshot_order() {
        let mut sync = TodoSync::default();
        sync.apply_snapshot(vec![
            todo("b", "second", false, 1),
            todo("a", "first", false, 0),
        ]);
        assert_eq!(texts(&sync.rendered()), vec!["second", "first"]);
    }

    #[test]
    fn test_visibility_filter_hides_done() {
        let mut sync = TodoSync::default();
        sync.apply_snapshot(vec![
            todo("a", "open", false, 0),
            todo("b", "done", true, 1),
        ]);
        assert_eq!(texts(&sync.visible(false)), vec!["open"]);
        assert_eq!(texts(&sync.visible(true)), vec!["open", "done"]);
        let (_, hidden) = sync.partition(false);
        assert_eq!(texts(&hidden), vec!["done"]);
        assert_eq!(sync.completed_count(), 1);
    }

    #[test]
    fn test_orders_for_new_and_completed_items() {
        let mut sync = TodoSync::default();
        assert_eq!(sync.next_order(), 0);
        assert_eq!(sync.completion_order("x"), 0);

        sync.apply_snapshot(vec![
            todo("a", "", false, 0),
            todo("b", "", false, 4),
            todo("c", "", true, 9),
        ]);
        assert_eq!(sync.next_order(), 10);
        assert_eq!(sync.completion_order("a"), 5);
        assert_eq!(sync.completion_order("b"), 1);
    }
}
