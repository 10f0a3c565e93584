use crate::models::Todo;
use std::collections::{HashMap, HashSet};

/// Period of the autosave timer while an item is focused.
pub const AUTOSAVE_INTERVAL_MS: i32 = 3000;

/// The single autosave timer: which item it saves and its interval handle.
///
/// Arming replaces the previous timer; callers clear whatever handle comes back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutosaveSlot {
    armed: Option<(String, i32)>,
}

impl AutosaveSlot {
    /// Arm for `id`; returns the handle of the timer it replaces.
    pub fn arm(&mut self, id: &str, handle: i32) -> Option<i32> {
        self.armed
            .replace((id.to_string(), handle))
            .map(|(_, previous)| previous)
    }

    /// Disarm if the timer belongs to `id`.
    pub fn disarm_for(&mut self, id: &str) -> Option<i32> {
        match &self.armed {
            Some((owner, _)) if owner == id => self.disarm(),
            _ => None,
        }
    }

    pub fn disarm(&mut self) -> Option<i32> {
        self.armed.take().map(|(_, handle)| handle)
    }

    pub fn armed_for(&self) -> Option<&str> {
        self.armed.as_ref().map(|(id, _)| id.as_str())
    }
}

/// What a keystroke in an item's text field means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// Save if changed, then leave the field.
    Commit,
    /// Shift+Enter: add a new item. The current field keeps its focus state.
    CreateItem,
    None,
}

pub fn key_action(key: &str, shift: bool) -> KeyAction {
    match key {
        "Enter" if shift => KeyAction::CreateItem,
        "Enter" | "Escape" => KeyAction::Commit,
        _ => KeyAction::None,
    }
}

/// Focus and unsaved text of the todo editor.
///
/// At most one item is focused. Buffers may outlive focus until the next
/// snapshot decides whether they are stale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditState {
    focused: Option<String>,
    buffers: HashMap<String, String>,
    /// Items whose buffer is being written; their buffers survive snapshots.
    committing: HashSet<String>,
}

impl EditState {
    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn is_focused(&self, id: &str) -> bool {
        self.focused.as_deref() == Some(id)
    }

    pub fn buffer(&self, id: &str) -> Option<&str> {
        self.buffers.get(id).map(String::as_str)
    }

    pub fn has_buffers(&self) -> bool {
        !self.buffers.is_empty()
    }

    /// Focus an item, seeding its buffer from the stored text if it has none.
    pub fn focus(&mut self, id: &str, stored_text: &str) {
        self.focused = Some(id.to_string());
        self.buffers
            .entry(id.to_string())
            .or_insert_with(|| stored_text.to_string());
    }

    pub fn input(&mut self, id: &str, text: &str) {
        self.buffers.insert(id.to_string(), text.to_string());
    }

    /// Text to write for `id`, if its buffer differs from what is stored.
    pub fn pending_write(&self, id: &str, stored_text: Option<&str>) -> Option<String> {
        let buffer = self.buffers.get(id)?;
        match stored_text {
            Some(stored) if stored != buffer => Some(buffer.clone()),
            _ => None,
        }
    }

    /// End editing of `id`: drop its buffer and clear focus if it held it.
    pub fn release(&mut self, id: &str) -> Option<String> {
        if self.is_focused(id) {
            self.focused = None;
        }
        self.buffers.remove(id)
    }

    /// Leave `id` for a write of its buffer. The buffer stays rendered until
    /// [`EditState::finish_commit`].
    pub fn begin_commit(&mut self, id: &str) {
        if self.is_focused(id) {
            self.focused = None;
        }
        self.committing.insert(id.to_string());
    }

    pub fn is_committing(&self, id: &str) -> bool {
        self.committing.contains(id)
    }

    /// The write for `id` resolved. On success the buffer is dropped unless the
    /// item was focused again meanwhile; on failure it is left in place.
    pub fn finish_commit(&mut self, id: &str, saved: bool) {
        self.committing.remove(id);
        if saved && !self.is_focused(id) {
            self.buffers.remove(id);
        }
    }

    /// Merge a fresh snapshot into the buffers.
    ///
    /// A buffer survives only if its item still exists and either the item is
    /// focused or the remote text still matches it.
    pub(crate) fn reconcile(&mut self, base: &[Todo]) {
        let focused = self.focused.clone();
        let committing = &self.committing;
        self.buffers.retain(|id, buffer| {
            let Some(remote) = base.iter().find(|t| &t.id == id) else {
                return false;
            };
            focused.as_deref() == Some(id.as_str())
                || committing.contains(id)
                || remote.text == *buffer
        });

        if let Some(id) = &self.focused {
            if !base.iter().any(|t| &t.id == id) {
                self.focused = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: &str, text: &str) -> Todo {
        Todo {
            id: id.to_string(),
            text: text.to_string(),
            done: false,
            color: Default::default(),
            category: None,
            created_at: 0,
            order: 0,
            list_id: None,
        }
    }

    #[test]
    fn test_key_actions() {
        assert_eq!(key_action("Enter", false), KeyAction::Commit);
        assert_eq!(key_action("Escape", false), KeyAction::Commit);
        assert_eq!(key_action("Escape", true), KeyAction::Commit);
        assert_eq!(key_action("Enter", true), KeyAction::CreateItem);
        assert_eq!(key_action("a", true), KeyAction::None);
    }

    #[test]
    fn test_autosave_slot_holds_one_timer() {
        let mut slot = AutosaveSlot::default();
        assert_eq!(slot.arm("a", 1), None);
        assert_eq!(slot.arm("b", 2), Some(1));
        assert_eq!(slot.armed_for(), Some("b"));

        // A late blur of the previous item leaves the new timer running.
        assert_eq!(slot.disarm_for("a"), None);
        assert_eq!(slot.armed_for(), Some("b"));

        assert_eq!(slot.disarm_for("b"), Some(2));
        assert_eq!(slot.armed_for(), None);
        assert_eq!(slot.disarm(), None);
    }

    #[test]
    fn test_focus_seeds_buffer_once() {
        let mut edit = EditState::default();
        edit.focus("a", "stored");
        edit.input("a", "typed");
        edit.focus("a", "stored");
        assert_eq!(edit.buffer("a"), Some("typed"));
        assert!(edit.is_focused("a"));
    }

    #[test]
    fn test_pending_write_skips_unchanged_text() {
        let mut edit = EditState::default();
        edit.focus("a", "same");
        assert_eq!(edit.pending_write("a", Some("same")), None);
        edit.input("a", "changed");
        assert_eq!(edit.pending_write("a", Some("same")), Some("changed".to_string()));
        assert_eq!(edit.pending_write("a", None), None);
        assert_eq!(edit.pending_write("b", Some("x")), None);
    }

    #[test]
    fn test_release_clears_focus_and_buffer() {
        let mut edit = EditState::default();
        edit.focus("a", "x");
        assert_eq!(edit.release("a"), Some("x".to_string()));
        assert_eq!(edit.focused(), None);
        assert!(!edit.has_buffers());
    }

    #[test]
    fn test_reconcile_rules() {
        let mut edit = EditState::default();
        edit.focus("focused", "old");
        edit.input("focused", "mine");
        edit.input("stale", "local");
        edit.input("matching", "same");
        edit.input("vanished", "gone");

        edit.reconcile(&[
            todo("focused", "theirs"),
            todo("stale", "remote"),
            todo("matching", "same"),
        ]);

        assert_eq!(edit.buffer("focused"), Some("mine"));
        assert_eq!(edit.buffer("stale"), None);
        assert_eq!(edit.buffer("matching"), Some("same"));
        assert_eq!(edit.buffer("vanished"), None);
    }

    #[test]
    fn test_commit_keeps_buffer_until_write_resolves() {
        let mut edit = EditState::default();
        edit.focus("a", "old");
        edit.input("a", "new");
        edit.begin_commit("a");

        assert_eq!(edit.focused(), None);
        edit.reconcile(&[todo("a", "old")]);
        assert_eq!(edit.buffer("a"), Some("new"));

        edit.finish_commit("a", true);
        assert!(!edit.is_committing("a"));
        assert_eq!(edit.buffer("a"), None);
    }

    #[test]
    fn test_failed_commit_leaves_buffer() {
        let mut edit = EditState::default();
        edit.focus("a", "old");
        edit.input("a", "new");
        edit.begin_commit("a");
        edit.finish_commit("a", false);
        assert_eq!(edit.buffer("a"), Some("new"));

        // A refocus during the write keeps the buffer for further typing.
        edit.begin_commit("a");
        edit.focus("a", "old");
        edit.finish_commit("a", true);
        assert_eq!(edit.buffer("a"), Some("new"));
    }

    #[test]
    fn test_reconcile_drops_focus_of_deleted_item() {
        let mut edit = EditState::default();
        edit.focus("a", "x");
        edit.reconcile(&[]);
        assert_eq!(edit.focused(), None);
        assert_eq!(edit.buffer("a"), None);
    }
}
