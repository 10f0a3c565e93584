use crate::gateway::TodoScope;
use crate::models::{Todo, TodoColor};
use crate::state::AppContext;
use crate::sync::{key_action, AutosaveSlot, KeyAction, TodoSession, AUTOSAVE_INTERVAL_MS};
use crate::util::{blur_target, clear_interval, now_ms, set_interval};
use leptos::logging::log;
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::sync::{Arc, Mutex};

/// Wires a [`TodoSession`] into the page: re-render signal, autosave timer,
/// focus hand-off for new items, and error reporting.
///
/// One controller per open list; `dispose` must run when the page goes away.
#[derive(Clone)]
pub(crate) struct TodoSyncController {
    app: AppContext,
    session: TodoSession,

    /// Bumped on every state change of the session.
    revision: RwSignal<u64>,

    /// The single autosave interval.
    autosave: Arc<Mutex<AutosaveSlot>>,

    /// Item to focus once it shows up in a snapshot.
    pub pending_focus: RwSignal<Option<String>>,
}

impl TodoSyncController {
    pub fn new(app: AppContext, scope: TodoScope) -> Self {
        let revision = RwSignal::new(0u64);
        let session = TodoSession::new(app.0.todos(), scope, move || {
            let _ = revision.try_update(|r| *r += 1);
        });
        session.attach();

        Self {
            app,
            session,
            revision,
            autosave: Arc::new(Mutex::new(AutosaveSlot::default())),
            pending_focus: RwSignal::new(None),
        }
    }

    pub fn scope(&self) -> &TodoScope {
        self.session.scope()
    }

    fn show_completed(&self) -> bool {
        self.app.0.preferences.get().show_completed
    }

    /// Items to render (tracked).
    pub fn visible(&self) -> Vec<Todo> {
        self.revision.track();
        let show_completed = self.show_completed();
        self.session.read(|s| s.visible(show_completed))
    }

    pub fn is_loaded(&self) -> bool {
        self.revision.track();
        self.session.read(|s| s.is_loaded())
    }

    pub fn completed_count(&self) -> usize {
        self.revision.track();
        self.session.read(|s| s.completed_count())
    }

    pub fn total_count(&self) -> usize {
        self.revision.track();
        self.session.read(|s| s.base().len())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, AutosaveSlot> {
        self.autosave.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn arm_autosave(&self, id: &str) {
        let s2 = self.clone();
        let Some(tid) = set_interval(AUTOSAVE_INTERVAL_MS, move || {
            let s3 = s2.clone();
            spawn_local(async move {
                if let Err(e) = s3.session.tick().await {
                    s3.app.0.report("autosave", e);
                }
            });
        }) else {
            self.disarm_autosave();
            return;
        };

        let previous = self.slot().arm(id, tid);
        if let Some(previous) = previous {
            clear_interval(previous);
        }
    }

    fn disarm_autosave(&self) {
        let previous = self.slot().disarm();
        if let Some(tid) = previous {
            clear_interval(tid);
        }
    }

    pub fn on_focus(&self, id: &str) {
        self.session.focus(id);
        self.arm_autosave(id);
    }

    pub fn on_input(&self, id: &str, text: &str) {
        self.session.input(id, text);
    }

    pub fn on_blur(&self, id: &str) {
        let previous = self.slot().disarm_for(id);
        if let Some(tid) = previous {
            clear_interval(tid);
        }

        let s2 = self.clone();
        let id = id.to_string();
        spawn_local(async move {
            if let Err(e) = s2.session.release(&id).await {
                s2.app.0.report("save item", e);
            }
        });
    }

    /// Enter / Escape leave the field; the blur handler does the commit.
    pub fn on_keydown(&self, ev: &web_sys::KeyboardEvent) {
        if key_action(&ev.key(), ev.shift_key()) == KeyAction::Commit {
            ev.prevent_default();
            blur_target(ev);
        }
    }

    pub fn add_item(&self) {
        let s2 = self.clone();
        spawn_local(async move {
            match s2.session.add_item(now_ms()).await {
                Ok(id) => {
                    log!("[TodoSync] created {}", id);
                    s2.pending_focus.set(Some(id));
                }
                Err(e) => s2.app.0.report("add item", e),
            }
        });
    }

    pub fn set_done(&self, id: &str, done: bool) {
        let s2 = self.clone();
        let id = id.to_string();
        spawn_local(async move {
            if let Err(e) = s2.session.set_done(&id, done).await {
                s2.app.0.report("update item", e);
            }
        });
    }

    pub fn set_color(&self, id: &str, color: TodoColor) {
        let s2 = self.clone();
        let id = id.to_string();
        spawn_local(async move {
            if let Err(e) = s2.session.set_color(&id, color).await {
                s2.app.0.report("update priority", e);
            }
        });
    }

    pub fn remove(&self, id: &str) {
        let s2 = self.clone();
        let id = id.to_string();
        spawn_local(async move {
            if let Err(e) = s2.session.remove(&id).await {
                s2.app.0.report("delete item", e);
            }
        });
    }

    pub fn drop_onto(&self, source: &str, destination: &str) {
        let show_completed = self.app.0.preferences.get_untracked().show_completed;
        let s2 = self.clone();
        let (source, destination) = (source.to_string(), destination.to_string());
        spawn_local(async move {
            if let Err(e) = s2.session.drag(&source, &destination, show_completed).await {
                s2.app.0.report("reorder items", e);
            }
        });
    }

    pub fn sort_by_priority(&self) {
        let show_completed = self.app.0.preferences.get_untracked().show_completed;
        let s2 = self.clone();
        spawn_local(async move {
            if let Err(e) = s2.session.sort_by_priority(show_completed).await {
                s2.app.0.report("sort items", e);
            }
        });
    }

    pub fn sort_by_added_time(&self) {
        let show_completed = self.app.0.preferences.get_untracked().show_completed;
        let s2 = self.clone();
        spawn_local(async move {
            if let Err(e) = s2.session.sort_by_added_time(show_completed).await {
                s2.app.0.report("sort items", e);
            }
        });
    }

    /// Rewrite an item's text. Ignored while another rewrite runs.
    pub fn rewrite(&self, id: &str) {
        let app = self.app.0.clone();
        if app.rewriting_id.get_untracked().is_some() {
            return;
        }

        let Some(item) = self.session.read(|s| s.rendered().into_iter().find(|t| t.id == id)) else {
            return;
        };
        if item.text.trim().is_empty() {
            return;
        }

        let scope = self.scope().clone();
        app.rewriting_id.set(Some(item.id.clone()));
        spawn_local(async move {
            if let Err(e) = app
                .rewriter
                .rewrite(&scope, &item.id, &item.text, item.color)
                .await
            {
                app.report("rewrite", e);
            }
            app.rewriting_id.set(None);
        });
    }

    pub fn dispose(&self) {
        self.disarm_autosave();
        self.session.detach();
    }
}
