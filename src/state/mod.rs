pub(crate) mod todo_sync;

pub(crate) use todo_sync::TodoSyncController;

use crate::config::EnvConfig;
use crate::errors::AppError;
use crate::gateway::{BriefGateway, GoalGateway, ListGateway, PreferencesGateway, TodoGateway};
use crate::models::{TodoList, UserPreferences};
use crate::rewrite::{GeminiClient, HttpTemplateSource, RewriteOrchestrator};
use crate::store::{FirestoreStore, MemoryStore, SharedStore, Subscription};
use leptos::logging::{error, log};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::sync::Arc;

pub(crate) fn build_store(config: &EnvConfig) -> SharedStore {
    match &config.firestore_project_id {
        Some(project) => {
            log!("[App] using Firestore project {}", project);
            Arc::new(FirestoreStore::new(
                project.clone(),
                config.firestore_api_key.clone(),
                config.auth_token.clone(),
            ))
        }
        None => {
            log!("[App] FIRESTORE_PROJECT_ID not set; data is kept in memory");
            Arc::new(MemoryStore::new())
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: EnvConfig,
    pub store: SharedStore,

    /// Sidebar lists, live.
    pub lists: RwSignal<Vec<TodoList>>,
    pub lists_loaded: RwSignal<bool>,

    pub preferences: RwSignal<UserPreferences>,

    /// Banner for failed user actions.
    pub error: RwSignal<Option<String>>,

    pub rewriter: RewriteOrchestrator,
    pub rewriting_id: RwSignal<Option<String>>,

    /// App-lifetime subscriptions (lists, preferences).
    _subscriptions: StoredValue<Vec<Subscription>>,
}

impl AppState {
    pub fn new() -> Self {
        let config = EnvConfig::new();
        let store = build_store(&config);

        let rewriter = RewriteOrchestrator::new(
            TodoGateway::new(store.clone()),
            BriefGateway::new(store.clone(), &config.user_id),
            Arc::new(HttpTemplateSource::new(config.prompt_template_url.clone())),
            Arc::new(GeminiClient::new(config.gemini_api_key.clone())),
        );

        let lists = RwSignal::new(vec![]);
        let lists_loaded = RwSignal::new(false);
        let preferences = RwSignal::new(UserPreferences::default());

        let lists_sub = ListGateway::new(store.clone(), &config.user_id).subscribe(move |next| {
            lists.set(next);
            lists_loaded.set(true);
        });
        let prefs_sub = PreferencesGateway::new(store.clone(), &config.user_id)
            .subscribe(move |next| preferences.set(next));

        Self {
            config,
            store,
            lists,
            lists_loaded,
            preferences,
            error: RwSignal::new(None),
            rewriter,
            rewriting_id: RwSignal::new(None),
            _subscriptions: StoredValue::new(vec![lists_sub, prefs_sub]),
        }
    }

    pub fn owner(&self) -> &str {
        &self.config.user_id
    }

    pub fn todos(&self) -> TodoGateway {
        TodoGateway::new(self.store.clone())
    }

    pub fn lists_gateway(&self) -> ListGateway {
        ListGateway::new(self.store.clone(), self.owner())
    }

    pub fn goals(&self) -> GoalGateway {
        GoalGateway::new(self.store.clone(), self.owner())
    }

    pub fn brief(&self) -> BriefGateway {
        BriefGateway::new(self.store.clone(), self.owner())
    }

    pub fn preferences_gateway(&self) -> PreferencesGateway {
        PreferencesGateway::new(self.store.clone(), self.owner())
    }

    /// Log a failed user action and show it in the banner.
    pub fn report(&self, action: &str, e: impl Into<AppError>) {
        let e = e.into();
        error!("[App] {} failed: {}", action, e);
        self.error.set(Some(e.user_message()));
    }

    pub fn clear_error(&self) {
        self.error.set(None);
    }

    pub fn set_show_completed(&self, show_completed: bool) {
        let prefs = UserPreferences { show_completed };
        self.preferences.set(prefs);

        let s2 = self.clone();
        spawn_local(async move {
            if let Err(e) = s2.preferences_gateway().save(&prefs).await {
                s2.report("save preferences", e);
            }
        });
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
