//! AI rewrite of a todo's text, personalized with the owner's brief.

pub mod gemini;

pub use gemini::{GeminiClient, HttpTemplateSource};

use crate::errors::{RewriteError, RewriteServiceError, ValidationError};
use crate::gateway::{BriefGateway, TodoGateway, TodoScope};
use crate::models::{PersonalBrief, TodoColor, TodoUpdate};
use async_trait::async_trait;
use leptos::logging::{log, warn};
use std::sync::{Arc, Mutex};

/// Models tried in order until one returns text.
pub const REWRITE_MODELS: [&str; 5] = [
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash-lite-001",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-pro",
];

pub const MAX_REWRITE_TEXT_LEN: usize = 5000;

const NOT_PROVIDED: &str = "Not provided";

pub const DEFAULT_TEMPLATE: &str = "Rewrite the following todo item to be clear and concise. \
Keep the essential meaning but make it more direct and actionable. \
Consider the user's priorities and personal context when rewriting. \
Return only the rewritten text, nothing else.

Personal Context:
Introduction: {intro}
Who You Are: {whoYouAre}
What You Want to Achieve: {whatYouWant}

Todo Information:
Text: {text}
Priority: {priority}

Rewritten:";

/// Where the prompt template comes from.
#[async_trait(?Send)]
pub trait TemplateSource: Send + Sync {
    async fn load(&self) -> Result<String, String>;
}

/// A text generation backend addressed by model name.
#[async_trait(?Send)]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, RewriteServiceError>;
}

/// Single global slot for the in-flight rewrite.
#[derive(Clone, Default)]
pub struct RewriteLock {
    holder: Arc<Mutex<Option<String>>>,
}

impl RewriteLock {
    /// Take the slot for `item_id`, or fail with `Busy` if it is taken.
    pub fn try_acquire(&self, item_id: &str) -> Result<RewriteGuard, RewriteError> {
        let mut holder = self.holder.lock().unwrap_or_else(|p| p.into_inner());
        if holder.is_some() {
            return Err(RewriteError::Busy);
        }
        *holder = Some(item_id.to_string());
        Ok(RewriteGuard {
            holder: self.holder.clone(),
        })
    }

    pub fn active_item(&self) -> Option<String> {
        self.holder
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// Releases the rewrite slot on drop.
pub struct RewriteGuard {
    holder: Arc<Mutex<Option<String>>>,
}

impl Drop for RewriteGuard {
    fn drop(&mut self) {
        *self.holder.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty { field: "text" });
    }
    let len = text.chars().count();
    if len > MAX_REWRITE_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: "text",
            max: MAX_REWRITE_TEXT_LEN,
            len,
        });
    }
    Ok(())
}

fn or_not_provided(s: &str) -> &str {
    if s.is_empty() {
        NOT_PROVIDED
    } else {
        s
    }
}

/// Fill every placeholder occurrence in one pass; substituted text is not rescanned.
pub fn compose_prompt(
    template: &str,
    brief: &PersonalBrief,
    text: &str,
    color: TodoColor,
) -> String {
    let values = [
        ("{intro}", or_not_provided(&brief.intro)),
        ("{whoYouAre}", or_not_provided(&brief.who_you_are)),
        ("{whatYouWant}", or_not_provided(&brief.what_you_want)),
        ("{text}", text),
        ("{priority}", color.label()),
    ];

    let mut out = String::with_capacity(template.len() + text.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Runs one rewrite at a time: validate, build the prompt, try each model, store the result.
#[derive(Clone)]
pub struct RewriteOrchestrator {
    lock: RewriteLock,
    todos: TodoGateway,
    brief: BriefGateway,
    templates: Arc<dyn TemplateSource>,
    service: Arc<dyn GenerationService>,
}

impl RewriteOrchestrator {
    pub fn new(
        todos: TodoGateway,
        brief: BriefGateway,
        templates: Arc<dyn TemplateSource>,
        service: Arc<dyn GenerationService>,
    ) -> Self {
        Self {
            lock: RewriteLock::default(),
            todos,
            brief,
            templates,
            service,
        }
    }

    pub fn lock(&self) -> &RewriteLock {
        &self.lock
    }

    pub async fn rewrite(
        &self,
        scope: &TodoScope,
        item_id: &str,
        current_text: &str,
        color: TodoColor,
    ) -> Result<String, RewriteError> {
        let _guard = self.lock.try_acquire(item_id)?;
        validate_text(current_text)?;

        let brief = match self.brief.get().await {
            Ok(brief) => brief,
            Err(e) => {
                warn!("[Rewrite] brief unavailable, continuing without it: {}", e);
                PersonalBrief::default()
            }
        };

        let template = match self.templates.load().await {
            Ok(t) if !t.trim().is_empty() => t,
            Ok(_) => DEFAULT_TEMPLATE.to_string(),
            Err(e) => {
                warn!("[Rewrite] template unavailable, using built-in: {}", e);
                DEFAULT_TEMPLATE.to_string()
            }
        };

        let prompt = compose_prompt(&template, &brief, current_text, color);
        let rewritten = self.generate(&prompt).await?;

        self.todos
            .update(scope, item_id, TodoUpdate::Text(rewritten.clone()))
            .await?;
        Ok(rewritten)
    }

    async fn generate(&self, prompt: &str) -> Result<String, RewriteServiceError> {
        let mut last_error = None;

        for model in REWRITE_MODELS {
            match self.service.generate(model, prompt).await {
                Ok(text) if !text.trim().is_empty() => {
                    log!("[Rewrite] succeeded with {}", model);
                    return Ok(text.trim().to_string());
                }
                Ok(_) => {
                    last_error = Some(RewriteServiceError::new(Some(model), "empty response"));
                }
                Err(e) => {
                    warn!("[Rewrite] model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RewriteServiceError::new(
                None,
                "All model attempts failed. Please check your API key and available models.",
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTodo;
    use crate::store::{MemoryStore, SharedStore};
    use futures::executor::block_on;

    struct FixedTemplate(Result<String, String>);

    #[async_trait(?Send)]
    impl TemplateSource for FixedTemplate {
        async fn load(&self) -> Result<String, String> {
            self.0.clone()
        }
    }

    /// Fails for every model listed in `failing`; records prompts and models.
    struct ScriptedService {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<(String, String)>>,
        lock_probe: Option<RewriteLock>,
    }

    impl ScriptedService {
        fn new(failing: Vec<&'static str>) -> Self {
            Self {
                failing,
                calls: Mutex::new(vec![]),
                lock_probe: None,
            }
        }
    }

    #[async_trait(?Send)]
    impl GenerationService for ScriptedService {
        async fn generate(&self, model: &str, prompt: &str) -> Result<String, RewriteServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string()));
            if let Some(lock) = &self.lock_probe {
                assert!(matches!(lock.try_acquire("other"), Err(RewriteError::Busy)));
            }
            if self.failing.contains(&model) {
                Err(RewriteServiceError::new(Some(model), format!("request failed (404): {model} not found")))
            } else {
                Ok(format!("  rewritten by {model}  "))
            }
        }
    }

    struct Fixture {
        store: SharedStore,
        scope: TodoScope,
        item: String,
    }

    fn fixture() -> Fixture {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let scope = TodoScope::list("u1", "l1");
        let mut todo = NewTodo::blank(Some("l1".to_string()), 0, 0);
        todo.text = "email bob".to_string();
        let item = block_on(TodoGateway::new(store.clone()).create(&scope, &todo)).unwrap();
        Fixture { store, scope, item }
    }

    fn orchestrator(
        fx: &Fixture,
        template: Result<String, String>,
        service: Arc<dyn GenerationService>,
    ) -> RewriteOrchestrator {
        RewriteOrchestrator::new(
            TodoGateway::new(fx.store.clone()),
            BriefGateway::new(fx.store.clone(), "u1"),
            Arc::new(FixedTemplate(template)),
            service,
        )
    }

    fn stored_text(fx: &Fixture) -> String {
        block_on(TodoGateway::new(fx.store.clone()).fetch(&fx.scope)).unwrap()[0]
            .text
            .clone()
    }

    #[test]
    fn test_compose_prompt_fills_every_placeholder() {
        let brief = PersonalBrief {
            intro: "Hi".to_string(),
            who_you_are: String::new(),
            what_you_want: "Ship it".to_string(),
        };
        let prompt = compose_prompt(
            "{intro}|{whoYouAre}|{whatYouWant}|{text}|{priority}|{text}|{unknown}",
            &brief,
            "write {priority}",
            TodoColor::Red,
        );
        assert_eq!(
            prompt,
            "Hi|Not provided|Ship it|write {priority}|Priority 1|write {priority}|{unknown}"
        );
    }

    #[test]
    fn test_validate_text_limits() {
        assert_eq!(
            validate_text("  "),
            Err(ValidationError::Empty { field: "text" })
        );
        assert!(validate_text(&"x".repeat(MAX_REWRITE_TEXT_LEN)).is_ok());
        assert!(matches!(
            validate_text(&"x".repeat(MAX_REWRITE_TEXT_LEN + 1)),
            Err(ValidationError::TooLong { len: 5001, .. })
        ));
    }

    #[test]
    fn test_lock_rejects_second_request_and_releases_on_drop() {
        let lock = RewriteLock::default();
        let guard = lock.try_acquire("a").unwrap();
        assert_eq!(lock.active_item(), Some("a".to_string()));
        assert!(matches!(lock.try_acquire("b"), Err(RewriteError::Busy)));
        drop(guard);
        assert!(lock.try_acquire("b").is_ok());
    }

    #[test]
    fn test_rewrite_falls_back_through_models_and_saves() {
        let fx = fixture();
        let service = Arc::new(ScriptedService::new(vec![
            "gemini-2.0-flash-lite",
            "gemini-2.0-flash-lite-001",
        ]));
        let orch = orchestrator(&fx, Err("offline".to_string()), service.clone());

        let out = block_on(orch.rewrite(&fx.scope, &fx.item, "email bob", TodoColor::Blue)).unwrap();

        assert_eq!(out, "rewritten by gemini-1.5-flash");
        assert_eq!(stored_text(&fx), "rewritten by gemini-1.5-flash");
        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].1.contains("Text: email bob"));
        assert!(calls[0].1.contains("Priority: Priority 3"));
        assert!(calls[0].1.contains("Introduction: Not provided"));
        assert_eq!(orch.lock().active_item(), None);
    }

    #[test]
    fn test_total_failure_leaves_item_untouched() {
        let fx = fixture();
        let service = Arc::new(ScriptedService::new(REWRITE_MODELS.to_vec()));
        let orch = orchestrator(&fx, Ok("{text}".to_string()), service);

        let err = block_on(orch.rewrite(&fx.scope, &fx.item, "email bob", TodoColor::None))
            .unwrap_err();

        match err {
            RewriteError::Service(e) => assert_eq!(e.model.as_deref(), Some("gemini-pro")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stored_text(&fx), "email bob");
        assert_eq!(orch.lock().active_item(), None);
    }

    #[test]
    fn test_invalid_text_never_reaches_service() {
        let fx = fixture();
        let service = Arc::new(ScriptedService::new(vec![]));
        let orch = orchestrator(&fx, Ok("{text}".to_string()), service.clone());

        let err = block_on(orch.rewrite(&fx.scope, &fx.item, "   ", TodoColor::None)).unwrap_err();
        assert!(matches!(err, RewriteError::Validation(_)));
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_lock_is_held_during_generation() {
        let fx = fixture();
        let orch_lock;
        let orch = {
            let mut service = ScriptedService::new(vec![]);
            let o = orchestrator(&fx, Ok("{text}".to_string()), Arc::new(ScriptedService::new(vec![])));
            orch_lock = o.lock().clone();
            service.lock_probe = Some(orch_lock.clone());
            RewriteOrchestrator {
                service: Arc::new(service),
                ..o
            }
        };

        block_on(orch.rewrite(&fx.scope, &fx.item, "email bob", TodoColor::None)).unwrap();
        assert_eq!(orch_lock.active_item(), None);
    }
}
