use serde::{Deserialize, Serialize};

/// Owner id used when the page does not configure one.
pub const DEFAULT_OWNER: &str = "local-user";

const TEMPLATE_PATH: &str = "/prompts/rewrite-todo.txt";

/// Runtime configuration, read from `window.ENV`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    /// Without a project id the app runs on the in-memory store.
    pub firestore_project_id: Option<String>,
    pub firestore_api_key: Option<String>,
    pub auth_token: Option<String>,
    pub user_id: String,
    pub gemini_api_key: Option<String>,
    pub prompt_template_url: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let origin = web_sys::window()
            .and_then(|w| w.location().origin().ok())
            .unwrap_or_default();

        let env = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object());

        Self::from_lookup(&origin, |key| {
            let env = env.as_ref()?;
            js_sys::Reflect::get(env, &key.into())
                .ok()
                .and_then(|v| v.as_string())
        })
    }

    /// Build from a key lookup. Each key is tried as `API_KEY` first, then `api_key`.
    pub fn from_lookup(origin: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .or_else(|| lookup(&key.to_lowercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            firestore_project_id: get("FIRESTORE_PROJECT_ID"),
            firestore_api_key: get("FIRESTORE_API_KEY"),
            auth_token: get("AUTH_TOKEN"),
            user_id: get("USER_ID").unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            gemini_api_key: get("GEMINI_API_KEY"),
            prompt_template_url: get("PROMPT_TEMPLATE_URL")
                .unwrap_or_else(|| format!("{}{}", origin.trim_end_matches('/'), TEMPLATE_PATH)),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}
