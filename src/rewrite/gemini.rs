use super::{GenerationService, TemplateSource};
use crate::errors::RewriteServiceError;
use async_trait::async_trait;
use futures::future::{select, Either};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Upper bound for one model attempt, request and body included.
pub const ATTEMPT_TIMEOUT_MS: u32 = 30_000;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini `generateContent` over REST.
pub struct GeminiClient {
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    fn endpoint(model: &str, key: &str) -> String {
        format!(
            "{GEMINI_BASE}/{}:generateContent?key={}",
            urlencoding::encode(model),
            urlencoding::encode(key)
        )
    }
}

/// `work`'s output, or `None` when `deadline` fires first.
async fn before_deadline<T>(
    work: impl Future<Output = T>,
    deadline: impl Future<Output = ()>,
) -> Option<T> {
    match select(Box::pin(work), Box::pin(deadline)).await {
        Either::Left((out, _)) => Some(out),
        Either::Right(((), _)) => None,
    }
}

/// First candidate's text, or a message explaining why there is none.
fn extract_text(res: GenerateResponse) -> Result<String, String> {
    if let Some(reason) = res.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(format!("prompt blocked by safety settings ({reason})"));
    }

    let Some(candidate) = res.candidates.into_iter().next() else {
        return Err("empty response".to_string());
    };

    let text = candidate
        .content
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(match candidate.finish_reason.as_deref() {
            Some("SAFETY") => "response blocked by safety settings".to_string(),
            _ => "empty response".to_string(),
        });
    }
    Ok(text)
}

#[async_trait(?Send)]
impl GenerationService for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, RewriteServiceError> {
        let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(RewriteServiceError::new(
                None,
                "Gemini API key is not configured",
            ));
        };

        let attempt = Self::attempt(model, key, prompt);
        let deadline = gloo_timers::future::TimeoutFuture::new(ATTEMPT_TIMEOUT_MS);
        before_deadline(attempt, deadline).await.unwrap_or_else(|| {
            Err(RewriteServiceError::new(
                Some(model),
                format!("request timed out after {}s", ATTEMPT_TIMEOUT_MS / 1000),
            ))
        })
    }
}

impl GeminiClient {
    async fn attempt(model: &str, key: &str, prompt: &str) -> Result<String, RewriteServiceError> {
        let client = reqwest::Client::new();
        let res = client
            .post(Self::endpoint(model, key))
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await
            .map_err(|e| RewriteServiceError::new(Some(model), format!("network error: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(RewriteServiceError::new(
                Some(model),
                format!("request failed ({}): {}", status.as_u16(), body),
            ));
        }

        let parsed: GenerateResponse = res
            .json()
            .await
            .map_err(|e| RewriteServiceError::new(Some(model), format!("invalid response: {e}")))?;

        extract_text(parsed).map_err(|m| RewriteServiceError::new(Some(model), m))
    }
}

/// Prompt template fetched as a plain-text file.
pub struct HttpTemplateSource {
    url: String,
}

impl HttpTemplateSource {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait(?Send)]
impl TemplateSource for HttpTemplateSource {
    async fn load(&self) -> Result<String, String> {
        let res = reqwest::Client::new()
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            return Err(format!("template request failed ({})", res.status().as_u16()));
        }
        res.text().await.map_err(|e| e.to_string())
    }
}
