use thiserror::Error;

/// A read or write against the remote document store failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("network error: {0}")]
    Network(String),

    #[error("storage request failed ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("could not decode stored document: {0}")]
    Decode(String),
}

impl StorageError {
    pub(crate) fn decode(e: impl std::fmt::Display) -> Self {
        Self::Decode(e.to_string())
    }

    pub(crate) fn network(e: impl std::fmt::Display) -> Self {
        Self::Network(e.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Input rejected before any network call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Empty { field: &'static str },

    #[error("{field} exceeds maximum length of {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },
}

/// Every configured model failed; carries the last failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RewriteServiceError {
    pub model: Option<String>,
    pub message: String,
}

impl RewriteServiceError {
    pub fn new(model: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            model: model.map(str::to_string),
            message: message.into(),
        }
    }

    /// Most specific user-facing text for the failure.
    pub fn user_message(&self) -> String {
        let m = self.message.as_str();
        let lower = m.to_lowercase();

        if lower.contains("not configured") {
            "Gemini API key is not configured. Set GEMINI_API_KEY in the page config.".to_string()
        } else if m.contains("API_KEY") || lower.contains("api key") || m.contains("401") {
            "Invalid Gemini API key. Please check your API key configuration.".to_string()
        } else if lower.contains("quota") || lower.contains("rate limit") || m.contains("429") {
            "API quota exceeded. Please try again later or check your quota limits.".to_string()
        } else if lower.contains("safety") {
            "Content was filtered by safety settings. Please try with different text.".to_string()
        } else if lower.contains("network")
            || lower.contains("fetch failed")
            || lower.contains("timed out")
            || lower.contains("timeout")
        {
            "Network error: Unable to connect to Gemini API. Please check your connection and try again."
                .to_string()
        } else if m.contains("404") || lower.contains("not found") {
            match &self.model {
                Some(model) => format!("Gemini model not found. The model '{model}' might not be available."),
                None => "Gemini model not found.".to_string(),
            }
        } else {
            m.to_string()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RewriteError {
    /// Another rewrite is in flight; requests are rejected, not queued.
    #[error("a rewrite is already in progress")]
    Busy,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Service(#[from] RewriteServiceError),
}

impl RewriteError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Service(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Anything an explicit user action can surface in the UI.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Storage(_) => "Could not save your changes. Please try again.".to_string(),
            Self::Validation(e) => e.to_string(),
            Self::Rewrite(e) => e.user_message(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
