use thiserror::Error;

use crate::config::prompt::PromptError;
use crate::history::HistoryError;
use crate::llm::LlmError;
use crate::progress::ProgressError;

/// Message shown to the user whenever the backend refuses to answer on policy grounds.
pub const CONTENT_BLOCKED_MESSAGE: &str =
    "Sorry, I can't help with that request. Please rephrase your question and try again.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("query classification failed: {0}")]
    ClassificationFailure(LlmError),
    #[error("{}", CONTENT_BLOCKED_MESSAGE)]
    ContentBlocked(String),
    #[error("LLM service unavailable after {attempts} attempts: {last}")]
    GatewayExhausted {
        attempts: u32,
        last: String,
    },
    #[error("LLM error: {0}")]
    Llm(LlmError),
    #[error("data source unavailable: {0}")]
    DataSourceUnavailable(String),
    #[error("session '{0}' not found")]
    SessionNotFound(String),
    #[error("invalid session id '{0}'")]
    InvalidSession(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("history error: {0}")]
    History(HistoryError),
}

impl AssistantError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AssistantError::ClassificationFailure(_) => "classification_failure",
            AssistantError::ContentBlocked(_) => "content_blocked",
            AssistantError::GatewayExhausted { .. } => "gateway_exhausted",
            AssistantError::Llm(_) => "llm_error",
            AssistantError::DataSourceUnavailable(_) => "data_source_unavailable",
            AssistantError::SessionNotFound(_) => "session_not_found",
            AssistantError::InvalidSession(_) => "invalid_session",
            AssistantError::InvalidRequest(_) => "invalid_request",
            AssistantError::Prompt(_) => "prompt_error",
            AssistantError::History(_) => "history_error",
        }
    }

    /// Maps a gateway failure during classification; policy refusals keep their own kind.
    pub fn from_classification(err: LlmError) -> Self {
        match err {
            LlmError::ContentBlocked(reason) => AssistantError::ContentBlocked(reason),
            other => AssistantError::ClassificationFailure(other),
        }
    }
}

impl From<LlmError> for AssistantError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ContentBlocked(reason) => AssistantError::ContentBlocked(reason),
            LlmError::Exhausted { attempts, last } =>
                AssistantError::GatewayExhausted {
                    attempts,
                    last: last.to_string(),
                },
            other => AssistantError::Llm(other),
        }
    }
}

impl From<HistoryError> for AssistantError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::InvalidSession(id) => AssistantError::InvalidSession(id),
            other => AssistantError::History(other),
        }
    }
}

impl From<ProgressError> for AssistantError {
    fn from(err: ProgressError) -> Self {
        AssistantError::DataSourceUnavailable(err.to_string())
    }
}
