pub mod chat;
pub mod gateway;

use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Ollama,
    OpenAI,
    Gemini,
    DeepSeek,
    XAI,
    Groq,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}

impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(LlmType::Ollama),
            "openai" => Ok(LlmType::OpenAI),
            "gemini" => Ok(LlmType::Gemini),
            "deepseek" => Ok(LlmType::DeepSeek),
            "xai" => Ok(LlmType::XAI),
            "groq" => Ok(LlmType::Groq),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Gemini,
            api_key: None,
            completion_model: None,
            base_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Normalized failure of a generation call.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Response blocked by content policy: {0}")]
    ContentBlocked(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<LlmError>,
    },

    #[error("API request failed (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
    },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Rate limits and connectivity/server failures; everything else fails fast.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::RateLimited(_) | LlmError::Unavailable(_))
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            body.trim().to_string()
        };
        match status {
            429 => LlmError::RateLimited(message),
            408 => LlmError::Unavailable(message),
            501 => LlmError::Api { status, message },
            500..=599 => LlmError::Unavailable(message),
            _ => LlmError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs may carry credentials.
        let err = err.without_url();
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            return LlmError::Unavailable(err.to_string());
        }
        if let Some(status) = err.status() {
            return LlmError::from_status(status.as_u16(), &err.to_string());
        }
        LlmError::InvalidResponse(err.to_string())
    }
}

pub fn parse_llm_type(type_str: &str) -> Result<LlmType, String> {
    type_str.parse::<LlmType>().map_err(|_| format!("Unsupported LLM type: {}", type_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_error_classes() {
        assert!(matches!(LlmError::from_status(429, "quota"), LlmError::RateLimited(_)));
        assert!(matches!(LlmError::from_status(503, ""), LlmError::Unavailable(_)));
        assert!(matches!(LlmError::from_status(500, "boom"), LlmError::Unavailable(_)));
        assert!(
            matches!(LlmError::from_status(400, "bad"), LlmError::Api { status: 400, .. })
        );
    }

    #[test]
    fn any_server_error_but_not_implemented_is_transient() {
        for status in [520, 529, 599] {
            assert!(LlmError::from_status(status, "").is_transient(), "status {}", status);
        }
        assert!(
            matches!(LlmError::from_status(501, ""), LlmError::Api { status: 501, .. })
        );
        assert!(!LlmError::from_status(404, "").is_transient());
    }

    #[test]
    fn only_rate_limit_and_unavailable_are_transient() {
        assert!(LlmError::RateLimited("x".into()).is_transient());
        assert!(LlmError::Unavailable("x".into()).is_transient());
        assert!(!LlmError::ContentBlocked("x".into()).is_transient());
        assert!(!(LlmError::Api { status: 400, message: "x".into() }).is_transient());
        assert!(!LlmError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn parses_llm_types() {
        assert_eq!(parse_llm_type("Gemini").unwrap(), LlmType::Gemini);
        assert_eq!(parse_llm_type("groq").unwrap(), LlmType::Groq);
        assert!(parse_llm_type("anthropic").is_err());
    }
}
