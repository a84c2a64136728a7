mod file;
mod redis;

pub use file::FileHistoryStore;
pub use self::redis::RedisHistoryStore;

use async_trait::async_trait;
use log::info;
use serde_json::{ Map, Value };
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::{ Category, ChatMessage, SessionSummary };

/// Number of prior exchanges fed back into a prompt.
pub const HISTORY_WINDOW_TURNS: usize = 3;
/// Answers longer than this (in chars) are cut in the conversation window.
pub const MAX_ANSWER_CHARS: usize = 500;
const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid session id '{0}'")]
    InvalidSession(String),
    #[error("history IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history record for '{0}' is unreadable: {1}")]
    Corrupted(String, String),
    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("redis history error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Session ids double as file names, so only a conservative character set is accepted.
pub fn validate_session_id(session_id: &str) -> Result<(), HistoryError> {
    let valid =
        !session_id.is_empty() &&
        session_id.len() <= MAX_SESSION_ID_LEN &&
        session_id != "." &&
        session_id != ".." &&
        session_id.chars().all(|c| (c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')));
    if valid {
        Ok(())
    } else {
        Err(HistoryError::InvalidSession(session_id.to_string()))
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one exchange, creating the session on first use. Durable on return.
    async fn append(
        &self,
        session_id: &str,
        query: &str,
        answer: &str,
        category: Category,
        metadata: Option<Map<String, Value>>
    ) -> Result<(), HistoryError>;

    /// Messages oldest first; `Some(k)` keeps only the last `k`. Unknown sessions read as empty.
    async fn read(
        &self,
        session_id: &str,
        limit: Option<usize>
    ) -> Result<Vec<ChatMessage>, HistoryError>;

    async fn delete(&self, session_id: &str) -> Result<bool, HistoryError>;

    /// Summaries, most recently updated first.
    async fn list(&self) -> Result<Vec<SessionSummary>, HistoryError>;

    async fn clear_all(&self) -> Result<usize, HistoryError>;

    async fn render_window(&self, session_id: &str, last_n: usize) -> Result<String, HistoryError> {
        let messages = self.read(session_id, Some(last_n)).await?;
        Ok(format_history_for_prompt(&messages))
    }
}

pub fn create_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "file" => {
            let store = FileHistoryStore::new(&args.history_dir)?;
            Ok(Arc::new(store))
        }
        "redis" => {
            let store = RedisHistoryStore::new(
                &args.history_redis_url,
                &args.history_redis_prefix,
                args.history_redis_scan_count
            )?;
            Ok(Arc::new(store))
        }
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    let location = match args.history_type.to_lowercase().as_str() {
        "redis" => args.history_redis_url.as_str(),
        _ => args.history_dir.as_str(),
    };
    info!("Chat history will be stored in: {} at {}", args.history_type, location);
    create_history_store(args)
}

fn truncate_answer(answer: &str) -> String {
    match answer.char_indices().nth(MAX_ANSWER_CHARS) {
        Some((cut, _)) => format!("{}...", &answer[..cut]),
        None => answer.to_string(),
    }
}

/// Renders prior exchanges as a transcript block; empty when there is no history.
pub fn format_history_for_prompt(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let mut parts = vec![String::from("PREVIOUS CONVERSATION:")];
    for msg in messages {
        parts.push(format!("\nUser: {}", msg.query));
        parts.push(format!("Assistant: {}", truncate_answer(&msg.answer)));
    }
    parts.push(String::from("\n---\nTHE CURRENT QUESTION MAY RELATE TO THE CONVERSATION ABOVE.\n"));
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(query: &str, answer: &str) -> ChatMessage {
        ChatMessage {
            timestamp: Utc::now(),
            query: query.to_string(),
            answer: answer.to_string(),
            category: Category::Learning,
            metadata: None,
        }
    }

    #[test]
    fn accepts_plain_ids_and_rejects_paths() {
        assert!(validate_session_id("user_42-session.1").is_ok());
        assert!(validate_session_id(&"a".repeat(128)).is_ok());

        for bad in ["", ".", "..", "../etc/passwd", "a/b", "with space", "ünï"] {
            assert!(
                matches!(validate_session_id(bad), Err(HistoryError::InvalidSession(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(validate_session_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn empty_history_renders_nothing() {
        assert_eq!(format_history_for_prompt(&[]), "");
    }

    #[test]
    fn window_lists_turns_in_order() {
        let text = format_history_for_prompt(&[message("q1", "a1"), message("q2", "a2")]);
        assert!(text.starts_with("PREVIOUS CONVERSATION:"));
        let first = text.find("User: q1\nAssistant: a1").unwrap();
        let second = text.find("User: q2\nAssistant: a2").unwrap();
        assert!(first < second);
    }

    #[test]
    fn long_answers_are_cut_at_char_boundary() {
        let long = "é".repeat(MAX_ANSWER_CHARS + 20);
        let text = format_history_for_prompt(&[message("q", &long)]);
        let expected = format!("Assistant: {}...", "é".repeat(MAX_ANSWER_CHARS));
        assert!(text.contains(&expected));
        assert!(!text.contains(&"é".repeat(MAX_ANSWER_CHARS + 1)));

        let exact = "x".repeat(MAX_ANSWER_CHARS);
        assert!(!format_history_for_prompt(&[message("q", &exact)]).contains("..."));
    }
}
