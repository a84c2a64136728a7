use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };
use std::fmt;
use std::str::FromStr;

/// Intent a user query is routed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tracking,
    Recommendation,
    Learning,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tracking => "tracking",
            Category::Recommendation => "recommendation",
            Category::Learning => "learning",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tracking" => Ok(Category::Tracking),
            "recommendation" => Ok(Category::Recommendation),
            "learning" => Ok(Category::Learning),
            other => Err(format!("Invalid category: '{}'", other)),
        }
    }
}

/// One question/answer exchange. Never edited once written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub answer: String,
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Full persisted record of a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            created_at: now,
            last_updated: None,
            messages: Vec::new(),
        }
    }

    /// Appends a message; `last_updated` never moves backwards.
    pub fn push(&mut self, message: ChatMessage) {
        let stamp = match self.last_updated {
            Some(prev) if prev > message.timestamp => prev,
            _ => message.timestamp,
        };
        self.messages.push(message);
        self.last_updated = Some(stamp);
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            created_at: Some(self.created_at),
            last_updated: self.last_updated,
            message_count: self.messages.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub message_count: usize,
}

/// Most recently updated first; sessions without `last_updated` go last.
pub fn sort_summaries(sessions: &mut [SessionSummary]) {
    sessions.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
}

/// Returns the last `limit` messages, oldest first. `None` returns everything.
pub fn tail(messages: &[ChatMessage], limit: Option<usize>) -> Vec<ChatMessage> {
    let start = match limit {
        Some(k) => messages.len().saturating_sub(k),
        None => 0,
    };
    messages[start..].to_vec()
}

/// Result of routing one query through the assistant.
#[derive(Clone, Debug, Serialize)]
pub struct ChatOutcome {
    pub answer: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(query: &str, at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            timestamp: at,
            query: query.into(),
            answer: "ok".into(),
            category: Category::Learning,
            metadata: None,
        }
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Tracking".parse::<Category>().unwrap(), Category::Tracking);
        assert_eq!(" recommendation ".parse::<Category>().unwrap(), Category::Recommendation);
        assert!("unknown".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Recommendation).unwrap();
        assert_eq!(json, "\"recommendation\"");
    }

    #[test]
    fn last_updated_never_moves_backwards() {
        let now = Utc::now();
        let mut conv = Conversation::new("s1", now);
        conv.push(message("first", now));
        conv.push(message("second", now - Duration::seconds(30)));
        assert_eq!(conv.last_updated, Some(now));
        assert_eq!(conv.messages.len(), 2);
    }

    #[test]
    fn tail_keeps_order_and_bounds() {
        let now = Utc::now();
        let messages: Vec<_> = (0..5).map(|i| message(&format!("q{}", i), now)).collect();

        let last_two = tail(&messages, Some(2));
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].query, "q3");
        assert_eq!(last_two[1].query, "q4");

        assert_eq!(tail(&messages, Some(10)).len(), 5);
        assert!(tail(&messages, Some(0)).is_empty());
        assert_eq!(tail(&messages, None).len(), 5);
    }

    #[test]
    fn summaries_sort_by_last_updated_desc_with_missing_last() {
        let now = Utc::now();
        let mut sessions = vec![
            SessionSummary {
                session_id: "none".into(),
                created_at: None,
                last_updated: None,
                message_count: 0,
            },
            SessionSummary {
                session_id: "old".into(),
                created_at: Some(now),
                last_updated: Some(now - Duration::hours(1)),
                message_count: 1,
            },
            SessionSummary {
                session_id: "new".into(),
                created_at: Some(now),
                last_updated: Some(now),
                message_count: 2,
            },
        ];
        sort_summaries(&mut sessions);
        let ids: Vec<_> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "none"]);
    }
}
