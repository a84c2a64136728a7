use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use log::{ debug, error, warn };
use redis::{ AsyncCommands, Client, Script };
use serde_json::{ Map, Value };

use super::{ validate_session_id, HistoryError, HistoryStore };
use crate::models::chat::{ sort_summaries, Category, ChatMessage, SessionSummary };

const META_SUFFIX: &str = ":meta";
const MESSAGES_SUFFIX: &str = ":messages";

// KEYS[1] meta hash, KEYS[2] message list; ARGV[1] now (ms), ARGV[2] message JSON.
const APPEND_SCRIPT: &str =
    r#"
redis.call('HSETNX', KEYS[1], 'created_at', ARGV[1])
local prev = tonumber(redis.call('HGET', KEYS[1], 'last_updated') or '0')
if tonumber(ARGV[1]) > prev then
    redis.call('HSET', KEYS[1], 'last_updated', ARGV[1])
end
return redis.call('RPUSH', KEYS[2], ARGV[2])
"#;

/// Session metadata in a hash and messages in a list, both under `key_prefix`.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
    scan_count: usize,
    append_script: Script,
}

impl RedisHistoryStore {
    pub fn new(url: &str, key_prefix: &str, scan_count: usize) -> Result<Self, HistoryError> {
        Ok(Self {
            client: Client::open(url)?,
            key_prefix: key_prefix.to_string(),
            scan_count: scan_count.max(1),
            append_script: Script::new(APPEND_SCRIPT),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn meta_key(&self, session_id: &str) -> String {
        format!("{}{}{}", self.key_prefix, session_id, META_SUFFIX)
    }

    fn messages_key(&self, session_id: &str) -> String {
        format!("{}{}{}", self.key_prefix, session_id, MESSAGES_SUFFIX)
    }

    fn session_id_from_meta_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.key_prefix.as_str())?.strip_suffix(META_SUFFIX)
    }

    async fn session_ids(
        &self,
        conn: &mut redis::aio::MultiplexedConnection
    ) -> Result<Vec<String>, HistoryError> {
        let pattern = format!("{}*{}", self.key_prefix, META_SUFFIX);
        let mut cursor: u64 = 0;
        let mut ids = Vec::new();
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(conn).await?;
            ids.extend(
                keys
                    .iter()
                    .filter_map(|k| self.session_id_from_meta_key(k))
                    .map(str::to_string)
            );
            if next == 0 {
                break;
            }
            cursor = next;
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn delete_with(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        session_id: &str
    ) -> Result<bool, HistoryError> {
        let keys = vec![self.meta_key(session_id), self.messages_key(session_id)];
        let removed: i64 = conn.del(keys).await?;
        Ok(removed > 0)
    }
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

/// An unreadable entry fails the whole read rather than shortening the history.
fn decode_messages(key: &str, json_entries: &[String]) -> Result<Vec<ChatMessage>, HistoryError> {
    json_entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_str::<ChatMessage>(entry).map_err(|e| {
                error!("Error parsing history entry {} of {}: {}", index, key, e);
                HistoryError::Corrupted(format!("{}[{}]", key, index), e.to_string())
            })
        })
        .collect()
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn append(
        &self,
        session_id: &str,
        query: &str,
        answer: &str,
        category: Category,
        metadata: Option<Map<String, Value>>
    ) -> Result<(), HistoryError> {
        validate_session_id(session_id)?;
        let mut conn = self.get_connection().await?;

        let now = Utc::now();
        let message = ChatMessage {
            timestamp: now,
            query: query.to_string(),
            answer: answer.to_string(),
            category,
            metadata,
        };
        let json_msg = serde_json::to_string(&message)?;

        let len: i64 = self.append_script
            .key(self.meta_key(session_id))
            .key(self.messages_key(session_id))
            .arg(now.timestamp_millis())
            .arg(json_msg)
            .invoke_async(&mut conn).await?;
        debug!("Appended {} message to session {} ({} total)", category, session_id, len);
        Ok(())
    }

    async fn read(
        &self,
        session_id: &str,
        limit: Option<usize>
    ) -> Result<Vec<ChatMessage>, HistoryError> {
        validate_session_id(session_id)?;
        let start = match limit {
            Some(0) => {
                return Ok(Vec::new());
            }
            Some(k) => -(k.min(isize::MAX as usize) as isize),
            None => 0,
        };

        let mut conn = self.get_connection().await?;
        let json_entries: Vec<String> = conn.lrange(self.messages_key(session_id), start, -1).await?;

        decode_messages(&self.messages_key(session_id), &json_entries)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, HistoryError> {
        validate_session_id(session_id)?;
        let mut conn = self.get_connection().await?;
        self.delete_with(&mut conn, session_id).await
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, HistoryError> {
        let mut conn = self.get_connection().await?;
        let mut sessions = Vec::new();

        for session_id in self.session_ids(&mut conn).await? {
            let fetched: Result<(Option<i64>, Option<i64>, usize), _> = redis::pipe()
                .hget(self.meta_key(&session_id), "created_at")
                .hget(self.meta_key(&session_id), "last_updated")
                .llen(self.messages_key(&session_id))
                .query_async(&mut conn).await;
            match fetched {
                Ok((created_at, last_updated, message_count)) => {
                    sessions.push(SessionSummary {
                        session_id,
                        created_at: from_millis(created_at),
                        last_updated: from_millis(last_updated),
                        message_count,
                    });
                }
                Err(e) => warn!("Skipping session {}: {}", session_id, e),
            }
        }
        sort_summaries(&mut sessions);
        Ok(sessions)
    }

    async fn clear_all(&self) -> Result<usize, HistoryError> {
        let mut conn = self.get_connection().await?;
        let mut deleted = 0;
        for session_id in self.session_ids(&mut conn).await? {
            if self.delete_with(&mut conn, &session_id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
