use async_trait::async_trait;
use chrono::Utc;
use log::{ debug, warn };
use serde_json::{ Map, Value };
use std::collections::HashMap;
use std::path::{ Path, PathBuf };
use std::sync::{ Arc, Mutex };
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;

use super::{ validate_session_id, HistoryError, HistoryStore };
use crate::models::chat::{ sort_summaries, tail, Category, ChatMessage, Conversation, SessionSummary };

const RECORD_EXTENSION: &str = "json";

/// One pretty-printed JSON record per session under `dir`.
///
/// Writes go to a hidden temp file that is fsynced and renamed over the
/// record, so readers only ever see a complete record. Mutations of one
/// session are serialized through a per-session async mutex.
pub struct FileHistoryStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FileHistoryStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, HistoryError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", session_id, RECORD_EXTENSION))
    }

    fn temp_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!(".{}.{}.tmp", session_id, RECORD_EXTENSION))
    }

    fn session_lock(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(session_id.to_string()).or_default())
    }

    /// Drops the map entry once no other task holds or waits on it.
    fn release_lock(&self, session_id: &str, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one in `lock`.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(session_id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    async fn load(&self, session_id: &str) -> Result<Option<Conversation>, HistoryError> {
        load_record(&self.record_path(session_id)).await
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), HistoryError> {
        let body = serde_json::to_vec_pretty(conversation)?;
        let tmp_path = self.temp_path(&conversation.session_id);

        let mut tmp_file = fs::File::create(&tmp_path).await?;
        tmp_file.write_all(&body).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);

        fs::rename(&tmp_path, self.record_path(&conversation.session_id)).await?;
        Ok(())
    }

    /// Session ids of every record file currently in the directory.
    async fn session_ids(&self) -> Result<Vec<String>, HistoryError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_session_id(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

impl FileHistoryStore {
    async fn append_locked(
        &self,
        session_id: &str,
        query: &str,
        answer: &str,
        category: Category,
        metadata: Option<Map<String, Value>>
    ) -> Result<(), HistoryError> {
        let now = Utc::now();
        let mut conversation = self
            .load(session_id).await?
            .unwrap_or_else(|| Conversation::new(session_id, now));
        conversation.push(ChatMessage {
            timestamp: now,
            query: query.to_string(),
            answer: answer.to_string(),
            category,
            metadata,
        });
        self.save(&conversation).await?;

        debug!(
            "Appended {} message to session {} ({} total)",
            category,
            session_id,
            conversation.messages.len()
        );
        Ok(())
    }
}

async fn load_record(path: &Path) -> Result<Option<Conversation>, HistoryError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(None);
        }
        Err(e) => {
            return Err(e.into());
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| HistoryError::Corrupted(path.display().to_string(), e.to_string()))
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(
        &self,
        session_id: &str,
        query: &str,
        answer: &str,
        category: Category,
        metadata: Option<Map<String, Value>>
    ) -> Result<(), HistoryError> {
        validate_session_id(session_id)?;
        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.append_locked(session_id, query, answer, category, metadata).await
        };
        self.release_lock(session_id, lock);
        result
    }

    async fn read(
        &self,
        session_id: &str,
        limit: Option<usize>
    ) -> Result<Vec<ChatMessage>, HistoryError> {
        validate_session_id(session_id)?;
        Ok(match self.load(session_id).await? {
            Some(conversation) => tail(&conversation.messages, limit),
            None => Vec::new(),
        })
    }

    async fn delete(&self, session_id: &str) -> Result<bool, HistoryError> {
        validate_session_id(session_id)?;
        if !fs::try_exists(self.record_path(session_id)).await? {
            return Ok(false);
        }

        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            match fs::remove_file(self.record_path(session_id)).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        };
        self.release_lock(session_id, lock);
        result
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, HistoryError> {
        let mut sessions = Vec::new();
        for session_id in self.session_ids().await? {
            match self.load(&session_id).await {
                Ok(Some(conversation)) => sessions.push(conversation.summary()),
                Ok(None) => {}
                Err(e) => warn!("Skipping session {}: {}", session_id, e),
            }
        }
        sort_summaries(&mut sessions);
        Ok(sessions)
    }

    async fn clear_all(&self) -> Result<usize, HistoryError> {
        let mut deleted = 0;
        for session_id in self.session_ids().await? {
            if self.delete(&session_id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
