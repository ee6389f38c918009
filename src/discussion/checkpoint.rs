use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use super::consensus::ConsensusState;
use super::cursor::Cursor;
use crate::error::Result;
use crate::thread::ThreadId;

/// Persisted progress of one session on one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub thread_id: ThreadId,
    pub topic: String,
    pub cursor: Cursor,
    pub consensus_state: ConsensusState,
    pub updated_at: DateTime<Utc>,
}

impl SessionCheckpoint {
    pub fn new(
        thread_id: ThreadId,
        topic: impl Into<String>,
        cursor: Cursor,
        consensus_state: ConsensusState,
    ) -> Self {
        Self {
            thread_id,
            topic: topic.into(),
            cursor,
            consensus_state,
            updated_at: Utc::now(),
        }
    }
}

/// One JSON file per thread under the sessions directory.
pub struct CursorStore {
    sessions_dir: PathBuf,
}

impl CursorStore {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.sessions_dir).await?;
        self.recover_interrupted_writes().await;
        Ok(())
    }

    fn path(&self, thread_id: ThreadId) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", thread_id))
    }

    pub async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()> {
        let path = self.path(checkpoint.thread_id);
        let content = serde_json::to_string_pretty(checkpoint)?;
        write_atomic(&path, &content).await
    }

    /// `None` when no checkpoint exists or it belongs to another thread.
    pub async fn load(&self, thread_id: ThreadId) -> Result<Option<SessionCheckpoint>> {
        let path = self.path(thread_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        let checkpoint: SessionCheckpoint = serde_json::from_str(&content)?;
        if checkpoint.thread_id != thread_id {
            warn!(
                path = %path.display(),
                expected = thread_id,
                found = checkpoint.thread_id,
                "Ignoring checkpoint for another thread"
            );
            return Ok(None);
        }
        Ok(Some(checkpoint))
    }

    /// All readable checkpoints, most recently updated first.
    pub async fn list(&self) -> Result<Vec<SessionCheckpoint>> {
        let mut out = Vec::new();
        if !self.sessions_dir.exists() {
            return Ok(out);
        }

        let mut entries = fs::read_dir(&self.sessions_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Ok(content) = fs::read_to_string(&path).await
                && let Ok(checkpoint) = serde_json::from_str::<SessionCheckpoint>(&content)
            {
                out.push(checkpoint);
            }
        }

        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn recover_interrupted_writes(&self) {
        if let Ok(mut entries) = fs::read_dir(&self.sessions_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "tmp") {
                    debug!(path = %path.display(), "Removing interrupted checkpoint write");
                    let _ = fs::remove_file(&path).await;
                }
            }
        }
    }
}

async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content).await?;
    fs::rename(&tmp_path, path).await?;
    debug!(path = %path.display(), "Checkpoint written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::thread::Comment;

    #[tokio::test]
    async fn test_save_load_list() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("sessions"));
        store.init().await.unwrap();

        let ts = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let cursor = Cursor::at(&Comment::new("55", "bob", "hi", ts));
        let checkpoint =
            SessionCheckpoint::new(12, "cache eviction", cursor.clone(), ConsensusState::ConsensusSuggested);
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load(12).await.unwrap().unwrap();
        assert_eq!(loaded.cursor, cursor);
        assert_eq!(loaded.consensus_state, ConsensusState::ConsensusSuggested);
        assert!(store.load(13).await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_init_removes_stale_temp_files() {
        let dir = TempDir::new().unwrap();
        let sessions = dir.path().join("sessions");
        std::fs::create_dir_all(&sessions).unwrap();
        std::fs::write(sessions.join("3.json.tmp"), "{").unwrap();

        CursorStore::new(&sessions).init().await.unwrap();
        assert!(!sessions.join("3.json.tmp").exists());
    }
}
