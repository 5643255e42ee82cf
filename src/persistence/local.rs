use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{StorageBackend, UserPreferences};
use crate::records::ClipRecord;
use crate::rewards::RewardLedgerState;

/// Local per-machine storage fallback: one JSON document per concern under a
/// data directory, same read/write surface as the remote store.
pub struct LocalStore {
    data_dir: PathBuf,
    /// Serializes read-modify-write cycles on the clip document
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            write_lock: Mutex::new(()),
        }
    }

    fn clips_path(&self) -> PathBuf {
        self.data_dir.join("clips.json")
    }

    fn preferences_path(&self, user_id: &str) -> PathBuf {
        self.data_dir
            .join(format!("preferences_{}.json", sanitize(user_id)))
    }

    fn ledger_path(&self, user_id: &str) -> PathBuf {
        self.data_dir.join(format!("coins_{}.json", sanitize(user_id)))
    }

    async fn read_clips(&self) -> Vec<ClipRecord> {
        let path = self.clips_path();
        match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(clips) => clips,
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }

    async fn write_clips(&self, clips: &[ClipRecord]) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;
        let content = serde_json::to_string_pretty(clips)?;
        fs::write(self.clips_path(), content).await?;
        Ok(())
    }

    /// Remove a user's preference document. Used by the document-store
    /// service; absent files are fine.
    pub async fn delete_preferences(&self, user_id: &str) -> Result<()> {
        let path = self.preferences_path(user_id);
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalStore {
    async fn load_clips(&self) -> Result<Vec<ClipRecord>> {
        Ok(self.read_clips().await)
    }

    async fn save_clip(&self, record: &ClipRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut clips = self.read_clips().await;
        match clips.iter().position(|c| c.id == record.id) {
            Some(i) => clips[i] = record.clone(),
            None => clips.push(record.clone()),
        }
        self.write_clips(&clips).await?;
        debug!("💾 Saved clip {} locally", record.id);
        Ok(())
    }

    async fn delete_clip(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut clips = self.read_clips().await;
        clips.retain(|c| c.id != id);
        self.write_clips(&clips).await
    }

    async fn clear_clips(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_clips(&[]).await
    }

    async fn load_preferences(&self, user_id: &str) -> Result<UserPreferences> {
        let path = self.preferences_path(user_id);
        match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(prefs) => Ok(prefs),
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Ok(UserPreferences::default_for(user_id))
                }
            },
            Err(_) => Ok(UserPreferences::default_for(user_id)),
        }
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;
        let content = serde_json::to_string_pretty(prefs)?;
        fs::write(self.preferences_path(&prefs.user_id), content).await?;
        Ok(())
    }

    async fn load_ledger(&self, user_id: &str) -> Result<RewardLedgerState> {
        let path = self.ledger_path(user_id);
        match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(ledger) => Ok(ledger),
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Ok(RewardLedgerState::default())
                }
            },
            Err(_) => Ok(RewardLedgerState::default()),
        }
    }

    async fn save_ledger(&self, user_id: &str, ledger: &RewardLedgerState) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;
        let content = serde_json::to_string_pretty(ledger)?;
        fs::write(self.ledger_path(user_id), content).await?;
        Ok(())
    }
}

fn sanitize(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
