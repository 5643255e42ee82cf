//! Persistence boundary: the companion document store over HTTP with a
//! transparent local-file fallback, plus JSON export/import.

pub mod local;
pub mod remote;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::catalog::{ClipDurationPolicy, TimeRange};
use crate::error::SchedulerError;
use crate::records::ClipRecord;
use crate::rewards::RewardLedgerState;

pub use local::LocalStore;
pub use remote::RemoteStore;

/// The single implicit user. Applied only at the outermost boundary; every
/// store operation takes the user id explicitly.
pub const DEFAULT_USER_ID: &str = "default";

/// Per-user preference record as stored by the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub user_id: String,

    pub study_directories: Vec<String>,
    pub relax_directories: Vec<String>,

    pub clip_policy: ClipDurationPolicy,

    /// Probability that a selection round tries the study pool first
    pub study_weight: f64,

    pub app_started: bool,

    /// Cached partition per video name, refreshed on catalog rebuild
    #[serde(default)]
    pub video_ranges: HashMap<String, Vec<TimeRange>>,

    #[serde(default)]
    pub ledger: RewardLedgerState,
}

impl UserPreferences {
    pub fn default_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            study_directories: Vec::new(),
            relax_directories: Vec::new(),
            clip_policy: ClipDurationPolicy::default(),
            study_weight: 0.8,
            app_started: false,
            video_ranges: HashMap::new(),
            ledger: RewardLedgerState::default(),
        }
    }
}

/// Read/write surface shared by the remote document store and the local
/// fallback, so callers never care which one is active.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn load_clips(&self) -> Result<Vec<ClipRecord>>;
    async fn save_clip(&self, record: &ClipRecord) -> Result<()>;
    async fn delete_clip(&self, id: &str) -> Result<()>;
    async fn clear_clips(&self) -> Result<()>;

    async fn load_preferences(&self, user_id: &str) -> Result<UserPreferences>;
    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<()>;

    async fn load_ledger(&self, user_id: &str) -> Result<RewardLedgerState>;
    async fn save_ledger(&self, user_id: &str, ledger: &RewardLedgerState) -> Result<()>;
}

/// Storage facade: prefers the remote document store while it stays healthy,
/// and falls back to the local file store permanently (for the session) after
/// the first failed health probe or request.
pub struct Storage {
    remote: Option<RemoteStore>,
    local: LocalStore,
    degraded: AtomicBool,
}

impl Storage {
    pub fn local_only(data_dir: PathBuf) -> Self {
        Self {
            remote: None,
            local: LocalStore::new(data_dir),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn with_remote(remote: RemoteStore, data_dir: PathBuf) -> Self {
        Self {
            remote: Some(remote),
            local: LocalStore::new(data_dir),
            degraded: AtomicBool::new(false),
        }
    }

    /// True while the remote store is still the active backend.
    pub fn remote_active(&self) -> bool {
        self.remote.is_some() && !self.degraded.load(Ordering::Relaxed)
    }

    fn degrade(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!("⚠️  Falling back to local storage for the rest of the session: {}", reason);
        }
    }

    /// The remote store, if it is still eligible to serve the next
    /// operation. The health probe gates every persistence-mode decision;
    /// one failed probe degrades the whole session.
    async fn active_remote(&self) -> Option<&RemoteStore> {
        let remote = self.remote.as_ref()?;
        if self.degraded.load(Ordering::Relaxed) {
            return None;
        }
        if remote.health().await {
            Some(remote)
        } else {
            self.degrade("health probe failed or timed out");
            None
        }
    }
}

#[async_trait]
impl StorageBackend for Storage {
    async fn load_clips(&self) -> Result<Vec<ClipRecord>> {
        if let Some(remote) = self.active_remote().await {
            match remote.load_clips().await {
                Ok(clips) => return Ok(clips),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.local.load_clips().await
    }

    async fn save_clip(&self, record: &ClipRecord) -> Result<()> {
        if let Some(remote) = self.active_remote().await {
            match remote.save_clip(record).await {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.local.save_clip(record).await
    }

    async fn delete_clip(&self, id: &str) -> Result<()> {
        if let Some(remote) = self.active_remote().await {
            match remote.delete_clip(id).await {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.local.delete_clip(id).await
    }

    async fn clear_clips(&self) -> Result<()> {
        if let Some(remote) = self.active_remote().await {
            match remote.clear_clips().await {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.local.clear_clips().await
    }

    async fn load_preferences(&self, user_id: &str) -> Result<UserPreferences> {
        if let Some(remote) = self.active_remote().await {
            match remote.load_preferences(user_id).await {
                Ok(prefs) => return Ok(prefs),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.local.load_preferences(user_id).await
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<()> {
        if let Some(remote) = self.active_remote().await {
            match remote.save_preferences(prefs).await {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.local.save_preferences(prefs).await
    }

    async fn load_ledger(&self, user_id: &str) -> Result<RewardLedgerState> {
        if let Some(remote) = self.active_remote().await {
            match remote.load_ledger(user_id).await {
                Ok(ledger) => return Ok(ledger),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.local.load_ledger(user_id).await
    }

    async fn save_ledger(&self, user_id: &str, ledger: &RewardLedgerState) -> Result<()> {
        if let Some(remote) = self.active_remote().await {
            match remote.save_ledger(user_id, ledger).await {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.local.save_ledger(user_id, ledger).await
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Write the clip list as a JSON array document.
pub async fn export_clips(path: &Path, clips: &[ClipRecord]) -> Result<()> {
    let content = serde_json::to_string_pretty(clips)?;
    tokio::fs::write(path, content).await?;
    info!("📤 Exported {} clips to {}", clips.len(), path.display());
    Ok(())
}

/// Read a clip list document, validating the top-level shape before parsing.
pub async fn import_clips(path: &Path) -> Result<Vec<ClipRecord>> {
    let content = tokio::fs::read_to_string(path).await?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    if !value.is_array() {
        return Err(SchedulerError::InvalidImportShape {
            expected: "array",
            actual: json_kind(&value),
        }
        .into());
    }
    let clips: Vec<ClipRecord> = serde_json::from_value(value)?;
    info!("📥 Imported {} clips from {}", clips.len(), path.display());
    Ok(clips)
}

/// Write the coin ledger as a JSON object document.
pub async fn export_ledger(path: &Path, ledger: &RewardLedgerState) -> Result<()> {
    let content = serde_json::to_string_pretty(ledger)?;
    tokio::fs::write(path, content).await?;
    info!("📤 Exported coin ledger to {}", path.display());
    Ok(())
}

/// Read a coin ledger document, validating the top-level shape before
/// parsing.
pub async fn import_ledger(path: &Path) -> Result<RewardLedgerState> {
    let content = tokio::fs::read_to_string(path).await?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    if !value.is_object() {
        return Err(SchedulerError::InvalidImportShape {
            expected: "object",
            actual: json_kind(&value),
        }
        .into());
    }
    let ledger: RewardLedgerState = serde_json::from_value(value)?;
    info!("📥 Imported coin ledger from {}", path.display());
    Ok(ledger)
}
