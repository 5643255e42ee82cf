use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{StorageBackend, UserPreferences};
use crate::records::ClipRecord;
use crate::rewards::RewardLedgerState;

/// Page size for draining the clip collection.
const CLIP_PAGE_SIZE: usize = 500;

/// HTTP client for the companion document store.
///
/// Every request carries the configured timeout; a hung backend surfaces as
/// an error for the storage facade to catch, never a stalled caller.
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

impl RemoteStore {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_secs(timeout_seconds),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Liveness probe. Any transport error, non-success status, or timeout
    /// counts as unhealthy.
    pub async fn health(&self) -> bool {
        let request = self.client.get(self.url("/health")).send();
        match tokio::time::timeout(self.probe_timeout, request).await {
            Ok(Ok(response)) => response.status().is_success(),
            Ok(Err(e)) => {
                debug!("Health probe error: {}", e);
                false
            }
            Err(_) => {
                debug!("Health probe timed out after {:?}", self.probe_timeout);
                false
            }
        }
    }
}

#[async_trait]
impl StorageBackend for RemoteStore {
    async fn load_clips(&self) -> Result<Vec<ClipRecord>> {
        let mut clips = Vec::new();
        let mut skip = 0usize;
        loop {
            let page: Vec<ClipRecord> = self
                .client
                .get(self.url("/clips"))
                .query(&[("limit", CLIP_PAGE_SIZE), ("skip", skip)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let fetched = page.len();
            clips.extend(page);
            if fetched < CLIP_PAGE_SIZE {
                break;
            }
            skip += fetched;
        }
        Ok(clips)
    }

    async fn save_clip(&self, record: &ClipRecord) -> Result<()> {
        // Upsert by identity key; the wire shape calls the video name
        // `videoPath`
        let mut body = serde_json::to_value(record)?;
        body["videoPath"] = json!(record.video_name);
        self.client
            .put(self.url("/clips/find-and-update"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_clip(&self, id: &str) -> Result<()> {
        self.client
            .delete(self.url(&format!("/clips/{}", id)))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn clear_clips(&self) -> Result<()> {
        let clips = self.load_clips().await?;
        if clips.is_empty() {
            return Ok(());
        }
        let ids: Vec<_> = clips.iter().map(|c| json!({ "id": c.id })).collect();
        self.client
            .post(self.url("/clips/bulk"))
            .json(&json!({ "operation": "delete", "clips": ids }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn load_preferences(&self, user_id: &str) -> Result<UserPreferences> {
        let prefs = self
            .client
            .get(self.url(&format!("/user-preferences/{}", user_id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(prefs)
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<()> {
        self.client
            .put(self.url(&format!("/user-preferences/{}", prefs.user_id)))
            .json(prefs)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn load_ledger(&self, user_id: &str) -> Result<RewardLedgerState> {
        // The ledger lives inside the preference record on the wire
        let prefs = self.load_preferences(user_id).await?;
        Ok(prefs.ledger)
    }

    async fn save_ledger(&self, user_id: &str, ledger: &RewardLedgerState) -> Result<()> {
        let response = self
            .client
            .patch(self.url(&format!("/user-preferences/{}", user_id)))
            .json(&json!({ "ledger": ledger }))
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("Ledger patch for '{}' returned {}", user_id, response.status());
            return Err(anyhow!("ledger patch failed: {}", response.status()));
        }
        Ok(())
    }
}
