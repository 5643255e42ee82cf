use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::Category;
use crate::persistence::StorageBackend;

/// Watch percentage at and above which a clip counts as watched.
pub const WATCHED_THRESHOLD_PCT: u8 = 80;

/// Identity of a clip-state record: the owning video's name plus the exact
/// time-range. The same logical clip may be (re)created by several code paths
/// and must collapse to one record, so identity is never a generated id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipKey {
    pub video_name: String,
    pub start_time: u32,
    pub end_time: u32,
}

/// Content-addressed clip id, stable across catalog rebuilds for the same
/// `(video_name, start, end)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    /// Derive the id by hashing the identity triple. The readable prefix
    /// keeps log lines and stored documents greppable.
    pub fn derive(video_name: &str, start_time: u32, end_time: u32) -> Self {
        let combined = format!("{}_{}_{}", video_name, start_time, end_time);
        let mut hasher = DefaultHasher::new();
        combined.hash(&mut hasher);
        let hash = hasher.finish();

        let prefix: String = video_name
            .chars()
            .take(24)
            .collect::<String>()
            .replace(' ', "_");
        Self(format!("{}_{:08x}", prefix, hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClipId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Outcome of the inline quiz attached to a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    NotYetAnswered,
    Passed,
    Failed,
}

/// Persisted per-clip state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRecord {
    /// Content-addressed id, derived from the identity key
    pub id: String,

    pub video_name: String,
    pub start_time: u32,
    pub end_time: u32,
    pub category: Category,

    pub memorized: bool,

    /// Derived: `watch_percentage >= 80`
    pub watched: bool,

    /// Monotonic non-decreasing while tracking is active
    pub watch_percentage: u8,

    pub quiz_status: QuizStatus,

    pub last_watched_at: Option<DateTime<Utc>>,

    /// Cumulative percentage points; advances only when `watch_percentage`
    /// increases
    pub total_watch_time: u32,

    pub updated_at: DateTime<Utc>,
}

impl ClipRecord {
    fn new(key: &ClipKey, category: Category, now: DateTime<Utc>) -> Self {
        Self {
            id: ClipId::derive(&key.video_name, key.start_time, key.end_time)
                .as_str()
                .to_string(),
            video_name: key.video_name.clone(),
            start_time: key.start_time,
            end_time: key.end_time,
            category,
            memorized: false,
            watched: false,
            watch_percentage: 0,
            quiz_status: QuizStatus::NotYetAnswered,
            last_watched_at: None,
            total_watch_time: 0,
            updated_at: now,
        }
    }

    pub fn key(&self) -> ClipKey {
        ClipKey {
            video_name: self.video_name.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// Duplicate-collapse ordering: higher watch percentage wins, most
    /// recently updated breaks ties.
    fn outranks(&self, other: &ClipRecord) -> bool {
        self.watch_percentage > other.watch_percentage
            || (self.watch_percentage == other.watch_percentage
                && self.updated_at > other.updated_at)
    }
}

/// Result of a watch-progress upsert.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    /// The record was created or its percentage advanced.
    Applied {
        record: ClipRecord,
        /// First crossing of the watched threshold by this upsert
        crossed_threshold: bool,
    },

    /// Threshold lock or non-increasing percentage; the stored record is
    /// untouched.
    Unchanged { record: ClipRecord },

    /// An upsert for the same key was already pending; this one was dropped.
    /// Expected during rapid playback-time ticks, counted as success.
    InFlight,
}

/// Authoritative mapping from clip identity to persisted clip state.
///
/// Records are owned by the persistence layer and cached here; mutation goes
/// through idempotent upserts with at most one in-flight upsert per key.
pub struct ClipRecordStore {
    records: RwLock<HashMap<ClipKey, ClipRecord>>,
    in_flight: Mutex<HashSet<ClipKey>>,
    backend: Arc<dyn StorageBackend>,
}

impl ClipRecordStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            backend,
        }
    }

    /// Populate the cache from the persistence layer, collapsing any
    /// duplicate records sharing an identity key.
    pub async fn load(&self) -> anyhow::Result<usize> {
        let stored = self.backend.load_clips().await?;
        let mut records = self.records.write().await;
        records.clear();
        for record in stored {
            let key = record.key();
            match records.get(&key) {
                Some(existing) if !record.outranks(existing) => {}
                _ => {
                    records.insert(key, record);
                }
            }
        }
        info!("📋 Clip record store loaded: {} records", records.len());
        Ok(records.len())
    }

    /// Apply a watch-progress sample.
    ///
    /// Creates the record on first report. An existing record at or past the
    /// watched threshold rejects all further progress updates; below it, only
    /// strictly increasing percentages are applied.
    pub async fn upsert_progress(
        &self,
        key: &ClipKey,
        category: Category,
        percentage: u8,
    ) -> UpsertOutcome {
        {
            let mut pending = self.in_flight.lock().await;
            if !pending.insert(key.clone()) {
                debug!("Dropping duplicate in-flight progress update for {}", key.video_name);
                return UpsertOutcome::InFlight;
            }
        }

        let outcome = self.apply_progress(key, category, percentage.min(100)).await;

        if let UpsertOutcome::Applied { record, .. } = &outcome {
            self.persist(record).await;
        }

        self.in_flight.lock().await.remove(key);
        outcome
    }

    async fn apply_progress(
        &self,
        key: &ClipKey,
        category: Category,
        percentage: u8,
    ) -> UpsertOutcome {
        let now = Utc::now();
        let mut records = self.records.write().await;

        if let Some(existing) = records.get_mut(key) {
            if existing.watch_percentage >= WATCHED_THRESHOLD_PCT {
                // Watched clips ignore further progress reports
                return UpsertOutcome::Unchanged {
                    record: existing.clone(),
                };
            }
            if percentage <= existing.watch_percentage {
                return UpsertOutcome::Unchanged {
                    record: existing.clone(),
                };
            }

            let crossed = percentage >= WATCHED_THRESHOLD_PCT;
            existing.total_watch_time += u32::from(percentage - existing.watch_percentage);
            existing.watch_percentage = percentage;
            existing.watched = crossed;
            existing.last_watched_at = Some(now);
            existing.updated_at = now;
            return UpsertOutcome::Applied {
                record: existing.clone(),
                crossed_threshold: crossed,
            };
        }

        let mut record = ClipRecord::new(key, category, now);
        record.watch_percentage = percentage;
        record.watched = percentage >= WATCHED_THRESHOLD_PCT;
        record.total_watch_time = u32::from(percentage);
        record.last_watched_at = Some(now);
        records.insert(key.clone(), record.clone());
        UpsertOutcome::Applied {
            crossed_threshold: record.watched,
            record,
        }
    }

    /// Set the memorized flag, creating the record if this is the clip's
    /// first interaction. Independent of watch tracking.
    pub async fn set_memorized(
        &self,
        key: &ClipKey,
        category: Category,
        memorized: bool,
    ) -> ClipRecord {
        let now = Utc::now();
        let record = {
            let mut records = self.records.write().await;
            let record = records
                .entry(key.clone())
                .or_insert_with(|| ClipRecord::new(key, category, now));
            record.memorized = memorized;
            record.updated_at = now;
            record.clone()
        };
        self.persist(&record).await;
        record
    }

    /// Record a quiz outcome, creating the record if needed.
    pub async fn set_quiz_status(
        &self,
        key: &ClipKey,
        category: Category,
        status: QuizStatus,
    ) -> ClipRecord {
        let now = Utc::now();
        let record = {
            let mut records = self.records.write().await;
            let record = records
                .entry(key.clone())
                .or_insert_with(|| ClipRecord::new(key, category, now));
            record.quiz_status = status;
            record.updated_at = now;
            record.clone()
        };
        self.persist(&record).await;
        record
    }

    pub async fn find(&self, key: &ClipKey) -> Option<ClipRecord> {
        self.records.read().await.get(key).cloned()
    }

    pub async fn all(&self) -> Vec<ClipRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Snapshot of identity keys whose records are memorized, used by the
    /// selector to filter eligibility.
    pub async fn memorized_keys(&self) -> HashSet<ClipKey> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.memorized)
            .map(|r| r.key())
            .collect()
    }

    /// Remove a record by its content-addressed id.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut records = self.records.write().await;
            let key = records
                .values()
                .find(|r| r.id == id)
                .map(|r| r.key());
            match key {
                Some(key) => records.remove(&key).is_some(),
                None => false,
            }
        };
        if removed {
            if let Err(e) = self.backend.delete_clip(id).await {
                warn!("Failed to delete clip {} from backend: {}", id, e);
            }
        }
        removed
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
        if let Err(e) = self.backend.clear_clips().await {
            warn!("Failed to clear clips on backend: {}", e);
        }
    }

    /// Collapse backend records sharing an identity key into one, keeping the
    /// highest watch percentage (tie-break: most recently updated), and
    /// refresh the cache from the survivors.
    pub async fn remove_duplicates(&self) -> anyhow::Result<usize> {
        let stored = self.backend.load_clips().await?;
        let mut survivors: HashMap<ClipKey, ClipRecord> = HashMap::new();
        let mut losers: Vec<String> = Vec::new();

        for record in stored {
            let key = record.key();
            match survivors.get(&key) {
                Some(existing) if record.outranks(existing) => {
                    losers.push(existing.id.clone());
                    survivors.insert(key, record);
                }
                Some(_) => losers.push(record.id.clone()),
                None => {
                    survivors.insert(key, record);
                }
            }
        }

        for id in &losers {
            if let Err(e) = self.backend.delete_clip(id).await {
                warn!("Failed to delete duplicate clip {}: {}", id, e);
            }
        }

        let mut records = self.records.write().await;
        *records = survivors;

        if !losers.is_empty() {
            info!("🧹 Collapsed {} duplicate clip records", losers.len());
        }
        Ok(losers.len())
    }

    async fn persist(&self, record: &ClipRecord) {
        // Persistence failures degrade to cache-only state, never an error
        if let Err(e) = self.backend.save_clip(record).await {
            warn!("Failed to persist clip {}: {}", record.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::UserPreferences;
    use crate::rewards::RewardLedgerState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Backend stub that records save counts and can optionally block each
    /// save until released, to exercise the in-flight guard.
    struct StubBackend {
        saves: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl StubBackend {
        fn new() -> Self {
            Self { saves: AtomicUsize::new(0), gate: None }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self { saves: AtomicUsize::new(0), gate: Some(gate) }
        }
    }

    #[async_trait]
    impl StorageBackend for StubBackend {
        async fn load_clips(&self) -> anyhow::Result<Vec<ClipRecord>> {
            Ok(Vec::new())
        }

        async fn save_clip(&self, _record: &ClipRecord) -> anyhow::Result<()> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete_clip(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn clear_clips(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn load_preferences(&self, user_id: &str) -> anyhow::Result<UserPreferences> {
            Ok(UserPreferences::default_for(user_id))
        }

        async fn save_preferences(&self, _prefs: &UserPreferences) -> anyhow::Result<()> {
            Ok(())
        }

        async fn load_ledger(&self, _user_id: &str) -> anyhow::Result<RewardLedgerState> {
            Ok(RewardLedgerState::default())
        }

        async fn save_ledger(
            &self,
            _user_id: &str,
            _ledger: &RewardLedgerState,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn key(name: &str) -> ClipKey {
        ClipKey {
            video_name: name.to_string(),
            start_time: 0,
            end_time: 60,
        }
    }

    fn store() -> ClipRecordStore {
        ClipRecordStore::new(Arc::new(StubBackend::new()))
    }

    #[tokio::test]
    async fn test_first_report_creates_record() {
        let store = store();
        let outcome = store.upsert_progress(&key("v"), Category::Study, 40).await;
        match outcome {
            UpsertOutcome::Applied { record, crossed_threshold } => {
                assert_eq!(record.watch_percentage, 40);
                assert_eq!(record.total_watch_time, 40);
                assert!(!record.watched);
                assert!(!crossed_threshold);
                assert!(record.last_watched_at.is_some());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_threshold_locked() {
        let store = store();
        let k = key("v");

        store.upsert_progress(&k, Category::Study, 50).await;
        let outcome = store.upsert_progress(&k, Category::Study, 85).await;
        assert!(matches!(
            outcome,
            UpsertOutcome::Applied { crossed_threshold: true, .. }
        ));

        // Past the threshold, lower and higher reports are both no-ops
        let outcome = store.upsert_progress(&k, Category::Study, 60).await;
        assert!(matches!(outcome, UpsertOutcome::Unchanged { .. }));
        let outcome = store.upsert_progress(&k, Category::Study, 95).await;
        assert!(matches!(outcome, UpsertOutcome::Unchanged { .. }));

        let record = store.find(&k).await.unwrap();
        assert_eq!(record.watch_percentage, 85);
        assert!(record.watched);
        assert_eq!(record.total_watch_time, 85);
    }

    #[tokio::test]
    async fn test_repeated_same_percentage_is_idempotent() {
        let store = store();
        let k = key("v");

        store.upsert_progress(&k, Category::Study, 50).await;
        let outcome = store.upsert_progress(&k, Category::Study, 50).await;
        assert!(matches!(outcome, UpsertOutcome::Unchanged { .. }));

        let record = store.find(&k).await.unwrap();
        assert_eq!(record.total_watch_time, 50);
    }

    #[tokio::test]
    async fn test_concurrent_upsert_for_same_key_is_dropped() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(StubBackend::gated(gate.clone()));
        let store = Arc::new(ClipRecordStore::new(backend.clone()));
        let k = key("v");

        let first = {
            let store = store.clone();
            let k = k.clone();
            tokio::spawn(async move { store.upsert_progress(&k, Category::Study, 30).await })
        };

        // Let the first upsert reach the (gated) backend save
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let second = store.upsert_progress(&k, Category::Study, 35).await;
        assert!(matches!(second, UpsertOutcome::InFlight));

        gate.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(first, UpsertOutcome::Applied { .. }));
        assert_eq!(backend.saves.load(Ordering::SeqCst), 1);

        // Once the pending upsert completes, the key is free again
        gate.notify_one();
        let third = store.upsert_progress(&k, Category::Study, 35).await;
        assert!(matches!(third, UpsertOutcome::Applied { .. }));
    }

    #[tokio::test]
    async fn test_memorize_toggle_is_independent_of_watch_tracking() {
        let store = store();
        let k = key("v");

        let record = store.set_memorized(&k, Category::Relax, true).await;
        assert!(record.memorized);
        assert_eq!(record.watch_percentage, 0);

        let record = store.set_memorized(&k, Category::Relax, false).await;
        assert!(!record.memorized);

        let keys = store.memorized_keys().await;
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_clip_id_is_stable_for_identity() {
        let a = ClipId::derive("lecture one", 0, 60);
        let b = ClipId::derive("lecture one", 0, 60);
        let c = ClipId::derive("lecture one", 60, 120);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("lecture_one_"));
    }
}
