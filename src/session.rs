use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogEntry, ClipDurationPolicy, VideoAsset};
use crate::config::Config;
use crate::error::SchedulerError;
use crate::media::MediaAccess;
use crate::persistence::StorageBackend;
use crate::queue::ClipQueue;
use crate::records::{ClipId, ClipRecord, ClipRecordStore, QuizStatus, WATCHED_THRESHOLD_PCT};
use crate::rewards::RewardLedger;
use crate::selector::{CategoryWeights, ClipSelector};
use crate::tracker::{ProgressEvent, WatchProgressTracker};

/// Result of answering a clip's inline quiz.
#[derive(Debug, Clone)]
pub struct QuizOutcome {
    pub record: ClipRecord,
    /// Net coin change applied to the ledger by this answer
    pub coins_delta: i64,
    /// True when a correct answer on an already-watched clip also marked it
    /// memorized
    pub auto_memorized: bool,
}

/// The active playback session: owns the catalog, queue, trackers, and
/// ledger, and wires every state change through the record store.
///
/// All collaborators are constructed and injected here rather than living as
/// ambient singletons, so tests get fresh instances per session.
pub struct PlaybackSession {
    user_id: String,
    catalog: Catalog,
    selector: ClipSelector,
    queue: ClipQueue,
    store: Arc<ClipRecordStore>,
    tracker: WatchProgressTracker,
    ledger: RewardLedger,
    backend: Arc<dyn StorageBackend>,
    media_access: Arc<dyn MediaAccess>,
    assets: HashMap<String, VideoAsset>,
    warmed: HashSet<String>,
    rng: StdRng,
    policy: ClipDurationPolicy,
    min_clip_seconds: u32,
    /// Bumped on every catalog rebuild; clip ids minted against an older
    /// generation stop resolving unless their range survived the rebuild
    generation: u64,
}

impl PlaybackSession {
    pub async fn new(
        config: &Config,
        videos: Vec<VideoAsset>,
        backend: Arc<dyn StorageBackend>,
        media_access: Arc<dyn MediaAccess>,
    ) -> Result<Self> {
        let mut rng = match config.scheduling.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let policy = config.scheduling.clip_policy;
        let catalog = Catalog::build(
            &videos,
            &policy,
            config.scheduling.min_clip_seconds,
            &mut rng,
        );
        info!(
            "🗂️  Session catalog: {} clips across {} videos",
            catalog.len(),
            videos.len()
        );

        let store = Arc::new(ClipRecordStore::new(backend.clone()));
        if let Err(e) = store.load().await {
            warn!("Starting with an empty record cache: {}", e);
        }

        let user_id = config.persistence.user_id.clone();
        let ledger_state = match backend.load_ledger(&user_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Starting with a fresh coin ledger: {}", e);
                Default::default()
            }
        };

        let assets = videos.into_iter().map(|v| (v.id.clone(), v)).collect();

        Ok(Self {
            user_id,
            catalog,
            selector: ClipSelector::new(CategoryWeights::new(config.scheduling.study_weight)),
            queue: ClipQueue::new(),
            tracker: WatchProgressTracker::new(store.clone()),
            store,
            ledger: RewardLedger::new(ledger_state),
            backend,
            media_access,
            assets,
            warmed: HashSet::new(),
            rng,
            policy,
            min_clip_seconds: config.scheduling.min_clip_seconds,
            generation: 0,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<ClipRecordStore> {
        &self.store
    }

    pub fn total_coins(&self) -> u32 {
        self.ledger.total_coins()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rebuild the catalog under a new clip-duration policy. The queue and
    /// the per-session threshold set are discarded; clip ids minted against
    /// the old catalog stop resolving unless their range survived.
    pub fn rebuild_catalog(&mut self, policy: ClipDurationPolicy) {
        self.policy = policy;
        let videos: Vec<VideoAsset> = self.assets.values().cloned().collect();
        self.catalog = Catalog::build(&videos, &self.policy, self.min_clip_seconds, &mut self.rng);
        self.queue.clear();
        self.tracker.reset_session();
        self.generation += 1;
        info!(
            "🔄 Catalog rebuilt (generation {}): {} clips",
            self.generation,
            self.catalog.len()
        );
    }

    /// Fill the queue and return the first clip to show, or `None` when
    /// everything is memorized.
    pub async fn start(&mut self) -> Option<CatalogEntry> {
        let memorized = self.store.memorized_keys().await;
        let current = self
            .queue
            .initialize(&self.catalog, &self.selector, &memorized, &mut self.rng)
            .cloned();
        self.sync_media_residency();
        current
    }

    /// Swipe forward.
    pub async fn next_clip(&mut self) -> Option<CatalogEntry> {
        let memorized = self.store.memorized_keys().await;
        let current = self
            .queue
            .advance(&self.catalog, &self.selector, &memorized, &mut self.rng)
            .cloned();
        self.sync_media_residency();
        current
    }

    /// Swipe backward.
    pub async fn previous_clip(&mut self) -> Option<CatalogEntry> {
        let memorized = self.store.memorized_keys().await;
        let current = self
            .queue
            .retreat(&self.catalog, &self.selector, &memorized, &mut self.rng)
            .cloned();
        self.sync_media_residency();
        current
    }

    pub fn current_clip(&self) -> Option<&CatalogEntry> {
        self.queue.current()
    }

    /// Feed one playback-progress sample through the tracker.
    pub async fn report_progress(&mut self, clip_id: &ClipId, percentage: u8) -> ProgressEvent {
        self.queue.touch();
        self.tracker
            .report(&self.catalog, clip_id, percentage)
            .await
    }

    /// Flip the memorized flag on a clip and settle the ledger: memorizing
    /// earns a coin, un-memorizing takes it back.
    pub async fn toggle_memorized(&mut self, clip_id: &ClipId) -> Result<ClipRecord> {
        let entry = self
            .catalog
            .resolve(clip_id)
            .ok_or_else(|| SchedulerError::UnresolvedClip(clip_id.to_string()))?
            .clone();

        let existing = self.store.find(&entry.key()).await;
        let memorize = !existing.map(|r| r.memorized).unwrap_or(false);
        let record = self
            .store
            .set_memorized(&entry.key(), entry.category, memorize)
            .await;

        if memorize {
            self.ledger.add_coins(1);
        } else {
            self.ledger.remove_coins(1);
        }
        self.persist_ledger().await;

        Ok(record)
    }

    /// Record a quiz answer. A correct answer earns a coin; if the clip is
    /// already past the watched threshold and not yet memorized, it is
    /// additionally auto-memorized, which earns a second coin through the
    /// memorize path. An incorrect answer costs a coin.
    pub async fn answer_quiz(&mut self, clip_id: &ClipId, correct: bool) -> Result<QuizOutcome> {
        let entry = self
            .catalog
            .resolve(clip_id)
            .ok_or_else(|| SchedulerError::UnresolvedClip(clip_id.to_string()))?
            .clone();
        let key = entry.key();

        let status = if correct {
            QuizStatus::Passed
        } else {
            QuizStatus::Failed
        };
        let mut record = self.store.set_quiz_status(&key, entry.category, status).await;

        let mut coins_delta: i64 = 0;
        let mut auto_memorized = false;

        if correct {
            self.ledger.add_coins(1);
            coins_delta += 1;

            if record.watch_percentage >= WATCHED_THRESHOLD_PCT && !record.memorized {
                record = self.store.set_memorized(&key, entry.category, true).await;
                self.ledger.add_coins(1);
                coins_delta += 1;
                auto_memorized = true;
                debug!("Quiz pass auto-memorized {}", clip_id);
            }
        } else {
            let before = self.ledger.total_coins();
            self.ledger.remove_coins(1);
            coins_delta -= i64::from(before - self.ledger.total_coins());
        }

        self.persist_ledger().await;

        Ok(QuizOutcome {
            record,
            coins_delta,
            auto_memorized,
        })
    }

    /// Clear the queue if it has been idle too long. Returns true when an
    /// eviction happened.
    pub fn evict_idle(&mut self) -> bool {
        let evicted = self.queue.evict_if_idle(Instant::now());
        if evicted {
            self.sync_media_residency();
        }
        evicted
    }

    /// Periodic idle-eviction timer, independent of user interaction.
    pub fn spawn_idle_eviction(
        session: Arc<Mutex<PlaybackSession>>,
        check_every: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(check_every);
            loop {
                ticker.tick().await;
                let mut session = session.lock().await;
                if session.evict_idle() {
                    debug!("Idle eviction cleared the queue");
                }
            }
        })
    }

    /// Reconcile warmed media with the queue's resident set: preload what
    /// became resident, release what left. Both directions are fire-and-
    /// forget; a stale completion after another navigation is harmless
    /// because warming is idempotent.
    fn sync_media_residency(&mut self) {
        let needed = self.queue.resident_media().clone();

        for video_id in self.warmed.difference(&needed) {
            let access = self.media_access.clone();
            let video_id = video_id.clone();
            tokio::spawn(async move {
                access.release(&video_id).await;
            });
        }

        for video_id in needed.difference(&self.warmed) {
            let Some(asset) = self.assets.get(video_id) else {
                continue;
            };
            let access = self.media_access.clone();
            let asset = asset.clone();
            tokio::spawn(async move {
                if let Err(e) = access.preload(&asset).await {
                    warn!("Media warm-up failed for {}: {}", asset.id, e);
                }
            });
        }

        self.warmed = needed;
    }

    async fn persist_ledger(&self) {
        if let Err(e) = self
            .backend
            .save_ledger(&self.user_id, self.ledger.state())
            .await
        {
            warn!("Failed to persist coin ledger: {}", e);
        }
    }
}
