/// Clipfeed - clip scheduling engine
///
/// Core logic for a swipeable video learning feed: partitions local videos
/// into timed clips, selects the next clip under a weighted category policy,
/// keeps a bounded sliding queue, and tracks watch/quiz/memorization state
/// with idempotent updates and a daily coin ledger.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod media;
pub mod persistence;
pub mod queue;
pub mod records;
pub mod rewards;
pub mod selector;
pub mod session;
pub mod tracker;

// Re-export main types for easy access
pub use crate::catalog::{
    partition, Catalog, CatalogEntry, Category, ClipDurationPolicy, MediaHandle, TimeRange,
    VideoAsset,
};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::SchedulerError;
pub use crate::media::{FileMediaAccess, MediaAccess, MediaLibrary};
pub use crate::persistence::{
    export_clips, export_ledger, import_clips, import_ledger, LocalStore, RemoteStore, Storage,
    StorageBackend, UserPreferences, DEFAULT_USER_ID,
};
pub use crate::queue::{ClipQueue, IDLE_EVICTION, PRELOAD_RADIUS, QUEUE_CAPACITY};
pub use crate::records::{
    ClipId, ClipKey, ClipRecord, ClipRecordStore, QuizStatus, UpsertOutcome,
    WATCHED_THRESHOLD_PCT,
};
pub use crate::rewards::{RewardLedger, RewardLedgerState};
pub use crate::selector::{CategoryWeights, ClipSelector};
pub use crate::session::{PlaybackSession, QuizOutcome};
pub use crate::tracker::{ProgressEvent, WatchProgressTracker};
