use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::records::{ClipId, ClipRecord, ClipRecordStore, UpsertOutcome};

/// What a progress sample amounted to.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Sample could not be applied: unresolvable clip id, or an update for
    /// the same clip was already in flight. Never an error.
    Ignored,

    /// Sample was processed; the stored record may or may not have advanced.
    Recorded { record: ClipRecord },

    /// The clip crossed the watched threshold for the first time this
    /// session.
    ThresholdReached { record: ClipRecord },
}

/// Consumes the playback-progress stream and drives clip-record updates.
///
/// Samples arrive on every media timing tick, so duplicates and overlapping
/// completions are expected; the store's in-flight guard plus the per-session
/// notified set keep updates single-counted and the threshold event one-shot.
pub struct WatchProgressTracker {
    store: Arc<ClipRecordStore>,
    notified: HashSet<ClipId>,
}

impl WatchProgressTracker {
    pub fn new(store: Arc<ClipRecordStore>) -> Self {
        Self {
            store,
            notified: HashSet::new(),
        }
    }

    /// Apply one `(clip_id, percentage)` sample against the given catalog.
    pub async fn report(
        &mut self,
        catalog: &Catalog,
        clip_id: &ClipId,
        percentage: u8,
    ) -> ProgressEvent {
        let entry = match catalog.resolve(clip_id) {
            Some(entry) => entry,
            None => {
                // Stale queue after a catalog rebuild
                warn!("Dropping progress sample for unresolved clip {}", clip_id);
                return ProgressEvent::Ignored;
            }
        };

        match self
            .store
            .upsert_progress(&entry.key(), entry.category, percentage)
            .await
        {
            UpsertOutcome::Applied {
                record,
                crossed_threshold,
            } => {
                if crossed_threshold && self.notified.insert(clip_id.clone()) {
                    debug!("Clip {} reached the watched threshold", clip_id);
                    ProgressEvent::ThresholdReached { record }
                } else {
                    ProgressEvent::Recorded { record }
                }
            }
            UpsertOutcome::Unchanged { record } => ProgressEvent::Recorded { record },
            UpsertOutcome::InFlight => ProgressEvent::Ignored,
        }
    }

    /// Forget which clips already fired their threshold event. Called when a
    /// new viewing session starts.
    pub fn reset_session(&mut self) {
        self.notified.clear();
    }
}
