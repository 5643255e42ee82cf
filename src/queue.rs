use rand::Rng;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::catalog::{Catalog, CatalogEntry};
use crate::records::ClipKey;
use crate::selector::ClipSelector;

/// Number of pre-selected clips kept in the sliding window.
pub const QUEUE_CAPACITY: usize = 7;

/// How many entries on each side of the current clip keep their media warm.
pub const PRELOAD_RADIUS: usize = 3;

/// Inactivity span after which the queue releases everything.
pub const IDLE_EVICTION: Duration = Duration::from_secs(5 * 60);

/// Fixed-size sliding window of pre-selected clips centered on the current
/// position.
///
/// The window is always rebuilt wholesale: reaching either edge regenerates
/// all seven entries around the just-finished clip, discarding queued but
/// unshown entries. The companion resident-media set bounds how many
/// underlying video files need to stay warm at once. Queue state is owned by
/// the playback session and never persisted.
pub struct ClipQueue {
    entries: Vec<CatalogEntry>,
    current_index: usize,
    last_activity: Instant,
    resident_media: HashSet<String>,
}

impl Default for ClipQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current_index: 0,
            last_activity: Instant::now(),
            resident_media: HashSet::new(),
        }
    }

    /// Build a fresh window of seven selector picks with the cursor at the
    /// middle. Returns `None` (leaving the queue empty) once the catalog is
    /// exhausted.
    pub fn initialize<R: Rng>(
        &mut self,
        catalog: &Catalog,
        selector: &ClipSelector,
        memorized: &HashSet<ClipKey>,
        rng: &mut R,
    ) -> Option<&CatalogEntry> {
        self.entries.clear();
        for _ in 0..QUEUE_CAPACITY {
            match selector.select_next(catalog, memorized, rng) {
                Some(entry) => self.entries.push(entry.clone()),
                None => {
                    self.clear();
                    return None;
                }
            }
        }
        self.current_index = QUEUE_CAPACITY / 2;
        self.last_activity = Instant::now();
        self.recompute_resident();
        debug!("Queue initialized, cursor at {}", self.current_index);
        self.current()
    }

    /// Move forward one clip. At the tail the whole queue is regenerated with
    /// the just-finished clip re-pinned at the middle.
    pub fn advance<R: Rng>(
        &mut self,
        catalog: &Catalog,
        selector: &ClipSelector,
        memorized: &HashSet<ClipKey>,
        rng: &mut R,
    ) -> Option<&CatalogEntry> {
        if self.entries.is_empty() {
            return self.initialize(catalog, selector, memorized, rng);
        }
        if self.current_index < self.entries.len() - 1 {
            self.current_index += 1;
            self.last_activity = Instant::now();
            self.recompute_resident();
            self.current()
        } else {
            self.rebuild_around_current(catalog, selector, memorized, rng)
        }
    }

    /// Move backward one clip; symmetric to `advance` at the head boundary.
    pub fn retreat<R: Rng>(
        &mut self,
        catalog: &Catalog,
        selector: &ClipSelector,
        memorized: &HashSet<ClipKey>,
        rng: &mut R,
    ) -> Option<&CatalogEntry> {
        if self.entries.is_empty() {
            return self.initialize(catalog, selector, memorized, rng);
        }
        if self.current_index > 0 {
            self.current_index -= 1;
            self.last_activity = Instant::now();
            self.recompute_resident();
            self.current()
        } else {
            self.rebuild_around_current(catalog, selector, memorized, rng)
        }
    }

    fn rebuild_around_current<R: Rng>(
        &mut self,
        catalog: &Catalog,
        selector: &ClipSelector,
        memorized: &HashSet<ClipKey>,
        rng: &mut R,
    ) -> Option<&CatalogEntry> {
        let finished = match self.entries.get(self.current_index) {
            Some(entry) => entry.clone(),
            None => return None,
        };

        if self.initialize(catalog, selector, memorized, rng).is_none() {
            return None;
        }
        // Re-pin the finished clip as the new middle so both scroll
        // directions keep a full preload buffer around it
        self.entries[self.current_index] = finished;
        self.recompute_resident();
        self.current()
    }

    pub fn current(&self) -> Option<&CatalogEntry> {
        self.entries.get(self.current_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Video asset ids whose media should be kept resident: the window
    /// `[current - radius, current + radius]` clamped to queue bounds.
    pub fn resident_media(&self) -> &HashSet<String> {
        &self.resident_media
    }

    /// Record user activity so idle eviction keeps its distance.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Clear the whole queue when no interaction happened for the eviction
    /// span. Called from a periodic timer independent of user input.
    pub fn evict_if_idle(&mut self, now: Instant) -> bool {
        if !self.entries.is_empty()
            && now.duration_since(self.last_activity) > IDLE_EVICTION
        {
            info!("💤 Queue idle for over {:?}, releasing media", IDLE_EVICTION);
            self.clear();
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.resident_media.clear();
        self.current_index = 0;
    }

    fn recompute_resident(&mut self) {
        self.resident_media.clear();
        if self.entries.is_empty() {
            return;
        }
        let lo = self.current_index.saturating_sub(PRELOAD_RADIUS);
        let hi = (self.current_index + PRELOAD_RADIUS).min(self.entries.len() - 1);
        for entry in &self.entries[lo..=hi] {
            self.resident_media.insert(entry.video_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, ClipDurationPolicy, MediaHandle, VideoAsset};
    use crate::selector::CategoryWeights;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture() -> (Catalog, ClipSelector) {
        let videos = vec![
            VideoAsset {
                id: "study_algebra".to_string(),
                display_name: "algebra".to_string(),
                category: Category::Study,
                duration_seconds: 1200.0,
                media: MediaHandle::Unbacked,
            },
            VideoAsset {
                id: "relax_lofi".to_string(),
                display_name: "lofi".to_string(),
                category: Category::Relax,
                duration_seconds: 1200.0,
                media: MediaHandle::Unbacked,
            },
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let catalog = Catalog::build(
            &videos,
            &ClipDurationPolicy::Fixed { seconds: 120 },
            30,
            &mut rng,
        );
        (catalog, ClipSelector::new(CategoryWeights::default()))
    }

    #[test]
    fn test_initialize_fills_window_with_cursor_at_middle() {
        let (catalog, selector) = fixture();
        let mut queue = ClipQueue::new();
        let mut rng = StdRng::seed_from_u64(2);

        let current = queue
            .initialize(&catalog, &selector, &HashSet::new(), &mut rng)
            .cloned();
        assert!(current.is_some());
        assert_eq!(queue.len(), QUEUE_CAPACITY);
        assert_eq!(queue.current_index(), 3);
        assert!(!queue.resident_media().is_empty());
        assert!(queue.resident_media().len() <= QUEUE_CAPACITY);
    }

    #[test]
    fn test_window_invariant_holds_across_navigation() {
        let (catalog, selector) = fixture();
        let mut queue = ClipQueue::new();
        let memorized = HashSet::new();
        let mut rng = StdRng::seed_from_u64(3);

        queue.initialize(&catalog, &selector, &memorized, &mut rng);
        for step in 0..40 {
            let entry = if step % 5 == 0 {
                queue.retreat(&catalog, &selector, &memorized, &mut rng)
            } else {
                queue.advance(&catalog, &selector, &memorized, &mut rng)
            };
            assert!(entry.is_some());
            assert_eq!(queue.len(), QUEUE_CAPACITY);
            assert!(queue.current_index() < queue.len());
        }
    }

    #[test]
    fn test_advance_at_tail_rebuilds_around_finished_clip() {
        let (catalog, selector) = fixture();
        let mut queue = ClipQueue::new();
        let memorized = HashSet::new();
        let mut rng = StdRng::seed_from_u64(4);

        queue.initialize(&catalog, &selector, &memorized, &mut rng);
        // Walk to the tail
        for _ in 0..(QUEUE_CAPACITY - 1 - queue.current_index()) {
            queue.advance(&catalog, &selector, &memorized, &mut rng);
        }
        let tail = queue.current().unwrap().clip_id.clone();

        let rebuilt = queue
            .advance(&catalog, &selector, &memorized, &mut rng)
            .unwrap()
            .clip_id
            .clone();
        assert_eq!(rebuilt, tail);
        assert_eq!(queue.len(), QUEUE_CAPACITY);
        assert_eq!(queue.current_index(), 3);
    }

    #[test]
    fn test_retreat_at_head_rebuilds_around_finished_clip() {
        let (catalog, selector) = fixture();
        let mut queue = ClipQueue::new();
        let memorized = HashSet::new();
        let mut rng = StdRng::seed_from_u64(5);

        queue.initialize(&catalog, &selector, &memorized, &mut rng);
        for _ in 0..queue.current_index() {
            queue.retreat(&catalog, &selector, &memorized, &mut rng);
        }
        assert_eq!(queue.current_index(), 0);
        let head = queue.current().unwrap().clip_id.clone();

        let rebuilt = queue
            .retreat(&catalog, &selector, &memorized, &mut rng)
            .unwrap()
            .clip_id
            .clone();
        assert_eq!(rebuilt, head);
        assert_eq!(queue.current_index(), 3);
    }

    #[test]
    fn test_exhausted_catalog_leaves_queue_empty() {
        let (catalog, selector) = fixture();
        let mut queue = ClipQueue::new();
        let memorized: HashSet<ClipKey> =
            catalog.entries().iter().map(|e| e.key()).collect();
        let mut rng = StdRng::seed_from_u64(6);

        let current = queue.initialize(&catalog, &selector, &memorized, &mut rng);
        assert!(current.is_none());
        assert!(queue.is_empty());
        assert!(queue.resident_media().is_empty());
    }

    #[test]
    fn test_idle_eviction_releases_everything() {
        let (catalog, selector) = fixture();
        let mut queue = ClipQueue::new();
        let mut rng = StdRng::seed_from_u64(7);

        queue.initialize(&catalog, &selector, &HashSet::new(), &mut rng);
        assert!(!queue.evict_if_idle(Instant::now()));
        assert_eq!(queue.len(), QUEUE_CAPACITY);

        let later = Instant::now() + IDLE_EVICTION + Duration::from_secs(1);
        assert!(queue.evict_if_idle(later));
        assert!(queue.is_empty());
        assert!(queue.resident_media().is_empty());

        // Empty queue has nothing left to evict
        assert!(!queue.evict_if_idle(later));
    }
}
