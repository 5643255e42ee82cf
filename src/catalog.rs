use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::records::{ClipId, ClipKey};

/// Duration substituted when a video's real duration cannot be determined.
pub const DEFAULT_VIDEO_DURATION_SECS: f64 = 600.0;

/// Minimum clip length floor in seconds.
pub const DEFAULT_MIN_CLIP_SECS: u32 = 30;

/// Which feed a video belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Study,
    Relax,
}

impl Category {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "study" => Some(Category::Study),
            "relax" => Some(Category::Relax),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Study => write!(f, "study"),
            Category::Relax => write!(f, "relax"),
        }
    }
}

/// Backing media for a video asset.
///
/// Directory scans produce `LocalFile`; records restored from persistence
/// without a re-granted directory come back `Unbacked` until the next scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MediaHandle {
    LocalFile { path: PathBuf },
    Unbacked,
}

/// A single video discovered in one of the source directories.
///
/// Immutable once created within a session; rebuilt on every rescan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAsset {
    /// Stable id derived from the parent directory and file stem
    pub id: String,

    /// Display name (file stem)
    pub display_name: String,

    /// Feed the video belongs to
    pub category: Category,

    /// Probed duration in seconds, or the default when probing failed
    pub duration_seconds: f64,

    /// Backing media handle
    pub media: MediaHandle,
}

/// Half-open clip time-range in whole seconds, `[start_time, end_time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_time: u32,
    pub end_time: u32,
}

impl TimeRange {
    pub fn duration_secs(&self) -> u32 {
        self.end_time - self.start_time
    }
}

/// How clip lengths are drawn when partitioning a video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ClipDurationPolicy {
    /// Every clip has the same length.
    Fixed { seconds: u32 },

    /// Each clip length is a uniform-random whole number of minutes in
    /// `[min_minutes, max_minutes]`.
    #[serde(rename_all = "camelCase")]
    RandomMinutes { min_minutes: u32, max_minutes: u32 },
}

impl Default for ClipDurationPolicy {
    fn default() -> Self {
        ClipDurationPolicy::Fixed { seconds: 300 }
    }
}

impl ClipDurationPolicy {
    fn draw<R: Rng>(&self, rng: &mut R) -> u32 {
        let length = match *self {
            ClipDurationPolicy::Fixed { seconds } => seconds,
            ClipDurationPolicy::RandomMinutes {
                min_minutes,
                max_minutes,
            } => {
                let lo = min_minutes.min(max_minutes);
                let hi = min_minutes.max(max_minutes);
                rng.gen_range(lo..=hi) * 60
            }
        };
        // A zero-length draw would never advance the cursor
        length.max(1)
    }
}

/// Partition a video's duration into non-overlapping clip ranges.
///
/// Ranges shorter than `min_clip_seconds` are dropped, including a trailing
/// remainder; the remainder is never merged into the previous range. A
/// non-positive or non-finite duration is substituted with the default
/// rather than failing.
pub fn partition<R: Rng>(
    duration_seconds: f64,
    policy: &ClipDurationPolicy,
    min_clip_seconds: u32,
    rng: &mut R,
) -> Vec<TimeRange> {
    let duration = if duration_seconds.is_finite() && duration_seconds > 0.0 {
        duration_seconds.floor() as u32
    } else {
        warn!(
            "Unusable duration {:?}, substituting {}s default",
            duration_seconds, DEFAULT_VIDEO_DURATION_SECS
        );
        DEFAULT_VIDEO_DURATION_SECS as u32
    };

    let mut ranges = Vec::new();
    let mut t = 0u32;
    while t < duration {
        let length = policy.draw(rng);
        let end = t.saturating_add(length).min(duration);
        if end - t >= min_clip_seconds {
            ranges.push(TimeRange {
                start_time: t,
                end_time: end,
            });
        }
        t = end;
    }

    ranges
}

/// One schedulable clip: a video, a time-range within it, and its category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Content-addressed clip id
    pub clip_id: ClipId,

    /// Owning video asset id
    pub video_id: String,

    /// Owning video display name (part of the clip identity key)
    pub video_name: String,

    /// Category inherited from the owning video
    pub category: Category,

    /// Time-range within the video
    pub range: TimeRange,

    /// Position of the range within the video's partition
    pub ordinal: usize,
}

impl CatalogEntry {
    /// Identity key of the clip-state record this entry maps to.
    pub fn key(&self) -> ClipKey {
        ClipKey {
            video_name: self.video_name.clone(),
            start_time: self.range.start_time,
            end_time: self.range.end_time,
        }
    }
}

/// The full set of schedulable clips across all loaded videos.
///
/// Derived, disposable state: rebuilt from scratch whenever the video set or
/// the clip-duration policy changes.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<ClipId, usize>,
}

impl Catalog {
    /// Build the catalog by partitioning every video under the given policy.
    pub fn build<R: Rng>(
        videos: &[VideoAsset],
        policy: &ClipDurationPolicy,
        min_clip_seconds: u32,
        rng: &mut R,
    ) -> Self {
        let mut entries = Vec::new();

        for video in videos {
            let ranges = partition(video.duration_seconds, policy, min_clip_seconds, rng);
            if ranges.is_empty() {
                debug!(
                    "Video '{}' produced no ranges ({}s, floor {}s)",
                    video.display_name, video.duration_seconds, min_clip_seconds
                );
                continue;
            }
            for (ordinal, range) in ranges.into_iter().enumerate() {
                entries.push(CatalogEntry {
                    clip_id: ClipId::derive(&video.display_name, range.start_time, range.end_time),
                    video_id: video.id.clone(),
                    video_name: video.display_name.clone(),
                    category: video.category,
                    range,
                    ordinal,
                });
            }
        }

        let by_id = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.clip_id.clone(), i))
            .collect();

        debug!("Catalog built: {} entries", entries.len());
        Self { entries, by_id }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map a clip id back to its catalog entry. Returns `None` for ids minted
    /// against a previous catalog build.
    pub fn resolve(&self, clip_id: &ClipId) -> Option<&CatalogEntry> {
        self.by_id.get(clip_id).map(|&i| &self.entries[i])
    }

    /// Ranges grouped by owning video, as cached into user preferences.
    pub fn ranges_by_video(&self) -> HashMap<String, Vec<TimeRange>> {
        let mut map: HashMap<String, Vec<TimeRange>> = HashMap::new();
        for entry in &self.entries {
            map.entry(entry.video_name.clone()).or_default().push(entry.range);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed(seconds: u32) -> ClipDurationPolicy {
        ClipDurationPolicy::Fixed { seconds }
    }

    #[test]
    fn test_partition_drops_short_remainder() {
        let mut rng = StdRng::seed_from_u64(1);
        let ranges = partition(125.0, &fixed(60), 30, &mut rng);
        assert_eq!(
            ranges,
            vec![
                TimeRange { start_time: 0, end_time: 60 },
                TimeRange { start_time: 60, end_time: 120 },
            ]
        );
    }

    #[test]
    fn test_partition_keeps_long_remainder() {
        let mut rng = StdRng::seed_from_u64(1);
        let ranges = partition(150.0, &fixed(60), 30, &mut rng);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[2], TimeRange { start_time: 120, end_time: 150 });
    }

    #[test]
    fn test_partition_properties_hold_for_random_policy() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = ClipDurationPolicy::RandomMinutes {
            min_minutes: 1,
            max_minutes: 5,
        };
        for duration in [45.0, 600.0, 3600.0, 7254.0] {
            let ranges = partition(duration, &policy, 30, &mut rng);
            let mut last_end = 0;
            let mut total = 0u32;
            for range in &ranges {
                assert!(range.start_time >= last_end);
                assert!(range.end_time > range.start_time);
                assert!(range.duration_secs() >= 30);
                last_end = range.end_time;
                total += range.duration_secs();
            }
            assert!(f64::from(total) <= duration);
        }
    }

    #[test]
    fn test_partition_is_deterministic_for_fixed_seed() {
        let policy = ClipDurationPolicy::RandomMinutes {
            min_minutes: 2,
            max_minutes: 8,
        };
        let a = partition(5000.0, &policy, 30, &mut StdRng::seed_from_u64(42));
        let b = partition(5000.0, &policy, 30, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_partition_substitutes_default_duration() {
        let mut rng = StdRng::seed_from_u64(1);
        let ranges = partition(0.0, &fixed(60), 30, &mut rng);
        assert_eq!(ranges.len(), 10); // 600s default / 60s clips
        let ranges = partition(f64::NAN, &fixed(60), 30, &mut rng);
        assert_eq!(ranges.len(), 10);
    }

    #[test]
    fn test_catalog_resolve_roundtrip() {
        let videos = vec![VideoAsset {
            id: "study_lecture1".to_string(),
            display_name: "lecture1".to_string(),
            category: Category::Study,
            duration_seconds: 300.0,
            media: MediaHandle::Unbacked,
        }];
        let mut rng = StdRng::seed_from_u64(3);
        let catalog = Catalog::build(&videos, &fixed(120), 30, &mut rng);
        assert_eq!(catalog.len(), 3); // 120 + 120 + 60
        for entry in catalog.entries() {
            let resolved = catalog.resolve(&entry.clip_id).unwrap();
            assert_eq!(resolved.range, entry.range);
        }
    }

    #[test]
    fn test_stale_clip_id_does_not_resolve_after_rebuild() {
        let videos = vec![VideoAsset {
            id: "study_lecture1".to_string(),
            display_name: "lecture1".to_string(),
            category: Category::Study,
            duration_seconds: 600.0,
            media: MediaHandle::Unbacked,
        }];
        let mut rng = StdRng::seed_from_u64(3);
        let old = Catalog::build(&videos, &fixed(90), 30, &mut rng);
        let stale_id = old.entries()[1].clip_id.clone();

        let rebuilt = Catalog::build(&videos, &fixed(240), 30, &mut rng);
        assert!(rebuilt.resolve(&stale_id).is_none());
    }
}
