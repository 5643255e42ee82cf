use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::catalog::{Category, MediaHandle, VideoAsset, DEFAULT_VIDEO_DURATION_SECS};

/// File-access collaborator: enumerates video files in the source
/// directories and probes their durations.
#[derive(Clone)]
pub struct MediaLibrary {
    supported_extensions: Vec<String>,
    default_duration_seconds: f64,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self {
            supported_extensions: vec![
                "mp4".to_string(),
                "mkv".to_string(),
                "avi".to_string(),
                "mov".to_string(),
                "webm".to_string(),
                "m4v".to_string(),
            ],
            default_duration_seconds: DEFAULT_VIDEO_DURATION_SECS,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.supported_extensions = extensions;
        self
    }

    /// Discover all videos under a directory recursively and probe each
    /// duration.
    pub async fn scan_directory(
        &self,
        dir: &Path,
        category: Category,
    ) -> Result<Vec<VideoAsset>> {
        let mut paths = self.discover_videos(dir).await?;
        paths.sort();

        let mut assets = Vec::with_capacity(paths.len());
        for path in paths {
            let duration = self.probe_duration(&path).await;
            assets.push(self.asset_for(&path, category, duration));
        }

        info!(
            "📹 Scanned {}: {} {} videos",
            dir.display(),
            assets.len(),
            category
        );
        Ok(assets)
    }

    fn asset_for(&self, path: &Path, category: Category, duration: f64) -> VideoAsset {
        let stem = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let parent = path
            .parent()
            .and_then(|p| p.file_name())
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        VideoAsset {
            id: format!("{}_{}", parent, stem),
            display_name: stem,
            category,
            duration_seconds: duration,
            media: MediaHandle::LocalFile {
                path: path.to_path_buf(),
            },
        }
    }

    /// Recursively collect files with a supported extension.
    async fn discover_videos(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        use std::future::Future;
        use std::pin::Pin;

        fn discover_recursive<'a>(
            supported_extensions: &'a [String],
            dir: &'a Path,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
            Box::pin(async move {
                let mut videos = Vec::new();

                let mut entries = tokio::fs::read_dir(dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if path.is_dir() {
                        let mut sub =
                            discover_recursive(supported_extensions, &path).await?;
                        videos.append(&mut sub);
                    } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                        if supported_extensions.contains(&ext.to_lowercase()) {
                            videos.push(path);
                        }
                    }
                }

                Ok(videos)
            })
        }

        discover_recursive(&self.supported_extensions, dir).await
    }

    /// Probe a video's duration with ffprobe. Any failure (missing binary,
    /// unreadable file, malformed output) substitutes the default duration
    /// rather than propagating.
    pub async fn probe_duration(&self, path: &Path) -> f64 {
        match self.try_probe(path).await {
            Ok(duration) if duration > 0.0 => duration,
            Ok(duration) => {
                warn!(
                    "ffprobe reported unusable duration {} for {}, using {}s default",
                    duration,
                    path.display(),
                    self.default_duration_seconds
                );
                self.default_duration_seconds
            }
            Err(e) => {
                warn!(
                    "Duration probe failed for {} ({}), using {}s default",
                    path.display(),
                    e,
                    self.default_duration_seconds
                );
                self.default_duration_seconds
            }
        }
    }

    async fn try_probe(&self, path: &Path) -> Result<f64> {
        let output = tokio::process::Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path.as_os_str())
            .output()
            .await?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe exited with {}", output.status));
        }

        let data: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        data["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| anyhow!("no duration in ffprobe output"))
    }
}

impl Default for MediaLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Preload/release hooks for keeping the queue's resident media warm.
/// Warming is best-effort: failures are logged and never fatal.
#[async_trait]
pub trait MediaAccess: Send + Sync {
    async fn preload(&self, asset: &VideoAsset) -> Result<()>;
    async fn release(&self, video_id: &str);
}

/// Default media access over local files: preloading verifies the file is
/// still readable so a revoked directory surfaces before playback.
pub struct FileMediaAccess;

#[async_trait]
impl MediaAccess for FileMediaAccess {
    async fn preload(&self, asset: &VideoAsset) -> Result<()> {
        match &asset.media {
            MediaHandle::LocalFile { path } => {
                tokio::fs::metadata(path).await?;
                debug!("Warmed media for {}", asset.id);
                Ok(())
            }
            MediaHandle::Unbacked => Err(anyhow!("no backing media for {}", asset.id)),
        }
    }

    async fn release(&self, video_id: &str) {
        debug!("Released media for {}", video_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::fs;

    #[tokio::test]
    async fn test_scan_finds_supported_files_recursively() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp4"), b"fake").await.unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip").await.unwrap();
        fs::create_dir(dir.path().join("nested")).await.unwrap();
        fs::write(dir.path().join("nested/b.webm"), b"fake")
            .await
            .unwrap();

        let library = MediaLibrary::new();
        let assets = library
            .scan_directory(dir.path(), Category::Study)
            .await
            .unwrap();

        assert_eq!(assets.len(), 2);
        assert!(assets.iter().all(|a| a.category == Category::Study));
        assert!(assets.iter().any(|a| a.display_name == "a"));
        assert!(assets.iter().any(|a| a.display_name == "b"));
    }

    #[tokio::test]
    async fn test_unprobeable_file_gets_default_duration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.mp4");
        fs::write(&path, b"not a real video").await.unwrap();

        let library = MediaLibrary::new();
        let duration = library.probe_duration(&path).await;
        assert_eq!(duration, DEFAULT_VIDEO_DURATION_SECS);
    }

    #[tokio::test]
    async fn test_preload_fails_cleanly_for_unbacked_media() {
        let asset = VideoAsset {
            id: "x".to_string(),
            display_name: "x".to_string(),
            category: Category::Relax,
            duration_seconds: 60.0,
            media: MediaHandle::Unbacked,
        };
        assert!(FileMediaAccess.preload(&asset).await.is_err());
    }
}
