use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::catalog::{ClipDurationPolicy, DEFAULT_MIN_CLIP_SECS};

/// Configuration for the clipfeed engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Video library locations and scanning
    pub library: LibraryConfig,

    /// Clip partitioning and selection policy
    pub scheduling: SchedulingConfig,

    /// Queue housekeeping
    pub queue: QueueConfig,

    /// Persistence backend settings
    pub persistence: PersistenceConfig,

    /// Embedded document-store service
    pub server: ServerConfig,

    /// Logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directories holding study videos
    pub study_dirs: Vec<PathBuf>,

    /// Directories holding relax videos
    pub relax_dirs: Vec<PathBuf>,

    /// Supported video file extensions
    pub supported_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Probability that a selection round tries the study pool first
    pub study_weight: f64,

    /// Minimum clip length floor in seconds
    pub min_clip_seconds: u32,

    /// How clip lengths are drawn
    pub clip_policy: ClipDurationPolicy,

    /// Fixed RNG seed for reproducible runs (unset = entropy)
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How often the idle-eviction timer fires, in seconds
    pub eviction_check_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Base URL of the companion document store; unset = local-only
    pub backend_url: Option<String>,

    /// Bounded wait for any persistence call, in seconds
    pub request_timeout_seconds: u64,

    /// Directory for the local fallback store
    pub data_dir: PathBuf,

    /// User record every store operation is scoped to
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Run the embedded document-store service
    pub enabled: bool,

    /// Listen port for the embedded service
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Log level filter
    pub log_level: String,
}

impl Config {
    /// Load configuration from the first parseable file in the standard
    /// locations, then fall back to environment variables.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "clipfeed.toml",
            "config/clipfeed.toml",
            "~/.config/clipfeed/config.toml",
            "/etc/clipfeed/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        if let Ok(config) = Self::from_env() {
            return Ok(config);
        }

        Err(anyhow!("No configuration file found"))
    }

    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(weight) = std::env::var("CLIPFEED_STUDY_WEIGHT") {
            config.scheduling.study_weight = weight.parse().unwrap_or(0.8);
        }

        if let Ok(backend) = std::env::var("CLIPFEED_BACKEND_URL") {
            config.persistence.backend_url = Some(backend);
        }

        if let Ok(data_dir) = std::env::var("CLIPFEED_DATA_DIR") {
            config.persistence.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(user_id) = std::env::var("CLIPFEED_USER_ID") {
            config.persistence.user_id = user_id;
        }

        if let Ok(log_level) = std::env::var("CLIPFEED_LOG_LEVEL") {
            config.output.log_level = log_level;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.scheduling.study_weight) {
            return Err(anyhow!("study_weight must be within [0, 1]"));
        }

        if self.scheduling.min_clip_seconds == 0 {
            return Err(anyhow!("min_clip_seconds must be greater than 0"));
        }

        match self.scheduling.clip_policy {
            ClipDurationPolicy::Fixed { seconds } => {
                if seconds < self.scheduling.min_clip_seconds {
                    return Err(anyhow!(
                        "fixed clip length must not be below min_clip_seconds"
                    ));
                }
            }
            ClipDurationPolicy::RandomMinutes {
                min_minutes,
                max_minutes,
            } => {
                if min_minutes == 0 || min_minutes > max_minutes {
                    return Err(anyhow!(
                        "random clip minutes must satisfy 0 < min <= max"
                    ));
                }
            }
        }

        if self.persistence.request_timeout_seconds == 0 {
            return Err(anyhow!("request_timeout_seconds must be greater than 0"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Clipfeed Configuration:\n\
            - Study Directories: {}\n\
            - Relax Directories: {}\n\
            - Study Weight: {:.2}\n\
            - Clip Policy: {:?}\n\
            - Backend: {}\n\
            - Data Directory: {}\n\
            - Embedded Store: {}",
            self.library.study_dirs.len(),
            self.library.relax_dirs.len(),
            self.scheduling.study_weight,
            self.scheduling.clip_policy,
            self.persistence
                .backend_url
                .as_deref()
                .unwrap_or("local-only"),
            self.persistence.data_dir.display(),
            if self.server.enabled {
                format!("port {}", self.server.port)
            } else {
                "disabled".to_string()
            },
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: LibraryConfig {
                study_dirs: Vec::new(),
                relax_dirs: Vec::new(),
                supported_extensions: vec![
                    "mp4".to_string(),
                    "mkv".to_string(),
                    "avi".to_string(),
                    "mov".to_string(),
                    "webm".to_string(),
                    "m4v".to_string(),
                ],
            },
            scheduling: SchedulingConfig {
                study_weight: 0.8,
                min_clip_seconds: DEFAULT_MIN_CLIP_SECS,
                clip_policy: ClipDurationPolicy::default(),
                rng_seed: None,
            },
            queue: QueueConfig {
                eviction_check_secs: 30,
            },
            persistence: PersistenceConfig {
                backend_url: None,
                request_timeout_seconds: 5,
                data_dir: PathBuf::from("./data"),
                user_id: crate::persistence::DEFAULT_USER_ID.to_string(),
            },
            server: ServerConfig {
                enabled: false,
                port: 5180,
            },
            output: OutputConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_study_dir(mut self, dir: PathBuf) -> Self {
        self.config.library.study_dirs.push(dir);
        self
    }

    pub fn with_relax_dir(mut self, dir: PathBuf) -> Self {
        self.config.library.relax_dirs.push(dir);
        self
    }

    pub fn with_study_weight(mut self, weight: f64) -> Self {
        self.config.scheduling.study_weight = weight;
        self
    }

    pub fn with_clip_policy(mut self, policy: ClipDurationPolicy) -> Self {
        self.config.scheduling.clip_policy = policy;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.config.scheduling.rng_seed = Some(seed);
        self
    }

    pub fn with_backend_url(mut self, url: String) -> Self {
        self.config.persistence.backend_url = Some(url);
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.config.persistence.data_dir = dir;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduling.study_weight, 0.8);
        assert_eq!(config.scheduling.min_clip_seconds, 30);
        assert_eq!(config.persistence.user_id, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_study_weight(0.6)
            .with_rng_seed(7)
            .with_data_dir(PathBuf::from("/tmp/clipfeed"))
            .build();

        assert_eq!(config.scheduling.study_weight, 0.6);
        assert_eq!(config.scheduling.rng_seed, Some(7));
        assert_eq!(config.persistence.data_dir, PathBuf::from("/tmp/clipfeed"));
    }

    #[test]
    fn test_validation_rejects_bad_policy() {
        let mut config = Config::default();
        config.scheduling.clip_policy = ClipDurationPolicy::Fixed { seconds: 10 };
        assert!(config.validate().is_err());

        config.scheduling.clip_policy = ClipDurationPolicy::RandomMinutes {
            min_minutes: 5,
            max_minutes: 2,
        };
        assert!(config.validate().is_err());
    }
}
