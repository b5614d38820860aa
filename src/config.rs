//! Configuration file handling
//!
//! Loads and manages ~/.config/coursetrack/config.yaml: API endpoint,
//! per-resource staleness windows, garbage-collection policy, and the retry
//! policy for fetches.

use crate::cache::QueryConfig;
use crate::retry::RetryConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the course API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    // json-server mock API
    "http://localhost:5174".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Cache policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Staleness window for course list pages, in seconds
    #[serde(default = "default_courses_stale_secs")]
    pub courses_stale_secs: u64,

    /// Staleness window for a single course, in seconds
    #[serde(default = "default_detail_stale_secs")]
    pub course_stale_secs: u64,

    /// Staleness window for a course's lessons, in seconds
    #[serde(default = "default_detail_stale_secs")]
    pub lessons_stale_secs: u64,

    /// Staleness window for enrollment state, in seconds
    #[serde(default = "default_detail_stale_secs")]
    pub enrollment_stale_secs: u64,

    /// Zero-subscriber inactivity before an entry is evicted, in seconds
    #[serde(default = "default_gc_after_secs")]
    pub gc_after_secs: u64,

    /// Interval between garbage-collection sweeps, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_courses_stale_secs() -> u64 {
    30
}

fn default_detail_stale_secs() -> u64 {
    60
}

fn default_gc_after_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            courses_stale_secs: default_courses_stale_secs(),
            course_stale_secs: default_detail_stale_secs(),
            lessons_stale_secs: default_detail_stale_secs(),
            enrollment_stale_secs: default_detail_stale_secs(),
            gc_after_secs: default_gc_after_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// coursetrack configuration
///
/// Represents the complete ~/.config/coursetrack/config.yaml file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiSettings,

    /// Cache policy
    #[serde(default)]
    pub cache: CacheSettings,

    /// Retry policy for fetches
    #[serde(default)]
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    /// Load configuration from a path; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save_default(&self) -> Result<()> {
        self.save(&Self::default_path())
    }

    /// Save configuration to a path, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_yaml::to_string(self)?;
        fs::write(path, raw)?;
        tracing::info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Default config file path (~/.config/coursetrack/config.yaml)
    pub fn default_path() -> PathBuf {
        // Always use ~/.config for consistency across platforms (macOS, Linux)
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("coursetrack");
        path.push("config.yaml");
        path
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Interval between background GC sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.sweep_interval_secs)
    }

    fn query_config(&self, stale_secs: u64) -> QueryConfig {
        QueryConfig::default()
            .with_stale_after(Duration::from_secs(stale_secs))
            .with_gc_after(Duration::from_secs(self.cache.gc_after_secs))
            .with_retry(self.retry.clone())
            .with_timeout(self.request_timeout())
    }

    /// Query configuration for course list pages
    pub fn courses_list_config(&self) -> QueryConfig {
        self.query_config(self.cache.courses_stale_secs)
    }

    /// Query configuration for a single course
    pub fn course_config(&self) -> QueryConfig {
        self.query_config(self.cache.course_stale_secs)
    }

    /// Query configuration for lessons
    pub fn lessons_config(&self) -> QueryConfig {
        self.query_config(self.cache.lessons_stale_secs)
    }

    /// Query configuration for enrollment state
    pub fn enrollment_config(&self) -> QueryConfig {
        self.query_config(self.cache.enrollment_stale_secs)
    }
}
