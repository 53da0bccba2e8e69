//! Service settings
//!
//! An explicit configuration record loaded once at startup and passed into
//! the components that need it. Nothing in the core reads configuration from
//! ambient process state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::transcode::Quality;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Root directory of the music collection
    #[serde(default)]
    pub music_root: PathBuf,

    /// Debounce window for filesystem change events, in seconds
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: f64,

    /// Rows sampled for the startup freshness check
    #[serde(default = "default_sample_size")]
    pub freshness_sample: i64,

    /// Per-bucket result cap for grouped search
    #[serde(default = "default_search_limit")]
    pub search_limit: i64,

    /// Parallel transcode workers
    #[serde(default = "default_cache_workers")]
    pub cache_workers: usize,

    /// Qualities generated when a mixtape is saved
    #[serde(default = "default_precache_qualities")]
    pub precache_qualities: Vec<Quality>,

    /// Per-job encoder timeout, in seconds
    #[serde(default = "default_transcode_timeout")]
    pub transcode_timeout_secs: u64,

    /// Progress listener inactivity timeout, in seconds
    #[serde(default = "default_listen_timeout")]
    pub listen_timeout_secs: u64,

    /// Maximum stored cover width in pixels
    #[serde(default = "default_cover_max_width")]
    pub cover_max_width: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            music_root: PathBuf::new(),
            debounce_secs: default_debounce_secs(),
            freshness_sample: default_sample_size(),
            search_limit: default_search_limit(),
            cache_workers: default_cache_workers(),
            precache_qualities: default_precache_qualities(),
            transcode_timeout_secs: default_transcode_timeout(),
            listen_timeout_secs: default_listen_timeout(),
            cover_max_width: default_cover_max_width(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, writing defaults when it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read settings file")?;
            serde_json::from_str(&content).context("Failed to parse settings file")
        } else {
            let settings = Self::default();
            settings.save(path)?;
            Ok(settings)
        }
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).context("Failed to write settings file")?;
        Ok(())
    }

    /// Debounce window as a [`Duration`]
    pub fn debounce(&self) -> Duration {
        Duration::from_secs_f64(self.debounce_secs)
    }

    /// Encoder timeout as a [`Duration`]
    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    /// Listener inactivity timeout as a [`Duration`]
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs)
    }
}

// Default value functions for serde

fn default_debounce_secs() -> f64 {
    2.0
}

fn default_sample_size() -> i64 {
    200
}

fn default_search_limit() -> i64 {
    20
}

fn default_cache_workers() -> usize {
    4
}

fn default_precache_qualities() -> Vec<Quality> {
    vec![Quality::Medium]
}

fn default_transcode_timeout() -> u64 {
    300
}

fn default_listen_timeout() -> u64 {
    300
}

fn default_cover_max_width() -> u32 {
    1200
}
