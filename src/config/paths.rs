//! Data directory layout
//!
//! All durable state lives under a single data directory: the SQLite index,
//! the per-mixtape JSON documents with their covers, the transcode cache and
//! the indexing status snapshot.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Filesystem layout of the service's data directory
#[derive(Debug, Clone)]
pub struct DataPaths {
    data_dir: PathBuf,
}

impl DataPaths {
    /// Create the layout rooted at `data_dir`, creating directories as needed
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let paths = Self {
            data_dir: data_dir.into(),
        };
        paths.create_directories()?;
        Ok(paths)
    }

    /// Platform default data directory when none is configured
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "tapedeck")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".tapedeck"))
    }

    fn create_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;

        for subdir in ["mixtapes", "mixtapes/covers", "cache"] {
            std::fs::create_dir_all(self.data_dir.join(subdir))?;
        }

        Ok(())
    }

    /// Get the data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the index database path
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("collection.db")
    }

    /// Get the indexing status snapshot path
    pub fn status_path(&self) -> PathBuf {
        self.data_dir.join("indexing_status.json")
    }

    /// Get the mixtape documents directory
    pub fn mixtapes_dir(&self) -> PathBuf {
        self.data_dir.join("mixtapes")
    }

    /// Get the mixtape covers directory
    pub fn covers_dir(&self) -> PathBuf {
        self.data_dir.join("mixtapes").join("covers")
    }

    /// Get the transcode cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_creation() {
        let temp_dir = TempDir::new().unwrap();
        let paths = DataPaths::new(temp_dir.path().join("data")).unwrap();

        assert!(paths.data_dir().exists());
        assert!(paths.mixtapes_dir().exists());
        assert!(paths.covers_dir().exists());
        assert!(paths.cache_dir().exists());
        assert_eq!(
            paths.status_path().file_name().unwrap(),
            "indexing_status.json"
        );
    }
}
