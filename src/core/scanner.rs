//! Filesystem scanner
//!
//! Enumerates the supported audio files under the library root. Used for
//! both the full rebuild pass and the delta resync (the caller diffs the
//! returned set against the store's paths).

use std::collections::BTreeSet;
use std::path::PathBuf;
use walkdir::{DirEntry, WalkDir};

use crate::core::tags;

/// Recursive scanner over a library root
pub struct Scanner {
    root: PathBuf,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Check if an entry should be skipped (hidden files and directories)
    fn should_skip(entry: &DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
    }

    /// Enumerate all supported audio files under the root.
    ///
    /// Paths come back symlink-resolved; an entry whose real path falls
    /// outside the root (a symlink escape) is skipped with a warning.
    pub fn scan(&self) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();

        let root = match self.root.canonicalize() {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(
                    "library root {} is not accessible: {}",
                    self.root.display(),
                    e
                );
                return files;
            }
        };

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !Self::should_skip(e));

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !tags::is_supported(entry.path()) {
                continue;
            }

            match entry.path().canonicalize() {
                Ok(resolved) if resolved.starts_with(&root) => {
                    files.insert(resolved);
                }
                Ok(_) => {
                    tracing::warn!(
                        "skipping {}: resolves outside the library root",
                        entry.path().display()
                    );
                }
                Err(e) => {
                    tracing::warn!("skipping {}: {}", entry.path().display(), e);
                }
            }
        }

        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_filters_and_recurses() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let root = root.as_path();

        std::fs::create_dir_all(root.join("Artist/Album")).unwrap();
        std::fs::write(root.join("Artist/Album/01.flac"), b"x").unwrap();
        std::fs::write(root.join("Artist/Album/02.MP3"), b"x").unwrap();
        std::fs::write(root.join("Artist/Album/cover.jpg"), b"x").unwrap();
        std::fs::write(root.join("loose.ogg"), b"x").unwrap();

        let files = Scanner::new(root).scan();
        assert_eq!(files.len(), 3);
        assert!(files.contains(&root.join("Artist/Album/01.flac")));
        assert!(files.contains(&root.join("Artist/Album/02.MP3")));
        assert!(files.contains(&root.join("loose.ogg")));
    }

    #[test]
    fn test_hidden_directories_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let root = root.as_path();

        std::fs::create_dir_all(root.join(".trash")).unwrap();
        std::fs::write(root.join(".trash/gone.mp3"), b"x").unwrap();
        std::fs::write(root.join("kept.mp3"), b"x").unwrap();

        let files = Scanner::new(root).scan();
        assert_eq!(files.len(), 1);
        assert!(files.contains(&root.join("kept.mp3")));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let files = Scanner::new("/definitely/not/a/real/root").scan();
        assert!(files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escapes_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("library");
        let outside = temp_dir.path().join("outside");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.mp3"), b"x").unwrap();
        std::fs::write(root.join("kept.mp3"), b"x").unwrap();

        // a symlinked directory and a symlinked file, both pointing outside
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();
        std::os::unix::fs::symlink(outside.join("secret.mp3"), root.join("link.mp3")).unwrap();

        let root = root.canonicalize().unwrap();
        let files = Scanner::new(&root).scan();
        assert_eq!(files.len(), 1);
        assert!(files.contains(&root.join("kept.mp3")));
    }
}
