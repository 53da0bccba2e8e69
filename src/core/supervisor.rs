//! Indexer supervisor
//!
//! Owns the scanner/watcher lifecycle and the single write path into the
//! index store. Rebuild passes, resync deltas and watcher-driven updates all
//! enter the same mutex-guarded writer critical section; search reads stay
//! concurrent through WAL.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::scanner::Scanner;
use crate::core::status::{IndexPhase, StatusPublisher};
use crate::core::tags;
use crate::core::watcher::{ChangeEvent, ChangeWatcher};
use crate::db::TrackTable;
use crate::error::Result;

/// Supervisor tuning
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Quiet window for filesystem change events
    pub debounce: Duration,
    /// Rows sampled by the startup freshness check
    pub freshness_sample: i64,
    /// Status snapshot cadence during rebuild/resync, in files
    pub progress_every: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            freshness_sample: 200,
            progress_every: 100,
        }
    }
}

struct WatchHandle {
    watcher: ChangeWatcher,
    drain: JoinHandle<()>,
}

struct Inner {
    root: PathBuf,
    tracks: TrackTable,
    status: StatusPublisher,
    options: SupervisorOptions,
    write_lock: tokio::sync::Mutex<()>,
    watch_paused: Arc<AtomicBool>,
    watch: tokio::sync::Mutex<Option<WatchHandle>>,
}

/// Orchestrates initial scan, resync and live monitoring
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    /// Create a supervisor over a library root.
    ///
    /// The root is canonicalized up front so every stored path is anchored
    /// under the resolved root.
    pub fn new(
        root: impl Into<PathBuf>,
        tracks: TrackTable,
        status: StatusPublisher,
        options: SupervisorOptions,
    ) -> Result<Self> {
        let root = root.into().canonicalize()?;

        Ok(Self {
            inner: Arc::new(Inner {
                root,
                tracks,
                status,
                options,
                write_lock: tokio::sync::Mutex::new(()),
                watch_paused: Arc::new(AtomicBool::new(false)),
                watch: tokio::sync::Mutex::new(None),
            }),
        })
    }

    /// Get the canonical library root
    pub fn root(&self) -> &PathBuf {
        &self.inner.root
    }

    /// Bring the store in line with the filesystem, then start watching.
    ///
    /// An empty store forces a full rebuild; a failed freshness sample
    /// triggers a resync.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.tracks.count().await? == 0 {
            tracing::info!("no tracks in database, performing initial scan");
            self.rebuild().await?;
        } else if !self.is_synced().await? {
            tracing::info!("database out of sync with filesystem, repairing");
            self.resync().await?;
        }

        self.start_watch().await
    }

    /// Full reindex: enumerate, clear, re-extract everything.
    ///
    /// The watcher is paused for the duration so the rebuild's own writes
    /// don't come back around as change events.
    pub async fn rebuild(&self) -> Result<()> {
        self.inner.watch_paused.store(true, Ordering::SeqCst);
        let result = self.rebuild_locked().await;
        self.inner.watch_paused.store(false, Ordering::SeqCst);
        result
    }

    async fn rebuild_locked(&self) -> Result<()> {
        let inner = &self.inner;
        let _write = inner.write_lock.lock().await;

        inner.status.publish(IndexPhase::Rebuilding, 0, 0)?;

        let files: Vec<PathBuf> = Scanner::new(&inner.root).scan().into_iter().collect();
        let total = files.len();
        tracing::info!("full rebuild: {} music files found, indexing...", total);

        inner.tracks.clear().await?;

        let mut done = 0usize;
        for chunk in files.chunks(inner.options.progress_every.max(1)) {
            let batch = extract_batch(chunk);
            inner.tracks.upsert_batch(&batch).await?;

            done += chunk.len();
            inner
                .status
                .publish(IndexPhase::Rebuilding, total as u64, done as u64)?;
        }

        inner.status.clear()?;
        tracing::info!("full rebuild complete: {} files indexed", done);

        Ok(())
    }

    /// Delta pass: drop rows whose files are gone, add files the store has
    /// never seen. Rows for unchanged paths are not touched.
    pub async fn resync(&self) -> Result<()> {
        let inner = &self.inner;
        let _write = inner.write_lock.lock().await;

        inner.status.publish(IndexPhase::Resyncing, 0, 0)?;

        let fs_paths: BTreeSet<String> = Scanner::new(&inner.root)
            .scan()
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let db_paths: BTreeSet<String> = inner.tracks.all_paths().await?.into_iter().collect();

        let to_remove: Vec<String> = db_paths.difference(&fs_paths).cloned().collect();
        let to_add: Vec<PathBuf> = fs_paths
            .difference(&db_paths)
            .map(PathBuf::from)
            .collect();

        inner.tracks.delete_batch(&to_remove).await?;

        let total = to_add.len();
        let mut done = 0usize;
        for chunk in to_add.chunks(inner.options.progress_every.max(1)) {
            let batch = extract_batch(chunk);
            inner.tracks.upsert_batch(&batch).await?;

            done += chunk.len();
            inner
                .status
                .publish(IndexPhase::Resyncing, total as u64, done as u64)?;
        }

        inner.status.clear()?;
        tracing::info!("sync complete: +{} / -{} tracks", total, to_remove.len());

        Ok(())
    }

    /// Sample stored rows and verify each file still exists with an
    /// unchanged mtime
    pub async fn is_synced(&self) -> Result<bool> {
        let rows = self
            .inner
            .tracks
            .sample_mtimes(self.inner.options.freshness_sample)
            .await?;

        for (path, stored_mtime) in rows {
            let Ok(metadata) = std::fs::metadata(&path) else {
                return Ok(false);
            };
            let current = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);

            if current != stored_mtime {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Start live monitoring of the library root
    pub async fn start_watch(&self) -> Result<()> {
        let mut watch = self.inner.watch.lock().await;
        if watch.is_some() {
            tracing::debug!("filesystem monitoring already active");
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ChangeWatcher::start(
            &self.inner.root,
            self.inner.options.debounce,
            Arc::clone(&self.inner.watch_paused),
            tx,
        )?;

        let supervisor = self.clone();
        let drain = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                supervisor.apply_change(event).await;
            }
        });

        *watch = Some(WatchHandle { watcher, drain });
        tracing::info!("live filesystem monitoring started");

        Ok(())
    }

    /// Apply one debounced change through the writer critical section.
    ///
    /// Reindexed paths are symlink-resolved and must still fall under the
    /// canonical root, the same containment rule the scanner applies.
    async fn apply_change(&self, event: ChangeEvent) {
        let _write = self.inner.write_lock.lock().await;

        let result = match &event {
            ChangeEvent::Reindex(path) => match path.canonicalize() {
                Ok(resolved) if resolved.starts_with(&self.inner.root) => {
                    match tags::read_track(&resolved) {
                        Ok(track) => self.inner.tracks.upsert(&track).await,
                        Err(e) => {
                            tracing::warn!("skip reindex of {}: {}", resolved.display(), e);
                            Ok(())
                        }
                    }
                }
                Ok(_) => {
                    tracing::warn!(
                        "skip reindex of {}: resolves outside the library root",
                        path.display()
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("skip reindex of {}: {}", path.display(), e);
                    Ok(())
                }
            },
            ChangeEvent::Delete(path) => self
                .inner
                .tracks
                .delete_by_path(&path.to_string_lossy())
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            tracing::error!("index update failed: {}", e);
        }
    }

    /// Stop live monitoring, flushing pending debounced events first
    pub async fn stop_watch(&self) {
        if let Some(handle) = self.inner.watch.lock().await.take() {
            handle.watcher.shutdown().await;
            let _ = handle.drain.await;
            tracing::info!("filesystem monitoring stopped");
        }
    }

    /// Graceful shutdown: watcher stops, writer queue drains
    pub async fn close(&self) {
        self.stop_watch().await;
    }
}

/// Extract tags for a chunk of files; per-file failures are logged and the
/// file is skipped while the batch continues
fn extract_batch(paths: &[PathBuf]) -> Vec<crate::models::Track> {
    let mut batch = Vec::with_capacity(paths.len());
    for path in paths {
        match tags::read_track(path) {
            Ok(track) => batch.push(track),
            Err(e) => tracing::warn!("skip {}: {}", path.display(), e),
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_pool;
    use tempfile::TempDir;

    async fn setup(root: &std::path::Path) -> (TempDir, Supervisor) {
        let data_dir = TempDir::new().unwrap();
        let pool = open_pool(&data_dir.path().join("collection.db"))
            .await
            .unwrap();
        let supervisor = Supervisor::new(
            root,
            TrackTable::new(pool),
            StatusPublisher::new(data_dir.path()),
            SupervisorOptions {
                debounce: Duration::from_millis(50),
                ..Default::default()
            },
        )
        .unwrap();
        (data_dir, supervisor)
    }

    fn seed_library(root: &std::path::Path) {
        std::fs::create_dir_all(root.join("Artist/Album")).unwrap();
        std::fs::write(root.join("Artist/Album/01 - Song.flac"), b"a").unwrap();
        std::fs::write(root.join("Artist/Album/02 - Other.mp3"), b"b").unwrap();
        std::fs::write(root.join("Artist/Album/liner.txt"), b"c").unwrap();
    }

    #[tokio::test]
    async fn test_rebuild_mirrors_filesystem() {
        let library = TempDir::new().unwrap();
        seed_library(library.path());
        let (_data, supervisor) = setup(library.path()).await;

        supervisor.rebuild().await.unwrap();

        let paths = supervisor.inner.tracks.all_paths().await.unwrap();
        assert_eq!(paths.len(), 2);
        let expected: BTreeSet<String> = Scanner::new(supervisor.root())
            .scan()
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        assert_eq!(paths.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let library = TempDir::new().unwrap();
        seed_library(library.path());
        let (_data, supervisor) = setup(library.path()).await;

        supervisor.rebuild().await.unwrap();
        let first = supervisor.inner.tracks.all_paths().await.unwrap();

        supervisor.rebuild().await.unwrap();
        let second = supervisor.inner.tracks.all_paths().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resync_applies_delta_without_touching_survivors() {
        let library = TempDir::new().unwrap();
        seed_library(library.path());
        let (_data, supervisor) = setup(library.path()).await;

        supervisor.rebuild().await.unwrap();

        let kept_path = supervisor
            .root()
            .join("Artist/Album/02 - Other.mp3")
            .to_string_lossy()
            .into_owned();
        let kept_before = supervisor
            .inner
            .tracks
            .get_by_path(&kept_path)
            .await
            .unwrap()
            .unwrap();

        std::fs::remove_file(library.path().join("Artist/Album/01 - Song.flac")).unwrap();
        std::fs::write(library.path().join("Artist/Album/03 - New.ogg"), b"n").unwrap();

        supervisor.resync().await.unwrap();

        let paths: BTreeSet<String> = supervisor
            .inner
            .tracks
            .all_paths()
            .await
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().any(|p| p.ends_with("03 - New.ogg")));
        assert!(!paths.iter().any(|p| p.ends_with("01 - Song.flac")));

        let kept_after = supervisor
            .inner
            .tracks
            .get_by_path(&kept_path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept_before, kept_after);
    }

    #[tokio::test]
    async fn test_freshness_check_detects_mtime_drift() {
        let library = TempDir::new().unwrap();
        seed_library(library.path());
        let (_data, supervisor) = setup(library.path()).await;

        supervisor.rebuild().await.unwrap();
        assert!(supervisor.is_synced().await.unwrap());

        std::thread::sleep(Duration::from_millis(50));
        std::fs::write(
            library.path().join("Artist/Album/01 - Song.flac"),
            b"rewritten",
        )
        .unwrap();

        assert!(!supervisor.is_synced().await.unwrap());
    }

    #[tokio::test]
    async fn test_initialize_on_empty_store_rebuilds_and_watches() {
        let library = TempDir::new().unwrap();
        seed_library(library.path());
        let (_data, supervisor) = setup(library.path()).await;

        supervisor.initialize().await.unwrap();
        assert_eq!(supervisor.inner.tracks.count().await.unwrap(), 2);
        assert!(supervisor.inner.watch.lock().await.is_some());

        supervisor.close().await;
        assert!(supervisor.inner.watch.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_reindex_outside_root_is_ignored() {
        let library = TempDir::new().unwrap();
        seed_library(library.path());
        let (_data, supervisor) = setup(library.path()).await;
        supervisor.rebuild().await.unwrap();

        let outside = TempDir::new().unwrap();
        let stray = outside.path().join("stray.mp3");
        std::fs::write(&stray, b"x").unwrap();

        supervisor
            .apply_change(ChangeEvent::Reindex(stray))
            .await;
        assert_eq!(supervisor.inner.tracks.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_status_cleared_after_rebuild() {
        let library = TempDir::new().unwrap();
        seed_library(library.path());
        let (_data, supervisor) = setup(library.path()).await;

        supervisor.rebuild().await.unwrap();
        assert!(supervisor.inner.status.read().is_none());
    }
}
