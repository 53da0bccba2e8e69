//! Cache worker pool
//!
//! Drives the transcode cache for whole track lists: serially when
//! deterministic order matters, or through a bounded pool. Concurrent
//! requests for the same `(source, quality)` collapse to a single encoder
//! invocation; the late caller waits for the first and shares its
//! derivative.

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::progress::ProgressSink;
use crate::core::transcode::{Quality, TranscodeCache};
use crate::error::Result;
use crate::models::{ProgressEvent, ProgressStatus};

/// How one track ended up during a caching pass
#[derive(Debug, Clone, PartialEq, Eq)]
enum CacheOutcome {
    Cached,
    Skipped,
    Failed(String),
}

/// Summary of one caching pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheReport {
    pub cached: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Per-path error messages for failed tracks
    pub failures: Vec<(PathBuf, String)>,
}

impl CacheReport {
    fn record(&mut self, path: &Path, outcome: CacheOutcome) {
        match outcome {
            CacheOutcome::Cached => self.cached += 1,
            CacheOutcome::Skipped => self.skipped += 1,
            CacheOutcome::Failed(error) => {
                self.failed += 1;
                tracing::error!("failed to cache {}: {}", path.display(), error);
                self.failures.push((path.to_path_buf(), error));
            }
        }
    }
}

/// Coordinates transcodes with bounded parallelism and single-flight keys
pub struct CacheWorker {
    cache: TranscodeCache,
    workers: usize,
    inflight: DashMap<(String, Quality), Arc<Mutex<()>>>,
}

impl CacheWorker {
    pub fn new(cache: TranscodeCache, workers: usize) -> Self {
        Self {
            cache,
            workers: workers.max(1),
            inflight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &TranscodeCache {
        &self.cache
    }

    /// Produce the derivative for `(source, quality)`.
    ///
    /// Concurrent calls for the same identity run the encoder at most once:
    /// later callers block on the first and then find the fresh derivative.
    pub async fn transcode_file(&self, source: &Path, quality: Quality) -> Result<PathBuf> {
        self.single_flight(source, quality, false).await
    }

    async fn single_flight(
        &self,
        source: &Path,
        quality: Quality,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let key = (TranscodeCache::canonical_key(source), quality);
        let slot = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = slot.lock().await;
            // a first caller may have produced the derivative while we
            // waited; the cache rechecks freshness before spawning
            self.cache.transcode_file(source, quality, overwrite).await
        };

        self.inflight
            .remove_if(&key, |_, value| Arc::strong_count(value) <= 2);

        result
    }

    async fn cache_one(&self, source: &Path, qualities: &[Quality]) -> CacheOutcome {
        if !TranscodeCache::should_transcode(source) {
            return CacheOutcome::Skipped;
        }

        for quality in qualities {
            if *quality == Quality::Original {
                continue;
            }
            if let Err(e) = self.single_flight(source, *quality, false).await {
                return CacheOutcome::Failed(e.to_string());
            }
        }

        CacheOutcome::Cached
    }

    /// Cache a mixtape's tracks in strict order.
    ///
    /// `sink` receives one `caching` event per processed track with
    /// `(done, total)` counts.
    pub async fn cache_mixtape(
        &self,
        task_id: &str,
        tracks: &[PathBuf],
        qualities: &[Quality],
        sink: &dyn ProgressSink,
    ) -> CacheReport {
        let total = tracks.len() as u64;
        let mut report = CacheReport::default();

        for (idx, path) in tracks.iter().enumerate() {
            let outcome = self.cache_one(path, qualities).await;
            report.record(path, outcome);
            emit_progress(sink, task_id, idx as u64 + 1, total);
        }

        report
    }

    /// Cache a mixtape's tracks through the bounded worker pool.
    ///
    /// Completion callbacks are delivered on the caller's task as slots
    /// free up; ordering between tracks is not guaranteed.
    pub async fn cache_mixtape_parallel(
        &self,
        task_id: &str,
        tracks: &[PathBuf],
        qualities: &[Quality],
        sink: &dyn ProgressSink,
    ) -> CacheReport {
        let total = tracks.len() as u64;
        let mut report = CacheReport::default();

        let jobs: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = (PathBuf, CacheOutcome)> + Send + '_>>> = tracks
            .iter()
            .map(|path| {
                let path = path.clone();
                Box::pin(async move {
                    let outcome = self.cache_one(&path, qualities).await;
                    (path, outcome)
                }) as std::pin::Pin<Box<dyn std::future::Future<Output = (PathBuf, CacheOutcome)> + Send + '_>>
            })
            .collect();

        let mut done = 0u64;
        let mut completions = stream::iter(jobs).buffer_unordered(self.workers);
        while let Some((path, outcome)) = completions.next().await {
            done += 1;
            report.record(&path, outcome);
            emit_progress(sink, task_id, done, total);
        }

        report
    }

    /// Report which tracks have a fresh derivative at `quality`.
    ///
    /// Tracks that never transcode count as available.
    pub fn verify_cache(&self, tracks: &[PathBuf], quality: Quality) -> BTreeMap<PathBuf, bool> {
        tracks
            .iter()
            .map(|path| {
                let available = !TranscodeCache::should_transcode(path)
                    || self.cache.is_cached(path, quality);
                (path.clone(), available)
            })
            .collect()
    }

    /// Rebuild only the derivatives that are missing or older than their
    /// source files
    pub async fn regenerate_outdated(
        &self,
        tracks: &[PathBuf],
        qualities: &[Quality],
    ) -> CacheReport {
        let mut report = CacheReport::default();

        for path in tracks {
            if !TranscodeCache::should_transcode(path) {
                continue;
            }

            for quality in qualities {
                if *quality == Quality::Original || self.cache.is_cached(path, *quality) {
                    continue;
                }

                tracing::info!(
                    "cache outdated or missing: {} at {}",
                    path.display(),
                    quality.as_str()
                );
                match self.single_flight(path, *quality, true).await {
                    Ok(_) => report.record(path, CacheOutcome::Cached),
                    Err(e) => report.record(path, CacheOutcome::Failed(e.to_string())),
                }
            }
        }

        report
    }
}

fn emit_progress(sink: &dyn ProgressSink, task_id: &str, current: u64, total: u64) {
    sink.emit(
        ProgressEvent::new(
            task_id,
            "caching",
            ProgressStatus::InProgress,
            format!("Caching track {current} of {total}"),
        )
        .with_counts(current, total),
    );
}
