//! tapedeck - a personal music-library service
//!
//! Watches a directory tree of audio files, keeps a searchable index of
//! their embedded metadata, persists user-curated mixtapes, and prepares
//! compressed derivatives of lossless tracks for bandwidth-constrained
//! playback.

#![allow(dead_code)]

mod config;
mod core;
mod db;
mod error;
mod models;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::{DataPaths, Settings};
use crate::core::mixtapes::MixtapeStore;
use crate::core::progress::ProgressBus;
use crate::core::search::SearchEngine;
use crate::core::status::StatusPublisher;
use crate::core::supervisor::{Supervisor, SupervisorOptions};
use crate::core::transcode::TranscodeCache;
use crate::core::worker::CacheWorker;
use crate::db::TrackTable;

/// tapedeck - personal music-library service
#[derive(Parser, Debug)]
#[command(name = "tapedeck")]
#[command(version = "0.4.0")]
#[command(about = "A personal music-library service with mixtapes and on-demand transcoding")]
struct Args {
    /// Root directory of the music collection
    #[arg(long)]
    root: Option<PathBuf>,

    /// Data directory (index, mixtapes, cache)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Force a full reindex on startup
    #[arg(long)]
    rebuild: bool,

    /// Run a one-shot search and print the results as JSON
    #[arg(long)]
    search: Option<String>,

    /// Delete cached derivatives older than this many days, then exit
    #[arg(long)]
    clear_cache_days: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // filter out noisy warnings from audio parsing libraries
    let log_level = if args.debug { "debug" } else { "info" };
    let filter =
        tracing_subscriber::EnvFilter::new(format!("{log_level},lofty=error,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("tapedeck v0.4.0 starting...");

    let data_dir = args.data.clone().unwrap_or_else(DataPaths::default_dir);
    let paths = DataPaths::new(data_dir)?;
    info!("Data directory: {:?}", paths.data_dir());

    let mut settings = Settings::load(&paths.settings_path())?;
    if let Some(root) = args.root.clone() {
        settings.music_root = root;
    }
    if settings.music_root.as_os_str().is_empty() {
        anyhow::bail!("no music root configured; pass --root or set musicRoot in settings.json");
    }
    if !settings.music_root.is_dir() {
        tracing::warn!(
            "Music root '{}' does not exist or is not accessible. Is the volume mounted?",
            settings.music_root.display()
        );
    }

    let cache = TranscodeCache::new(paths.cache_dir(), settings.transcode_timeout())?;
    if let Some(days) = args.clear_cache_days {
        let deleted = cache.clear_cache(Some(days))?;
        info!("Deleted {} cached derivatives", deleted);
        return Ok(());
    }

    let pool = db::open_pool(&paths.db_path()).await?;
    let tracks = TrackTable::new(pool);

    let status = StatusPublisher::new(paths.data_dir());
    let supervisor = Supervisor::new(
        &settings.music_root,
        tracks.clone(),
        status,
        SupervisorOptions {
            debounce: settings.debounce(),
            freshness_sample: settings.freshness_sample,
            ..Default::default()
        },
    )
    .context("failed to open library root")?;

    // one-shot search against the existing index
    if let Some(query) = args.search {
        if tracks.count().await? == 0 {
            supervisor.rebuild().await?;
        }
        let engine = SearchEngine::new(&tracks, supervisor.root(), settings.search_limit);
        let results = engine.search_highlighted(&query).await?;
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    info!("Checking ffmpeg availability...");
    if let Err(e) = crate::core::ffmpeg::ensure_ffmpeg() {
        tracing::warn!("Failed to ensure ffmpeg: {}. Transcoding may not work.", e);
    }

    if args.rebuild {
        supervisor.rebuild().await?;
        supervisor.start_watch().await?;
    } else {
        supervisor.initialize().await?;
    }
    info!(
        "Indexed {} tracks under {}",
        tracks.count().await?,
        supervisor.root().display()
    );

    // the mixtape store, worker pool and progress bus are the surfaces the
    // HTTP layer drives; they live for the service lifetime
    let bus = ProgressBus::new();
    let worker = Arc::new(CacheWorker::new(cache, settings.cache_workers));
    let mixtapes = MixtapeStore::new(
        paths.mixtapes_dir(),
        tracks.clone(),
        supervisor.root().clone(),
        settings.cover_max_width,
    )?;

    // refresh stale derivatives for saved mixtapes in the background
    {
        let worker = Arc::clone(&worker);
        let qualities = settings.precache_qualities.clone();
        let root = supervisor.root().clone();
        let docs = mixtapes.list_all();
        tokio::spawn(async move {
            let mut track_paths: Vec<PathBuf> = Vec::new();
            for doc in &docs {
                for track in &doc.tracks {
                    let path = Path::new(&track.path);
                    let absolute = if path.is_absolute() {
                        path.to_path_buf()
                    } else {
                        root.join(path)
                    };
                    if absolute.exists() {
                        track_paths.push(absolute);
                    }
                }
            }
            track_paths.sort();
            track_paths.dedup();

            let report = worker.regenerate_outdated(&track_paths, &qualities).await;
            if report.cached > 0 || report.failed > 0 {
                info!(
                    "Derivative refresh: {} rebuilt, {} failed",
                    report.cached, report.failed
                );
            }
        });
    }

    info!("Service running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    bus.close();
    supervisor.close().await;

    Ok(())
}
