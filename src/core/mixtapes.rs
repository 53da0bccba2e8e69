//! Mixtape store
//!
//! One JSON document per mixtape, with cover images under `covers/`.
//! Identity is a slug derived from the title; an incoming `client_id` that
//! already resolves in the store turns a save into an update. Reads
//! reconcile track metadata against the index store so playback follows
//! library changes, and degrade to the cached document values when the
//! index is unavailable.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::progress::ProgressBus;
use crate::core::transcode::Quality;
use crate::core::worker::CacheWorker;
use crate::db::TrackTable;
use crate::error::{LibraryError, Result};
use crate::models::{Mixtape, ProgressEvent, ProgressStatus};
use crate::utils::dates::now_timestamp;
use crate::utils::slug::slugify;

/// Document-per-file mixtape store
pub struct MixtapeStore {
    dir: PathBuf,
    covers_dir: PathBuf,
    tracks: TrackTable,
    /// Library root; mixtape track paths are stored relative to it
    root: PathBuf,
    cover_max_width: u32,
}

impl MixtapeStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        tracks: TrackTable,
        root: impl Into<PathBuf>,
        cover_max_width: u32,
    ) -> Result<Self> {
        let dir = dir.into();
        let covers_dir = dir.join("covers");
        std::fs::create_dir_all(&covers_dir)?;

        Ok(Self {
            dir,
            covers_dir,
            tracks,
            root: root.into(),
            cover_max_width,
        })
    }

    fn doc_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.json"))
    }

    fn cover_path(&self, slug: &str) -> PathBuf {
        self.covers_dir.join(format!("{slug}.jpg"))
    }

    /// First free slug for `base`; an update keeps its own current slug
    fn unique_slug(&self, base: &str, current: Option<&str>) -> String {
        let mut slug = base.to_string();
        let mut counter = 1;

        loop {
            if current == Some(slug.as_str()) || !self.doc_path(&slug).exists() {
                return slug;
            }
            slug = format!("{base}-{counter}");
            counter += 1;
        }
    }

    /// Create a mixtape, or update the existing one matching the incoming
    /// `client_id`. Returns the slug the document lives under.
    pub fn save(&self, mut doc: Mixtape) -> Result<String> {
        if let Some(existing_slug) = self.find_by_client_id(doc.client_id.as_deref()) {
            tracing::info!(
                "found existing mixtape for client_id, updating slug '{}'",
                existing_slug
            );
            return self.update(&existing_slug, document_patch(&doc)?);
        }

        if doc.title.is_empty() {
            doc.title = "Untitled Mixtape".to_string();
        }
        let slug = self.unique_slug(&slugify(&doc.title), None);

        let now = now_timestamp();
        doc.created_at = Some(now.clone());
        doc.updated_at = Some(now);
        doc.normalize();

        self.write_doc(&slug, doc)?;
        Ok(slug)
    }

    /// Update `slug` in place from a raw document payload.
    ///
    /// A whitelisted field only changes when the payload actually carries
    /// its key, so partial payloads leave everything else untouched. A
    /// null value is ignored except for `cover`, which may be cleared
    /// explicitly. Identity and creation time are preserved.
    pub fn update(&self, slug: &str, patch: Map<String, Value>) -> Result<String> {
        const ALLOWED_FIELDS: &[&str] = &[
            "title",
            "tracks",
            "liner_notes",
            "cover",
            "creator_name",
            "gift_flow_enabled",
            "unwrap_style",
            "show_tracklist_after_completion",
            "client_id",
        ];

        let mut existing = self.load_raw(slug)?;
        existing.normalize();

        let mut merged = serde_json::to_value(&existing)
            .map_err(|e| LibraryError::Fatal(format!("failed to serialize mixtape: {e}")))?;
        let Some(doc) = merged.as_object_mut() else {
            return Err(LibraryError::Fatal(
                "mixtape did not serialize to an object".to_string(),
            ));
        };

        for field in ALLOWED_FIELDS {
            if let Some(value) = patch.get(*field) {
                if !value.is_null() || *field == "cover" {
                    doc.insert((*field).to_string(), value.clone());
                }
            }
        }

        let mut updated: Mixtape = serde_json::from_value(merged)
            .map_err(|e| LibraryError::InvalidInput(format!("invalid mixtape payload: {e}")))?;
        updated.normalize();

        if updated.title.is_empty() {
            updated.title = "Untitled Mixtape".to_string();
        }
        updated.updated_at = Some(now_timestamp());

        self.write_doc(slug, updated)?;
        Ok(slug.to_string())
    }

    /// Fetch one mixtape.
    ///
    /// Missing and unparseable documents both read as `None` (the latter
    /// with an error logged). Track fields are refreshed from the index
    /// store; a failing index degrades to the stored values with a warning.
    pub async fn get(&self, slug: &str) -> Result<Option<Mixtape>> {
        let mut doc = match self.load_raw(slug) {
            Ok(doc) => doc,
            Err(LibraryError::NotFound(_)) => return Ok(None),
            Err(LibraryError::ReadCorruption { path, reason }) => {
                tracing::error!("failed to read mixtape {}: {}", path.display(), reason);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        doc.normalize();
        doc.slug = slug.to_string();

        if let Err(e) = self.reconcile(&mut doc).await {
            tracing::warn!(
                "could not verify mixtape {} against the index: {}. using cached data",
                slug,
                e
            );
        }

        Ok(Some(doc))
    }

    /// All mixtapes, most recently written first; corrupt files are skipped
    pub fn list_all(&self) -> Vec<Mixtape> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut mixtapes = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.load_raw(slug) {
                Ok(mut doc) => {
                    doc.normalize();
                    doc.slug = slug.to_string();
                    mixtapes.push(doc);
                }
                Err(e) => {
                    tracing::warn!("skipping corrupted mixtape file {}: {}", path.display(), e);
                }
            }
        }

        mixtapes.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
        mixtapes
    }

    /// Delete a mixtape and its cover image
    pub fn delete(&self, slug: &str) -> Result<()> {
        remove_if_exists(&self.doc_path(slug))?;
        remove_if_exists(&self.cover_path(slug))?;
        Ok(())
    }

    /// Save, then warm the transcode cache for the mixtape's tracks in the
    /// background, reporting progress under the slug as task id
    pub fn save_and_precache(
        &self,
        doc: Mixtape,
        worker: Arc<CacheWorker>,
        qualities: Vec<Quality>,
        bus: Arc<ProgressBus>,
    ) -> Result<String> {
        let slug = self.save(doc)?;

        let saved = self.load_raw(&slug)?;
        let mut paths = Vec::new();
        let mut missing = 0;
        for track in &saved.tracks {
            let path = PathBuf::from(self.resolve_track_path(&track.path));
            if path.exists() {
                paths.push(path);
            } else {
                missing += 1;
            }
        }
        if missing > 0 {
            tracing::warn!("{} track files not found, skipping", missing);
        }

        let task_id = slug.clone();
        tokio::spawn(async move {
            let report = worker
                .cache_mixtape_parallel(&task_id, &paths, &qualities, bus.as_ref())
                .await;
            bus.emit(
                ProgressEvent::new(
                    task_id.as_str(),
                    "caching",
                    ProgressStatus::Completed,
                    format!(
                        "Caching complete: {} cached, {} skipped, {} failed",
                        report.cached, report.skipped, report.failed
                    ),
                )
                .with_counts(paths.len() as u64, paths.len() as u64),
            );
        });

        Ok(slug)
    }

    fn load_raw(&self, slug: &str) -> Result<Mixtape> {
        let path = self.doc_path(slug);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LibraryError::NotFound(format!(
                    "mixtape with slug '{slug}' not found"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| LibraryError::ReadCorruption {
            path,
            reason: e.to_string(),
        })
    }

    fn write_doc(&self, slug: &str, mut doc: Mixtape) -> Result<()> {
        if let Some(cover) = doc.cover.clone() {
            if cover.starts_with("data:image") {
                doc.cover = Some(self.process_cover(&cover, slug)?);
            }
        }

        doc.slug = slug.to_string();

        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| LibraryError::Fatal(format!("failed to serialize mixtape: {e}")))?;
        std::fs::write(self.doc_path(slug), json)?;

        tracing::info!("saved mixtape '{}' as '{}'", doc.title, slug);
        Ok(())
    }

    /// Scan documents for a matching client identity; corrupt files are
    /// skipped
    fn find_by_client_id(&self, client_id: Option<&str>) -> Option<String> {
        let client_id = client_id?;

        for entry in std::fs::read_dir(&self.dir).ok()?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.load_raw(slug) {
                Ok(doc) if doc.client_id.as_deref() == Some(client_id) => {
                    return Some(slug.to_string());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("skipping corrupted mixtape file {}: {}", path.display(), e);
                }
            }
        }

        None
    }

    /// Rewrite each track's metadata from the current index row for its
    /// path; tracks without a row are left untouched
    async fn reconcile(&self, doc: &mut Mixtape) -> Result<()> {
        for track in &mut doc.tracks {
            let absolute = self.resolve_track_path(&track.path);
            let row = self
                .tracks
                .get_by_path(&absolute)
                .await
                .map_err(|e| match e {
                    LibraryError::Database(db) => LibraryError::IndexUnavailable(db),
                    other => other,
                })?;

            let Some(row) = row else {
                continue;
            };

            track.filename = row.filename;
            track.artist = row.artist;
            track.album = row.album;
            track.track = row.title;
            track.duration = row.duration;
        }

        Ok(())
    }

    fn resolve_track_path(&self, path: &str) -> String {
        let p = Path::new(path);
        if p.is_absolute() {
            path.to_string()
        } else {
            self.root.join(p).to_string_lossy().into_owned()
        }
    }

    /// Decode a `data:image/*` payload, composite alpha onto white, bound
    /// the width, and store as `covers/<slug>.jpg`
    fn process_cover(&self, data_url: &str, slug: &str) -> Result<String> {
        let payload = data_url
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| LibraryError::InvalidInput("malformed cover data url".to_string()))?;

        let bytes = BASE64
            .decode(payload)
            .map_err(|e| LibraryError::InvalidInput(format!("invalid cover data: {e}")))?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| LibraryError::InvalidInput(format!("unreadable cover image: {e}")))?;

        // JPEG has no alpha; composite transparent covers onto white
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            let out = canvas.get_pixel_mut(x, y);
            for channel in 0..3 {
                let blended = (pixel[channel] as u32 * alpha + 255 * (255 - alpha)) / 255;
                out[channel] = blended as u8;
            }
        }

        if width > self.cover_max_width {
            let new_height = ((height as f64) * (self.cover_max_width as f64) / (width as f64))
                .round()
                .max(1.0) as u32;
            canvas = image::imageops::resize(
                &canvas,
                self.cover_max_width,
                new_height,
                FilterType::Lanczos3,
            );
        }

        let file = self.cover_path(slug);
        let mut out = std::fs::File::create(&file)?;
        JpegEncoder::new_with_quality(&mut out, 95)
            .encode_image(&canvas)
            .map_err(|e| LibraryError::Fatal(format!("failed to encode cover: {e}")))?;

        Ok(format!("covers/{slug}.jpg"))
    }
}

/// A full document rendered as an update payload (every field present)
fn document_patch(doc: &Mixtape) -> Result<Map<String, Value>> {
    match serde_json::to_value(doc) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(LibraryError::Fatal(
            "mixtape did not serialize to an object".to_string(),
        )),
        Err(e) => Err(LibraryError::Fatal(format!(
            "failed to serialize mixtape: {e}"
        ))),
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_pool;
    use crate::models::{MixtapeTrack, Track};
    use base64::Engine as _;
    use image::DynamicImage;
    use serde_json::json;
    use std::io::Cursor;
    use tempfile::TempDir;

    async fn test_store() -> (TempDir, MixtapeStore) {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(&temp_dir.path().join("collection.db"))
            .await
            .unwrap();
        let store = MixtapeStore::new(
            temp_dir.path().join("mixtapes"),
            TrackTable::new(pool),
            temp_dir.path().join("library"),
            1200,
        )
        .unwrap();
        (temp_dir, store)
    }

    fn doc(title: &str, client_id: Option<&str>) -> Mixtape {
        Mixtape {
            title: title.to_string(),
            client_id: client_id.map(|c| c.to_string()),
            ..Default::default()
        }
    }

    fn patch(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("patch must be an object"),
        }
    }

    #[tokio::test]
    async fn test_save_then_get_round_trip() {
        let (_dir, store) = test_store().await;

        let slug = store.save(doc("Summer Mix", Some("c1"))).unwrap();
        assert_eq!(slug, "summer-mix");

        let loaded = store.get(&slug).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Summer Mix");
        assert_eq!(loaded.slug, "summer-mix");
        assert_eq!(loaded.client_id.as_deref(), Some("c1"));
        assert_eq!(loaded.unwrap_style, "playful");

        let created = loaded.created_at.unwrap();
        let updated = loaded.updated_at.unwrap();
        assert!(created <= updated);
    }

    #[tokio::test]
    async fn test_client_id_resolves_save_to_update() {
        let (_dir, store) = test_store().await;

        let first = store.save(doc("Summer", Some("c1"))).unwrap();
        assert_eq!(first, "summer");
        let created = store
            .get("summer")
            .await
            .unwrap()
            .unwrap()
            .created_at
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.save(doc("Summer 2", Some("c1"))).unwrap();
        assert_eq!(second, "summer");

        let loaded = store.get("summer").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Summer 2");
        assert_eq!(loaded.created_at.unwrap(), created);
        assert!(loaded.updated_at.unwrap() > created);
    }

    #[tokio::test]
    async fn test_slug_collisions_get_suffixes() {
        let (_dir, store) = test_store().await;

        assert_eq!(store.save(doc("Tape", None)).unwrap(), "tape");
        assert_eq!(store.save(doc("Tape", None)).unwrap(), "tape-1");
        assert_eq!(store.save(doc("Tape", None)).unwrap(), "tape-2");
    }

    #[tokio::test]
    async fn test_empty_title_becomes_untitled() {
        let (_dir, store) = test_store().await;
        let slug = store.save(doc("", None)).unwrap();
        assert_eq!(slug, "untitled-mixtape");
        assert_eq!(
            store.get(&slug).await.unwrap().unwrap().title,
            "Untitled Mixtape"
        );
    }

    #[tokio::test]
    async fn test_update_missing_slug_is_not_found() {
        let (_dir, store) = test_store().await;
        assert!(matches!(
            store.update("ghost", patch(json!({"title": "X"}))),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_unmentioned_fields() {
        let (_dir, store) = test_store().await;

        let mut tape = doc("Road Trip", Some("c9"));
        tape.creator_name = "Mark".to_string();
        tape.cover = Some("covers/elsewhere.jpg".to_string());
        tape.tracks = vec![MixtapeTrack {
            path: "a.mp3".to_string(),
            ..Default::default()
        }];
        let slug = store.save(tape).unwrap();

        store
            .update(&slug, patch(json!({"liner_notes": "for the drive"})))
            .unwrap();

        let loaded = store.get(&slug).await.unwrap().unwrap();
        assert_eq!(loaded.liner_notes, "for the drive");
        assert_eq!(loaded.title, "Road Trip");
        assert_eq!(loaded.creator_name, "Mark");
        assert_eq!(loaded.cover.as_deref(), Some("covers/elsewhere.jpg"));
        assert_eq!(loaded.tracks.len(), 1);
        assert_eq!(loaded.client_id.as_deref(), Some("c9"));
    }

    #[tokio::test]
    async fn test_null_patch_values_ignored_except_cover() {
        let (_dir, store) = test_store().await;

        let mut tape = doc("Nulls", None);
        tape.creator_name = "Mark".to_string();
        tape.cover = Some("covers/elsewhere.jpg".to_string());
        let slug = store.save(tape).unwrap();

        store
            .update(&slug, patch(json!({"creator_name": null, "cover": null})))
            .unwrap();

        let loaded = store.get(&slug).await.unwrap().unwrap();
        assert_eq!(loaded.creator_name, "Mark");
        assert!(loaded.cover.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_none_and_corrupt_is_skipped() {
        let (_dir, store) = test_store().await;
        assert!(store.get("ghost").await.unwrap().is_none());

        std::fs::write(store.doc_path("broken"), b"{not json").unwrap();
        assert!(store.get("broken").await.unwrap().is_none());

        store.save(doc("Good", None)).unwrap();
        let all = store.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].slug, "good");
    }

    #[tokio::test]
    async fn test_list_all_orders_by_recency() {
        let (_dir, store) = test_store().await;
        assert!(store.list_all().is_empty());

        store.save(doc("First", None)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save(doc("Second", None)).unwrap();

        let all = store.list_all();
        assert_eq!(all[0].title, "Second");
        assert_eq!(all[1].title, "First");
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let (_dir, store) = test_store().await;

        let slug = store.save(doc("Doomed", None)).unwrap();
        store.delete(&slug).unwrap();
        assert!(store.get(&slug).await.unwrap().is_none());

        // deleting again is fine
        store.delete(&slug).unwrap();
    }

    #[tokio::test]
    async fn test_get_reconciles_tracks_against_index() {
        let (dir, store) = test_store().await;

        let library_path = dir
            .path()
            .join("library")
            .join("a.flac")
            .to_string_lossy()
            .into_owned();
        store
            .tracks
            .upsert(&Track {
                path: library_path,
                filename: "a.flac".to_string(),
                artist: "Real Artist".to_string(),
                album: "Real Album".to_string(),
                title: "Real Title".to_string(),
                albumartist: None,
                genre: None,
                year: None,
                duration: Some(123.0),
                mtime: 1.0,
            })
            .await
            .unwrap();

        let mut tape = doc("Tape", None);
        tape.tracks = vec![
            MixtapeTrack {
                path: "a.flac".to_string(),
                artist: "Stale Artist".to_string(),
                track: "Stale Title".to_string(),
                ..Default::default()
            },
            MixtapeTrack {
                path: "missing.flac".to_string(),
                artist: "Kept".to_string(),
                ..Default::default()
            },
        ];
        let slug = store.save(tape).unwrap();

        let loaded = store.get(&slug).await.unwrap().unwrap();
        assert_eq!(loaded.tracks[0].artist, "Real Artist");
        assert_eq!(loaded.tracks[0].track, "Real Title");
        assert_eq!(loaded.tracks[0].duration, Some(123.0));
        // no index row: stored values survive
        assert_eq!(loaded.tracks[1].artist, "Kept");
    }

    #[tokio::test]
    async fn test_cover_data_url_is_persisted_as_jpeg() {
        let (_dir, store) = test_store().await;

        // 2x2 half-transparent PNG
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 10, 10, 128]));
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();
        let data_url = format!("data:image/png;base64,{}", BASE64.encode(&png));

        let mut tape = doc("Covered", None);
        tape.cover = Some(data_url);
        let slug = store.save(tape).unwrap();

        let loaded = store.get(&slug).await.unwrap().unwrap();
        assert_eq!(loaded.cover.as_deref(), Some("covers/covered.jpg"));
        assert!(store.cover_path(&slug).exists());
    }

    #[tokio::test]
    async fn test_invalid_cover_data_is_rejected_without_state() {
        let (_dir, store) = test_store().await;

        let mut tape = doc("Bad Cover", None);
        tape.cover = Some("data:image/png;base64,!!!not-base64!!!".to_string());

        assert!(matches!(
            store.save(tape),
            Err(LibraryError::InvalidInput(_))
        ));
        assert!(store.get("bad-cover").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_opaque_cover_reference_passes_through() {
        let (_dir, store) = test_store().await;

        let mut tape = doc("Linked", None);
        tape.cover = Some("covers/elsewhere.jpg".to_string());
        let slug = store.save(tape).unwrap();

        let loaded = store.get(&slug).await.unwrap().unwrap();
        assert_eq!(loaded.cover.as_deref(), Some("covers/elsewhere.jpg"));
    }

    #[tokio::test]
    async fn test_save_and_precache_reports_completion() {
        let (dir, store) = test_store().await;

        let library = dir.path().join("library");
        std::fs::create_dir_all(&library).unwrap();
        std::fs::write(library.join("song.mp3"), b"x").unwrap();

        let cache = crate::core::transcode::TranscodeCache::new(
            dir.path().join("cache"),
            std::time::Duration::from_secs(300),
        )
        .unwrap();
        let worker = Arc::new(CacheWorker::new(cache, 2));
        let bus = ProgressBus::new();

        let mut tape = doc("Warm", None);
        tape.tracks = vec![MixtapeTrack {
            path: "song.mp3".to_string(),
            ..Default::default()
        }];

        let slug = store
            .save_and_precache(tape, worker, vec![Quality::Medium], Arc::clone(&bus))
            .unwrap();
        assert_eq!(slug, "warm");

        let mut rx = bus.listen(&slug, std::time::Duration::from_secs(5));
        let mut saw_terminal = false;
        while let Some(event) = rx.recv().await {
            if event.status.is_terminal() {
                assert_eq!(event.status, ProgressStatus::Completed);
                saw_terminal = true;
                break;
            }
        }
        assert!(saw_terminal);
    }

    #[tokio::test]
    async fn test_double_update_differs_only_in_updated_at() {
        let (_dir, store) = test_store().await;

        let slug = store.save(doc("Stable", None)).unwrap();
        let payload = document_patch(&doc("Stable", None)).unwrap();

        store.update(&slug, payload.clone()).unwrap();
        let first = store.get(&slug).await.unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.update(&slug, payload).unwrap();
        let second = store.get(&slug).await.unwrap().unwrap();

        assert_ne!(first.updated_at, second.updated_at);
        let mut first = first;
        let mut second = second;
        first.updated_at = None;
        second.updated_at = None;
        assert_eq!(first, second);
    }
}
