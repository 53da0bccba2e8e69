//! Tag extraction from audio files using lofty
//!
//! Extraction never fails the indexing pipeline: when tags cannot be read
//! the file is still stored, with fields derived from its path.

use lofty::{Accessor, AudioFile, ItemKey, Probe, TaggedFileExt};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::Result;
use crate::models::Track;

/// Supported audio extensions
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["mp3", "flac", "ogg", "oga", "m4a", "mp4", "wav", "wma"];

/// Directory names never used as an album fallback
const IGNORED_ALBUM_DIRS: &[&str] = &["", ".", "..", "Music", "music"];

/// Check if a path has a supported audio extension (case-insensitive)
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Raw fields pulled from embedded tags; everything is optional
#[derive(Debug, Clone, Default)]
struct RawTags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    albumartist: Option<String>,
    genre: Option<String>,
    year_raw: Option<String>,
    duration: Option<f64>,
}

/// Build a track record for `path`, reading tags and falling back to
/// path-derived values for anything missing or unreadable.
///
/// Only a failing `stat` makes this return an error; the caller skips the
/// file and continues.
pub fn read_track(path: &Path) -> Result<Track> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    let tags = probe_tags(path);

    Ok(Track {
        path: path.to_string_lossy().into_owned(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        artist: extract_artist(&tags, path),
        album: extract_album(&tags, path),
        title: extract_title(&tags, path),
        albumartist: tags.albumartist,
        genre: tags.genre,
        year: tags.year_raw.as_deref().and_then(parse_year),
        duration: tags.duration,
        mtime,
    })
}

/// Read tags with lofty; any error yields an empty-tag result
fn probe_tags(path: &Path) -> RawTags {
    let tagged_file = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("failed to extract tags from {}: {}", path.display(), e);
            return RawTags::default();
        }
    };

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    // raw date string preferred over lofty's parsed year, so lenient
    // formats like "2021-05-01" and "2021.3" survive
    let year_raw = tag.and_then(|t| {
        [
            ItemKey::RecordingDate,
            ItemKey::OriginalReleaseDate,
            ItemKey::Year,
        ]
        .into_iter()
        .find_map(|key| t.get_string(&key).map(|s| s.to_string()))
        .or_else(|| t.year().map(|y| y.to_string()))
    });

    let duration = tagged_file.properties().duration().as_secs_f64();

    RawTags {
        title: tag.and_then(|t| non_empty(t.title().map(|s| s.to_string()))),
        artist: tag.and_then(|t| non_empty(t.artist().map(|s| s.to_string()))),
        album: tag.and_then(|t| non_empty(t.album().map(|s| s.to_string()))),
        albumartist: tag.and_then(|t| {
            non_empty(t.get_string(&ItemKey::AlbumArtist).map(|s| s.to_string()))
        }),
        genre: tag.and_then(|t| non_empty(t.genre().map(|s| s.to_string()))),
        year_raw,
        duration: if duration > 0.0 { Some(duration) } else { None },
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// artist tag, then albumartist, then grandparent directory, then "Unknown"
fn extract_artist(tags: &RawTags, path: &Path) -> String {
    tags.artist
        .clone()
        .or_else(|| tags.albumartist.clone())
        .or_else(|| grandparent_name(path))
        .unwrap_or_else(|| "Unknown".to_string())
        .trim()
        .to_string()
}

/// album tag, then parent directory unless it is a generic collection
/// folder, then grandparent, then "Unknown"
fn extract_album(tags: &RawTags, path: &Path) -> String {
    if let Some(album) = &tags.album {
        return album.trim().to_string();
    }

    let mut album = parent_name(path).unwrap_or_default();
    if IGNORED_ALBUM_DIRS.contains(&album.as_str()) {
        if let Some(grandparent) = grandparent_name(path) {
            album = grandparent;
        }
    }

    if album.is_empty() {
        "Unknown".to_string()
    } else {
        album.trim().to_string()
    }
}

/// title tag, then file stem, then "Unknown"
fn extract_title(tags: &RawTags, path: &Path) -> String {
    tags.title
        .clone()
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "Unknown".to_string())
        .trim()
        .to_string()
}

fn parent_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
}

fn grandparent_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
}

/// Parse the leading integer run of a raw year tag, splitting on `-` and `.`
/// ("2021-05-01" and "2021.3" both give 2021)
fn parse_year(raw: &str) -> Option<i64> {
    raw.trim()
        .split('-')
        .next()?
        .split('.')
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("/m/a.mp3")));
        assert!(is_supported(Path::new("/m/a.FLAC")));
        assert!(is_supported(Path::new("/m/a.oga")));
        assert!(!is_supported(Path::new("/m/a.txt")));
        assert!(!is_supported(Path::new("/m/noext")));
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2021"), Some(2021));
        assert_eq!(parse_year("2021-05-01"), Some(2021));
        assert_eq!(parse_year("2021.3"), Some(2021));
        assert_eq!(parse_year(" 1999 "), Some(1999));
        assert_eq!(parse_year("unknown"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_path_fallbacks_for_unreadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let album_dir = temp_dir.path().join("Radiohead").join("OK Computer");
        std::fs::create_dir_all(&album_dir).unwrap();

        let file = album_dir.join("02 - Paranoid Android.mp3");
        std::fs::write(&file, b"not really audio").unwrap();

        let track = read_track(&file).unwrap();
        assert_eq!(track.artist, "Radiohead");
        assert_eq!(track.album, "OK Computer");
        assert_eq!(track.title, "02 - Paranoid Android");
        assert!(track.mtime > 0.0);
        assert!(track.duration.is_none());
    }

    #[test]
    fn test_generic_album_dir_falls_through() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Aphex Twin").join("Music");
        std::fs::create_dir_all(&dir).unwrap();

        let file = dir.join("track.mp3");
        std::fs::write(&file, b"junk").unwrap();

        let track = read_track(&file).unwrap();
        assert_eq!(track.album, "Aphex Twin");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(read_track(&PathBuf::from("/nonexistent/never.mp3")).is_err());
    }
}
