//! Grouped, prefix-biased library search
//!
//! Queries are whitespace-separated terms, optionally field-qualified
//! (`artist:`, `album:`, `track:`/`song:`, `release_dir:`). Quoted values
//! ask for exact case-insensitive equality, bare values for substring
//! match. Results come back in three buckets (artists, albums, tracks) with
//! mutual-exclusion rules between them, ordered prefix-matches-first and
//! then case-insensitively. A second projection decorates the buckets with
//! `«»` highlight markers and match reasons for the UI.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use std::path::{Path, PathBuf};

use crate::db::TrackTable;
use crate::error::Result;
use crate::utils::dates::format_duration;

/// Field a term applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Any,
    Artist,
    Album,
    Track,
    ReleaseDir,
}

impl SearchField {
    fn from_qualifier(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "artist" => Some(SearchField::Artist),
            "album" => Some(SearchField::Album),
            "track" | "song" => Some(SearchField::Track),
            "release_dir" => Some(SearchField::ReleaseDir),
            _ => None,
        }
    }
}

/// One parsed query term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub field: SearchField,
    pub value: String,
    /// Quoted terms request exact (case-insensitive) equality
    pub exact: bool,
}

/// Parse a query string into terms.
///
/// Unknown qualifiers are not qualifiers: `ab:cd` is one bare term.
/// Whitespace between a qualifier and its (possibly quoted) value is
/// tolerated.
pub fn parse_query(query: &str) -> Vec<SearchTerm> {
    let chars: Vec<char> = query.chars().collect();
    let mut terms = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let mut field = SearchField::Any;
        let ident_start = i;
        let mut ident = String::new();
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
            ident.push(chars[i]);
            i += 1;
        }

        if i < chars.len() && chars[i] == ':' {
            if let Some(qualified) = SearchField::from_qualifier(&ident) {
                field = qualified;
                i += 1;
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
            } else {
                i = ident_start;
            }
        } else {
            i = ident_start;
        }

        if i < chars.len() && (chars[i] == '"' || chars[i] == '\'') {
            let quote = chars[i];
            i += 1;
            let mut value = String::new();
            while i < chars.len() && chars[i] != quote {
                value.push(chars[i]);
                i += 1;
            }
            if i < chars.len() {
                i += 1;
            }
            if !value.is_empty() {
                terms.push(SearchTerm {
                    field,
                    value,
                    exact: true,
                });
            }
        } else {
            let mut value = String::new();
            while i < chars.len() && !chars[i].is_whitespace() {
                value.push(chars[i]);
                i += 1;
            }
            if !value.is_empty() {
                terms.push(SearchTerm {
                    field,
                    value,
                    exact: false,
                });
            }
        }
    }

    terms
}

/// A track row as it appears in search results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackHit {
    pub artist: String,
    pub album: String,
    pub track: String,
    pub filename: String,
    /// Library-root-relative path
    pub path: String,
    /// Rendered as `M:SS`, `?:??` when unknown
    pub duration: String,
}

/// An album with its tracks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumHit {
    pub artist: String,
    pub album: String,
    pub tracks: Vec<TrackHit>,
}

/// An artist expanded with albums and their tracks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistHit {
    pub artist: String,
    pub albums: Vec<AlbumHit>,
}

/// The three result buckets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedResults {
    pub artists: Vec<ArtistHit>,
    pub albums: Vec<AlbumHit>,
    pub tracks: Vec<TrackHit>,
}

#[derive(Debug, FromRow)]
struct TrackRow {
    artist: String,
    album: String,
    title: String,
    path: String,
    filename: String,
    duration: Option<f64>,
}

/// Read-only query surface over the index store
#[derive(Debug, Clone)]
pub struct SearchEngine {
    pool: SqlitePool,
    root: PathBuf,
    limit: i64,
}

impl SearchEngine {
    pub fn new(tracks: &TrackTable, root: impl Into<PathBuf>, limit: i64) -> Self {
        Self {
            pool: tracks.pool().clone(),
            root: root.into(),
            limit,
        }
    }

    /// Grouped search over artists, albums and tracks.
    ///
    /// Queries shorter than two characters return empty buckets. A
    /// `track:`/`song:` qualifier narrows to track-level results: the
    /// artists and albums buckets come back empty.
    pub async fn search_grouped(&self, query: &str) -> Result<GroupedResults> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Ok(GroupedResults::default());
        }

        let terms = parse_query(query);
        if terms.is_empty() {
            return Ok(GroupedResults::default());
        }

        let track_scoped = terms.iter().any(|t| t.field == SearchField::Track);

        let artists = if track_scoped {
            Vec::new()
        } else {
            self.search_artists(&terms).await?
        };
        let albums = if track_scoped {
            Vec::new()
        } else {
            self.search_albums(&terms, &artists).await?
        };
        let tracks = self.search_tracks(&terms, &artists, &albums).await?;

        Ok(GroupedResults {
            artists,
            albums,
            tracks,
        })
    }

    async fn search_artists(&self, terms: &[SearchTerm]) -> Result<Vec<ArtistHit>> {
        let relevant: Vec<&SearchTerm> = terms
            .iter()
            .filter(|t| matches!(t.field, SearchField::Any | SearchField::Artist))
            .collect();
        let Some(primary) = relevant.first() else {
            return Ok(Vec::new());
        };

        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        for term in &relevant {
            let (sql, value) = condition("artist", term);
            conditions.push(sql);
            binds.push(value);
        }

        let sql = format!(
            "SELECT DISTINCT artist FROM tracks WHERE {} \
             ORDER BY artist LIKE ? DESC, artist COLLATE NOCASE LIMIT ?",
            conditions.join(" AND ")
        );

        let mut query = sqlx::query_as::<_, (String,)>(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        query = query.bind(starts_pattern(primary)).bind(self.limit);

        let names = query.fetch_all(&self.pool).await?;

        let mut artists = Vec::with_capacity(names.len());
        for (artist,) in names {
            let albums = self.artist_albums(&artist).await?;
            artists.push(ArtistHit { artist, albums });
        }

        Ok(artists)
    }

    async fn artist_albums(&self, artist: &str) -> Result<Vec<AlbumHit>> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT album FROM tracks WHERE artist = ? ORDER BY album COLLATE NOCASE",
        )
        .bind(artist)
        .fetch_all(&self.pool)
        .await?;

        let mut albums = Vec::with_capacity(names.len());
        for (album,) in names {
            let tracks = self.album_tracks(artist, &album).await?;
            albums.push(AlbumHit {
                artist: artist.to_string(),
                album,
                tracks,
            });
        }

        Ok(albums)
    }

    async fn album_tracks(&self, artist: &str, album: &str) -> Result<Vec<TrackHit>> {
        let rows: Vec<TrackRow> = sqlx::query_as(
            "SELECT DISTINCT artist, album, title, path, filename, duration FROM tracks \
             WHERE artist = ? AND album = ? ORDER BY title COLLATE NOCASE",
        )
        .bind(artist)
        .bind(album)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| self.hit_from_row(r)).collect())
    }

    async fn search_albums(
        &self,
        terms: &[SearchTerm],
        seen_artists: &[ArtistHit],
    ) -> Result<Vec<AlbumHit>> {
        let relevant: Vec<&SearchTerm> = terms
            .iter()
            .filter(|t| matches!(t.field, SearchField::Any | SearchField::Album))
            .collect();
        let Some(primary) = relevant.first() else {
            return Ok(Vec::new());
        };

        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        for term in &relevant {
            let (sql, value) = condition("album", term);
            conditions.push(sql);
            binds.push(value);
        }
        for term in terms.iter().filter(|t| t.field == SearchField::Artist) {
            let (sql, value) = condition("artist", term);
            conditions.push(sql);
            binds.push(value);
        }

        let skip: Vec<String> = seen_artists
            .iter()
            .map(|a| a.artist.to_lowercase())
            .collect();
        if !skip.is_empty() {
            let placeholders = vec!["?"; skip.len()].join(",");
            conditions.push(format!("lower(artist) NOT IN ({placeholders})"));
            binds.extend(skip);
        }

        let sql = format!(
            "SELECT DISTINCT artist, album FROM tracks WHERE {} \
             ORDER BY album LIKE ? DESC, album COLLATE NOCASE LIMIT ?",
            conditions.join(" AND ")
        );

        let mut query = sqlx::query_as::<_, (String, String)>(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        query = query.bind(starts_pattern(primary)).bind(self.limit);

        let pairs = query.fetch_all(&self.pool).await?;

        let mut albums = Vec::with_capacity(pairs.len());
        for (artist, album) in pairs {
            let tracks = self.album_tracks(&artist, &album).await?;
            albums.push(AlbumHit {
                artist,
                album,
                tracks,
            });
        }

        Ok(albums)
    }

    async fn search_tracks(
        &self,
        terms: &[SearchTerm],
        seen_artists: &[ArtistHit],
        seen_albums: &[AlbumHit],
    ) -> Result<Vec<TrackHit>> {
        let relevant: Vec<&SearchTerm> = terms
            .iter()
            .filter(|t| matches!(t.field, SearchField::Any | SearchField::Track))
            .collect();
        let dir_terms: Vec<&SearchTerm> = terms
            .iter()
            .filter(|t| t.field == SearchField::ReleaseDir)
            .collect();
        if relevant.is_empty() && dir_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        for term in &relevant {
            // titles always match by substring; quoting a track term is for
            // phrases with spaces, not equality
            conditions.push("title LIKE ? COLLATE NOCASE".to_string());
            binds.push(format!("%{}%", term.value));
        }
        for term in terms.iter().filter(|t| t.field == SearchField::Artist) {
            let (sql, value) = condition("artist", term);
            conditions.push(sql);
            binds.push(value);
        }
        for term in terms.iter().filter(|t| t.field == SearchField::Album) {
            let (sql, value) = condition("album", term);
            conditions.push(sql);
            binds.push(value);
        }
        for term in &dir_terms {
            // directory scoping matches anywhere in the stored path
            conditions.push("path LIKE ? COLLATE NOCASE".to_string());
            binds.push(format!("%{}%", term.value));
        }

        let mut skip: Vec<String> = seen_artists
            .iter()
            .map(|a| a.artist.to_lowercase())
            .collect();
        skip.extend(seen_albums.iter().map(|a| a.artist.to_lowercase()));
        skip.sort();
        skip.dedup();
        if !skip.is_empty() {
            let placeholders = vec!["?"; skip.len()].join(",");
            conditions.push(format!("lower(artist) NOT IN ({placeholders})"));
            binds.extend(skip);
        }

        let sql = format!(
            "SELECT artist, album, title, path, filename, duration FROM tracks WHERE {} \
             ORDER BY title LIKE ? DESC, title COLLATE NOCASE LIMIT ?",
            conditions.join(" AND ")
        );

        // directory-only queries have no title term to rank prefixes on
        let starts = relevant
            .first()
            .map(|term| starts_pattern(term))
            .unwrap_or_else(|| "%".to_string());

        let mut query = sqlx::query_as::<_, TrackRow>(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        query = query.bind(starts).bind(self.limit);

        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(|r| self.hit_from_row(r)).collect())
    }

    fn hit_from_row(&self, row: TrackRow) -> TrackHit {
        TrackHit {
            artist: row.artist,
            album: row.album,
            track: row.title,
            filename: row.filename,
            path: self.relative_path(&row.path),
            duration: format_duration(row.duration),
        }
    }

    fn relative_path(&self, path: &str) -> String {
        Path::new(path)
            .strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string())
    }
}

fn condition(column: &str, term: &SearchTerm) -> (String, String) {
    if term.exact {
        (format!("{column} = ? COLLATE NOCASE"), term.value.clone())
    } else {
        (
            format!("{column} LIKE ? COLLATE NOCASE"),
            format!("%{}%", term.value),
        )
    }
}

fn starts_pattern(term: &SearchTerm) -> String {
    format!("{}%", term.value)
}

// ---- highlighting projection ----

/// What part of a result matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Artist,
    Album,
    Track,
}

/// Why a result matched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reason {
    #[serde(rename = "type")]
    pub kind: MatchKind,
    pub text: String,
}

/// A track rendered for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayTrack {
    pub title: String,
    pub duration: String,
    pub path: String,
    pub filename: String,
}

/// A matched track with its marked-up title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightedTrack {
    pub title: String,
    pub duration: String,
    pub highlighted: String,
}

/// One display record in the flattened, highlighted result list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: MatchKind,
    pub artist: String,
    pub album: String,
    pub reasons: Vec<Reason>,
    pub tracks: Vec<DisplayTrack>,
    pub highlighted_tracks: Vec<HighlightedTrack>,
}

impl SearchEngine {
    /// Grouped search projected into display records with `«»` highlight
    /// markers and match reasons
    pub async fn search_highlighted(&self, query: &str) -> Result<Vec<SearchResult>> {
        let grouped = self.search_grouped(query).await?;
        let values: Vec<String> = parse_query(query.trim())
            .into_iter()
            .map(|t| t.value)
            .collect();

        let mut results = Vec::new();

        for entry in &grouped.artists {
            results.push(project_artist(entry, &values));
        }
        for entry in &grouped.albums {
            results.push(project_album(entry, &values));
        }
        for entry in &grouped.tracks {
            results.push(project_track(entry, &values));
        }

        Ok(results)
    }
}

fn project_artist(entry: &ArtistHit, values: &[String]) -> SearchResult {
    let mut reasons = vec![Reason {
        kind: MatchKind::Artist,
        text: entry.artist.clone(),
    }];
    let mut tracks = Vec::new();
    let mut highlighted = Vec::new();

    for album in &entry.albums {
        if matches_any(&album.album, values) {
            reasons.push(Reason {
                kind: MatchKind::Album,
                text: album.album.clone(),
            });
        }
        collect_tracks(&album.tracks, values, &mut tracks, &mut highlighted);
    }

    if !highlighted.is_empty() {
        reasons.push(Reason {
            kind: MatchKind::Track,
            text: format!("{} track(s)", highlighted.len()),
        });
    }

    SearchResult {
        kind: MatchKind::Artist,
        artist: entry.artist.clone(),
        album: "Multiple albums".to_string(),
        reasons,
        tracks,
        highlighted_tracks: highlighted,
    }
}

fn project_album(entry: &AlbumHit, values: &[String]) -> SearchResult {
    let mut tracks = Vec::new();
    let mut highlighted = Vec::new();
    collect_tracks(&entry.tracks, values, &mut tracks, &mut highlighted);

    let mut reasons = Vec::new();
    if matches_any(&entry.artist, values) {
        reasons.push(Reason {
            kind: MatchKind::Artist,
            text: entry.artist.clone(),
        });
    }
    if matches_any(&entry.album, values) {
        reasons.push(Reason {
            kind: MatchKind::Album,
            text: entry.album.clone(),
        });
    }
    if !highlighted.is_empty() {
        reasons.push(Reason {
            kind: MatchKind::Track,
            text: format!("{} track(s)", highlighted.len()),
        });
    }

    SearchResult {
        kind: MatchKind::Album,
        artist: entry.artist.clone(),
        album: entry.album.clone(),
        reasons,
        tracks,
        highlighted_tracks: highlighted,
    }
}

fn project_track(entry: &TrackHit, values: &[String]) -> SearchResult {
    SearchResult {
        kind: MatchKind::Track,
        artist: entry.artist.clone(),
        album: entry.album.clone(),
        reasons: vec![Reason {
            kind: MatchKind::Track,
            text: entry.track.clone(),
        }],
        tracks: vec![display_track(entry)],
        highlighted_tracks: vec![HighlightedTrack {
            title: entry.track.clone(),
            duration: entry.duration.clone(),
            highlighted: highlight(&entry.track, values),
        }],
    }
}

fn collect_tracks(
    hits: &[TrackHit],
    values: &[String],
    tracks: &mut Vec<DisplayTrack>,
    highlighted: &mut Vec<HighlightedTrack>,
) {
    for hit in hits {
        tracks.push(display_track(hit));
        if matches_any(&hit.track, values) {
            highlighted.push(HighlightedTrack {
                title: hit.track.clone(),
                duration: hit.duration.clone(),
                highlighted: highlight(&hit.track, values),
            });
        }
    }
}

fn display_track(hit: &TrackHit) -> DisplayTrack {
    DisplayTrack {
        title: hit.track.clone(),
        duration: hit.duration.clone(),
        path: hit.path.clone(),
        filename: safe_filename(&hit.track, &hit.path),
    }
}

fn matches_any(text: &str, values: &[String]) -> bool {
    let lower = text.to_lowercase();
    values.iter().any(|v| lower.contains(&v.to_lowercase()))
}

/// Wrap every case-insensitive occurrence of any term in `«`/`»`.
///
/// Longer terms claim their ranges first, so overlapping shorter terms
/// don't split an existing highlight.
pub fn highlight(text: &str, values: &[String]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let lower: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    let mut terms: Vec<Vec<char>> = values
        .iter()
        .map(|v| v.to_lowercase().chars().collect())
        .filter(|t: &Vec<char>| !t.is_empty())
        .collect();
    terms.sort_by(|a, b| b.len().cmp(&a.len()));
    terms.dedup();

    let mut claimed = vec![false; chars.len()];
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for term in &terms {
        let n = term.len();
        if n == 0 || n > chars.len() {
            continue;
        }
        let mut i = 0;
        while i + n <= chars.len() {
            if lower[i..i + n] == term[..] && !claimed[i..i + n].iter().any(|&c| c) {
                for flag in &mut claimed[i..i + n] {
                    *flag = true;
                }
                spans.push((i, i + n));
                i += n;
            } else {
                i += 1;
            }
        }
    }

    if spans.is_empty() {
        return text.to_string();
    }
    spans.sort_unstable();

    let mut out = String::with_capacity(text.len() + spans.len() * 4);
    let mut idx = 0;
    for (start, end) in spans {
        out.extend(chars[idx..start].iter());
        out.push('«');
        out.extend(chars[start..end].iter());
        out.push('»');
        idx = end;
    }
    out.extend(chars[idx..].iter());

    out
}

/// Filesystem-friendly download name: filtered title plus the source
/// file's extension
pub fn safe_filename(title: &str, path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let safe: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_' || *c == '-')
        .collect();

    format!("{}{}", safe.trim(), ext)
}
