//! Track record model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One indexed audio file.
///
/// `path` is the absolute canonical path and the unique key in the index
/// store. `artist`, `album` and `title` are never empty: extraction falls
/// back to path-derived values and finally "Unknown". `mtime` is the source
/// modification time observed at insertion, in floating seconds since epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub path: String,
    pub filename: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub albumartist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub duration: Option<f64>,
    pub mtime: f64,
}
