//! Track table operations
//!
//! The single write path lives in the indexer supervisor; everything here is
//! safe under concurrent readers.

use sqlx::sqlite::SqlitePool;
use sqlx::Sqlite;

use crate::error::Result;
use crate::models::Track;

/// Track table handle over a shared connection pool
#[derive(Debug, Clone)]
pub struct TrackTable {
    pool: SqlitePool,
}

impl TrackTable {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool (read-only query surfaces, e.g. search)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn bind_upsert<'q>(
        track: &'q Track,
    ) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO tracks
            (path, filename, artist, album, title, albumartist, genre, year, duration, mtime)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&track.path)
        .bind(&track.filename)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(&track.title)
        .bind(&track.albumartist)
        .bind(&track.genre)
        .bind(track.year)
        .bind(track.duration)
        .bind(track.mtime)
    }

    /// Insert or replace a single track
    pub async fn upsert(&self, track: &Track) -> Result<()> {
        Self::bind_upsert(track).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert or replace a batch of tracks inside one transaction.
    ///
    /// Either the whole batch commits or none of it does.
    pub async fn upsert_batch(&self, tracks: &[Track]) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for track in tracks {
            Self::bind_upsert(track).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Remove one track by path
    pub async fn delete_by_path(&self, path: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tracks WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Remove a batch of tracks inside one transaction
    pub async fn delete_batch(&self, paths: &[String]) -> Result<u64> {
        if paths.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for path in paths {
            let result = sqlx::query("DELETE FROM tracks WHERE path = ?")
                .bind(path)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;

        Ok(removed)
    }

    /// Remove all tracks
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tracks").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Get track count
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    /// Enumerate all stored paths
    pub async fn all_paths(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT path FROM tracks")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    /// Get a track by its path
    pub async fn get_by_path(&self, path: &str) -> Result<Option<Track>> {
        let track: Option<Track> = sqlx::query_as("SELECT * FROM tracks WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    /// Random sample of (path, mtime) pairs for the freshness check
    pub async fn sample_mtimes(&self, limit: i64) -> Result<Vec<(String, f64)>> {
        let rows: Vec<(String, f64)> =
            sqlx::query_as("SELECT path, mtime FROM tracks ORDER BY RANDOM() LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }
}
