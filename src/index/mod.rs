//! AliasIndex - persistent alias to storage-path mapping
//!
//! ## Responsibilities
//!
//! - Idempotent schema creation on first use
//! - Unique alias inserts with non-fatal conflict reporting
//! - Alias lookup and full listing for random selection
//!
//! Every operation opens its own scoped SQLite connection and releases it on
//! all exit paths when the handle drops. Reopening per call is a deliberate
//! simplicity trade-off for a read-mostly, low-QPS workload; no pool is kept.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};
use std::path::Path;

/// One row of the alias index
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Lowercase hex digest of the input path string, unique
    pub alias: String,
    /// Filesystem location of the compressed image
    pub storage_path: String,
}

/// Alias index over a SQLite file
#[derive(Debug, Clone)]
pub struct ImageIndex {
    options: SqliteConnectOptions,
}

impl ImageIndex {
    /// Create an index handle for the given database file.
    ///
    /// `cache_kib` is the advisory SQLite page-cache hint from the config,
    /// applied as the `cache_size` pragma on every connection.
    pub fn new(database: &Path, cache_kib: u32) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(database)
            .create_if_missing(true)
            // Negative cache_size means "KiB" to SQLite
            .pragma("cache_size", format!("-{cache_kib}"));
        Self { options }
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        Ok(self.options.connect().await?)
    }

    /// Create the backing table if absent. Safe to call repeatedly.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alias TEXT UNIQUE NOT NULL,
                file_path TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut conn)
        .await?;
        conn.close().await?;
        Ok(())
    }

    /// Insert an alias mapping.
    ///
    /// Returns `Ok(false)` when the alias is already indexed (uniqueness
    /// conflict); any other database failure is an error.
    pub async fn insert(&self, alias: &str, path: &str) -> Result<bool> {
        let mut conn = self.connect().await?;
        let result = sqlx::query("INSERT INTO images (alias, file_path) VALUES (?, ?)")
            .bind(alias)
            .bind(path)
            .execute(&mut conn)
            .await;
        conn.close().await?;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up the storage path for an alias.
    pub async fn lookup(&self, alias: &str) -> Result<Option<String>> {
        let mut conn = self.connect().await?;
        let row = sqlx::query("SELECT file_path FROM images WHERE alias = ?")
            .bind(alias)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;

        Ok(row.map(|r| r.get("file_path")))
    }

    /// List every indexed record, unordered.
    pub async fn list_all(&self) -> Result<Vec<ImageRecord>> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query("SELECT alias, file_path FROM images")
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;

        Ok(rows
            .into_iter()
            .map(|r| ImageRecord {
                alias: r.get("alias"),
                storage_path: r.get("file_path"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_index(dir: &TempDir) -> ImageIndex {
        let index = ImageIndex::new(&dir.path().join("index.db"), 256);
        index.ensure_schema().await.unwrap();
        index
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir).await;

        index.ensure_schema().await.unwrap();
        index.ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir).await;

        let inserted = index.insert("abc123", "/data/abc123.jpeg").await.unwrap();
        assert!(inserted);

        let path = index.lookup("abc123").await.unwrap();
        assert_eq!(path.as_deref(), Some("/data/abc123.jpeg"));
    }

    #[tokio::test]
    async fn lookup_unknown_alias_is_none() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir).await;

        assert!(index.lookup("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_alias_is_a_conflict_not_an_error() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir).await;

        assert!(index.insert("dup", "/data/first.jpeg").await.unwrap());
        assert!(!index.insert("dup", "/data/second.jpeg").await.unwrap());

        // The first mapping wins
        let path = index.lookup("dup").await.unwrap();
        assert_eq!(path.as_deref(), Some("/data/first.jpeg"));
    }

    #[tokio::test]
    async fn list_all_returns_every_record() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir).await;

        assert!(index.list_all().await.unwrap().is_empty());

        index.insert("a1", "/data/a1.jpeg").await.unwrap();
        index.insert("b2", "/data/b2.jpeg").await.unwrap();

        let mut aliases: Vec<String> = index
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.alias)
            .collect();
        aliases.sort();
        assert_eq!(aliases, vec!["a1", "b2"]);
    }
}
