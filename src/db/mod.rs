//! Download ledger.
//!
//! Records which releases were downloaded completely, so re-runs skip them.
//! Uses SQLx with SQLite for lightweight, embedded storage. The pool holds a
//! single connection, which serializes every read and write.
//!
//! # Example
//!
//! ```ignore
//! use release_fetch::db::{Ledger, SqliteLedger, db_url};
//!
//! let ledger = SqliteLedger::open(&db_url(Some(path))).await?;
//! if !ledger.contains("0060254735180").await? { ... }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt};
use crate::model::{QualityTier, ReleaseKind};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "downloads.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// A completed release.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Upstream release id
    pub id: String,
    pub media_type: ReleaseKind,
    pub quality: QualityTier,
    /// Release folder
    pub saved_path: PathBuf,
    pub url: String,
    pub release_date: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Persistent set of completed release ids.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn contains(&self, id: &str) -> Result<bool>;

    /// Record a completed release. Recording an id twice is a no-op.
    async fn record(&self, entry: &LedgerEntry) -> Result<()>;

    /// Forget every entry.
    async fn purge(&self) -> Result<()>;
}

/// SQLite-backed ledger.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open the ledger, creating the database file and schema if needed.
    pub async fn open(db_url: &str) -> Result<Self> {
        if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
            sqlx::Sqlite::create_database(db_url)
                .await
                .with_context(format!("creating ledger {}", db_url))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(db_url)
            .await
            .with_context(format!("opening ledger {}", db_url))?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Number of recorded releases.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloads")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn contains(&self, id: &str) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn record(&self, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO downloads \
             (id, media_type, quality, file_format, saved_path, url, release_date, recorded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&entry.id)
        .bind(entry.media_type.as_str())
        .bind(i64::from(entry.quality.format_id()))
        .bind(entry.quality.label())
        .bind(entry.saved_path.to_string_lossy().into_owned())
        .bind(&entry.url)
        .bind(entry.release_date.as_deref())
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(format!("recording {}", entry.id))?;
        Ok(())
    }

    async fn purge(&self) -> Result<()> {
        sqlx::query("DELETE FROM downloads")
            .execute(&self.pool)
            .await?;
        tracing::info!("Download ledger purged");
        Ok(())
    }
}
