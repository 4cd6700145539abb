use crate::types::Result;
use crate::utils::normalize_link;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

/// Dedup identity of an article: a stable one-way hash of its normalized
/// link. Link identity is the cheapest identifier that survives description
/// text changing between fetches of the same feed.
pub fn fingerprint(link: &str) -> String {
    let digest = Sha256::digest(normalize_link(link).as_bytes());
    format!("{:x}", digest)
}

/// Persistent record of already-emitted articles. The ledger is the sole
/// source of truth for "is this new" and the only shared mutable resource
/// across runs.
#[async_trait]
pub trait DedupLedger: Send + Sync {
    async fn is_seen(&self, fingerprint: &str) -> Result<bool>;

    /// Idempotent insert-if-absent. Returns true iff the fingerprint was
    /// newly recorded; an existing row is untouched (first_seen_at is not
    /// refreshed). Check-then-record must be atomic per fingerprint so the
    /// same article appearing in two sources is emitted once, by whichever
    /// source is processed first.
    async fn record_seen(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Delete every record older than the retention window. Returns the
    /// number removed, for observability only.
    async fn prune(&self, retention: Duration, now: DateTime<Utc>) -> Result<u64>;
}

/// Durable SQLite-backed ledger. Schema is exactly
/// `(fingerprint TEXT PRIMARY KEY, first_seen_at INTEGER)`.
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (or create) a file-backed ledger.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;

        Ok(ledger)
    }

    /// In-memory ledger, one connection so the database lives as long as the
    /// pool. Used in tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;

        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen_articles (
                fingerprint TEXT PRIMARY KEY,
                first_seen_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DedupLedger for SqliteLedger {
    async fn is_seen(&self, fingerprint: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM seen_articles WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn record_seen(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<bool> {
        // INSERT OR IGNORE makes check-then-record a single atomic statement.
        let result =
            sqlx::query("INSERT OR IGNORE INTO seen_articles (fingerprint, first_seen_at) VALUES (?, ?)")
                .bind(fingerprint)
                .bind(now.timestamp())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn prune(&self, retention: Duration, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = (now - retention).timestamp();

        let result = sqlx::query("DELETE FROM seen_articles WHERE first_seen_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!("Pruned {} expired records from the dedup ledger", removed);
        }

        Ok(removed)
    }
}

/// In-memory ledger for tests and dry runs; same contract, no durability.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<HashMap<String, i64>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl DedupLedger for MemoryLedger {
    async fn is_seen(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.records.lock().await.contains_key(fingerprint))
    }

    async fn record_seen(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut records = self.records.lock().await;
        if records.contains_key(fingerprint) {
            return Ok(false);
        }
        records.insert(fingerprint.to_string(), now.timestamp());
        Ok(true)
    }

    async fn prune(&self, retention: Duration, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = (now - retention).timestamp();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, first_seen_at| *first_seen_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}
