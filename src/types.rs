use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-field limits imposed by the webhook delivery channel.
pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_CONTENT_LEN: usize = 2000;
pub const ARTICLES_PER_MESSAGE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// RSS/Atom syndication feed.
    #[serde(alias = "rss", alias = "atom")]
    Syndication,
    /// JSON document with a top-level `reports` collection.
    #[serde(alias = "json")]
    JsonReport,
    /// Ranked-ID listing endpoint requiring a second fetch per item.
    #[serde(alias = "hackernews")]
    RankedIds,
}

/// One configured feed source. Loaded once per run and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

/// Canonical normalized article. Constructed exclusively by a source parser;
/// only its link fingerprint is ever persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub description: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub source_name: String,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            timeout_seconds: 15,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

/// Transient outcome of one aggregation pass, discarded at end of run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub sources_checked: usize,
    pub new_articles: Vec<Article>,
    pub pruned: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("terminal HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("fetch failed for {url} after {attempts} attempts: {cause}")]
    Fetch {
        url: String,
        attempts: u32,
        cause: String,
    },

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("summarization failed: {0}")]
    Summarize(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
