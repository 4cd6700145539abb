pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod fetcher;
pub mod ledger;
pub mod sources;
pub mod summarizer;
pub mod types;
pub mod utils;

pub use aggregator::Aggregator;
pub use config::{load_sources, Settings};
pub use dispatcher::{build_article_payloads, chunk_content, NotificationSink, WebhookSink};
pub use fetcher::Fetcher;
pub use ledger::{fingerprint, DedupLedger, MemoryLedger, SqliteLedger};
pub use sources::{parser_for, SourceParser};
pub use summarizer::{GeminiSummarizer, NoopSummarizer, Summarizer};
pub use types::*;
