use crate::types::{AggregatorError, FetchConfig, Result, SourceConfig};
use std::env;
use std::path::Path;
use tracing::warn;

/// Runtime settings for one aggregation pass. Webhook endpoints and the
/// summarizer key come from the environment; everything else has defaults
/// matched to the delivery channel.
#[derive(Debug, Clone)]
pub struct Settings {
    pub webhook_urls: Vec<String>,
    pub gemini_api_key: Option<String>,
    pub time_window_hours: i64,
    pub retention_days: i64,
    pub per_source_cap: usize,
    pub ranked_ids_cap: usize,
    pub fetch: FetchConfig,
    /// Delay between successive outbound payloads, to respect sink rate limits.
    pub pacing_ms: u64,
    /// Delay after dispatching one source's articles before moving on.
    pub source_pacing_ms: u64,
    pub summary_max_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webhook_urls: Vec::new(),
            gemini_api_key: None,
            time_window_hours: 48,
            retention_days: 7,
            per_source_cap: 20,
            ranked_ids_cap: 20,
            fetch: FetchConfig::default(),
            pacing_ms: 1500,
            source_pacing_ms: 5000,
            summary_max_len: 1500,
        }
    }
}

impl Settings {
    /// Build settings from the process environment. A missing or empty
    /// webhook list is fatal: with no delivery target a run cannot do
    /// anything observable.
    pub fn from_env() -> Result<Self> {
        let webhook_urls: Vec<String> = env::var("RELAY_WEBHOOK_URLS")
            .unwrap_or_default()
            .split(',')
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();

        if webhook_urls.is_empty() {
            return Err(AggregatorError::Config(
                "RELAY_WEBHOOK_URLS is not set; at least one webhook endpoint is required"
                    .to_string(),
            ));
        }

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|key| !key.is_empty());
        if gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY not set; run summaries will be skipped");
        }

        Ok(Self {
            webhook_urls,
            gemini_api_key,
            ..Self::default()
        })
    }
}

/// Load the ordered source list. Any failure here is fatal for the run:
/// without a source list there is nothing to aggregate.
pub fn load_sources(path: impl AsRef<Path>) -> Result<Vec<SourceConfig>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AggregatorError::Config(format!("cannot read source list {}: {}", path.display(), e))
    })?;

    let sources: Vec<SourceConfig> = serde_json::from_str(&raw).map_err(|e| {
        AggregatorError::Config(format!("cannot parse source list {}: {}", path.display(), e))
    })?;

    Ok(sources)
}
