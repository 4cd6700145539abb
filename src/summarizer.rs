use crate::types::{AggregatorError, Article, Result};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Summarization collaborator. Advisory only: the caller treats any failure
/// as "no summary" and moves on.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a run's worth of articles as one short text. `Ok(None)`
    /// means no summary is available and is not an error.
    async fn summarize(&self, articles: &[Article], max_len: usize) -> Result<Option<String>>;
}

/// Gemini-backed summarizer over the run's `{title, link}` pairs.
pub struct GeminiSummarizer {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", GEMINI_ENDPOINT, GEMINI_MODEL),
        })
    }

    /// Point requests at a different endpoint (used in tests).
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn build_prompt(articles: &[Article], max_len: usize) -> String {
        let mut prompt = format!(
            "Provide a brief overview of the following news articles, highlighting key points \
             or common themes (max {} characters):\n",
            max_len
        );
        for article in articles {
            prompt.push_str(&format!("- {} ({})\n", article.title, article.link));
        }
        prompt
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, articles: &[Article], max_len: usize) -> Result<Option<String>> {
        debug!("Requesting summary for {} articles", articles.len());

        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": Self::build_prompt(articles, max_len) }]
            }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AggregatorError::Summarize(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AggregatorError::Summarize(format!(
                "HTTP {} from summarization service",
                response.status()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AggregatorError::Summarize(e.to_string()))?;

        let text = value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|t| truncate_chars(t.trim(), max_len))
            .filter(|t| !t.is_empty());

        if text.is_some() {
            info!("Summarization succeeded");
        }

        Ok(text)
    }
}

/// Used when no summarization credentials are configured.
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, _articles: &[Article], _max_len: usize) -> Result<Option<String>> {
        Ok(None)
    }
}
