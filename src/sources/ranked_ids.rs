use super::{normalize_author, normalize_description, normalize_title, SourceParser};
use crate::fetcher::Fetcher;
use crate::types::{Article, Result, SourceConfig};
use crate::utils::is_valid_url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ITEM_ENDPOINT: &str = "https://hacker-news.firebaseio.com/v0/item";
const DISCUSSION_ENDPOINT: &str = "https://news.ycombinator.com/item";

/// Ranked-ID feed: the configured URL returns a JSON array of item IDs in
/// rank order, and each item needs a secondary fetch. Per-item fetch
/// failures skip that item only.
pub struct RankedIdsParser {
    fetcher: Arc<Fetcher>,
    max_items: usize,
    item_endpoint: String,
    discussion_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "type")]
    kind: Option<String>,
    time: Option<i64>,
    url: Option<String>,
    title: Option<String>,
    text: Option<String>,
    by: Option<String>,
}

impl RankedIdsParser {
    pub fn new(fetcher: Arc<Fetcher>, max_items: usize) -> Self {
        Self {
            fetcher,
            max_items,
            item_endpoint: ITEM_ENDPOINT.to_string(),
            discussion_endpoint: DISCUSSION_ENDPOINT.to_string(),
        }
    }

    /// Point item lookups at a different endpoint (used in tests).
    pub fn with_item_endpoint(mut self, item: String, discussion: String) -> Self {
        self.item_endpoint = item;
        self.discussion_endpoint = discussion;
        self
    }

    fn article_from_item(
        &self,
        item: RawItem,
        id: u64,
        source: &SourceConfig,
        cutoff: DateTime<Utc>,
    ) -> Option<Article> {
        if item.kind.as_deref() != Some("story") {
            return None;
        }

        let published_at = DateTime::from_timestamp(item.time?, 0)?;
        if published_at < cutoff {
            return None;
        }

        // Link-less stories point at their own discussion page.
        let link = item
            .url
            .filter(|u| is_valid_url(u))
            .unwrap_or_else(|| format!("{}?id={}", self.discussion_endpoint, id));

        Some(Article {
            title: normalize_title(item.title),
            link,
            published_at,
            description: normalize_description(item.text),
            image_url: None,
            author: normalize_author(item.by),
            source_name: source.name.clone(),
        })
    }
}

#[async_trait]
impl SourceParser for RankedIdsParser {
    async fn parse(
        &self,
        source: &SourceConfig,
        body: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        let ids: Vec<u64> = match serde_json::from_str(body) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Unexpected ID listing from {}: {}", source.name, e);
                return Ok(Vec::new());
            }
        };

        let mut articles = Vec::new();

        for id in ids.into_iter().take(self.max_items) {
            let item_url = format!("{}/{}.json", self.item_endpoint, id);

            let item_body = match self.fetcher.fetch(&item_url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!("Skipping item {} from {}: {}", id, source.name, e);
                    continue;
                }
            };

            match serde_json::from_str::<RawItem>(&item_body) {
                Ok(item) => {
                    if let Some(article) = self.article_from_item(item, id, source, cutoff) {
                        articles.push(article);
                    }
                }
                Err(e) => {
                    warn!("Skipping malformed item {} from {}: {}", id, source.name, e);
                }
            }
        }

        info!("Fetched {} recent articles from {}", articles.len(), source.name);
        Ok(articles)
    }
}
