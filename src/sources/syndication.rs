use super::{normalize_author, normalize_description, normalize_image, normalize_title, SourceParser};
use crate::types::{AggregatorError, Article, Result, SourceConfig};
use crate::utils::is_valid_url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use tracing::{debug, info, warn};

/// RSS/Atom parser backed by feed-rs.
pub struct SyndicationParser;

impl SyndicationParser {
    fn article_from_entry(
        &self,
        entry: Entry,
        source: &SourceConfig,
        cutoff: DateTime<Utc>,
    ) -> Option<Article> {
        // Atom feeds often carry only `updated`; accept it as the publish time.
        let published_at = entry.published.or(entry.updated)?;
        if published_at < cutoff {
            return None;
        }

        let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();
        if !is_valid_url(&link) {
            warn!(
                "Skipping entry with unusable link from {}: {:?}",
                source.name,
                entry.title.as_ref().map(|t| t.content.as_str())
            );
            return None;
        }

        let image_url = entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .find_map(|c| c.url.as_ref().map(|u| u.to_string()));

        Some(Article {
            title: normalize_title(entry.title.map(|t| t.content)),
            link,
            published_at: published_at.with_timezone(&Utc),
            description: normalize_description(entry.summary.map(|s| s.content)),
            image_url: normalize_image(image_url),
            author: normalize_author(entry.authors.first().map(|a| a.name.clone())),
            source_name: source.name.clone(),
        })
    }
}

#[async_trait]
impl SourceParser for SyndicationParser {
    async fn parse(
        &self,
        source: &SourceConfig,
        body: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        let feed = parser::parse(body.as_bytes())
            .map_err(|e| AggregatorError::Parse(format!("{}: {}", source.name, e)))?;

        let total = feed.entries.len();
        let articles: Vec<Article> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.article_from_entry(entry, source, cutoff))
            .collect();

        debug!(
            "{}: {} of {} entries inside the time window",
            source.name,
            articles.len(),
            total
        );
        info!("Fetched {} recent articles from {}", articles.len(), source.name);

        Ok(articles)
    }
}
