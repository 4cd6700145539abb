use super::{normalize_author, normalize_description, normalize_image, normalize_title, SourceParser};
use crate::types::{Article, Result, SourceConfig};
use crate::utils::is_valid_url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

/// Generic JSON report feed: a top-level `reports` array of disclosure
/// records.
pub struct JsonReportParser;

#[derive(Debug, Deserialize)]
struct RawReport {
    disclosed_at: Option<String>,
    url: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    image: Option<String>,
    author: Option<String>,
}

impl JsonReportParser {
    fn article_from_report(
        &self,
        report: RawReport,
        source: &SourceConfig,
        cutoff: DateTime<Utc>,
    ) -> Option<Article> {
        let disclosed_at = report.disclosed_at.as_deref()?;
        let published_at = DateTime::parse_from_rfc3339(disclosed_at)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()?;
        if published_at < cutoff {
            return None;
        }

        let link = report.url.unwrap_or_default();
        if !is_valid_url(&link) {
            warn!(
                "Skipping report with unusable link from {}: {:?}",
                source.name, report.title
            );
            return None;
        }

        Some(Article {
            title: normalize_title(report.title),
            link,
            published_at,
            description: normalize_description(report.summary),
            image_url: normalize_image(report.image),
            author: normalize_author(report.author),
            source_name: source.name.clone(),
        })
    }
}

#[async_trait]
impl SourceParser for JsonReportParser {
    async fn parse(
        &self,
        source: &SourceConfig,
        body: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        if body.trim().is_empty() {
            warn!("Empty response body from {}", source.name);
            return Ok(Vec::new());
        }

        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Non-JSON response from {}: {}", source.name, e);
                return Ok(Vec::new());
            }
        };

        let reports = match value.get("reports").and_then(|v| v.as_array()) {
            Some(reports) => reports,
            None => {
                warn!("No `reports` collection in response from {}", source.name);
                return Ok(Vec::new());
            }
        };

        let mut articles = Vec::new();
        for raw in reports {
            // Per-item deserialization so one malformed report cannot sink
            // the rest of the batch.
            match serde_json::from_value::<RawReport>(raw.clone()) {
                Ok(report) => {
                    if let Some(article) = self.article_from_report(report, source, cutoff) {
                        articles.push(article);
                    }
                }
                Err(e) => {
                    warn!("Skipping malformed report from {}: {}", source.name, e);
                }
            }
        }

        info!("Fetched {} recent articles from {}", articles.len(), source.name);
        Ok(articles)
    }
}
