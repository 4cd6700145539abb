pub mod json_report;
pub mod ranked_ids;
pub mod syndication;

use crate::fetcher::Fetcher;
use crate::types::{Article, Result, SourceConfig, SourceKind, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use crate::utils::{is_valid_url, truncate_chars};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use json_report::JsonReportParser;
pub use ranked_ids::RankedIdsParser;
pub use syndication::SyndicationParser;

/// One parser per source kind. Shared postconditions: every emitted Article
/// satisfies the model invariants, only items published at or after `cutoff`
/// pass (boundary inclusive), items without a parseable timestamp are
/// dropped rather than defaulted to now, and one malformed item never aborts
/// the rest of the payload.
#[async_trait]
pub trait SourceParser: Send + Sync {
    async fn parse(
        &self,
        source: &SourceConfig,
        body: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Article>>;
}

/// Select the parser variant for a configured source kind. Supporting a new
/// feed format means adding one variant here.
pub fn parser_for(
    kind: SourceKind,
    fetcher: Arc<Fetcher>,
    ranked_ids_cap: usize,
) -> Box<dyn SourceParser> {
    match kind {
        SourceKind::Syndication => Box::new(SyndicationParser),
        SourceKind::JsonReport => Box::new(JsonReportParser),
        SourceKind::RankedIds => Box::new(RankedIdsParser::new(fetcher, ranked_ids_cap)),
    }
}

pub(crate) fn normalize_title(raw: Option<String>) -> String {
    let title = raw.unwrap_or_default();
    let title = title.trim();
    if title.is_empty() {
        "No Title".to_string()
    } else {
        truncate_chars(title, MAX_TITLE_LEN)
    }
}

pub(crate) fn normalize_description(raw: Option<String>) -> String {
    truncate_chars(raw.unwrap_or_default().trim(), MAX_DESCRIPTION_LEN)
}

pub(crate) fn normalize_author(raw: Option<String>) -> Option<String> {
    raw.map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .map(|a| truncate_chars(&a, MAX_TITLE_LEN))
}

pub(crate) fn normalize_image(raw: Option<String>) -> Option<String> {
    raw.filter(|u| is_valid_url(u))
}
