use crate::config::Settings;
use crate::dispatcher::NotificationSink;
use crate::fetcher::Fetcher;
use crate::ledger::{fingerprint, DedupLedger};
use crate::sources::parser_for;
use crate::summarizer::Summarizer;
use crate::types::{Article, Result, RunReport, SourceConfig};
use crate::utils::is_valid_url;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Run controller: one call to `run` is one full aggregation pass over the
/// configured sources.
pub struct Aggregator {
    settings: Settings,
    fetcher: Arc<Fetcher>,
    ledger: Arc<dyn DedupLedger>,
    sink: Arc<dyn NotificationSink>,
    summarizer: Arc<dyn Summarizer>,
}

impl Aggregator {
    pub fn new(
        settings: Settings,
        ledger: Arc<dyn DedupLedger>,
        sink: Arc<dyn NotificationSink>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(settings.fetch.clone())?);
        Ok(Self {
            settings,
            fetcher,
            ledger,
            sink,
            summarizer,
        })
    }

    /// One aggregation pass: poll every source in listed order, dispatch each
    /// source's new articles as they are found, prune the ledger, then close
    /// with either an idle status message or a best-effort run summary.
    ///
    /// A single source's failure is isolated; only the surrounding entry
    /// point can fail a run, and only on configuration errors.
    pub async fn run(&self, sources: &[SourceConfig]) -> Result<RunReport> {
        let mut report = RunReport::default();
        let cutoff = Utc::now() - Duration::hours(self.settings.time_window_hours);

        for source in sources {
            if !is_valid_url(&source.url) {
                warn!("Skipping source {} with invalid URL: {}", source.name, source.url);
                continue;
            }

            info!("Fetching from {}...", source.name);
            report.sources_checked += 1;

            let new_articles = match self.process_source(source, cutoff).await {
                Ok(articles) => articles,
                Err(e) => {
                    error!("Source {} yielded nothing this run: {}", source.name, e);
                    continue;
                }
            };

            if new_articles.is_empty() {
                info!("No new articles from {}", source.name);
                continue;
            }

            // Dispatch per source as soon as its articles are known.
            if let Err(e) = self.sink.push_articles(&new_articles, &source.name).await {
                error!("Delivery failed for {}: {}", source.name, e);
            }

            report.new_articles.extend(new_articles);
            tokio::time::sleep(std::time::Duration::from_millis(self.settings.source_pacing_ms))
                .await;
        }

        let now = Utc::now();
        match self
            .ledger
            .prune(Duration::days(self.settings.retention_days), now)
            .await
        {
            Ok(pruned) => report.pruned = pruned,
            Err(e) => error!("Ledger prune failed: {}", e),
        }

        if report.new_articles.is_empty() {
            let message = idle_status_message(report.sources_checked, now);
            if let Err(e) = self.sink.push_text(&message).await {
                error!("Failed to deliver idle status message: {}", e);
            }
        } else {
            match self
                .summarizer
                .summarize(&report.new_articles, self.settings.summary_max_len)
                .await
            {
                Ok(Some(summary)) => {
                    let message = format!("**Run Summary:**\n{}", summary);
                    if let Err(e) = self.sink.push_text(&message).await {
                        error!("Failed to deliver summary message: {}", e);
                    }
                }
                Ok(None) => debug!("No summary available for this run"),
                Err(e) => warn!("Summarization failed, skipping summary message: {}", e),
            }
        }

        info!(
            "Run finished: {} new articles from {} sources, {} ledger records pruned",
            report.new_articles.len(),
            report.sources_checked,
            report.pruned
        );

        Ok(report)
    }

    /// Fetch, parse, and deduplicate one source. Returns the source's
    /// newly-seen articles, already recorded in the ledger.
    async fn process_source(
        &self,
        source: &SourceConfig,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        let body = self.fetcher.fetch(&source.url).await?;
        let parser = parser_for(source.kind, self.fetcher.clone(), self.settings.ranked_ids_cap);
        let articles = parser.parse(source, &body, cutoff).await?;

        // Feeds list newest first; walk oldest-first so ledger insertion
        // order follows publish order.
        let mut fresh = Vec::new();
        let mut seen_in_payload = HashSet::new();
        for article in articles.iter().rev() {
            let fp = fingerprint(&article.link);
            if seen_in_payload.contains(&fp) {
                continue;
            }
            if self.ledger.is_seen(&fp).await? {
                continue;
            }
            seen_in_payload.insert(fp);
            fresh.push(article.clone());
        }

        // Cap a single burst. The excess stays unrecorded, so it is eligible
        // to reappear on the next run.
        if fresh.len() > self.settings.per_source_cap {
            info!(
                "Too many new articles from {}, keeping the first {}",
                source.name, self.settings.per_source_cap
            );
            fresh.truncate(self.settings.per_source_cap);
        }

        let now = Utc::now();
        let mut new_articles = Vec::with_capacity(fresh.len());
        for article in fresh {
            let fp = fingerprint(&article.link);
            // Atomic insert-if-absent; false means an overlapping run
            // recorded this fingerprint first.
            if self.ledger.record_seen(&fp, now).await? {
                debug!("New article from {}: {}", source.name, article.title);
                new_articles.push(article);
            }
        }

        Ok(new_articles)
    }
}

/// Synthesized status message for runs that found nothing new, rotated by
/// wall-clock so consecutive idle runs vary.
fn idle_status_message(sources_checked: usize, now: DateTime<Utc>) -> String {
    let messages = [
        format!("Relay is awake and monitoring! No new articles from {} sources.", sources_checked),
        format!("All quiet on the news front, but {} sources were checked!", sources_checked),
        format!("Still here, still working. Nothing new from {} sources!", sources_checked),
        format!("Full sweep of {} sources complete; no fresh articles this run.", sources_checked),
        format!("Just a ping to say the relay is active after scanning {} sources!", sources_checked),
        format!("The feeds are calm. Standing watch over {} sources.", sources_checked),
        format!("No new stories from {} sources this run; all systems green.", sources_checked),
        format!("Silence is golden. On guard after checking {} sources.", sources_checked),
    ];

    let index = now.timestamp().rem_euclid(messages.len() as i64) as usize;
    messages[index].clone()
}
