use clap::Parser;
use news_relay::{
    load_sources, Aggregator, GeminiSummarizer, NoopSummarizer, Settings, SqliteLedger, Summarizer,
    WebhookSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "news-relay",
    about = "Poll configured feed sources once and relay new articles to webhook endpoints"
)]
struct Args {
    /// Path to the JSON source list
    #[arg(long, default_value = "sources.json")]
    sources: PathBuf,

    /// Path to the dedup ledger database
    #[arg(long, default_value = "relay.db")]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("--- news-relay starting run ---");

    // Configuration failures are the only fatal errors; everything past this
    // point is isolated per source or per delivery.
    let settings = Settings::from_env()?;
    let sources = load_sources(&args.sources)?;

    let ledger = Arc::new(SqliteLedger::open(&args.db).await?);

    let timeout = Duration::from_secs(settings.fetch.timeout_seconds);
    let sink = Arc::new(WebhookSink::new(
        settings.webhook_urls.clone(),
        timeout,
        Duration::from_millis(settings.pacing_ms),
    )?);

    let summarizer: Arc<dyn Summarizer> = match &settings.gemini_api_key {
        Some(key) => Arc::new(GeminiSummarizer::new(key.clone(), timeout)?),
        None => Arc::new(NoopSummarizer),
    };

    let aggregator = Aggregator::new(settings, ledger, sink, summarizer)?;
    let report = aggregator.run(&sources).await?;

    info!(
        "--- Run finished: {} new articles from {} sources ---",
        report.new_articles.len(),
        report.sources_checked
    );

    Ok(())
}
