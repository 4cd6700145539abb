use crate::types::{AggregatorError, FetchConfig, Result};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, warn};

/// HTTP/network conditions worth retrying. Anything else is terminal for the
/// source this run.
const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// HTTP retrieval with bounded retries and exponential backoff. Shared by the
/// run controller and the ranked-ID parser's secondary per-item fetches.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch a URL body as text. Connection failures, timeouts, and the
    /// transient status set are retried up to `max_retries` times with
    /// backoff delays of 1x, 2x, 4x the base interval; any other HTTP status
    /// fails immediately with no retry.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let base = Duration::from_millis(self.config.retry_base_delay_ms);
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: base,
            initial_interval: base,
            max_interval: base * 32,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body = response.text().await?;
                        debug!("Fetched {} ({} bytes)", url, body.len());
                        return Ok(body);
                    }

                    if !TRANSIENT_STATUSES.contains(&status.as_u16()) {
                        return Err(AggregatorError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }

                    last_error = Some(format!(
                        "HTTP {}: {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown")
                    ));
                }
                Err(e) => {
                    // reqwest send errors cover connection failures and
                    // timeouts, both transient.
                    last_error = Some(e.to_string());
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!(
                        "Attempt {} failed for {}: {}; retrying in {:?}",
                        attempt + 1,
                        url,
                        last_error.as_deref().unwrap_or("unknown error"),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let attempts = self.config.max_retries + 1;
        error!("Failed to fetch {} after {} attempts", url, attempts);

        Err(AggregatorError::Fetch {
            url: url.to_string(),
            attempts,
            cause: last_error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}
