use crate::types::{Article, Result, ARTICLES_PER_MESSAGE, MAX_CONTENT_LEN, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use crate::utils::{is_valid_url, truncate_chars};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CONTINUATION_MARKER: &str = " (continued)";

/// Delivery sink collaborator. The core attempts each delivery once; failed
/// deliveries are logged, never retried.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Push a batch of articles attributed to one source.
    async fn push_articles(&self, articles: &[Article], source_name: &str) -> Result<()>;

    /// Push a free-text message, chunked to the channel content limit.
    async fn push_text(&self, content: &str) -> Result<()>;
}

/// Partition articles into outbound payloads of at most `ARTICLES_PER_MESSAGE`
/// embeds each, re-enforcing the channel's per-field caps.
pub fn build_article_payloads(articles: &[Article], source_name: &str) -> Vec<serde_json::Value> {
    articles
        .chunks(ARTICLES_PER_MESSAGE)
        .enumerate()
        .map(|(part, batch)| {
            let embeds: Vec<serde_json::Value> = batch
                .iter()
                .map(|article| {
                    let mut embed = serde_json::json!({
                        "title": truncate_chars(&article.title, MAX_TITLE_LEN),
                        "url": article.link,
                        "description": truncate_chars(&article.description, MAX_DESCRIPTION_LEN),
                        "color": 0x5865F2,
                        "footer": { "text": article.source_name },
                        "timestamp": article.published_at.to_rfc3339(),
                    });
                    if let Some(author) = &article.author {
                        embed["author"] =
                            serde_json::json!({ "name": truncate_chars(author, MAX_TITLE_LEN) });
                    }
                    if let Some(image) = &article.image_url {
                        if is_valid_url(image) {
                            embed["image"] = serde_json::json!({ "url": image });
                        }
                    }
                    embed
                })
                .collect();

            serde_json::json!({
                "content": format!("**New Articles from {} (Part {})**", source_name, part + 1),
                "embeds": embeds,
            })
        })
        .collect()
}

/// Split free text into ordered chunks that never exceed `max_len` chars,
/// marking every non-final chunk with a continuation suffix.
pub fn chunk_content(content: &str, max_len: usize) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }

    let marker_len = CONTINUATION_MARKER.chars().count();
    let chars: Vec<char> = content.chars().collect();
    let mut chunks = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let remaining = chars.len() - pos;
        if remaining <= max_len {
            chunks.push(chars[pos..].iter().collect());
            break;
        }

        // Reserve room so the marker itself never pushes a chunk over the limit.
        let take = max_len.saturating_sub(marker_len).max(1);
        let chunk: String = chars[pos..pos + take].iter().collect();
        chunks.push(format!("{}{}", chunk, CONTINUATION_MARKER));
        pos += take;
    }

    chunks
}

/// Webhook-backed sink that fans every payload out to all configured
/// endpoints, with a pacing delay between successive payloads.
pub struct WebhookSink {
    client: Client,
    endpoints: Vec<String>,
    pacing: Duration,
}

impl WebhookSink {
    pub fn new(endpoints: Vec<String>, timeout: Duration, pacing: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoints,
            pacing,
        })
    }

    async fn deliver(&self, payloads: &[serde_json::Value]) -> Result<()> {
        if payloads.is_empty() {
            return Ok(());
        }

        for endpoint in &self.endpoints {
            if !is_valid_url(endpoint) {
                warn!("Skipping invalid webhook endpoint: {}", endpoint_label(endpoint));
                continue;
            }

            debug!("Delivering {} payloads to {}", payloads.len(), endpoint_label(endpoint));

            for payload in payloads {
                // One failed endpoint or payload must not block the rest.
                match self.client.post(endpoint).json(payload).send().await {
                    Ok(response) if response.status().is_success() => {
                        info!("Delivered payload to {}", endpoint_label(endpoint));
                    }
                    Ok(response) => {
                        error!(
                            "Webhook {} rejected payload: HTTP {}",
                            endpoint_label(endpoint),
                            response.status()
                        );
                    }
                    Err(e) => {
                        error!("Error delivering to {}: {}", endpoint_label(endpoint), e);
                    }
                }

                tokio::time::sleep(self.pacing).await;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn push_articles(&self, articles: &[Article], source_name: &str) -> Result<()> {
        let payloads = build_article_payloads(articles, source_name);
        self.deliver(&payloads).await
    }

    async fn push_text(&self, content: &str) -> Result<()> {
        let payloads: Vec<serde_json::Value> = chunk_content(content, MAX_CONTENT_LEN)
            .into_iter()
            .map(|chunk| serde_json::json!({ "content": chunk }))
            .collect();
        self.deliver(&payloads).await
    }
}

/// Webhook URLs embed credentials; log only a prefix.
fn endpoint_label(endpoint: &str) -> String {
    let label = truncate_chars(endpoint, 35);
    if label.len() < endpoint.len() {
        format!("{}...", label)
    } else {
        label
    }
}
