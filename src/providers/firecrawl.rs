//! Firecrawl scrape client.
//!
//! Requests the markdown format only. Throttling (429) and provider-side
//! 5xx responses are retried with [`Backoff`]; any other non-success response
//! is turned into a [`ScrapeResult`] carrying `scrape_error` and
//! `status_code`, so the content filter can reject it like any other bad page.

use super::{require_key, Scraper};
use crate::api::Backoff;
use crate::error::ProviderError;
use crate::models::ScrapeResult;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

pub const FIRECRAWL_ENDPOINT: &str = "https://api.firecrawl.dev/v1/scrape";
const PROVIDER: &str = "Firecrawl";

#[derive(Debug, Default, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    title: Option<String>,
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
    status_code: Option<u16>,
    error: Option<String>,
    published_time: Option<String>,
    #[serde(rename = "article:published_time")]
    article_published_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FirecrawlClient {
    http: Client,
    api_key: String,
    endpoint: String,
    backoff: Backoff,
}

impl FirecrawlClient {
    /// # Errors
    ///
    /// [`ProviderError::MissingApiKey`] when `api_key` is blank.
    pub fn new(http: Client, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            http,
            api_key: require_key(PROVIDER, api_key.into())?,
            endpoint: FIRECRAWL_ENDPOINT.to_string(),
            backoff: Backoff {
                max_retries: 3,
                ..Backoff::default()
            },
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn post_once(&self, url: &str) -> Result<(u16, String), ProviderError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "url": url, "formats": ["markdown"] }))
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

impl Scraper for FirecrawlClient {
    #[instrument(level = "info", skip(self))]
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ProviderError> {
        let mut attempt = 0usize;
        loop {
            let (status, body) = match self.post_once(url).await {
                Ok(reply) => reply,
                Err(e) if e.is_transient() && attempt < self.backoff.max_retries => {
                    attempt += 1;
                    let delay = self.backoff.delay_for(attempt);
                    warn!(error = %e, attempt, ?delay, "Scrape request failed; retrying");
                    sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let throttled = status == 429 || status >= 500;
            if throttled && attempt < self.backoff.max_retries {
                attempt += 1;
                let delay = self.backoff.delay_for(attempt);
                warn!(status, attempt, ?delay, "Scrape provider busy; backing off");
                sleep(delay).await;
                continue;
            }

            let result = parse_scrape_response(url, status, &body)?;
            info!(
                status,
                bytes = result.markdown.len(),
                failed = result.failed(),
                "Scraped page"
            );
            return Ok(result);
        }
    }
}

/// Turn a Firecrawl response into a [`ScrapeResult`].
///
/// `http_status` is the status of the call to Firecrawl itself. Error bodies
/// that are not JSON are kept verbatim as the scrape error.
pub fn parse_scrape_response(
    url: &str,
    http_status: u16,
    body: &str,
) -> Result<ScrapeResult, ProviderError> {
    let ok = (200..300).contains(&http_status);
    let parsed: ScrapeResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(source) if ok => {
            return Err(ProviderError::Decode {
                provider: PROVIDER,
                source,
            });
        }
        Err(_) => {
            let trimmed = body.trim();
            let scrape_error = if trimmed.is_empty() {
                format!("{PROVIDER} returned status {http_status}")
            } else {
                trimmed.to_string()
            };
            return Ok(ScrapeResult {
                url: url.to_string(),
                scrape_error: Some(scrape_error),
                status_code: Some(http_status),
                ..Default::default()
            });
        }
    };

    let data = parsed.data.unwrap_or_default();
    let meta = data.metadata;
    let mut scrape_error = meta.error.or(parsed.error);
    if scrape_error.is_none() && (!ok || parsed.success == Some(false)) {
        scrape_error = Some(format!("{PROVIDER} returned status {http_status}"));
    }
    let status_code = meta.status_code.or((!ok).then_some(http_status));

    Ok(ScrapeResult {
        url: meta.source_url.unwrap_or_else(|| url.to_string()),
        markdown: data.markdown.unwrap_or_default(),
        title: meta.title,
        published_time: meta.published_time.or(meta.article_published_time),
        scrape_error,
        status_code,
    })
}
