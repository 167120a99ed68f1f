//! Search → scrape → filter pipeline.
//!
//! A [`Harvester`] owns one search provider and one scraper, both injected at
//! construction. [`Harvester::harvest`] runs the daily query, skips hub URLs
//! without scraping them, scrapes the rest with bounded concurrency and runs
//! every page through [`evaluate`]. Individual failures never abort the
//! harvest; they are recorded as [`Rejection`]s.

use crate::error::ProviderError;
use crate::filter::{evaluate, reject_hub, FilterConfig, FilterOutcome, RejectReason};
use crate::models::{HarvestedArticle, Rejection, ScrapeResult};
use crate::providers::{Scraper, SearchProvider};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Pages kept and pages dropped by one harvest, in search-rank order.
#[derive(Debug, Default)]
pub struct HarvestReport {
    pub admitted: Vec<HarvestedArticle>,
    pub rejected: Vec<Rejection>,
}

impl HarvestReport {
    /// Number of rejections per [`RejectReason`], in reason order.
    pub fn counts_by_reason(&self) -> BTreeMap<RejectReason, usize> {
        self.rejected.iter().counts_by(|r| r.reason).into_iter().collect()
    }
}

/// Search, scrape and filter for one run.
pub struct Harvester<S, C> {
    search: S,
    scraper: C,
    filter: FilterConfig,
    concurrency: usize,
}

impl<S, C> Harvester<S, C>
where
    S: SearchProvider,
    C: Scraper,
{
    /// Create a harvester scraping [`DEFAULT_CONCURRENCY`] pages at a time.
    ///
    /// # Arguments
    ///
    /// * `search` - Provider answering the daily query
    /// * `scraper` - Provider turning each result into markdown
    /// * `filter` - Gates every scraped page must pass
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let http = http_client(Duration::from_secs(60))?;
    /// let harvester = Harvester::new(
    ///     SerperClient::new(http.clone(), serper_key)?,
    ///     FirecrawlClient::new(http, firecrawl_key)?,
    ///     FilterConfig::default(),
    /// )
    /// .with_concurrency(8);
    /// ```
    pub fn new(search: S, scraper: C, filter: FilterConfig) -> Self {
        Self {
            search,
            scraper,
            filter,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Pages scraped at once; zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run `query` and harvest every result.
    ///
    /// # Arguments
    ///
    /// * `query` - Search query, usually from [`crate::query::build_news_query`]
    /// * `now` - Instant the recency gate measures article age against
    ///
    /// # Returns
    ///
    /// A [`HarvestReport`] holding admitted articles and rejections, both in
    /// search-rank order. Repeated links are harvested once.
    ///
    /// # Errors
    ///
    /// Only a failed search is an error.
    #[instrument(level = "info", skip(self, now))]
    pub async fn harvest(&self, query: &str, now: DateTime<Utc>) -> Result<HarvestReport, ProviderError> {
        let hits = self.search.search(query).await?;
        let urls = hits.into_iter().map(|hit| hit.link).unique().collect();
        Ok(self.harvest_urls(urls, now).await)
    }

    /// Filter and scrape an explicit list of candidate URLs.
    ///
    /// Hub URLs are rejected without a scrape call. Scrape failures, undecodable
    /// provider replies and filter rejections all end up in
    /// [`HarvestReport::rejected`]; nothing here aborts the run.
    #[instrument(level = "info", skip_all, fields(candidates = urls.len()))]
    pub async fn harvest_urls(&self, urls: Vec<String>, now: DateTime<Utc>) -> HarvestReport {
        let mut verdicts: Vec<(usize, Result<HarvestedArticle, Rejection>)> = Vec::new();
        let mut to_scrape = Vec::new();

        for (rank, url) in urls.into_iter().enumerate() {
            match reject_hub(&url, &self.filter) {
                Some(FilterOutcome::Rejected { reason, detail }) => {
                    info!(%url, %detail, "Skipping hub URL without scraping");
                    verdicts.push((rank, Err(Rejection { url, reason, detail })));
                }
                _ => to_scrape.push((rank, url)),
            }
        }

        let scraped: Vec<(usize, Result<HarvestedArticle, Rejection>)> = stream::iter(to_scrape)
            .map(|(rank, url)| async move { (rank, self.process(url, now).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        verdicts.extend(scraped);
        verdicts.sort_by_key(|(rank, _)| *rank);

        let mut report = HarvestReport::default();
        for (_, verdict) in verdicts {
            match verdict {
                Ok(article) => report.admitted.push(article),
                Err(rejection) => report.rejected.push(rejection),
            }
        }

        info!(
            admitted = report.admitted.len(),
            rejected = report.rejected.len(),
            by_reason = ?report.counts_by_reason(),
            "Harvest complete"
        );
        report
    }

    #[instrument(level = "info", skip(self, now))]
    async fn process(&self, url: String, now: DateTime<Utc>) -> Result<HarvestedArticle, Rejection> {
        let scrape = match self.scraper.scrape(&url).await {
            Ok(scrape) => scrape,
            Err(e) => {
                error!(error = %e, "Scrape request failed");
                let reason = match e {
                    ProviderError::Decode { .. } => RejectReason::ParseIgnored,
                    _ => RejectReason::ScrapeError,
                };
                return Err(Rejection {
                    url,
                    reason,
                    detail: e.to_string(),
                });
            }
        };

        admit(url, scrape, now, &self.filter)
    }
}

/// Run one scraped page through the filter.
fn admit(
    url: String,
    scrape: ScrapeResult,
    now: DateTime<Utc>,
    filter: &FilterConfig,
) -> Result<HarvestedArticle, Rejection> {
    match evaluate(&url, &scrape, now, filter) {
        Ok(FilterOutcome::Admitted { cleaned_text }) => {
            debug!(%url, bytes = cleaned_text.len(), "Article admitted");
            Ok(HarvestedArticle {
                source: url,
                title: scrape.title,
                published_time: scrape.published_time,
                content: cleaned_text,
            })
        }
        Ok(FilterOutcome::Rejected { reason, detail }) => {
            warn!(%url, %reason, %detail, "Article rejected");
            Err(Rejection { url, reason, detail })
        }
        Err(e) => {
            error!(%url, error = %e, "Filter refused input");
            Err(Rejection {
                url,
                reason: RejectReason::ParseIgnored,
                detail: e.to_string(),
            })
        }
    }
}
