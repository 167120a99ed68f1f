//! Data models passed between the pipeline stages.
//!
//! - [`SearchHit`]: one organic result from the search provider
//! - [`ScrapeResult`]: markdown and metadata returned by the scrape provider
//! - [`HarvestedArticle`]: a page that passed the content filter
//! - [`Rejection`]: a page that did not, with the reason
//! - [`ArticleSummary`]: the LLM's structured summary of an article
//! - [`NewsDigest`]: everything produced by a single run
//!
//! [`ArticleSummary`] uses camelCase field names to match the JSON schema in
//! the LLM template, hence the `#[allow(non_snake_case)]`.

use crate::filter::RejectReason;
use serde::{Deserialize, Serialize};

/// A single organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: Option<String>,
    /// Provider-formatted date, e.g. `"3 hours ago"`. Informational only.
    #[serde(default)]
    pub date: Option<String>,
}

/// Page data produced by the scrape provider.
///
/// Every metadata field the provider may omit is an `Option`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScrapeResult {
    /// URL the provider reports for the page (after redirects).
    pub url: String,
    /// Raw markdown body; empty when the provider returned nothing.
    pub markdown: String,
    pub title: Option<String>,
    pub published_time: Option<String>,
    pub scrape_error: Option<String>,
    pub status_code: Option<u16>,
}

impl ScrapeResult {
    /// True when the provider reported an error or a non-success status.
    pub fn failed(&self) -> bool {
        let has_error = self.scrape_error.as_deref().is_some_and(|e| !e.is_empty());
        let bad_status = self.status_code.is_some_and(|code| !(200..400).contains(&code));
        has_error || bad_status
    }
}

/// An article admitted by the content filter, ready for summarization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestedArticle {
    /// The URL that was searched and scraped.
    pub source: String,
    pub title: Option<String>,
    pub published_time: Option<String>,
    pub content: String,
}

/// A candidate URL that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rejection {
    pub url: String,
    pub reason: RejectReason,
    pub detail: String,
}

/// Structured summary returned by the LLM for one article.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArticleSummary {
    /// The source URL (added after LLM processing).
    #[serde(default)]
    pub source: Option<String>,
    pub title: String,
    /// Category assigned by the LLM (e.g. "Politics & Governance").
    pub category: String,
    pub summaryOfNewsArticle: String,
    pub keyTakeAways: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Publication time reported by the scrape provider, when known.
    #[serde(default)]
    pub publishedTime: Option<String>,
}

impl ArticleSummary {
    /// Domain name before the TLD, e.g. `"https://www.npr.org/x"` -> `"npr"`.
    pub fn source_tag(&self) -> Option<String> {
        let parsed = url::Url::parse(self.source.as_deref()?).ok()?;
        let host = parsed.host_str()?;
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() >= 2 {
            Some(parts[parts.len() - 2].to_string())
        } else {
            None
        }
    }
}

/// Output of one run: the summaries plus what was skipped.
#[derive(Debug, Deserialize, Serialize)]
pub struct NewsDigest {
    /// Local date of the run in `YYYY-MM-DD` format.
    pub local_date: String,
    pub local_time: String,
    /// `"us"` or `"ko"`.
    pub mode: String,
    pub query: String,
    pub articles: Vec<ArticleSummary>,
    pub rejected: Vec<Rejection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(source: Option<&str>) -> ArticleSummary {
        ArticleSummary {
            source: source.map(str::to_string),
            title: "Test".to_string(),
            category: "Politics & Governance".to_string(),
            summaryOfNewsArticle: "Summary".to_string(),
            keyTakeAways: vec![],
            tags: vec![],
            publishedTime: None,
        }
    }

    #[test]
    fn test_scrape_result_failure_detection() {
        let ok = ScrapeResult {
            status_code: Some(200),
            ..Default::default()
        };
        assert!(!ok.failed());

        let redirected = ScrapeResult {
            status_code: Some(301),
            ..Default::default()
        };
        assert!(!redirected.failed());

        let not_found = ScrapeResult {
            status_code: Some(404),
            ..Default::default()
        };
        assert!(not_found.failed());

        let errored = ScrapeResult {
            scrape_error: Some("timeout".to_string()),
            ..Default::default()
        };
        assert!(errored.failed());
    }

    #[test]
    fn test_summary_deserializes_without_optional_fields() {
        let json = r#"{
            "title": "Storm hits coast",
            "category": "Environment",
            "summaryOfNewsArticle": "A storm hit the coast.",
            "keyTakeAways": ["Evacuations ordered"]
        }"#;
        let parsed: ArticleSummary = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.title, "Storm hits coast");
        assert!(parsed.source.is_none());
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_source_tag() {
        assert_eq!(
            summary(Some("https://www.reuters.com/world/story")).source_tag(),
            Some("reuters".to_string())
        );
        assert_eq!(
            summary(Some("https://text.npr.org/nx-s1-5599")).source_tag(),
            Some("npr".to_string())
        );
        assert_eq!(summary(None).source_tag(), None);
        assert_eq!(summary(Some("not a url")).source_tag(), None);
    }

    #[test]
    fn test_rejection_reason_serializes_snake_case() {
        let rejection = Rejection {
            url: "https://a.com/tag/x".to_string(),
            reason: RejectReason::HubUrl,
            detail: "hub".to_string(),
        };
        let json = serde_json::to_string(&rejection).unwrap();
        assert!(json.contains(r#""reason":"hub_url""#));
    }
}
