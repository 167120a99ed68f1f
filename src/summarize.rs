//! Turning admitted articles into structured summaries.
//!
//! Each article is sent to the LLM as a short prompt (language hint, source,
//! title and cleaned text). The reply must be an [`ArticleSummary`] in JSON.
//! A reply cut off mid-JSON is re-asked once; any other non-conforming reply
//! skips the article.

use crate::api::AskAsync;
use crate::models::{ArticleSummary, HarvestedArticle};
use crate::utils::{looks_truncated, truncate_for_log};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::fmt::Write;
use tracing::{debug, error, info, instrument, warn};

/// Prompt for one article.
pub fn build_prompt(article: &HarvestedArticle, language: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Language: {language}");
    let _ = writeln!(prompt, "Source: {}", article.source);
    if let Some(title) = &article.title {
        let _ = writeln!(prompt, "Title: {title}");
    }
    if let Some(published) = &article.published_time {
        let _ = writeln!(prompt, "Published: {published}");
    }
    let _ = write!(prompt, "\n{}", article.content);
    prompt
}

/// Summarize one article, or `None` when the model fails or misbehaves.
#[instrument(level = "info", skip_all, fields(source = %article.source))]
pub async fn summarize_article<A>(api: &A, article: &HarvestedArticle, language: &str) -> Option<ArticleSummary>
where
    A: AskAsync<Response = String>,
{
    let prompt = build_prompt(article, language);

    let response = match api.ask(&prompt).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "LLM call failed; skipping article");
            return None;
        }
    };

    let mut parsed = serde_json::from_str::<ArticleSummary>(&response);
    let mut last_response = response;
    if let Err(e) = &parsed {
        if looks_truncated(e) {
            warn!(error = %e, "EOF while parsing; re-asking once");
            match api.ask(&prompt).await {
                Ok(retry) => {
                    parsed = serde_json::from_str::<ArticleSummary>(&retry);
                    last_response = retry;
                }
                Err(e2) => warn!(error = %e2, "Re-ask failed; will skip article"),
            }
        }
    }

    match parsed {
        Ok(summary) => {
            debug!(title = %summary.title, "Parsed summary");
            Some(finish(summary, article))
        }
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&last_response, 300),
                "Model returned non-conforming JSON; skipping article"
            );
            None
        }
    }
}

/// Summarize `articles` with at most `concurrency` requests in flight.
/// Output order follows input order; failed articles are dropped.
///
/// # Arguments
///
/// * `api` - LLM client, normally a [`crate::api::RetryAsk`]
/// * `articles` - Admitted articles from the harvest
/// * `language` - Language hint put at the top of every prompt
/// * `concurrency` - Requests in flight at once; zero is treated as one
#[instrument(level = "info", skip_all, fields(count = articles.len(), concurrency = concurrency))]
pub async fn summarize_all<A>(
    api: &A,
    articles: &[HarvestedArticle],
    language: &str,
    concurrency: usize,
) -> Vec<ArticleSummary>
where
    A: AskAsync<Response = String>,
{
    let summaries: Vec<ArticleSummary> = stream::iter(articles)
        .map(|article| summarize_article(api, article, language))
        .buffered(concurrency.max(1))
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(
        total = articles.len(),
        successful = summaries.len(),
        failed = articles.len() - summaries.len(),
        "Completed summarization"
    );
    summaries
}

/// Attach provenance and drop repeated entries.
fn finish(mut summary: ArticleSummary, article: &HarvestedArticle) -> ArticleSummary {
    summary.source = Some(article.source.clone());
    if summary.publishedTime.is_none() {
        summary.publishedTime = article.published_time.clone();
    }
    summary.keyTakeAways = summary.keyTakeAways.into_iter().unique().collect();
    summary.tags = summary
        .tags
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .unique()
        .collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::error::Error;
    use std::sync::Mutex;

    /// Replays canned replies in order; errors once the queue is empty.
    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl AskAsync for Scripted {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.prompts.lock().unwrap().push(text.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| "no more replies".into())
        }
    }

    const GOOD: &str = r#"{
        "title": "Senate passes budget",
        "category": "Politics & Governance",
        "summaryOfNewsArticle": "The Senate passed the budget.",
        "keyTakeAways": ["Vote was 51-49", "Vote was 51-49", "Goes to the House"],
        "tags": ["Budget", "budget ", "senate"]
    }"#;

    fn article() -> HarvestedArticle {
        HarvestedArticle {
            source: "https://www.npr.org/2025/11/04/budget".to_string(),
            title: Some("Budget vote".to_string()),
            published_time: Some("2025-11-04T09:00:00Z".to_string()),
            content: "The Senate voted on Tuesday.".to_string(),
        }
    }

    #[test]
    fn test_prompt_contains_metadata_and_body() {
        let prompt = build_prompt(&article(), "ko");
        assert!(prompt.starts_with("Language: ko\n"));
        assert!(prompt.contains("Title: Budget vote"));
        assert!(prompt.contains("Published: 2025-11-04T09:00:00Z"));
        assert!(prompt.ends_with("The Senate voted on Tuesday."));
    }

    #[tokio::test]
    async fn test_summary_is_deduplicated_and_tagged_with_source() {
        let api = Scripted::new(&[GOOD]);
        let summary = summarize_article(&api, &article(), "us").await.unwrap();
        assert_eq!(summary.source.as_deref(), Some("https://www.npr.org/2025/11/04/budget"));
        assert_eq!(summary.keyTakeAways, vec!["Vote was 51-49", "Goes to the House"]);
        assert_eq!(summary.tags, vec!["budget", "senate"]);
        assert_eq!(summary.publishedTime.as_deref(), Some("2025-11-04T09:00:00Z"));
    }

    #[tokio::test]
    async fn test_truncated_reply_is_reasked_once() {
        let api = Scripted::new(&[r#"{"title": "Senate"#, GOOD]);
        let summary = summarize_article(&api, &article(), "us").await;
        assert!(summary.is_some());
        assert_eq!(api.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_reply_skips_without_reask() {
        let api = Scripted::new(&[r#"{"headline": "wrong schema"}"#, GOOD]);
        assert!(summarize_article(&api, &article(), "us").await.is_none());
        assert_eq!(api.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summarize_all_keeps_order_and_drops_failures() {
        let mut second = article();
        second.source = "https://www.reuters.com/world/second-2025-11-04/".to_string();
        let api = Scripted::new(&[GOOD, "not json at all"]);

        let summaries = summarize_all(&api, &[article(), second], "us", 1).await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].source.as_deref(), Some("https://www.npr.org/2025/11/04/budget"));
    }
}
