//! Serper (google.serper.dev) search client.

use super::{require_key, SearchProvider};
use crate::error::ProviderError;
use crate::models::SearchHit;
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

pub const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const PROVIDER: &str = "Serper";

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

#[derive(Debug, Clone)]
pub struct SerperClient {
    http: Client,
    api_key: String,
    endpoint: String,
    n_results: usize,
}

impl SerperClient {
    /// Client returning 10 results per query.
    ///
    /// # Errors
    ///
    /// [`ProviderError::MissingApiKey`] when `api_key` is blank.
    pub fn new(http: Client, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            http,
            api_key: require_key(PROVIDER, api_key.into())?,
            endpoint: SERPER_ENDPOINT.to_string(),
            n_results: 10,
        })
    }

    pub fn with_results(mut self, n_results: usize) -> Self {
        self.n_results = n_results;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for SerperClient {
    #[instrument(level = "info", skip(self), fields(n_results = self.n_results))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": self.n_results }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let hits = parse_search_response(&body)?;
        info!(count = hits.len(), "Search returned results");
        debug!(links = ?hits.iter().map(|h| &h.link).collect::<Vec<_>>(), "Search links");
        Ok(hits)
    }
}

/// Decode a Serper response body, dropping repeated links.
pub fn parse_search_response(body: &str) -> Result<Vec<SearchHit>, ProviderError> {
    let parsed: SerperResponse =
        serde_json::from_str(body).map_err(|source| ProviderError::Decode {
            provider: PROVIDER,
            source,
        })?;
    Ok(parsed
        .organic
        .into_iter()
        .filter(|hit| !hit.link.trim().is_empty())
        .unique_by(|hit| hit.link.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http_client;
    use crate::providers::stub::StubServer;
    use std::time::Duration;

    fn client(endpoint: &str) -> SerperClient {
        let http = http_client(Duration::from_secs(5)).unwrap();
        SerperClient::new(http, "serper-key")
            .unwrap()
            .with_endpoint(endpoint)
            .with_results(5)
    }

    #[test]
    fn test_parse_organic_results() {
        let body = r#"{
            "searchParameters": {"q": "news", "type": "search"},
            "organic": [
                {"title": "Senate passes bill", "link": "https://www.reuters.com/world/us/a-2025-11-04/",
                 "snippet": "The Senate...", "date": "2 hours ago", "position": 1},
                {"title": "Dupe", "link": "https://www.reuters.com/world/us/a-2025-11-04/", "position": 2},
                {"title": "Storm", "link": "https://www.npr.org/2025/11/04/storm", "position": 3}
            ]
        }"#;
        let hits = parse_search_response(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Senate passes bill");
        assert_eq!(hits[0].date.as_deref(), Some("2 hours ago"));
        assert_eq!(hits[1].snippet, None);
    }

    #[test]
    fn test_missing_organic_is_empty() {
        assert!(parse_search_response("{}").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_body_is_decode_error() {
        let err = parse_search_response("<html>").unwrap_err();
        assert!(matches!(err, ProviderError::Decode { provider: "Serper", .. }));
    }

    #[test]
    fn test_blank_key_rejected() {
        let err = SerperClient::new(Client::new(), "  ").unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey { provider: "Serper" }));
    }

    #[tokio::test]
    async fn test_search_posts_query_and_key() {
        let body = r#"{"organic": [{"title": "Storm", "link": "https://www.npr.org/2025/11/04/storm"}]}"#;
        let server = StubServer::start(vec![(200, body)]).await;
        let hits = client(&server.url).search("top news").await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].link, "https://www.npr.org/2025/11/04/storm");
        let request = server.requests()[0].to_lowercase();
        assert!(request.contains("x-api-key: serper-key"));
        assert!(request.contains(r#""num":5"#));
        assert!(request.contains(r#""q":"top news""#));
    }

    #[tokio::test]
    async fn test_rejected_key_is_status_error() {
        let server = StubServer::start(vec![(401, r#"{"message": "Unauthorized."}"#)]).await;
        let err = client(&server.url).search("top news").await.unwrap_err();

        match err {
            ProviderError::Status { provider, status, body } => {
                assert_eq!(provider, "Serper");
                assert_eq!(status, 401);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(server.requests().len(), 1);
    }
}
