//! Clients for the external search and scrape providers.
//!
//! The harvest pipeline only sees the [`SearchProvider`] and [`Scraper`]
//! traits; concrete clients are built once in `main` and passed in.
//!
//! | Provider | Module | Role |
//! |----------|--------|------|
//! | Serper | [`serper`] | Google search results for the daily query |
//! | Firecrawl | [`firecrawl`] | Page scraping to markdown with metadata |

pub mod firecrawl;
pub mod serper;

use crate::error::ProviderError;
use crate::models::{ScrapeResult, SearchHit};
use reqwest::Client;
use std::time::Duration;

pub use firecrawl::FirecrawlClient;
pub use serper::SerperClient;

/// Web search returning organic results.
pub trait SearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Fetches a page and converts it to markdown.
///
/// Provider-side failures (404 from the target site, blocked pages) are
/// reported inside the [`ScrapeResult`]; `Err` is reserved for failures to
/// reach or understand the provider itself.
pub trait Scraper {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ProviderError>;
}

/// Shared HTTP client for both providers.
pub fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Reject blank API keys up front so the failure names the provider.
fn require_key(provider: &'static str, key: String) -> Result<String, ProviderError> {
    if key.trim().is_empty() {
        Err(ProviderError::MissingApiKey { provider })
    } else {
        Ok(key)
    }
}

/// Loopback HTTP server for exercising the provider clients.
#[cfg(test)]
pub(crate) mod stub {
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Replays `(status, body)` replies in order, repeating the last one once
    /// the script runs out. Every raw request is recorded.
    pub(crate) struct StubServer {
        pub(crate) url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        pub(crate) async fn start(replies: Vec<(u16, &'static str)>) -> Self {
            assert!(!replies.is_empty(), "stub needs at least one reply");
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}/", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&requests);

            tokio::spawn(async move {
                let mut served = 0usize;
                while let Ok((mut socket, _)) = listener.accept().await {
                    let request = read_request(&mut socket).await;
                    seen.lock().unwrap().push(request);
                    let (status, body) = replies[served.min(replies.len() - 1)];
                    served += 1;
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self { url, requests }
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Read one request: headers, then `content-length` bytes of body.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }
}
