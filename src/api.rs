//! LLM interaction with exponential backoff.
//!
//! - [`AskAsync`]: sends text to a language model and returns its reply
//! - [`AwfulJadeBackend`]: [`AskAsync`] over `awful_aj::api::ask`
//! - [`RetryAsk`]: decorator retrying any [`AskAsync`] according to a [`Backoff`]
//!
//! [`Backoff`] is also used by the scrape client when the provider throttles.
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=jitter)
//! ```
//!
//! Defaults: 5 retries, 1 second base, 30 second cap, 250 ms jitter.

use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{rng, Rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Retry schedule shared by the LLM and provider clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_retries: usize,
    pub base_delay: StdDuration,
    pub max_delay: StdDuration,
    /// Upper bound of the random jitter added to every delay, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: StdDuration::from_secs(1),
            max_delay: StdDuration::from_secs(30),
            jitter_ms: 250,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based), jitter excluded.
    pub fn base_delay_for(&self, attempt: usize) -> StdDuration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay before retry number `attempt` (1-based), jitter included.
    pub fn delay_for(&self, attempt: usize) -> StdDuration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=self.jitter_ms)
        };
        self.base_delay_for(attempt) + StdDuration::from_millis(jitter)
    }
}

/// Async access to a language model.
pub trait AskAsync {
    type Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Retries the wrapped [`AskAsync`] until it succeeds or the [`Backoff`]
/// runs out of attempts. The last error is returned on exhaustion.
pub struct RetryAsk<T> {
    inner: T,
    backoff: Backoff,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_total = total_t0.elapsed().as_millis();

                    if attempt > self.backoff.max_retries {
                        error!(
                            attempt,
                            max = self.backoff.max_retries,
                            elapsed_ms_total,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.backoff.max_retries,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// [`AskAsync`] backed by an `awful_aj` configuration and chat template.
#[derive(Debug)]
pub struct AwfulJadeBackend<'a> {
    /// API endpoint, key and model settings.
    pub config: &'a AwfulJadeConfig,
    /// System prompt and response schema.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AwfulJadeBackend<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis(), error = %e, "LLM call failed");
        }
        res
    }
}
