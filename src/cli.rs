//! Command-line interface.
//!
//! Every option can also come from the environment (or a `.env` file, which
//! is loaded before parsing).

use crate::filter::FilterConfig;
use crate::query::NewsMode;
use clap::Parser;
use std::error::Error;
use tracing::info;

/// Hunt today's breaking news, filter it and summarize it.
///
/// # Examples
///
/// ```sh
/// # US edition
/// news_hunter -j ./json -m ./markdown
///
/// # Korean edition, logging to a file
/// news_hunter ko -j ./json -m ./markdown --log-file crew_run.log
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Edition to hunt: `us` or `ko` (anything else means `us`)
    #[arg(default_value = "us")]
    pub mode: String,

    /// Output directory for the JSON digest
    #[arg(short, long)]
    pub json_output_dir: String,

    /// Output directory for the Markdown digest
    #[arg(short, long)]
    pub markdown_output_dir: String,

    /// Optional path to the awful_aj config.yaml (defaults to its config dir)
    #[arg(short, long)]
    pub config: Option<String>,

    /// awful_aj template used to summarize articles
    #[arg(long, default_value = "news_hunter")]
    pub template: String,

    /// Optional YAML file with filter settings (hub_patterns, max_age_hours, min_word_count)
    #[arg(long, env = "NEWS_HUNTER_FILTER_CONFIG")]
    pub filter_config: Option<String>,

    /// Serper API key
    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    pub serper_api_key: Option<String>,

    /// Firecrawl API key
    #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true)]
    pub firecrawl_api_key: Option<String>,

    /// Number of search results to request
    #[arg(long, default_value_t = 10)]
    pub results: usize,

    /// Override the recency window in hours
    #[arg(long)]
    pub max_age_hours: Option<i64>,

    /// Override the minimum article length in words
    #[arg(long)]
    pub min_word_count: Option<usize>,

    /// Scrapes and LLM calls in flight at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// HTTP timeout for provider calls, in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Send all log output to this file instead of stdout
    #[arg(long, env = "NEWS_HUNTER_LOG_FILE")]
    pub log_file: Option<String>,
}

impl Cli {
    pub fn news_mode(&self) -> NewsMode {
        NewsMode::from_arg(&self.mode)
    }

    /// Filter settings: defaults, then the YAML file, then CLI overrides.
    pub fn filter_config(&self) -> Result<FilterConfig, Box<dyn Error>> {
        let mut config = match &self.filter_config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let config: FilterConfig = serde_yaml::from_str(&raw)?;
                info!(%path, "Loaded filter configuration");
                config
            }
            None => FilterConfig::default(),
        };
        if let Some(hours) = self.max_age_hours {
            config.max_age_hours = hours;
        }
        if let Some(words) = self.min_word_count {
            config.min_word_count = words;
        }
        Ok(config)
    }
}
