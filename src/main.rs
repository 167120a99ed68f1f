//! `news_hunter` binary: one run of the daily news hunt.
//!
//! ```sh
//! news_hunter us -j ./json -m ./markdown
//! ```

use awful_aj::{config, config_dir, template};
use chrono::{Local, Utc};
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

use news_hunter::api::{AwfulJadeBackend, Backoff, RetryAsk};
use news_hunter::cli::Cli;
use news_hunter::harvest::Harvester;
use news_hunter::models::NewsDigest;
use news_hunter::outputs::{json, markdown};
use news_hunter::providers::{http_client, FirecrawlClient, SerperClient};
use news_hunter::query::build_news_query;
use news_hunter::summarize::summarize_all;
use news_hunter::utils::ensure_writable_dir;

/// Install the global subscriber. With `log_file`, everything goes to that
/// file (truncated on start) without ANSI colors.
fn init_tracing(log_file: Option<&str>) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339());

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let dotenv = dotenvy::dotenv();
    let args = Cli::parse();
    init_tracing(args.log_file.as_deref())?;

    let start_time = std::time::Instant::now();
    info!("news_hunter starting up");
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env loaded"),
    }

    let mode = args.news_mode();
    let filter_config = args.filter_config()?;
    debug!(?filter_config, %mode, "Parsed CLI arguments");

    // ---- Fail fast on anything that would waste API calls ----
    for dir in [&args.json_output_dir, &args.markdown_output_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable");
            return Err(e);
        }
    }

    let conf_file = match &args.config {
        Some(path) => PathBuf::from(path),
        None => config_dir()?.join("config.yaml"),
    };
    let config_path = conf_file.to_string_lossy().to_string();
    let llm_config = config::load_config(&config_path)
        .map_err(|e| format!("failed to load {config_path}: {e}"))?;
    info!(%config_path, "Loaded LLM configuration");
    let llm_template = template::load_template(&args.template)
        .await
        .map_err(|e| format!("failed to load template {}: {e}", args.template))?;
    info!(template = %args.template, "Loaded template");

    let http = http_client(Duration::from_secs(args.timeout_secs))?;
    let search = SerperClient::new(http.clone(), args.serper_api_key.clone().unwrap_or_default())?
        .with_results(args.results);
    let scraper = FirecrawlClient::new(http, args.firecrawl_api_key.clone().unwrap_or_default())?;

    // ---- Search, scrape, filter ----
    let today = Local::now();
    let query = build_news_query(mode, today.date_naive());
    info!(%query, "Built search query");

    let harvester = Harvester::new(search, scraper, filter_config).with_concurrency(args.concurrency);
    let report = harvester.harvest(&query, Utc::now()).await?;

    // ---- Summarize ----
    let api = RetryAsk::new(
        AwfulJadeBackend {
            config: &llm_config,
            template: &llm_template,
        },
        Backoff::default(),
    );
    let articles = summarize_all(&api, &report.admitted, mode.language(), args.concurrency).await;

    let digest = NewsDigest {
        local_date: today.date_naive().to_string(),
        local_time: today.time().format("%H:%M:%S").to_string(),
        mode: mode.language().to_string(),
        query,
        articles,
        rejected: report.rejected,
    };

    // ---- Output ----
    if let Err(e) = json::write_digest(&digest, &args.json_output_dir).await {
        error!(error = %e, "Failed to write JSON digest");
    }
    if let Err(e) = markdown::write_digest(&digest, &args.markdown_output_dir).await {
        error!(error = %e, "Failed to write Markdown digest");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        articles = digest.articles.len(),
        skipped = digest.rejected.len(),
        "Execution complete"
    );

    Ok(())
}
