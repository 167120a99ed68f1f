//! # News Hunter
//!
//! Finds today's breaking news, keeps only real, recent, substantial articles
//! and summarizes them with an LLM.
//!
//! ## Architecture
//!
//! 1. **Query**: [`query::build_news_query`] builds a date-pinned search query
//! 2. **Search**: [`providers::SerperClient`] returns candidate article URLs
//! 3. **Scrape**: [`providers::FirecrawlClient`] turns each page into markdown
//! 4. **Filter**: [`filter::evaluate`] rejects hubs, failures, stale and short pages
//! 5. **Summarize**: [`summarize::summarize_all`] asks the LLM for structured summaries
//! 6. **Output**: [`outputs`] writes the JSON and Markdown digests
//!
//! Steps 2 to 4 are driven by [`harvest::Harvester`].

pub mod api;
pub mod cli;
pub mod error;
pub mod filter;
pub mod harvest;
pub mod models;
pub mod outputs;
pub mod providers;
pub mod query;
pub mod summarize;
pub mod utils;
