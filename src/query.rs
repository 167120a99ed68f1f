//! Search query construction.
//!
//! Each run searches for today's headlines from a fixed set of outlets. The
//! US query pins Reuters and NPR article paths to today's date so that the
//! provider returns articles rather than section fronts.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

const US_SITES: [&str; 2] = ["reuters.com", "npr.org"];
const KO_SITES: [&str; 3] = ["yna.co.kr", "hani.co.kr", "khan.co.kr"];

/// Which edition of the news to hunt for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsMode {
    #[default]
    Us,
    Ko,
}

impl NewsMode {
    /// Language hint handed to the summarizer.
    pub fn language(self) -> &'static str {
        match self {
            NewsMode::Us => "us",
            NewsMode::Ko => "ko",
        }
    }

    /// Lenient parse: anything other than `ko` is the US edition.
    pub fn from_arg(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("ko") {
            NewsMode::Ko
        } else {
            NewsMode::Us
        }
    }
}

impl fmt::Display for NewsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.language())
    }
}

/// Build the search query for `today`'s top news.
pub fn build_news_query(mode: NewsMode, today: NaiveDate) -> String {
    let full = today.format("%B %d, %Y");
    match mode {
        NewsMode::Ko => {
            let sites = KO_SITES.join(" OR site:");
            format!("{full} 오늘의 주요 뉴스 site:{sites}")
        }
        NewsMode::Us => {
            let dashed = today.format("%Y-%m-%d");
            let slashed = today.format("%Y/%m/%d");
            format!(
                "Top breaking US news {full} site:{} inurl:/{dashed}/ OR site:{} inurl:/{slashed}/",
                US_SITES[0], US_SITES[1]
            )
        }
    }
}
