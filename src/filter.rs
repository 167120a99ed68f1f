//! Content admissibility filter.
//!
//! Decides whether a scraped page is worth handing to the summarizer. The
//! decision is a pure function of the URL, the scrape result, the current
//! instant, and a [`FilterConfig`]. Gates run in a fixed order and the first
//! one that rejects wins:
//!
//! 1. **Hub URLs**: listing/category pages are dropped before anything else
//! 2. **Scrape failures**: provider errors are passed through as rejections
//! 3. **Recency**: articles older than `max_age_hours` are stale
//! 4. **Cleanup**: escapes, newlines, markdown links and bare URLs are removed
//! 5. **Length**: fewer than `min_word_count` words is too short
//!
//! Every content problem is returned as a [`FilterOutcome::Rejected`] value.
//! The only error is [`FilterError::InvalidInput`] for a blank URL.

use crate::error::FilterError;
use crate::models::ScrapeResult;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

static ESCAPES_AND_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\+|\n+").expect("valid escape regex"));
static LINKS_AND_URLS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]+\]\([^)]+\)|https?://\S+").expect("valid link regex")
});
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("valid date regex"));

/// Hub patterns applied when no configuration overrides them.
pub const DEFAULT_HUB_PATTERNS: [&str; 6] = [
    "/tag/",
    "/topic/",
    "/hub/",
    "/section/",
    "/category/",
    "/us-news$",
];

/// A URL fragment identifying listing pages rather than articles.
///
/// Written as a plain string; a trailing `$` anchors the pattern to the end
/// of the URL (`"/us-news$"` matches `https://x.com/us-news` but not
/// `https://x.com/us-news/story`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HubPattern {
    /// Matches anywhere in the URL.
    Contains(String),
    /// Matches only as the final segment of the URL.
    EndsWith(String),
}

impl HubPattern {
    pub fn matches(&self, url: &str) -> bool {
        match self {
            HubPattern::Contains(fragment) => url.contains(fragment.as_str()),
            HubPattern::EndsWith(suffix) => url.ends_with(suffix.as_str()),
        }
    }
}

impl From<&str> for HubPattern {
    fn from(raw: &str) -> Self {
        match raw.strip_suffix('$') {
            Some(suffix) => HubPattern::EndsWith(suffix.to_string()),
            None => HubPattern::Contains(raw.to_string()),
        }
    }
}

impl From<String> for HubPattern {
    fn from(raw: String) -> Self {
        HubPattern::from(raw.as_str())
    }
}

impl From<HubPattern> for String {
    fn from(pattern: HubPattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for HubPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubPattern::Contains(fragment) => write!(f, "{fragment}"),
            HubPattern::EndsWith(suffix) => write!(f, "{suffix}$"),
        }
    }
}

/// Tunables for [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub hub_patterns: Vec<HubPattern>,
    /// Articles published more than this many hours before `now` are stale.
    pub max_age_hours: i64,
    /// Minimum whitespace-separated tokens in the cleaned text.
    pub min_word_count: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            hub_patterns: DEFAULT_HUB_PATTERNS
                .iter()
                .map(|p| HubPattern::from(*p))
                .collect(),
            max_age_hours: 48,
            min_word_count: 100,
        }
    }
}

impl FilterConfig {
    /// First hub pattern matching `url`, if any.
    pub fn matching_hub(&self, url: &str) -> Option<&HubPattern> {
        self.hub_patterns.iter().find(|p| p.matches(url))
    }
}

/// Machine-readable reason attached to a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    HubUrl,
    ScrapeError,
    StaleArticle,
    /// The provider's response could not be decoded. Never produced by
    /// [`evaluate`], which treats unreadable timestamps permissively.
    ParseIgnored,
    TooShort,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RejectReason::HubUrl => "hub/index URL",
            RejectReason::ScrapeError => "scrape error",
            RejectReason::StaleArticle => "stale article",
            RejectReason::ParseIgnored => "unparseable metadata",
            RejectReason::TooShort => "too short",
        };
        f.write_str(label)
    }
}

/// Result of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Admitted { cleaned_text: String },
    Rejected { reason: RejectReason, detail: String },
}

impl FilterOutcome {
    fn rejected(reason: RejectReason, detail: impl Into<String>) -> Self {
        FilterOutcome::Rejected {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, FilterOutcome::Admitted { .. })
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            FilterOutcome::Admitted { .. } => None,
            FilterOutcome::Rejected { reason, .. } => Some(*reason),
        }
    }
}

/// What the recency gate concluded about a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecencyCheck {
    Fresh(DateTime<Utc>),
    /// Carries the timestamp text exactly as found.
    Stale(String),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoTimestamp,
    Unparseable,
}

/// Decide whether `scrape` may be summarized.
///
/// `url` is the address the caller asked for; `scrape.url` may differ after
/// redirects and is not consulted.
///
/// # Arguments
///
/// * `url` - Candidate article URL, checked against the hub patterns
/// * `scrape` - What the scraper returned for `url`
/// * `now` - Instant article age is measured against
/// * `config` - Hub patterns, recency window and minimum length
///
/// # Returns
///
/// [`FilterOutcome::Admitted`] with the cleaned text, or
/// [`FilterOutcome::Rejected`] naming the first gate that failed.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use news_hunter::filter::{evaluate, FilterConfig, RejectReason};
/// use news_hunter::models::ScrapeResult;
///
/// let outcome = evaluate(
///     "https://example.com/tag/politics",
///     &ScrapeResult::default(),
///     Utc::now(),
///     &FilterConfig::default(),
/// )
/// .unwrap();
/// assert_eq!(outcome.reason(), Some(RejectReason::HubUrl));
/// ```
///
/// # Errors
///
/// [`FilterError::InvalidInput`] when `url` is blank. Content problems are
/// never errors.
#[instrument(level = "debug", skip_all, fields(%url))]
pub fn evaluate(
    url: &str,
    scrape: &ScrapeResult,
    now: DateTime<Utc>,
    config: &FilterConfig,
) -> Result<FilterOutcome, FilterError> {
    if url.trim().is_empty() {
        return Err(FilterError::InvalidInput("url must not be empty".into()));
    }

    if let Some(rejection) = reject_hub(url, config) {
        return Ok(rejection);
    }

    if scrape.failed() {
        let status = scrape
            .status_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let error = scrape
            .scrape_error
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or("unsuccessful response");
        return Ok(FilterOutcome::rejected(
            RejectReason::ScrapeError,
            format!("Scraping failed. Status code: {status} ({error})"),
        ));
    }

    match check_recency(scrape, now, config.max_age_hours) {
        RecencyCheck::Stale(stamp) => {
            return Ok(FilterOutcome::rejected(RejectReason::StaleArticle, stamp));
        }
        RecencyCheck::Skipped(why) => debug!(?why, "Recency check skipped"),
        RecencyCheck::Fresh(published) => debug!(%published, "Article within recency window"),
    }

    let cleaned_text = clean_markdown(&scrape.markdown);
    let words = word_count(&cleaned_text);
    if words < config.min_word_count {
        return Ok(FilterOutcome::rejected(
            RejectReason::TooShort,
            format!(
                "Article too short (<{} words). Word count: {words}",
                config.min_word_count
            ),
        ));
    }

    Ok(FilterOutcome::Admitted { cleaned_text })
}

/// The hub gate on its own, for callers that want to skip scraping hubs.
///
/// # Returns
///
/// `Some(Rejected { reason: HubUrl, .. })` naming the matched pattern, or
/// `None` when `url` looks like an article.
pub fn reject_hub(url: &str, config: &FilterConfig) -> Option<FilterOutcome> {
    config.matching_hub(url).map(|pattern| {
        FilterOutcome::rejected(
            RejectReason::HubUrl,
            format!("Filtered out hub/index URL (matched {pattern})"),
        )
    })
}

/// Apply the recency gate.
///
/// The timestamp comes from `published_time` when present, otherwise from the
/// first `YYYY-MM-DD` in the markdown body.
pub fn check_recency(scrape: &ScrapeResult, now: DateTime<Utc>, max_age_hours: i64) -> RecencyCheck {
    let stamp = match scrape.published_time.as_deref() {
        Some(published) => published,
        None => match ISO_DATE.find(&scrape.markdown) {
            Some(m) => m.as_str(),
            None => return RecencyCheck::Skipped(SkipReason::NoTimestamp),
        },
    };
    if stamp.trim().is_empty() {
        return RecencyCheck::Skipped(SkipReason::NoTimestamp);
    }

    let Some(published) = parse_timestamp(stamp) else {
        return RecencyCheck::Skipped(SkipReason::Unparseable);
    };

    // A window too large to represent can never be exceeded.
    let stale = Duration::try_hours(max_age_hours)
        .is_some_and(|window| now.signed_duration_since(published) > window);
    if stale {
        RecencyCheck::Stale(stamp.to_string())
    } else {
        RecencyCheck::Fresh(published)
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// A trailing `Z` is offset zero. Timestamps without an offset and bare dates
/// are taken as UTC (bare dates at midnight).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let normalized = match raw.strip_suffix('Z') {
        Some(head) => format!("{head}+00:00"),
        None => raw.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Strip a markdown body down to plain text.
///
/// Backslash runs and newline runs are deleted outright, so the text on
/// either side joins up. Markdown links and bare URLs are then deleted in one
/// left-to-right scan. Text that comes together after a deletion keeps being
/// scanned, so `[a][b](c)(d)` leaves nothing behind and cleaning twice changes
/// nothing.
///
/// # Arguments
///
/// * `markdown` - Raw page body as returned by the scraper
///
/// # Returns
///
/// Trimmed text with no `[text](target)` links and no `http(s)://` URLs.
///
/// # Examples
///
/// ```
/// use news_hunter::filter::clean_markdown;
///
/// assert_eq!(clean_markdown("See [this](https://x.io) now"), "See  now");
/// assert_eq!(clean_markdown("para\\\\graph\n\nnext"), "paragraphnext");
/// ```
pub fn clean_markdown(markdown: &str) -> String {
    let joined = ESCAPES_AND_NEWLINES.replace_all(markdown, "");
    let mut stripper = LinkStripper::with_capacity(joined.len());
    for c in joined.trim().chars() {
        stripper.push(c);
    }
    stripper.finish().trim().to_string()
}

/// Where the scan stands relative to a bare URL. Indexes are byte offsets of
/// the URL's first character in the kept text.
#[derive(Debug, Default, Clone, Copy)]
enum UrlState {
    #[default]
    Outside,
    /// `http://` or `https://` was just kept; not a URL until a non-space follows.
    Scheme(usize),
    Inside(usize),
}

/// Incremental link and URL remover.
///
/// A `[text](target)` is deleted the moment its `)` arrives and a URL the
/// moment the whitespace after it arrives, so the kept text never contains
/// either. Each character is pushed once and popped at most once from every
/// index stack; finding the link a `)` closes is a binary search.
#[derive(Debug, Default)]
struct LinkStripper {
    out: String,
    /// First `[` after the last kept `]`.
    open: Option<usize>,
    /// Kept `]`s, each with the value `open` had just before it.
    closes: Vec<(usize, Option<usize>)>,
    /// Kept `](` pairs that close a non-empty `[text`: (`(` index, `[` index).
    heads: Vec<(usize, usize)>,
    /// Kept `)`s.
    parens: Vec<usize>,
    url: UrlState,
}

impl LinkStripper {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            ..Self::default()
        }
    }

    fn push(&mut self, c: char) {
        if c.is_whitespace() {
            if let UrlState::Inside(start) = self.url {
                self.truncate(start);
            }
            self.url = UrlState::Outside;
        } else if let UrlState::Scheme(start) = self.url {
            self.url = UrlState::Inside(start);
        }

        let at = self.out.len();
        match c {
            '[' => {
                self.open.get_or_insert(at);
            }
            ']' => self.closes.push((at, self.open.take())),
            '(' => {
                if let Some(&(close, Some(open))) = self.closes.last() {
                    if close + 1 == at && open + 1 < close {
                        self.heads.push((at, open));
                    }
                }
            }
            ')' => {
                // The target may not contain `)`, so only heads after the
                // previous `)` can close here; the earliest one is leftmost.
                let last_paren = self.parens.last().copied();
                let first = self
                    .heads
                    .partition_point(|&(paren, _)| last_paren.is_some_and(|l| paren < l));
                if let Some(&(paren, open)) = self.heads.get(first) {
                    if paren + 1 < at {
                        self.truncate(open);
                        return;
                    }
                }
                self.parens.push(at);
            }
            _ => {}
        }

        self.out.push(c);
        if c == '/' && matches!(self.url, UrlState::Outside) {
            self.detect_scheme();
        }
    }

    fn detect_scheme(&mut self) {
        for scheme in ["https://", "http://"] {
            if self.out.ends_with(scheme) {
                self.url = UrlState::Scheme(self.out.len() - scheme.len());
                return;
            }
        }
    }

    /// Drop everything from byte `len` on. `len` always sits on an ASCII
    /// `[` or `h`, so it is a char boundary.
    fn truncate(&mut self, len: usize) {
        self.out.truncate(len);

        let mut open = self.open;
        while let Some(&(close, before)) = self.closes.last() {
            if close < len {
                break;
            }
            open = before;
            self.closes.pop();
        }
        self.open = open.filter(|&i| i < len);

        while self.heads.last().is_some_and(|&(paren, _)| paren >= len) {
            self.heads.pop();
        }
        while self.parens.last().is_some_and(|&i| i >= len) {
            self.parens.pop();
        }

        match self.url {
            UrlState::Scheme(start) | UrlState::Inside(start) if start < len => {}
            _ => {
                self.url = UrlState::Outside;
                self.detect_scheme();
            }
        }
    }

    fn finish(mut self) -> String {
        if let UrlState::Inside(start) = self.url {
            self.out.truncate(start);
        }
        self.out
    }
}

/// Whitespace-separated tokens in `text`.
///
/// # Examples
///
/// ```
/// use news_hunter::filter::word_count;
///
/// assert_eq!(word_count("  two\twords "), 2);
/// ```
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// True when `text` still contains a markdown link or a bare URL.
pub fn contains_link(text: &str) -> bool {
    LINKS_AND_URLS.is_match(text)
}
