//! Markdown rendering of the digest.
//!
//! Articles are grouped by category (alphabetical). Each article gets a
//! heading, a source line, the summary and its key takeaways. Rejected
//! sources are listed at the end so a reader can see what was left out.

use crate::models::{ArticleSummary, NewsDigest};
use crate::utils::slugify_title;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Write;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

pub fn digest_to_markdown(digest: &NewsDigest) -> String {
    let mut md = String::new();
    let edition = match digest.mode.as_str() {
        "ko" => "Korean",
        _ => "US",
    };
    let _ = writeln!(md, "# {edition} breaking news, {}\n", digest.local_date);
    let _ = writeln!(md, "_Generated at {}. Query: `{}`_\n", digest.local_time, digest.query);

    let mut by_category: BTreeMap<&str, Vec<&ArticleSummary>> = BTreeMap::new();
    for article in &digest.articles {
        by_category.entry(article.category.as_str()).or_default().push(article);
    }

    if by_category.is_empty() {
        let _ = writeln!(md, "No articles passed the filters in this run.\n");
    } else {
        let _ = writeln!(md, "## Contents\n");
        for (category, articles) in &by_category {
            let _ = writeln!(md, "- {category}");
            for article in articles {
                let _ = writeln!(md, "  - [{}](#{})", article.title, slugify_title(&article.title));
            }
        }
        md.push('\n');
    }

    for (category, articles) in &by_category {
        let _ = writeln!(md, "## {category}\n");
        for article in articles {
            write_article(&mut md, article);
        }
    }

    if !digest.rejected.is_empty() {
        let _ = writeln!(md, "## Skipped sources\n");
        for rejection in &digest.rejected {
            let _ = writeln!(
                md,
                "- <{}>: {} ({})",
                rejection.url, rejection.reason, rejection.detail
            );
        }
    }

    md
}

fn write_article(md: &mut String, article: &ArticleSummary) {
    let _ = writeln!(md, "### {}\n", article.title);
    if let Some(source) = &article.source {
        let tag = article.source_tag().unwrap_or_else(|| "source".to_string());
        let _ = writeln!(md, "**Source:** [{tag}]({source})");
    }
    if let Some(published) = &article.publishedTime {
        let _ = writeln!(md, "**Published:** {published}");
    }
    let _ = writeln!(md, "\n{}\n", article.summaryOfNewsArticle);
    if !article.keyTakeAways.is_empty() {
        let _ = writeln!(md, "**Key takeaways**\n");
        for takeaway in &article.keyTakeAways {
            let _ = writeln!(md, "- {takeaway}");
        }
        md.push('\n');
    }
    if !article.tags.is_empty() {
        let tags: Vec<String> = article.tags.iter().map(|t| format!("`{t}`")).collect();
        let _ = writeln!(md, "Tags: {}\n", tags.join(" "));
    }
}

/// Write the rendered digest to `{markdown_output_dir}/{date}_{mode}.md`.
#[instrument(level = "info", skip_all, fields(%markdown_output_dir))]
pub async fn write_digest(digest: &NewsDigest, markdown_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let path = PathBuf::from(markdown_output_dir)
        .join(format!("{}_{}.md", digest.local_date, digest.mode));
    fs::write(&path, digest_to_markdown(digest)).await?;
    info!(path = %path.display(), "Wrote Markdown digest");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RejectReason;
    use crate::models::Rejection;

    fn summary(title: &str, category: &str) -> ArticleSummary {
        ArticleSummary {
            source: Some("https://www.npr.org/2025/11/04/story".to_string()),
            title: title.to_string(),
            category: category.to_string(),
            summaryOfNewsArticle: format!("About {title}."),
            keyTakeAways: vec!["First point".to_string()],
            tags: vec!["policy".to_string()],
            publishedTime: Some("2025-11-04T09:00:00Z".to_string()),
        }
    }

    fn digest(articles: Vec<ArticleSummary>) -> NewsDigest {
        NewsDigest {
            local_date: "2025-11-04".to_string(),
            local_time: "07:30:00".to_string(),
            mode: "us".to_string(),
            query: "Top breaking US news".to_string(),
            articles,
            rejected: vec![Rejection {
                url: "https://www.reuters.com/tag/politics".to_string(),
                reason: RejectReason::HubUrl,
                detail: "Filtered out hub/index URL (matched /tag/)".to_string(),
            }],
        }
    }

    #[test]
    fn test_categories_are_sorted_and_linked() {
        let md = digest_to_markdown(&digest(vec![
            summary("Storm Hits Coast", "Environment"),
            summary("Budget Vote", "Politics & Governance"),
            summary("Drought Ends", "Environment"),
        ]));

        assert!(md.starts_with("# US breaking news, 2025-11-04"));
        let env = md.find("## Environment").unwrap();
        let pol = md.find("## Politics & Governance").unwrap();
        assert!(env < pol);
        assert!(md.contains("  - [Storm Hits Coast](#storm-hits-coast)"));
        assert!(md.contains("**Source:** [npr](https://www.npr.org/2025/11/04/story)"));
        assert!(md.contains("- First point"));
        assert!(md.contains("Tags: `policy`"));
    }

    #[test]
    fn test_skipped_sources_listed() {
        let md = digest_to_markdown(&digest(vec![]));
        assert!(md.contains("No articles passed the filters"));
        assert!(md.contains("## Skipped sources"));
        assert!(md.contains("<https://www.reuters.com/tag/politics>: hub/index URL"));
    }

    #[tokio::test]
    async fn test_write_digest_file_name() {
        let tmp = tempfile::TempDir::new().expect("temp dir should be created");
        let path = write_digest(&digest(vec![]), tmp.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(path, tmp.path().join("2025-11-04_us.md"));
        assert!(std::fs::read_to_string(path).unwrap().contains("2025-11-04"));
    }
}
