//! JSON output of the digest.

use crate::models::NewsDigest;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `digest` to `{json_output_dir}/{date}/{mode}.json`, returning the path.
///
/// A second run on the same day and mode replaces the earlier file.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest(digest: &NewsDigest, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(digest)?;

    let dir = PathBuf::from(json_output_dir).join(&digest.local_date);
    if let Err(e) = fs::create_dir_all(&dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = dir.join(format!("{}.json", digest.mode));
    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = digest.articles.len(), "Wrote JSON digest");
    Ok(path)
}
