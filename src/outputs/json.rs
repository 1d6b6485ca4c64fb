//! JSON archive of each run.
//!
//! When an archive directory is configured, every run writes its digest and
//! run summary to one file per day:
//!
//! ```text
//! archive_dir/
//! ├── 2025-05-05.json
//! └── 2025-05-06.json
//! ```
//!
//! A second run on the same date overwrites that day's file.

use crate::models::{Digest, RunSummary};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Serialize)]
pub struct RunRecord<'a> {
    pub digest: &'a Digest,
    pub summary: &'a RunSummary,
}

/// Path of the archive file for `digest` under `archive_dir`.
pub fn archive_path(archive_dir: &Path, digest: &Digest) -> PathBuf {
    archive_dir.join(format!("{}.json", digest.date))
}

/// Write the digest and run summary to `{archive_dir}/{date}.json`.
#[instrument(level = "info", skip_all, fields(archive_dir = %archive_dir.display()))]
pub async fn write_run(
    archive_dir: &Path,
    digest: &Digest,
    summary: &RunSummary,
) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
    let json = serde_json::to_string_pretty(&RunRecord { digest, summary })?;

    if let Err(e) = fs::create_dir_all(archive_dir).await {
        error!(error = %e, "Failed to create archive dir");
        return Err(e.into());
    }

    let path = archive_path(archive_dir, digest);
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run archive");
    Ok(path)
}
