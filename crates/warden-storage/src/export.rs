//! JSON export of the review queue.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use warden_core::review::{ReviewItem, ReviewRepository};

use crate::error::Result;

/// Full snapshot of the review queue at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueExport {
    /// When the snapshot was taken.
    pub exported_at: DateTime<Utc>,
    /// Total number of items.
    pub queue_length: usize,
    /// Items waiting for a reviewer, oldest first.
    pub pending_reviews: Vec<ReviewItem>,
    /// Resolved items, oldest first.
    pub reviewed_items: Vec<ReviewItem>,
}

/// Takes a snapshot of `repo` without writing it anywhere.
pub fn snapshot(repo: &dyn ReviewRepository) -> Result<QueueExport> {
    let snapshot = repo.snapshot()?;

    Ok(QueueExport {
        exported_at: Utc::now(),
        queue_length: snapshot.len(),
        pending_reviews: snapshot.pending,
        reviewed_items: snapshot.reviewed,
    })
}

/// Writes a snapshot of `repo` to `dir` as pretty-printed JSON.
///
/// The directory is created if needed. Returns the file path and the
/// snapshot that was written.
pub fn export_queue(repo: &dyn ReviewRepository, dir: &Path) -> Result<(PathBuf, QueueExport)> {
    let export = snapshot(repo)?;

    fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "review_queue_{}.json",
        export.exported_at.format("%Y%m%d_%H%M%S_%3f")
    ));

    let json = serde_json::to_string_pretty(&export)?;
    fs::write(&path, json)?;

    info!(
        path = %path.display(),
        queue_length = export.queue_length,
        "Review queue exported"
    );

    Ok((path, export))
}
