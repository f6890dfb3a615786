//! SQLite-backed review queue.

use std::path::PathBuf;

use chrono::Utc;
use directories::ProjectDirs;
use tracing::{debug, info};
use warden_core::review::{
    QueueError, ReviewId, ReviewItem, ReviewRepository, ReviewStatus, StatusFilter,
};

use crate::error::{Result, StorageError};
use crate::pool::ConnectionPool;
use crate::repository::ReviewsRepo;

/// Review queue persisted in SQLite.
///
/// Survives restarts, and several processes on one host can share the same
/// database file.
#[derive(Clone)]
pub struct SqliteReviewQueue {
    pool: ConnectionPool,
}

impl SqliteReviewQueue {
    /// Opens the queue in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Opens the queue at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening review queue at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Opens an in-memory queue (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "warden", "warden")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("review_queue.db"))
    }
}

impl ReviewRepository for SqliteReviewQueue {
    fn append(&self, item: ReviewItem) -> std::result::Result<(), QueueError> {
        let conn = self.pool.get()?;
        let seq = ReviewsRepo::insert(&conn, &item)?;
        debug!(review_id = %item.review_id, seq, "Review item stored");
        Ok(())
    }

    fn list(&self, filter: StatusFilter) -> std::result::Result<Vec<ReviewItem>, QueueError> {
        let conn = self.pool.get()?;
        Ok(ReviewsRepo::list(&conn, filter)?)
    }

    fn get(&self, id: &ReviewId) -> std::result::Result<Option<ReviewItem>, QueueError> {
        let conn = self.pool.get()?;
        Ok(ReviewsRepo::get(&conn, id)?)
    }

    fn mark_reviewed(
        &self,
        id: &ReviewId,
        decision: &str,
        notes: Option<&str>,
    ) -> std::result::Result<ReviewItem, QueueError> {
        let conn = self.pool.get()?;
        let item = ReviewsRepo::mark_reviewed(&conn, id, decision, notes, Utc::now())?;
        info!(review_id = %id, decision, "Review item resolved");
        Ok(item)
    }

    fn len(&self) -> std::result::Result<usize, QueueError> {
        let conn = self.pool.get()?;
        Ok(ReviewsRepo::count(&conn)? as usize)
    }

    fn pending_len(&self) -> std::result::Result<usize, QueueError> {
        let conn = self.pool.get()?;
        Ok(ReviewsRepo::count_by_status(&conn, ReviewStatus::Pending)? as usize)
    }
}
