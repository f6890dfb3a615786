//! Human review queue.
//!
//! Requests escalated by the oversight evaluator end up here until a reviewer
//! resolves them. The queue is append-only: items are never removed, only
//! moved from `pending` to `reviewed`.

mod item;
mod memory;

use serde::Serialize;
use thiserror::Error;

pub use item::{ReviewId, ReviewItem, ReviewStatus};
pub use memory::InMemoryReviewQueue;

/// Errors from review queue operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueueError {
    /// No item with this id exists.
    #[error("review item not found: {0}")]
    NotFound(ReviewId),

    /// The item was already resolved.
    #[error("review item already reviewed: {0}")]
    AlreadyReviewed(ReviewId),

    /// The backing store failed.
    #[error("review storage error: {0}")]
    Storage(String),
}

/// Which items a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// Every item.
    #[default]
    All,
    /// Pending items only.
    Pending,
    /// Reviewed items only.
    Reviewed,
}

impl StatusFilter {
    /// Returns true if `status` passes this filter.
    pub fn accepts(&self, status: ReviewStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == ReviewStatus::Pending,
            StatusFilter::Reviewed => status == ReviewStatus::Reviewed,
        }
    }
}

/// Queue contents split by status, each half in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueSnapshot {
    /// Items waiting for a reviewer.
    pub pending: Vec<ReviewItem>,
    /// Items already resolved.
    pub reviewed: Vec<ReviewItem>,
}

impl QueueSnapshot {
    /// Splits a creation-ordered list of items by status.
    pub fn from_items(items: Vec<ReviewItem>) -> Self {
        let (pending, reviewed) = items.into_iter().partition(ReviewItem::is_pending);
        Self { pending, reviewed }
    }

    /// Total number of items.
    pub fn len(&self) -> usize {
        self.pending.len() + self.reviewed.len()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage for review items.
///
/// Implementations must be safe to share between request handlers. Every
/// operation is atomic with respect to every other: concurrent appends are
/// all retained, and of two concurrent `mark_reviewed` calls on the same
/// pending item exactly one succeeds.
pub trait ReviewRepository: Send + Sync {
    /// Appends a new item at the end of the queue.
    fn append(&self, item: ReviewItem) -> Result<(), QueueError>;

    /// Lists items in creation order.
    fn list(&self, filter: StatusFilter) -> Result<Vec<ReviewItem>, QueueError>;

    /// Fetches a single item.
    fn get(&self, id: &ReviewId) -> Result<Option<ReviewItem>, QueueError>;

    /// Resolves a pending item and returns its updated state.
    fn mark_reviewed(
        &self,
        id: &ReviewId,
        decision: &str,
        notes: Option<&str>,
    ) -> Result<ReviewItem, QueueError>;

    /// Total number of items.
    fn len(&self) -> Result<usize, QueueError>;

    /// Number of items still awaiting review.
    fn pending_len(&self) -> Result<usize, QueueError> {
        Ok(self.list(StatusFilter::Pending)?.len())
    }

    /// Returns true if the queue holds no items.
    fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    /// Returns the queue split by status.
    fn snapshot(&self) -> Result<QueueSnapshot, QueueError> {
        Ok(QueueSnapshot::from_items(self.list(StatusFilter::All)?))
    }
}
