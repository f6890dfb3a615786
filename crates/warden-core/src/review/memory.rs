//! In-process review queue.

use chrono::Utc;
use parking_lot::Mutex;

use super::{QueueError, ReviewId, ReviewItem, ReviewRepository, StatusFilter};

/// Review queue held in memory.
///
/// Lookups scan the whole queue, which is fine for the volumes a single
/// process accumulates between restarts. Use the SQLite queue from
/// `warden-storage` for anything that must survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryReviewQueue {
    items: Mutex<Vec<ReviewItem>>,
}

impl InMemoryReviewQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReviewRepository for InMemoryReviewQueue {
    fn append(&self, item: ReviewItem) -> Result<(), QueueError> {
        self.items.lock().push(item);
        Ok(())
    }

    fn list(&self, filter: StatusFilter) -> Result<Vec<ReviewItem>, QueueError> {
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|item| filter.accepts(item.status))
            .cloned()
            .collect())
    }

    fn get(&self, id: &ReviewId) -> Result<Option<ReviewItem>, QueueError> {
        Ok(self
            .items
            .lock()
            .iter()
            .find(|item| &item.review_id == id)
            .cloned())
    }

    fn mark_reviewed(
        &self,
        id: &ReviewId,
        decision: &str,
        notes: Option<&str>,
    ) -> Result<ReviewItem, QueueError> {
        let mut items = self.items.lock();
        let item = items
            .iter_mut()
            .find(|item| &item.review_id == id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;

        item.resolve(decision, notes, Utc::now())?;
        Ok(item.clone())
    }

    fn len(&self) -> Result<usize, QueueError> {
        Ok(self.items.lock().len())
    }
}
