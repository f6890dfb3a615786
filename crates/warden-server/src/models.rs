//! API request and response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{ReviewId, ReviewItem};
use warden_storage::QueueExport;

/// Response body for GET /safety/oversight-queue.
#[derive(Debug, Serialize)]
pub struct OversightQueueResponse {
    /// Total number of items.
    pub queue_length: usize,
    /// Items waiting for a reviewer, oldest first.
    pub pending_reviews: Vec<ReviewItem>,
    /// Resolved items, oldest first.
    pub reviewed_items: Vec<ReviewItem>,
}

/// Request body for POST /safety/mark-reviewed.
#[derive(Debug, Deserialize)]
pub struct MarkReviewedRequest {
    /// Item to resolve.
    pub review_id: ReviewId,
    /// Reviewer decision, e.g. "approved" or "escalated".
    pub review_decision: String,
    /// Optional free-form notes.
    #[serde(default)]
    pub reviewer_notes: Option<String>,
}

/// Response body for POST /safety/mark-reviewed.
#[derive(Debug, Serialize)]
pub struct MarkReviewedResponse {
    pub status: &'static str,
    pub review_id: ReviewId,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Response body for GET /safety/export-queue.
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    #[serde(flatten)]
    pub export: QueueExport,
    /// File the snapshot was written to, when an export directory is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_to: Option<String>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue_length: usize,
    /// Items still awaiting a reviewer.
    pub pending_reviews: usize,
    /// Registered task types.
    pub handlers: Vec<String>,
}
