//! Review queue entries.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::QueueError;
use crate::payload::Payload;
use crate::safety::Severity;

/// Unique identifier of a review item.
///
/// Generated ids look like `review_20240101_120000_1a2b3c4d`: the creation
/// time followed by 32 random bits, so ids created within the same second
/// still differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(String);

impl ReviewId {
    /// Generates a fresh id.
    pub fn generate() -> Self {
        let suffix: u32 = rand::thread_rng().gen();
        Self(format!(
            "review_{}_{:08x}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            suffix
        ))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ReviewId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReviewId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a review item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Waiting for a reviewer.
    #[default]
    Pending,
    /// Resolved by a reviewer.
    Reviewed,
}

impl ReviewStatus {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Reviewed => "reviewed",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "reviewed" => Some(ReviewStatus::Reviewed),
            _ => None,
        }
    }
}

/// A request escalated for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Unique id.
    pub review_id: ReviewId,
    /// When the item was queued.
    pub created_at: DateTime<Utc>,
    /// Review priority.
    pub priority: Severity,
    /// Why the request was escalated.
    pub reason: String,
    /// Copy of the request payload at escalation time.
    pub payload_snapshot: Payload,
    /// Pending or reviewed.
    pub status: ReviewStatus,
    /// Reviewer decision. Set together with `reviewed_at`.
    pub decision: Option<String>,
    /// Free-form reviewer notes.
    pub reviewer_notes: Option<String>,
    /// When the item was resolved.
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewItem {
    /// Creates a pending item stamped with the current time.
    pub fn pending(
        review_id: ReviewId,
        priority: Severity,
        reason: impl Into<String>,
        payload_snapshot: Payload,
    ) -> Self {
        Self {
            review_id,
            created_at: Utc::now(),
            priority,
            reason: reason.into(),
            payload_snapshot,
            status: ReviewStatus::Pending,
            decision: None,
            reviewer_notes: None,
            reviewed_at: None,
        }
    }

    /// Returns true if no reviewer has resolved this item.
    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending
    }

    /// Resolves the item. An item can be resolved at most once.
    pub fn resolve(
        &mut self,
        decision: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        if !self.is_pending() {
            return Err(QueueError::AlreadyReviewed(self.review_id.clone()));
        }

        self.status = ReviewStatus::Reviewed;
        self.decision = Some(decision.to_string());
        self.reviewer_notes = notes.map(str::to_string);
        self.reviewed_at = Some(at);
        Ok(())
    }
}
