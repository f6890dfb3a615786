//! Request and response shapes of the coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::Payload;
use crate::review::ReviewId;
use crate::safety::{ClassificationResult, OversightResult, Severity};

/// Handler name reported when no handler ran.
pub const UNKNOWN_HANDLER: &str = "unknown";

/// An incoming task request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Which handler should run the task.
    #[serde(default)]
    pub task_type: Option<String>,
    /// Arbitrary task data.
    #[serde(default)]
    pub task_data: Payload,
}

impl TaskRequest {
    /// Creates a request for `task_type`.
    pub fn new(task_type: impl Into<String>, task_data: Payload) -> Self {
        Self {
            task_type: Some(task_type.into()),
            task_data,
        }
    }
}

/// Whether the handler step succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatorStatus {
    /// A handler produced a result, or the task type was soft-failed.
    Success,
    /// The handler failed or timed out.
    Error,
}

/// Screening results attached to every envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyInfo {
    /// Content classifier result.
    pub content_filter: ClassificationResult,
    /// Oversight evaluator result.
    pub human_oversight: OversightResult,
}

/// Response for a request that was not blocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Outcome of the handler step.
    pub coordinator_status: CoordinatorStatus,
    /// Handler that ran, or `"unknown"`.
    pub handler_name: String,
    /// Requested task type.
    pub task_type: Option<String>,
    /// Handler output, or `{"error": ...}` / `{"message": ...}`.
    pub result: Value,
    /// When the envelope was built.
    pub timestamp: DateTime<Utc>,
    /// Screening results.
    pub safety_info: SafetyInfo,
}

impl TaskEnvelope {
    /// Returns true if the handler step succeeded.
    pub fn is_success(&self) -> bool {
        self.coordinator_status == CoordinatorStatus::Success
    }
}

/// Why a request was blocked. Never carries the matched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    /// The classifier found a prohibited advisory topic.
    ProhibitedTopic,
    /// The evaluator found a crisis or critical-safety indicator.
    CrisisIndicator,
    /// Screening itself failed under a fail-closed policy.
    SafetyFault,
}

impl BlockCategory {
    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockCategory::ProhibitedTopic => "prohibited_topic",
            BlockCategory::CrisisIndicator => "crisis_indicator",
            BlockCategory::SafetyFault => "safety_fault",
        }
    }
}

impl std::fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of a blocked request, safe to return to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedRequest {
    /// Risk category.
    pub risk_category: BlockCategory,
    /// Level that triggered the block.
    pub risk_level: Severity,
    /// User-facing escalation message.
    pub escalation_message: String,
    /// Review item queued for the request, if any.
    pub review_id: Option<ReviewId>,
}
