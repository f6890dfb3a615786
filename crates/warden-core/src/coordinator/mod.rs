//! Request coordination.
//!
//! Every request goes through the same pipeline:
//!
//! ```text
//! validate → classify → evaluate → gate → dispatch → envelope
//! ```
//!
//! Both scanners always run before any handler. Blocked requests never reach
//! a handler, and handler faults never escape the envelope.

mod envelope;
mod handler;
mod state;
mod textgen;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

pub use envelope::{
    BlockCategory, BlockedRequest, CoordinatorStatus, SafetyInfo, TaskEnvelope, TaskRequest,
    UNKNOWN_HANDLER,
};
pub use handler::{HandlerError, HandlerRegistry, TaskHandler};
pub use state::RequestState;
pub use textgen::{
    HttpTextGenerator, HttpTextGeneratorConfig, TextGenError, TextGenerationHandler,
    TextGenerator, DEFAULT_TEXTGEN_TIMEOUT,
};

use state::Lifecycle;

use crate::safety::{
    ClassificationResult, ContentClassifier, OversightEvaluator, OversightResult, Severity,
};

/// Default handler timeout.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest accepted task type.
pub const MAX_TASK_TYPE_LEN: usize = 64;

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a handler may run.
    pub handler_timeout: Duration,
    /// Block requests the oversight evaluator rates `critical`, not only those
    /// the classifier rates `critical`.
    pub block_on_critical_oversight: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            block_on_critical_oversight: true,
        }
    }
}

impl CoordinatorConfig {
    /// Sets the handler timeout.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Sets whether a critical oversight priority blocks the request.
    pub fn with_block_on_critical_oversight(mut self, block: bool) -> Self {
        self.block_on_critical_oversight = block;
        self
    }
}

/// Errors that end a request without an envelope.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The request is malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The request was rejected by screening.
    #[error("request blocked: {}", .0.risk_category)]
    Blocked(BlockedRequest),

    /// The caller cancelled the request while a handler was running.
    #[error("request cancelled")]
    Cancelled,
}

/// Screens requests and routes them to handlers.
pub struct Coordinator {
    classifier: Arc<ContentClassifier>,
    evaluator: Arc<OversightEvaluator>,
    handlers: HandlerRegistry,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Creates a coordinator.
    pub fn new(
        classifier: Arc<ContentClassifier>,
        evaluator: Arc<OversightEvaluator>,
        handlers: HandlerRegistry,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            classifier,
            evaluator,
            handlers,
            config,
        }
    }

    /// Returns the handler registry.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Coordinates a request that cannot be cancelled.
    pub async fn coordinate(&self, request: TaskRequest) -> Result<TaskEnvelope, CoordinatorError> {
        self.coordinate_until(request, std::future::pending()).await
    }

    /// Coordinates a request, abandoning the handler call when `cancel`
    /// completes.
    pub async fn coordinate_until<F>(
        &self,
        request: TaskRequest,
        cancel: F,
    ) -> Result<TaskEnvelope, CoordinatorError>
    where
        F: Future<Output = ()>,
    {
        validate_task_type(request.task_type.as_deref())?;

        let TaskRequest {
            task_type,
            task_data,
        } = request;
        let mut lifecycle = Lifecycle::new();

        let mut classification = self.classifier.classify(&task_data);
        lifecycle.advance(RequestState::Classified);

        let oversight = self.evaluator.evaluate(&task_data);
        lifecycle.advance(RequestState::Evaluated);

        if let Some(blocked) = self.block_decision(&classification, &oversight) {
            lifecycle.advance(RequestState::Blocked);
            warn!(
                risk_category = %blocked.risk_category,
                risk_level = %blocked.risk_level,
                review_id = ?blocked.review_id.as_ref().map(|id| id.as_str()),
                "Request blocked"
            );
            return Err(CoordinatorError::Blocked(blocked));
        }

        if oversight.requires_review {
            info!(
                priority = %oversight.priority,
                review_id = ?oversight.review_id.as_ref().map(|id| id.as_str()),
                "Dispatching request pending human review"
            );
        }

        let payload = std::mem::take(&mut classification.filtered_content);
        let safety_info = SafetyInfo {
            content_filter: classification,
            human_oversight: oversight,
        };

        let handler = task_type.as_deref().and_then(|t| self.handlers.get(t));
        let Some(handler) = handler else {
            let message = match &task_type {
                Some(t) => format!("Task type {} not implemented yet", t),
                None => "No task type provided".to_string(),
            };
            info!(task_type = ?task_type, "No handler registered");
            lifecycle.advance(RequestState::Completed);
            return Ok(TaskEnvelope {
                coordinator_status: CoordinatorStatus::Success,
                handler_name: UNKNOWN_HANDLER.to_string(),
                task_type,
                result: json!({ "message": message }),
                timestamp: Utc::now(),
                safety_info,
            });
        };

        lifecycle.advance(RequestState::Dispatched);

        let timeout = self.config.handler_timeout;
        tokio::pin!(cancel);
        let outcome = tokio::select! {
            biased;
            _ = &mut cancel => None,
            res = tokio::time::timeout(timeout, handler.handle(payload)) => Some(res),
        };

        let Some(outcome) = outcome else {
            lifecycle.advance(RequestState::Failed);
            warn!(handler = handler.name(), "Handler call cancelled");
            return Err(CoordinatorError::Cancelled);
        };

        let (coordinator_status, result) = match outcome {
            Ok(Ok(value)) => {
                lifecycle.advance(RequestState::Completed);
                (CoordinatorStatus::Success, value)
            }
            Ok(Err(e)) => {
                lifecycle.advance(RequestState::Failed);
                warn!(handler = handler.name(), error = %e, "Handler failed");
                (CoordinatorStatus::Error, json!({ "error": e.to_string() }))
            }
            Err(_) => {
                lifecycle.advance(RequestState::Failed);
                let e = HandlerError::Timeout(timeout);
                warn!(handler = handler.name(), error = %e, "Handler timed out");
                (CoordinatorStatus::Error, json!({ "error": e.to_string() }))
            }
        };

        Ok(TaskEnvelope {
            coordinator_status,
            handler_name: handler.name().to_string(),
            task_type,
            result,
            timestamp: Utc::now(),
            safety_info,
        })
    }

    fn block_decision(
        &self,
        classification: &ClassificationResult,
        oversight: &OversightResult,
    ) -> Option<BlockedRequest> {
        let risk_category = if classification.is_blocked() {
            if classification.degraded {
                BlockCategory::SafetyFault
            } else {
                BlockCategory::ProhibitedTopic
            }
        } else if self.config.block_on_critical_oversight
            && oversight.priority == Severity::Critical
        {
            BlockCategory::CrisisIndicator
        } else {
            return None;
        };

        Some(BlockedRequest {
            risk_category,
            risk_level: Severity::Critical,
            escalation_message: ContentClassifier::escalation_message(Severity::Critical)
                .to_string(),
            review_id: oversight.review_id.clone(),
        })
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("handlers", &self.handlers)
            .field("config", &self.config)
            .finish()
    }
}

/// Checks that a present task type is a short identifier.
pub fn validate_task_type(task_type: Option<&str>) -> Result<(), CoordinatorError> {
    let Some(task_type) = task_type else {
        return Ok(());
    };

    if task_type.is_empty() {
        return Err(CoordinatorError::Validation(
            "task_type must not be empty".to_string(),
        ));
    }
    if task_type.len() > MAX_TASK_TYPE_LEN {
        return Err(CoordinatorError::Validation(format!(
            "task_type must be at most {} characters",
            MAX_TASK_TYPE_LEN
        )));
    }
    if !task_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoordinatorError::Validation(
            "task_type may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}
