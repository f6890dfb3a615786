//! Warden Core - Request screening, human oversight, and task coordination.
//!
//! This crate holds everything that decides what happens to a task request:
//!
//! - Payload model and text extraction ([`payload`])
//! - Content classification and oversight evaluation ([`safety`])
//! - The human review queue ([`review`])
//! - Routing screened requests to task handlers ([`coordinator`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_core::coordinator::{Coordinator, CoordinatorConfig, HandlerRegistry, TaskRequest};
//! use warden_core::review::InMemoryReviewQueue;
//! use warden_core::safety::{ContentClassifier, EvaluatorConfig, OversightEvaluator};
//! use warden_core::Payload;
//!
//! # async fn run() {
//! let queue = Arc::new(InMemoryReviewQueue::new());
//! let coordinator = Coordinator::new(
//!     Arc::new(ContentClassifier::default()),
//!     Arc::new(OversightEvaluator::new(queue, EvaluatorConfig::default())),
//!     HandlerRegistry::new(),
//!     CoordinatorConfig::default(),
//! );
//!
//! let request = TaskRequest::new("assessment_feedback", Payload::from("hello"));
//! let envelope = coordinator.coordinate(request).await.unwrap();
//! println!("{}", envelope.handler_name);
//! # }
//! ```

pub mod coordinator;
pub mod payload;
pub mod review;
pub mod safety;

pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, TaskEnvelope, TaskRequest};
pub use payload::{extract_text, Payload, PayloadVisitor};
pub use review::{QueueError, ReviewId, ReviewItem, ReviewRepository, ReviewStatus};
pub use safety::{ContentClassifier, FailurePolicy, OversightEvaluator, Severity};
