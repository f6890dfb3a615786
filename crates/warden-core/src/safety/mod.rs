//! Rule-based request screening.
//!
//! Two independent scanners run over the same flattened corpus:
//!
//! - [`ContentClassifier`] decides whether a request may reach a handler at
//!   all, and annotates the payload when it may.
//! - [`OversightEvaluator`] decides whether a human has to look at the
//!   request, and queues it for review when so.
//!
//! Neither scanner ever returns an error to its caller. Internal faults are
//! logged and replaced by a result chosen by the scanner's [`FailurePolicy`].
//! The defaults differ on purpose: the classifier fails open (availability)
//! and the evaluator fails closed (a human sees anything we could not judge).

mod classifier;
mod oversight;
pub mod rules;
mod severity;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::review::QueueError;

pub use classifier::{ClassificationResult, ClassifierConfig, ContentClassifier};
pub use oversight::{EvaluatorConfig, OversightEvaluator, OversightResult};
pub use severity::Severity;

/// Default upper bound on the flattened corpus size (1 MiB).
pub const DEFAULT_MAX_CORPUS_BYTES: usize = 1024 * 1024;

/// What a scanner reports when it cannot evaluate a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report the request as harmless and let it through.
    FailOpen,
    /// Report the request at the scanner's escalation level.
    FailClosed,
}

impl FailurePolicy {
    /// Returns a human-readable name for this policy.
    pub fn name(&self) -> &'static str {
        match self {
            FailurePolicy::FailOpen => "fail-open",
            FailurePolicy::FailClosed => "fail-closed",
        }
    }
}

/// Internal fault while screening a request.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The flattened payload exceeds the configured size limit.
    #[error("corpus of {size} bytes exceeds the {limit} byte limit")]
    CorpusTooLarge {
        /// Corpus size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The review queue rejected a new item.
    #[error("review queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Rejects corpora above `limit` bytes.
fn check_corpus_size(corpus: &str, limit: usize) -> Result<(), EvaluationError> {
    if corpus.len() > limit {
        return Err(EvaluationError::CorpusTooLarge {
            size: corpus.len(),
            limit,
        });
    }
    Ok(())
}
