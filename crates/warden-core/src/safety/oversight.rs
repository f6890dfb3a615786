//! Human oversight evaluator.
//!
//! Decides whether a request needs a human reviewer and, when it does, queues
//! a snapshot of it in the review repository.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::rules::{
    PatternRules, TermRules, BUSINESS_CRITICAL_TOPICS, CRITICAL_OVERSIGHT_KEYWORDS,
    HIGH_PRIORITY_PATTERNS, MEDIUM_PRIORITY_PATTERNS,
};
use super::{check_corpus_size, EvaluationError, FailurePolicy, Severity, DEFAULT_MAX_CORPUS_BYTES};
use crate::payload::{extract_text, Payload};
use crate::review::{QueueError, ReviewId, ReviewItem, ReviewRepository};

/// Configuration for the oversight evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Result to report when evaluation itself fails.
    /// Default: fail closed.
    pub failure_policy: FailurePolicy,
    /// Largest corpus the evaluator will scan.
    pub max_corpus_bytes: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::FailClosed,
            max_corpus_bytes: DEFAULT_MAX_CORPUS_BYTES,
        }
    }
}

impl EvaluatorConfig {
    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets the corpus size limit.
    pub fn with_max_corpus_bytes(mut self, limit: usize) -> Self {
        self.max_corpus_bytes = limit;
        self
    }
}

/// Outcome of an oversight evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OversightResult {
    /// Review priority.
    pub priority: Severity,
    /// Whether a human must review the request.
    pub requires_review: bool,
    /// Every triggered category, joined with `; `.
    pub escalation_reason: String,
    /// Id of the queued review item. Empty when no item was stored.
    pub review_id: Option<ReviewId>,
    /// True when this result was produced by the failure policy.
    #[serde(default)]
    pub degraded: bool,
}

/// Findings per rule table, each in table order.
#[derive(Debug, Default)]
struct Findings<'a> {
    critical: Vec<&'a str>,
    high: Vec<&'a str>,
    business: Vec<&'a str>,
    medium: Vec<&'a str>,
}

impl Findings<'_> {
    fn priority(&self) -> Severity {
        if !self.critical.is_empty() {
            Severity::Critical
        } else if !self.high.is_empty() || !self.business.is_empty() {
            Severity::High
        } else if !self.medium.is_empty() {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    fn reason(&self) -> String {
        let sections = [
            ("Critical keywords detected", &self.critical),
            ("High-priority patterns detected", &self.high),
            ("Business-critical topics detected", &self.business),
            ("Medium-priority patterns detected", &self.medium),
        ];

        let reasons: Vec<String> = sections
            .iter()
            .filter(|(_, hits)| !hits.is_empty())
            .map(|(label, hits)| format!("{}: {}", label, hits.join(", ")))
            .collect();

        if reasons.is_empty() {
            "No specific concerns detected".to_string()
        } else {
            reasons.join("; ")
        }
    }
}

/// Rule-based oversight evaluator.
pub struct OversightEvaluator {
    critical_keywords: TermRules,
    high_priority_patterns: PatternRules,
    medium_priority_patterns: PatternRules,
    business_critical_topics: TermRules,
    queue: Arc<dyn ReviewRepository>,
    config: EvaluatorConfig,
}

impl OversightEvaluator {
    /// Creates an evaluator that queues reviews in `queue`.
    pub fn new(queue: Arc<dyn ReviewRepository>, config: EvaluatorConfig) -> Self {
        Self {
            critical_keywords: TermRules::new(CRITICAL_OVERSIGHT_KEYWORDS),
            high_priority_patterns: PatternRules::builtin(HIGH_PRIORITY_PATTERNS),
            medium_priority_patterns: PatternRules::builtin(MEDIUM_PRIORITY_PATTERNS),
            business_critical_topics: TermRules::with_prose_forms(BUSINESS_CRITICAL_TOPICS),
            queue,
            config,
        }
    }

    /// Returns the review repository this evaluator appends to.
    pub fn queue(&self) -> &Arc<dyn ReviewRepository> {
        &self.queue
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Returns the reviewer-facing escalation message for a priority.
    pub fn escalation_message(priority: Severity) -> &'static str {
        match priority {
            Severity::Critical => {
                "CRITICAL: This request requires immediate human review due to safety concerns."
            }
            Severity::High => {
                "HIGH PRIORITY: This request requires human review due to potential serious issues."
            }
            Severity::Medium => "MEDIUM PRIORITY: This request may benefit from human review.",
            Severity::Low => "LOW PRIORITY: This request can proceed with automated processing.",
        }
    }

    /// Evaluates a payload. Never fails; see [`FailurePolicy`].
    ///
    /// The failure policy only decides the result when the payload could not
    /// be scanned. When the scan succeeds but the review item cannot be
    /// queued, the scanned priority stands and `review_id` is left empty.
    pub fn evaluate(&self, payload: &Payload) -> OversightResult {
        let (priority, escalation_reason) = match self.assess(payload) {
            Ok(assessment) => assessment,
            Err(e) => {
                error!(
                    error = %e,
                    policy = self.config.failure_policy.name(),
                    "Oversight evaluation failed"
                );
                return self.fallback(payload, &e);
            }
        };

        match self.queue_for_review(payload, priority, &escalation_reason) {
            Ok(review_id) => OversightResult {
                priority,
                requires_review: priority.requires_review(),
                escalation_reason,
                review_id,
                degraded: false,
            },
            Err(e) => {
                error!(
                    error = %e,
                    priority = %priority,
                    "Could not queue request for human review"
                );
                OversightResult {
                    priority,
                    requires_review: true,
                    escalation_reason: format!(
                        "{}; Review queue unavailable: {}",
                        escalation_reason, e
                    ),
                    review_id: None,
                    degraded: true,
                }
            }
        }
    }

    /// Evaluates a payload, surfacing internal faults.
    ///
    /// A review item is appended only when the whole evaluation succeeds up
    /// to that point.
    pub fn try_evaluate(&self, payload: &Payload) -> Result<OversightResult, EvaluationError> {
        let (priority, escalation_reason) = self.assess(payload)?;
        let review_id = self.queue_for_review(payload, priority, &escalation_reason)?;

        Ok(OversightResult {
            priority,
            requires_review: priority.requires_review(),
            escalation_reason,
            review_id,
            degraded: false,
        })
    }

    /// Scans the payload and returns its priority and escalation reason.
    fn assess(&self, payload: &Payload) -> Result<(Severity, String), EvaluationError> {
        let corpus = extract_text(payload);
        check_corpus_size(&corpus, self.config.max_corpus_bytes)?;

        let findings = Findings {
            critical: self.critical_keywords.find_all(&corpus),
            high: self.high_priority_patterns.find_all(&corpus),
            business: self.business_critical_topics.find_all(&corpus),
            medium: self.medium_priority_patterns.find_all(&corpus),
        };

        let priority = findings.priority();
        debug!(priority = %priority, "Oversight evaluated");
        Ok((priority, findings.reason()))
    }

    /// Appends a pending review item when `priority` requires one.
    fn queue_for_review(
        &self,
        payload: &Payload,
        priority: Severity,
        reason: &str,
    ) -> Result<Option<ReviewId>, QueueError> {
        if !priority.requires_review() {
            return Ok(None);
        }

        let id = ReviewId::generate();
        self.queue.append(ReviewItem::pending(
            id.clone(),
            priority,
            reason,
            payload.clone(),
        ))?;
        info!(review_id = %id, priority = %priority, "Request queued for human review");
        Ok(Some(id))
    }

    fn fallback(&self, payload: &Payload, e: &EvaluationError) -> OversightResult {
        let escalation_reason = format!("Error in oversight evaluation: {}", e);

        match self.config.failure_policy {
            FailurePolicy::FailClosed => {
                let review_id =
                    match self.queue_for_review(payload, Severity::High, &escalation_reason) {
                        Ok(id) => id,
                        Err(append_err) => {
                            warn!(
                                error = %append_err,
                                "Could not queue degraded evaluation for review"
                            );
                            None
                        }
                    };

                OversightResult {
                    priority: Severity::High,
                    requires_review: true,
                    escalation_reason,
                    review_id,
                    degraded: true,
                }
            }
            FailurePolicy::FailOpen => OversightResult {
                priority: Severity::Low,
                requires_review: false,
                escalation_reason,
                review_id: None,
                degraded: true,
            },
        }
    }
}

impl std::fmt::Debug for OversightEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OversightEvaluator")
            .field("critical_keywords", &self.critical_keywords.len())
            .field("high_priority_patterns", &self.high_priority_patterns.len())
            .field("medium_priority_patterns", &self.medium_priority_patterns.len())
            .field("business_critical_topics", &self.business_critical_topics.len())
            .field("config", &self.config)
            .finish()
    }
}
