//! Tiered content classifier.
//!
//! Three rule tiers are checked against the flattened corpus. The highest tier
//! with any hit decides the risk level, and only that tier's hits are reported:
//!
//! 1. Prohibited topics → `critical` (blocked)
//! 2. High-risk keywords → `high` (annotated)
//! 3. Medium-risk patterns → `medium` (annotated)
//!
//! Anything else is `low` and passes through untouched.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use super::rules::{
    PatternRules, TermRules, HIGH_RISK_KEYWORDS, MEDIUM_RISK_PATTERNS, PROHIBITED_TOPICS,
};
use super::{check_corpus_size, EvaluationError, FailurePolicy, Severity, DEFAULT_MAX_CORPUS_BYTES};
use crate::payload::{extract_text, Payload};

/// Key under which risk annotations are attached to a payload.
pub const SAFETY_WARNINGS_KEY: &str = "_safety_warnings";

/// Configuration for the content classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Result to report when classification itself fails.
    /// Default: fail open.
    pub failure_policy: FailurePolicy,
    /// Largest corpus the classifier will scan.
    pub max_corpus_bytes: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::FailOpen,
            max_corpus_bytes: DEFAULT_MAX_CORPUS_BYTES,
        }
    }
}

impl ClassifierConfig {
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

/// Result of classifying a request payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Overall risk level.
    pub risk_level: Severity,
    /// Findings from the deciding tier, in table order.
    pub flagged_issues: Vec<String>,
    /// Whether the request may be dispatched.
    pub is_safe: bool,
    /// True when this result was produced by the failure policy.
    #[serde(default)]
    pub degraded: bool,
    /// Payload to hand to the handler: unchanged, annotated, or a block notice.
    #[serde(skip)]
    pub filtered_content: Payload,
}

impl ClassificationResult {
    /// Returns true if the request must not reach a handler.
    pub fn is_blocked(&self) -> bool {
        self.risk_level == Severity::Critical
    }
}

/// Rule-based content classifier.
///
/// Immutable after construction, so one instance can be shared across any
/// number of concurrent requests.
#[derive(Debug, Clone)]
pub struct ContentClassifier {
    prohibited_topics: TermRules,
    high_risk_keywords: TermRules,
    medium_risk_patterns: PatternRules,
    config: ClassifierConfig,
}

impl ContentClassifier {
    /// Creates a classifier with the built-in rule tables.
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            prohibited_topics: TermRules::new(PROHIBITED_TOPICS),
            high_risk_keywords: TermRules::new(HIGH_RISK_KEYWORDS),
            medium_risk_patterns: PatternRules::builtin(MEDIUM_RISK_PATTERNS),
            config,
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Returns the user-facing escalation message for a risk level.
    pub fn escalation_message(level: Severity) -> &'static str {
        match level {
            Severity::Critical => {
                "This request requires immediate human review. Please contact support."
            }
            Severity::High => {
                "This topic requires professional assistance. Please consult appropriate experts."
            }
            Severity::Medium => {
                "For this topic, consider consulting with qualified professionals."
            }
            Severity::Low => "Proceed with caution and within appropriate boundaries.",
        }
    }

    /// Classifies a payload. Never fails; see [`FailurePolicy`].
    pub fn classify(&self, payload: &Payload) -> ClassificationResult {
        let start = Instant::now();

        match self.try_classify(payload) {
            Ok(result) => {
                debug!(
                    risk_level = %result.risk_level,
                    issues = result.flagged_issues.len(),
                    duration_us = start.elapsed().as_micros() as u64,
                    "Content classified"
                );
                result
            }
            Err(e) => {
                error!(
                    error = %e,
                    policy = self.config.failure_policy.name(),
                    "Content classification failed"
                );
                self.fallback(payload, &e)
            }
        }
    }

    /// Classifies a payload, surfacing internal faults.
    pub fn try_classify(&self, payload: &Payload) -> Result<ClassificationResult, EvaluationError> {
        let corpus = extract_text(payload);
        check_corpus_size(&corpus, self.config.max_corpus_bytes)?;

        let (risk_level, flagged_issues) = self.scan(&corpus);
        let filtered_content = filter_content(payload, risk_level, &flagged_issues);

        Ok(ClassificationResult {
            risk_level,
            is_safe: !matches!(risk_level, Severity::High | Severity::Critical),
            flagged_issues,
            degraded: false,
            filtered_content,
        })
    }

    /// Runs the tiers in priority order and stops at the first with hits.
    fn scan(&self, corpus: &str) -> (Severity, Vec<String>) {
        let prohibited = self.prohibited_topics.find_all(corpus);
        if !prohibited.is_empty() {
            let issues = prohibited
                .into_iter()
                .map(|t| format!("Prohibited topic detected: {}", t))
                .collect();
            return (Severity::Critical, issues);
        }

        let keywords = self.high_risk_keywords.find_all(corpus);
        if !keywords.is_empty() {
            let issues = keywords
                .into_iter()
                .map(|k| format!("High-risk keyword detected: {}", k))
                .collect();
            return (Severity::High, issues);
        }

        let patterns = self.medium_risk_patterns.find_all(corpus);
        if !patterns.is_empty() {
            let issues = patterns
                .into_iter()
                .map(|p| format!("Medium-risk pattern detected: {}", p))
                .collect();
            return (Severity::Medium, issues);
        }

        (Severity::Low, Vec::new())
    }

    fn fallback(&self, payload: &Payload, e: &EvaluationError) -> ClassificationResult {
        let flagged_issues = vec![format!("Classification error: {}", e)];

        match self.config.failure_policy {
            FailurePolicy::FailOpen => ClassificationResult {
                risk_level: Severity::Low,
                flagged_issues,
                is_safe: true,
                degraded: true,
                filtered_content: payload.clone(),
            },
            FailurePolicy::FailClosed => {
                let filtered_content = filter_content(payload, Severity::Critical, &flagged_issues);
                ClassificationResult {
                    risk_level: Severity::Critical,
                    flagged_issues,
                    is_safe: false,
                    degraded: true,
                    filtered_content,
                }
            }
        }
    }
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// Produces the payload a handler would see for the given risk level.
fn filter_content(payload: &Payload, level: Severity, issues: &[String]) -> Payload {
    let message = ContentClassifier::escalation_message(level);

    match level {
        Severity::Critical => Payload::from(json!({
            "error": "Request blocked due to prohibited content",
            "escalation_message": message,
            "flagged_issues": issues,
        })),
        Severity::High | Severity::Medium => {
            let warnings = Payload::from(json!({
                "risk_level": level.as_str(),
                "escalation_message": message,
                "flagged_issues": issues,
            }));

            let mut annotated = if payload.is_map() {
                payload.clone()
            } else {
                Payload::Map(vec![("content".to_string(), payload.clone())])
            };
            annotated.insert(SAFETY_WARNINGS_KEY, warnings);
            annotated
        }
        Severity::Low => payload.clone(),
    }
}
