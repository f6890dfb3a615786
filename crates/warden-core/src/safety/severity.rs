//! Four-step severity scale shared by risk levels and review priorities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a classification or oversight finding.
///
/// Ordered so that `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Nothing of note.
    #[default]
    Low,
    /// Worth a cautionary note.
    Medium,
    /// Serious; needs professional attention or human review.
    High,
    /// Must never be processed automatically.
    Critical,
}

impl Severity {
    /// Returns all severities in ascending order.
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]
    }

    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Parses the wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Returns true if a finding at this severity must be queued for a human.
    pub fn requires_review(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_are_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(Severity::all().iter().max(), Some(&Severity::Critical));
    }

    #[test]
    fn parse_round_trips() {
        for severity in Severity::all() {
            assert_eq!(Severity::parse(severity.as_str()), Some(*severity));
        }
        assert_eq!(Severity::parse("severe"), None);
    }

    #[test]
    fn only_high_and_critical_require_review() {
        assert!(!Severity::Low.requires_review());
        assert!(!Severity::Medium.requires_review());
        assert!(Severity::High.requires_review());
        assert!(Severity::Critical.requires_review());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
