//! Compiled-in rule tables and the matchers that scan a corpus against them.
//!
//! Both matchers report hits in table order, which is the order the
//! classifier and evaluator use when listing findings.

use regex::{RegexSet, RegexSetBuilder};

/// Advisory domains the service must never answer. Matched in identifier form.
pub const PROHIBITED_TOPICS: &[&str] = &[
    "financial_advice",
    "legal_advice",
    "medical_advice",
    "tax_advice",
    "investment_advice",
    "health_advice",
];

/// Keywords that mark a request as high risk for the content classifier.
pub const HIGH_RISK_KEYWORDS: &[&str] = &[
    "suicide",
    "self-harm",
    "kill myself",
    "end my life",
    "emergency",
    "crisis",
    "urgent help",
    "immediate danger",
    "illegal",
    "criminal",
    "fraud",
    "scam",
    "hack",
    "personal information",
    "social security",
    "credit card",
];

/// Patterns that mark a request as medium risk for the content classifier.
pub const MEDIUM_RISK_PATTERNS: &[&str] = &[
    r"invest.*money",
    r"financial.*advice",
    r"legal.*advice",
    r"medical.*condition",
    r"financial.*planning",
    r"tax.*return",
];

/// Keywords that always put a request in front of a human reviewer.
pub const CRITICAL_OVERSIGHT_KEYWORDS: &[&str] = &[
    "suicide",
    "self-harm",
    "kill myself",
    "end my life",
    "want to die",
    "emergency",
    "crisis",
    "urgent help",
    "immediate danger",
    "illegal",
    "criminal",
    "fraud",
    "scam",
    "hack",
    "steal",
    "personal information",
    "social security",
    "credit card",
    "bank account",
];

/// First-person distress phrasing that warrants high-priority review.
pub const HIGH_PRIORITY_PATTERNS: &[&str] = &[
    r"i want to.*die",
    r"i'm going to.*kill",
    r"i need.*help.*urgently",
    r"i'm in.*crisis",
    r"i'm going to.*hurt.*myself",
    r"i want to.*end.*life",
    r"i'm thinking of.*suicide",
];

/// Softer distress phrasing that may benefit from review.
pub const MEDIUM_PRIORITY_PATTERNS: &[&str] = &[
    r"i'm struggling.*mentally",
    r"i feel.*hopeless",
    r"i don't know.*what to do",
    r"i'm overwhelmed",
    r"i need.*professional.*help",
    r"i'm having.*thoughts.*of",
];

/// High-stakes business domains that need a human in the loop. Matched in
/// identifier form and in prose form (`legal_advice`, `legal advice`).
pub const BUSINESS_CRITICAL_TOPICS: &[&str] = &[
    "financial_advice",
    "legal_advice",
    "investment_advice",
    "tax_advice",
    "regulatory_compliance",
    "intellectual_property",
    "contract_negotiation",
];

/// Plain substring matcher over a lowercase corpus.
///
/// Each entry is reported under its table name, but may match through any of
/// its spellings.
#[derive(Debug, Clone)]
pub struct TermRules {
    terms: Vec<(String, Vec<String>)>,
}

impl TermRules {
    /// Builds a matcher from a term table. Terms are lowercased once here.
    pub fn new(terms: &[&str]) -> Self {
        Self {
            terms: terms
                .iter()
                .map(|t| {
                    let term = t.to_lowercase();
                    (term.clone(), vec![term])
                })
                .collect(),
        }
    }

    /// Builds a matcher for identifier-style terms that also matches their
    /// prose spelling, with underscores read as spaces.
    pub fn with_prose_forms(terms: &[&str]) -> Self {
        Self {
            terms: terms
                .iter()
                .map(|t| {
                    let term = t.to_lowercase();
                    let mut forms = vec![term.clone()];
                    let prose = term.replace('_', " ");
                    if prose != term {
                        forms.push(prose);
                    }
                    (term, forms)
                })
                .collect(),
        }
    }

    /// Returns every term contained in `corpus`, in table order.
    pub fn find_all(&self, corpus: &str) -> Vec<&str> {
        self.terms
            .iter()
            .filter(|(_, forms)| forms.iter().any(|form| corpus.contains(form.as_str())))
            .map(|(term, _)| term.as_str())
            .collect()
    }

    /// Returns the number of terms in the table.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Case-insensitive regex matcher.
///
/// Uses a [`RegexSet`] so the whole table is checked in a single pass.
#[derive(Debug, Clone)]
pub struct PatternRules {
    regex_set: RegexSet,
    patterns: Vec<String>,
}

impl PatternRules {
    /// Compiles a pattern table.
    pub fn new(patterns: &[&str]) -> Result<Self, regex::Error> {
        let regex_set = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            regex_set,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Compiles one of the built-in tables.
    pub(crate) fn builtin(patterns: &[&str]) -> Self {
        Self::new(patterns).expect("Invalid built-in regex patterns")
    }

    /// Returns the source text of every pattern matching `corpus`, in table order.
    pub fn find_all(&self, corpus: &str) -> Vec<&str> {
        self.regex_set
            .matches(corpus)
            .into_iter()
            .map(|idx| self.patterns[idx].as_str())
            .collect()
    }

    /// Returns the number of patterns in the table.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_compile() {
        for table in [
            MEDIUM_RISK_PATTERNS,
            HIGH_PRIORITY_PATTERNS,
            MEDIUM_PRIORITY_PATTERNS,
        ] {
            let rules = PatternRules::new(table).unwrap();
            assert_eq!(rules.len(), table.len());
        }
    }

    #[test]
    fn term_rules_report_in_table_order() {
        let rules = TermRules::new(&["alpha", "beta", "gamma"]);
        let hits = rules.find_all("gamma then alpha");
        assert_eq!(hits, vec!["alpha", "gamma"]);
    }

    #[test]
    fn term_rules_lowercase_the_table() {
        let rules = TermRules::new(&["Credit Card"]);
        assert_eq!(rules.find_all("my credit card number"), vec!["credit card"]);
    }

    #[test]
    fn pattern_rules_report_in_table_order() {
        let rules = PatternRules::new(&[r"b.*c", r"a.*b"]).unwrap();
        assert_eq!(rules.find_all("a b c"), vec![r"b.*c", r"a.*b"]);
        assert!(rules.find_all("nothing").is_empty());
    }

    #[test]
    fn pattern_rules_ignore_case() {
        let rules = PatternRules::new(&[r"invest.*money"]).unwrap();
        assert_eq!(rules.find_all("INVEST my MONEY").len(), 1);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(PatternRules::new(&["(unclosed"]).is_err());
    }

    #[test]
    fn prohibited_topics_match_identifier_form_only() {
        let rules = TermRules::new(PROHIBITED_TOPICS);
        assert_eq!(
            rules.find_all("requested: financial_advice"),
            vec!["financial_advice"]
        );
        assert!(rules.find_all("i need financial advice").is_empty());
    }

    #[test]
    fn prose_forms_report_the_identifier() {
        let rules = TermRules::with_prose_forms(BUSINESS_CRITICAL_TOPICS);
        assert_eq!(
            rules.find_all("help with regulatory compliance and intellectual property"),
            vec!["regulatory_compliance", "intellectual_property"]
        );
        assert_eq!(rules.find_all("re: legal_advice"), vec!["legal_advice"]);
        assert_eq!(
            rules.find_all("legal advice, again: legal_advice"),
            vec!["legal_advice"]
        );
        assert!(rules.find_all("a legal question").is_empty());
    }
}
