//! Premise → verdict rules (hyperedges).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::verdict::Verdict;

/// A single rule: when every premise holds, the outcome applies.
///
/// Identity is `rule_id`. Rules are immutable once constructed; edits
/// replace the whole rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    rule_id: String,
    premises: BTreeSet<String>,
    outcome: String,
    #[serde(default)]
    note: String,
}

/// Explanation of how a rule relates to a fact set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub is_matched: bool,
    pub matching_premises: Vec<String>,
    pub missing_premises: Vec<String>,
}

impl Rule {
    pub fn new<I, S>(
        rule_id: impl Into<String>,
        premises: I,
        outcome: impl Into<String>,
        note: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rule_id: rule_id.into(),
            premises: premises.into_iter().map(Into::into).collect(),
            outcome: outcome.into(),
            note: note.into(),
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn premises(&self) -> &BTreeSet<String> {
        &self.premises
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// Parsed outcome, or `None` when the outcome is not `Kind(Action)`.
    pub fn verdict(&self) -> Option<Verdict> {
        Verdict::parse(&self.outcome)
    }

    /// True iff every premise is in `facts`.
    pub fn applies_to(&self, facts: &BTreeSet<String>) -> bool {
        self.premises.is_subset(facts)
    }

    /// Splits premises into matching and missing for the given fact set.
    ///
    /// The split is always reported, whether or not the rule matches.
    pub fn matches(&self, facts: &BTreeSet<String>) -> RuleMatch {
        let (matching, missing): (Vec<&String>, Vec<&String>) =
            self.premises.iter().partition(|p| facts.contains(*p));
        RuleMatch {
            is_matched: missing.is_empty(),
            matching_premises: matching.into_iter().cloned().collect(),
            missing_premises: missing.into_iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_premises_are_deduplicated_and_sorted() {
        let rule = Rule::new("r", ["Dx.B", "Dx.A", "Dx.B"], "Allowed(Action.X)", "");
        let premises: Vec<&str> = rule.premises().iter().map(String::as_str).collect();
        assert_eq!(premises, vec!["Dx.A", "Dx.B"]);
    }

    #[test]
    fn test_match_reports_split_when_unmatched() {
        let rule = Rule::new("r", ["Dx.A", "Ctx.GA_>=34w"], "Obligated(Action.X)", "");
        let m = rule.matches(&facts(&["Dx.A", "Dx.Other"]));
        assert!(!m.is_matched);
        assert_eq!(m.matching_premises, vec!["Dx.A"]);
        assert_eq!(m.missing_premises, vec!["Ctx.GA_>=34w"]);
    }

    #[test]
    fn test_match_when_premises_subset() {
        let rule = Rule::new("r", ["Dx.A"], "Obligated(Action.X)", "");
        let m = rule.matches(&facts(&["Dx.A", "Dx.B"]));
        assert!(m.is_matched);
        assert!(m.missing_premises.is_empty());
        assert!(rule.applies_to(&facts(&["Dx.A"])));
    }

    #[test]
    fn test_empty_premises_always_match() {
        let rule = Rule::new("r", Vec::<String>::new(), "Allowed(Action.X)", "");
        assert!(rule.matches(&BTreeSet::new()).is_matched);
    }

    #[test]
    fn test_unparseable_outcome_has_no_verdict() {
        let rule = Rule::new("r", ["Dx.A"], "do something", "");
        assert!(rule.verdict().is_none());
    }
}
