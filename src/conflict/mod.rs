//! Conflict detector
//!
//! Pairwise screening of rule verdicts. Two parsed verdicts conflict when
//! they target the same action with `{Obligated, Rejected}` or
//! `{Allowed, Rejected}`. A conflict is resolvable when one rule's premises
//! are a strict subset of the other's: the more specific rule overrides the
//! more general one at evaluation time. The detector only certifies that
//! such an override relation exists; it never applies it.
//!
//! Unresolvable conflicts block publication.

use serde::{Deserialize, Serialize};

use crate::rules::{Rule, Verdict};

/// A contradictory pair of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictWarning {
    pub rule_a_id: String,
    pub rule_b_id: String,
    pub action: String,
    pub verdict_a: String,
    pub verdict_b: String,
    pub resolvable: bool,
}

impl ConflictWarning {
    /// Human-readable one-liner used in logs and error messages.
    pub fn describe(&self) -> String {
        format!(
            "{} [{}] vs {} [{}] on {}{}",
            self.rule_a_id,
            self.verdict_a,
            self.rule_b_id,
            self.verdict_b,
            self.action,
            if self.resolvable {
                " (resolvable by specificity)"
            } else {
                ""
            }
        )
    }
}

/// Screens every unordered pair of rules with parseable outcomes.
///
/// Warnings are emitted in input order: for rules at positions `i < j`,
/// rule `i` is `rule_a`. O(n²) in rule count.
pub fn detect_conflicts(rules: &[Rule]) -> Vec<ConflictWarning> {
    let parsed: Vec<(&Rule, Verdict)> = rules
        .iter()
        .filter_map(|r| r.verdict().map(|v| (r, v)))
        .collect();

    let mut warnings = Vec::new();
    for (i, (rule_a, verdict_a)) in parsed.iter().enumerate() {
        for (rule_b, verdict_b) in parsed.iter().skip(i + 1) {
            if !verdict_a.conflicts_with(verdict_b) {
                continue;
            }
            let a = rule_a.premises();
            let b = rule_b.premises();
            let resolvable = a != b && (a.is_subset(b) || b.is_subset(a));
            warnings.push(ConflictWarning {
                rule_a_id: rule_a.rule_id().to_string(),
                rule_b_id: rule_b.rule_id().to_string(),
                action: verdict_a.action.clone(),
                verdict_a: verdict_a.to_string(),
                verdict_b: verdict_b.to_string(),
                resolvable,
            });
        }
    }
    warnings
}

/// Returns only the conflicts that cannot be resolved by specificity.
pub fn unresolvable(warnings: &[ConflictWarning]) -> Vec<ConflictWarning> {
    warnings.iter().filter(|w| !w.resolvable).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, premises: &[&str], outcome: &str) -> Rule {
        Rule::new(id, premises.iter().copied(), outcome, "")
    }

    #[test]
    fn test_strict_subset_is_resolvable() {
        let rules = vec![
            rule("specific", &["A", "B"], "Obligated(Action.X)"),
            rule("general", &["A"], "Rejected(Action.X)"),
        ];
        let warnings = detect_conflicts(&rules);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].resolvable);
        assert_eq!(warnings[0].rule_a_id, "specific");
        assert_eq!(warnings[0].action, "Action.X");
        assert_eq!(warnings[0].verdict_b, "Rejected(Action.X)");
    }

    #[test]
    fn test_incomparable_premises_are_unresolvable() {
        let rules = vec![
            rule("r1", &["A", "B"], "Allowed(Action.X)"),
            rule("r2", &["C"], "Rejected(Action.X)"),
        ];
        let warnings = detect_conflicts(&rules);
        assert_eq!(warnings.len(), 1);
        assert!(!warnings[0].resolvable);
        assert_eq!(unresolvable(&warnings).len(), 1);
    }

    #[test]
    fn test_equal_premises_are_unresolvable() {
        let rules = vec![
            rule("r1", &["A"], "Obligated(Action.X)"),
            rule("r2", &["A"], "Rejected(Action.X)"),
        ];
        assert!(!detect_conflicts(&rules)[0].resolvable);
    }

    #[test]
    fn test_non_conflicting_kinds_and_actions_are_ignored() {
        let rules = vec![
            rule("r1", &["A"], "Obligated(Action.X)"),
            rule("r2", &["A"], "Allowed(Action.X)"),
            rule("r3", &["A"], "Disallowed(Action.X)"),
            rule("r4", &["A"], "Rejected(Action.Y)"),
        ];
        assert!(detect_conflicts(&rules).is_empty());
    }

    #[test]
    fn test_unparseable_rules_are_inert() {
        let rules = vec![
            rule("r1", &["A"], "Obligated(Action.X)"),
            rule("r2", &["A"], "Reject Action.X"),
        ];
        assert!(detect_conflicts(&rules).is_empty());
    }

    #[test]
    fn test_describe_mentions_both_rules() {
        let rules = vec![
            rule("r1", &["A"], "Obligated(Action.X)"),
            rule("r2", &["B"], "Rejected(Action.X)"),
        ];
        let text = detect_conflicts(&rules)[0].describe();
        assert!(text.contains("r1"));
        assert!(text.contains("r2"));
        assert!(!text.contains("resolvable"));
    }
}
