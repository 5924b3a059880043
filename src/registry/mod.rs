//! Token registry
//!
//! The closed vocabulary of fact and action tokens the kernel validates
//! against. The registry is owned by the ontology collaborator; the kernel
//! only reads it. The built-in registry is constructed once on first use
//! and never mutated afterwards. An alternative registry may be loaded
//! from a JSON document `{"facts": [...], "actions": [...]}`.

mod builtin;
mod errors;

pub use errors::{ValidationError, ValidationResult};

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::rules::{Rule, Verdict, VerdictKind};

/// Closed set of valid fact and action tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRegistry {
    facts: BTreeSet<String>,
    actions: BTreeSet<String>,
}

impl TokenRegistry {
    pub fn new<F, A, S, T>(facts: F, actions: A) -> Self
    where
        F: IntoIterator<Item = S>,
        A: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            facts: facts.into_iter().map(Into::into).collect(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    /// The process-wide built-in registry.
    pub fn builtin() -> Arc<TokenRegistry> {
        static BUILTIN: OnceLock<Arc<TokenRegistry>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                let facts = builtin::DIAGNOSIS_FACTS
                    .iter()
                    .chain(builtin::ATTRIBUTE_FACTS)
                    .chain(builtin::CONTEXT_FACTS)
                    .chain(builtin::BUCKET_FACTS)
                    .copied();
                Arc::new(TokenRegistry::new(facts, builtin::ACTIONS.iter().copied()))
            })
            .clone()
    }

    /// Parses a registry document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn facts(&self) -> &BTreeSet<String> {
        &self.facts
    }

    pub fn actions(&self) -> &BTreeSet<String> {
        &self.actions
    }

    pub fn verdict_kinds(&self) -> [VerdictKind; 4] {
        VerdictKind::ALL
    }

    pub fn is_fact(&self, token: &str) -> bool {
        self.facts.contains(token)
    }

    pub fn is_action(&self, token: &str) -> bool {
        self.actions.contains(token)
    }

    /// Rejects any token not in the fact vocabulary, listing all of them.
    pub fn validate_facts<'a, I>(&self, tokens: I) -> ValidationResult<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let unknown: BTreeSet<String> = tokens
            .into_iter()
            .filter(|t| !self.is_fact(t))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::UnknownFactTokens {
                tokens: unknown.into_iter().collect(),
            })
        }
    }

    pub fn validate_action(&self, token: &str) -> ValidationResult<()> {
        if self.is_action(token) {
            Ok(())
        } else {
            Err(ValidationError::UnknownActionToken {
                token: token.to_string(),
            })
        }
    }

    /// Parses an outcome and checks its action against the vocabulary.
    pub fn validate_outcome(&self, outcome: &str) -> ValidationResult<Verdict> {
        let verdict = Verdict::parse(outcome).ok_or_else(|| ValidationError::MalformedOutcome {
            outcome: outcome.to_string(),
        })?;
        if !self.is_action(&verdict.action) {
            return Err(ValidationError::UnknownOutcomeAction {
                outcome: outcome.to_string(),
                action: verdict.action,
            });
        }
        Ok(verdict)
    }

    /// Full admission check for a rule entering the draft.
    pub fn validate_rule(&self, rule: &Rule) -> ValidationResult<()> {
        if rule.rule_id().trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier { field: "rule_id" });
        }
        self.validate_facts(rule.premises())?;
        self.validate_outcome(rule.outcome())?;
        Ok(())
    }

    pub fn validate_incompatibility(&self, a: &str, b: &str) -> ValidationResult<()> {
        self.validate_action(a)?;
        self.validate_action(b)?;
        if a == b {
            return Err(ValidationError::SelfIncompatibility {
                action: a.to_string(),
            });
        }
        Ok(())
    }

    pub fn validate_infeasibility(
        &self,
        action: &str,
        premises: &BTreeSet<String>,
    ) -> ValidationResult<()> {
        self.validate_action(action)?;
        self.validate_facts(premises)
    }

    pub fn validate_fact_exclusion(&self, facts: &BTreeSet<String>) -> ValidationResult<()> {
        if facts.is_empty() {
            return Err(ValidationError::EmptyTokenSet { field: "facts" });
        }
        self.validate_facts(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_is_shared() {
        let a = TokenRegistry::builtin();
        let b = TokenRegistry::builtin();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_fact("Dx.Preeclampsia"));
        assert!(a.is_fact("Ctx.GA_<34w"));
        assert!(a.is_action("Action.ImmediateDelivery"));
    }

    #[test]
    fn test_unknown_facts_are_all_reported() {
        let registry = TokenRegistry::builtin();
        let err = registry
            .validate_facts(&set(&["Dx.Preeclampsia", "Dx.Zzz", "Ctx.Aaa"]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownFactTokens {
                tokens: vec!["Ctx.Aaa".into(), "Dx.Zzz".into()]
            }
        );
    }

    #[test]
    fn test_outcome_validation() {
        let registry = TokenRegistry::builtin();
        assert!(registry
            .validate_outcome("Allowed(Action.ExpectantManagement)")
            .is_ok());
        assert!(matches!(
            registry.validate_outcome("Allowed Action.ExpectantManagement"),
            Err(ValidationError::MalformedOutcome { .. })
        ));
        assert!(matches!(
            registry.validate_outcome("Allowed(Action.Teleport)"),
            Err(ValidationError::UnknownOutcomeAction { .. })
        ));
    }

    #[test]
    fn test_rule_requires_identifier() {
        let registry = TokenRegistry::builtin();
        let rule = Rule::new("  ", ["Dx.Preeclampsia"], "Allowed(Action.ExpectantManagement)", "");
        assert_eq!(
            registry.validate_rule(&rule),
            Err(ValidationError::EmptyIdentifier { field: "rule_id" })
        );
    }

    #[test]
    fn test_self_incompatibility_rejected() {
        let registry = TokenRegistry::builtin();
        assert!(matches!(
            registry.validate_incompatibility("Action.ExpeditedDelivery", "Action.ExpeditedDelivery"),
            Err(ValidationError::SelfIncompatibility { .. })
        ));
    }

    #[test]
    fn test_fact_exclusion_needs_facts() {
        let registry = TokenRegistry::builtin();
        assert!(registry.validate_fact_exclusion(&BTreeSet::new()).is_err());
        assert!(registry
            .validate_fact_exclusion(&set(&["Ctx.GA_<34w", "Ctx.GA_>=34w"]))
            .is_ok());
    }

    #[test]
    fn test_from_json() {
        let registry =
            TokenRegistry::from_json(r#"{"facts": ["F.One"], "actions": ["Act.One"]}"#).unwrap();
        assert!(registry.is_fact("F.One"));
        assert!(!registry.is_fact("Dx.Preeclampsia"));
        assert!(registry.is_action("Act.One"));
    }
}
