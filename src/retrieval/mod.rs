//! Retrieval against the verified runtime
//!
//! Evaluates a fact set against the runtime ruleset of a session and, if
//! a proposed action is given, summarizes how strongly the matched rules
//! support it. Draft rules are never consulted: a session whose runtime
//! is not `verified` is refused.

mod errors;

pub use errors::{RetrievalError, RetrievalResult};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::observability::Event;
use crate::registry::TokenRegistry;
use crate::rules::{Verdict, VerdictKind};
use crate::store::ArtifactStore;

/// One runtime rule evaluated against the request facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEdge {
    pub rule_id: String,
    pub premises: Vec<String>,
    pub outcome: String,
    pub note: String,
    pub is_matched: bool,
    pub matching_premises: Vec<String>,
    pub missing_premises: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    Obligated,
    Allowed,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportSummary {
    pub proposed_action: String,
    pub is_supported: bool,
    pub support_level: SupportLevel,
    pub supporting_rule_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub candidate_count: usize,
    pub matched_count: usize,
    /// Distinct outcomes of matched rules, sorted.
    pub derived_outcomes: Vec<String>,
    pub candidate_edges: Vec<CandidateEdge>,
    pub support: Option<SupportSummary>,
}

fn summarize(action: &str, edges: &[CandidateEdge]) -> SupportSummary {
    let supporting = |kind: VerdictKind| -> Vec<String> {
        let target = Verdict::new(kind, action);
        let mut ids: Vec<String> = edges
            .iter()
            .filter(|e| e.is_matched && Verdict::parse(&e.outcome).as_ref() == Some(&target))
            .map(|e| e.rule_id.clone())
            .collect();
        ids.sort();
        ids
    };

    let (support_level, supporting_rule_ids) = match supporting(VerdictKind::Obligated) {
        ids if !ids.is_empty() => (SupportLevel::Obligated, ids),
        _ => match supporting(VerdictKind::Allowed) {
            ids if !ids.is_empty() => (SupportLevel::Allowed, ids),
            _ => (SupportLevel::Unsupported, Vec::new()),
        },
    };

    SupportSummary {
        proposed_action: action.to_string(),
        is_supported: support_level != SupportLevel::Unsupported,
        support_level,
        supporting_rule_ids,
    }
}

/// Evaluates `facts` against the session's verified runtime.
///
/// Tokens are validated against `registry` before the store is read.
pub fn retrieve(
    store: &ArtifactStore,
    registry: &TokenRegistry,
    facts: &BTreeSet<String>,
    proposed_action: Option<&str>,
) -> RetrievalResult<RetrievalReport> {
    registry.validate_facts(facts)?;
    if let Some(action) = proposed_action {
        registry.validate_action(action)?;
    }

    let (status, runtime) = store.runtime_snapshot()?;
    let runtime = match runtime {
        Some(bundle) if status.is_verified() => bundle,
        _ => {
            warn!(
                event = %Event::RetrievalRefused,
                status = status.status.as_str(),
                "retrieval against unverified runtime"
            );
            return Err(RetrievalError::NotVerified {
                status: status.status,
            });
        }
    };

    let candidate_edges: Vec<CandidateEdge> = runtime
        .ruleset
        .iter()
        .map(|rule| {
            let m = rule.matches(facts);
            CandidateEdge {
                rule_id: rule.rule_id().to_string(),
                premises: rule.premises().iter().cloned().collect(),
                outcome: rule.outcome().to_string(),
                note: rule.note().to_string(),
                is_matched: m.is_matched,
                matching_premises: m.matching_premises,
                missing_premises: m.missing_premises,
            }
        })
        .collect();

    let derived: BTreeSet<&str> = candidate_edges
        .iter()
        .filter(|e| e.is_matched)
        .map(|e| e.outcome.as_str())
        .collect();
    let matched_count = candidate_edges.iter().filter(|e| e.is_matched).count();
    let support = proposed_action.map(|action| summarize(action, &candidate_edges));

    info!(
        event = %Event::RetrievalServed,
        facts = facts.len(),
        candidates = candidate_edges.len(),
        matched = matched_count,
    );

    Ok(RetrievalReport {
        candidate_count: candidate_edges.len(),
        matched_count,
        derived_outcomes: derived.into_iter().map(str::to_string).collect(),
        candidate_edges,
        support,
    })
}
