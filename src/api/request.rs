//! API request types
//!
//! One JSON object per request, tagged by `op`. Every session-scoped
//! operation carries a `session` field.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::publish::PublishRequest;
use crate::rules::Rule;
use crate::verify::{ArtifactDocuments, VerifyMode};

use super::errors::{ApiError, ApiResult};

/// Lightweight verification timeout for `verify_artifacts` when none is given.
pub const DEFAULT_ARTIFACT_TIMEOUT_SECONDS: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    // Reads
    GetDraft {
        session: String,
    },
    GetCandidate {
        session: String,
    },
    GetConflicts {
        session: String,
    },
    GetVerificationStatus {
        session: String,
    },
    GetRuntimeRuleset {
        session: String,
    },
    ActiveView {
        session: String,
    },
    RuntimeView {
        session: String,
    },

    // Rules
    ReplaceDraft {
        session: String,
        ruleset_version: String,
        updated_by: String,
        #[serde(default)]
        change_summary: String,
        rules: Vec<Rule>,
    },
    AddRule {
        session: String,
        rule: Rule,
        actor: String,
    },
    UpdateRule {
        session: String,
        rule_id: String,
        rule: Rule,
        actor: String,
    },
    RemoveRule {
        session: String,
        rule_id: String,
        actor: String,
    },

    // Constraints
    AddIncompatibility {
        session: String,
        a: String,
        b: String,
        actor: String,
    },
    UpdateIncompatibility {
        session: String,
        index: usize,
        a: String,
        b: String,
        actor: String,
    },
    RemoveIncompatibility {
        session: String,
        index: usize,
        actor: String,
    },
    AddInfeasibility {
        session: String,
        action: String,
        premises: BTreeSet<String>,
        actor: String,
    },
    UpdateInfeasibility {
        session: String,
        index: usize,
        action: String,
        premises: BTreeSet<String>,
        actor: String,
    },
    RemoveInfeasibility {
        session: String,
        index: usize,
        actor: String,
    },
    AddFactExclusion {
        session: String,
        facts: BTreeSet<String>,
        actor: String,
    },
    UpdateFactExclusion {
        session: String,
        index: usize,
        facts: BTreeSet<String>,
        actor: String,
    },
    RemoveFactExclusion {
        session: String,
        index: usize,
        actor: String,
    },

    // Publication and retrieval
    Publish {
        session: String,
        #[serde(default)]
        verify: Option<bool>,
        #[serde(default)]
        mode: Option<VerifyMode>,
        #[serde(default)]
        timeout_seconds: Option<f64>,
        #[serde(default)]
        published_by: Option<String>,
    },
    Retrieve {
        session: String,
        facts: BTreeSet<String>,
        #[serde(default)]
        proposed_action: Option<String>,
    },
    ListSnapshots {
        session: String,
    },
    VerifyArtifacts {
        ruleset: Value,
        incompatibility: Value,
        infeasibility: Value,
        #[serde(default)]
        fact_exclusions: Option<Value>,
        #[serde(default)]
        timeout_seconds: Option<f64>,
    },

    // Kernel-wide
    Registry,
    Metrics,
    EvictExpired,
}

impl Request {
    /// Every accepted `op` value.
    pub const OPERATIONS: &'static [&'static str] = &[
        "get_draft",
        "get_candidate",
        "get_conflicts",
        "get_verification_status",
        "get_runtime_ruleset",
        "active_view",
        "runtime_view",
        "replace_draft",
        "add_rule",
        "update_rule",
        "remove_rule",
        "add_incompatibility",
        "update_incompatibility",
        "remove_incompatibility",
        "add_infeasibility",
        "update_infeasibility",
        "remove_infeasibility",
        "add_fact_exclusion",
        "update_fact_exclusion",
        "remove_fact_exclusion",
        "publish",
        "retrieve",
        "list_snapshots",
        "verify_artifacts",
        "registry",
        "metrics",
        "evict_expired",
    ];

    /// Parse a request from a JSON string.
    ///
    /// An `op` outside [`Request::OPERATIONS`] is reported as an unknown
    /// operation, anything else malformed as an invalid request.
    pub fn parse(json: &str) -> ApiResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ApiError::invalid_request(format!("Invalid JSON: {}", e)))?;

        let op = value
            .get("op")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ApiError::invalid_request("Missing op"))?;
        if !Self::OPERATIONS.contains(&op.as_str()) {
            return Err(ApiError::unknown_operation(&op));
        }

        serde_json::from_value(value)
            .map_err(|e| ApiError::invalid_request(format!("Invalid {} request: {}", op, e)))
    }

    pub fn op(&self) -> &'static str {
        match self {
            Request::GetDraft { .. } => "get_draft",
            Request::GetCandidate { .. } => "get_candidate",
            Request::GetConflicts { .. } => "get_conflicts",
            Request::GetVerificationStatus { .. } => "get_verification_status",
            Request::GetRuntimeRuleset { .. } => "get_runtime_ruleset",
            Request::ActiveView { .. } => "active_view",
            Request::RuntimeView { .. } => "runtime_view",
            Request::ReplaceDraft { .. } => "replace_draft",
            Request::AddRule { .. } => "add_rule",
            Request::UpdateRule { .. } => "update_rule",
            Request::RemoveRule { .. } => "remove_rule",
            Request::AddIncompatibility { .. } => "add_incompatibility",
            Request::UpdateIncompatibility { .. } => "update_incompatibility",
            Request::RemoveIncompatibility { .. } => "remove_incompatibility",
            Request::AddInfeasibility { .. } => "add_infeasibility",
            Request::UpdateInfeasibility { .. } => "update_infeasibility",
            Request::RemoveInfeasibility { .. } => "remove_infeasibility",
            Request::AddFactExclusion { .. } => "add_fact_exclusion",
            Request::UpdateFactExclusion { .. } => "update_fact_exclusion",
            Request::RemoveFactExclusion { .. } => "remove_fact_exclusion",
            Request::Publish { .. } => "publish",
            Request::Retrieve { .. } => "retrieve",
            Request::ListSnapshots { .. } => "list_snapshots",
            Request::VerifyArtifacts { .. } => "verify_artifacts",
            Request::Registry => "registry",
            Request::Metrics => "metrics",
            Request::EvictExpired => "evict_expired",
        }
    }
}

/// Builds a [`PublishRequest`], taking defaults for absent fields.
pub(crate) fn publish_request(
    verify: Option<bool>,
    mode: Option<VerifyMode>,
    timeout_seconds: Option<f64>,
    published_by: Option<String>,
) -> PublishRequest {
    let defaults = PublishRequest::default();
    PublishRequest {
        verify: verify.unwrap_or(defaults.verify),
        mode: mode.unwrap_or(defaults.mode),
        timeout_seconds: timeout_seconds.unwrap_or(defaults.timeout_seconds),
        published_by,
    }
}

pub(crate) fn artifact_documents(
    ruleset: Value,
    incompatibility: Value,
    infeasibility: Value,
    fact_exclusions: Option<Value>,
) -> ArtifactDocuments {
    ArtifactDocuments {
        ruleset,
        incompatibility,
        infeasibility,
        fact_exclusions,
    }
}
