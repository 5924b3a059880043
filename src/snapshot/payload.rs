//! JSON projections written into a snapshot directory
//!
//! - `manifest.json`: candidate manifest plus publication time
//! - `ruleset.json`: facts, actions, domain and rules as `{id, premises, out, source}`
//! - `incompatibility.json`, `infeasibility.json`, `fact_exclusions.json`
//! - `proof_report.json`: the candidate's proof report
//!
//! The four verifier inputs can be read back from an existing snapshot.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules::VerdictKind;
use crate::store::ArtifactBundle;

use super::errors::{SnapshotError, SnapshotResult};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const RULESET_FILE: &str = "ruleset.json";
pub const INCOMPATIBILITY_FILE: &str = "incompatibility.json";
pub const INFEASIBILITY_FILE: &str = "infeasibility.json";
pub const FACT_EXCLUSIONS_FILE: &str = "fact_exclusions.json";
pub const PROOF_REPORT_FILE: &str = "proof_report.json";

const PUBLISH_NOTES: &str = "Published from in-memory kernel artifact store.";
const PREVIEW_NOTE: &str = "Preview snapshot (no persistence guarantees).";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub artifact_source: String,
    pub ruleset_version: String,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    pub change_summary: String,
    pub published_at: DateTime<Utc>,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOut {
    pub kind: VerdictKind,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub id: String,
    pub premises: Vec<String>,
    pub out: RuleOut,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetFile {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    pub rules: Vec<RuleEntry>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairEntry {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompatibilityFile {
    #[serde(default)]
    pub version: String,
    pub pairs: Vec<PairEntry>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfeasibilityRow {
    pub action: String,
    pub premises: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfeasibilityFile {
    #[serde(default)]
    pub version: String,
    pub entries: Vec<InfeasibilityRow>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionGroupRow {
    pub facts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactExclusionsFile {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub groups: Vec<ExclusionGroupRow>,
    #[serde(default)]
    pub notes: String,
}

/// The four documents an external verifier consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierInputs {
    pub ruleset: RulesetFile,
    pub incompatibility: IncompatibilityFile,
    pub infeasibility: InfeasibilityFile,
    pub fact_exclusions: FactExclusionsFile,
}

/// Everything written into one snapshot directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub manifest: ManifestFile,
    #[serde(flatten)]
    pub inputs: VerifierInputs,
    pub proof_report: Value,
}

fn rule_source(bundle: &ArtifactBundle, rule_id: &str, note: &str) -> Option<String> {
    let mut chunks = Vec::new();
    if let Some(prov) = bundle.rule_provenance.get(rule_id) {
        chunks.push(format!("by={}", prov.created_by));
        chunks.push(format!("at={}", prov.created_at.to_rfc3339()));
    }
    if !note.is_empty() {
        chunks.push(note.to_string());
    }
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join(" | "))
    }
}

impl SnapshotPayload {
    /// Projects a candidate bundle.
    ///
    /// Rules whose outcome does not parse as `Kind(Action)` are dropped.
    /// The fact and action universes are collected from the surviving
    /// rules and the infeasibility entries.
    pub fn from_bundle(bundle: &ArtifactBundle, domain: &str, published_at: DateTime<Utc>) -> Self {
        let version = bundle.manifest.ruleset_version.clone();
        let mut facts = BTreeSet::new();
        let mut actions = BTreeSet::new();

        let mut rules = Vec::new();
        for rule in &bundle.ruleset {
            let Some(verdict) = rule.verdict() else {
                continue;
            };
            facts.extend(rule.premises().iter().cloned());
            actions.insert(verdict.action.clone());
            rules.push(RuleEntry {
                id: rule.rule_id().to_string(),
                premises: rule.premises().iter().cloned().collect(),
                out: RuleOut {
                    kind: verdict.kind,
                    action: verdict.action,
                },
                source: rule_source(bundle, rule.rule_id(), rule.note()),
            });
        }
        rules.sort_by(|a, b| a.id.cmp(&b.id));

        let entries: Vec<InfeasibilityRow> = bundle
            .constraints
            .infeasibility
            .iter()
            .map(|entry| {
                actions.insert(entry.action.clone());
                facts.extend(entry.premises.iter().cloned());
                InfeasibilityRow {
                    action: entry.action.clone(),
                    premises: entry.premises.iter().cloned().collect(),
                }
            })
            .collect();

        let notes = if bundle.manifest.change_summary.is_empty() {
            PUBLISH_NOTES.to_string()
        } else {
            bundle.manifest.change_summary.clone()
        };

        SnapshotPayload {
            manifest: ManifestFile {
                artifact_source: bundle.manifest.artifact_source.clone(),
                ruleset_version: version.clone(),
                revision: bundle.manifest.revision,
                updated_at: bundle.manifest.updated_at,
                updated_by: bundle.manifest.updated_by.clone(),
                change_summary: bundle.manifest.change_summary.clone(),
                published_at,
                note: PREVIEW_NOTE.to_string(),
            },
            inputs: VerifierInputs {
                ruleset: RulesetFile {
                    version: version.clone(),
                    domain: domain.to_string(),
                    facts: facts.into_iter().collect(),
                    actions: actions.into_iter().collect(),
                    rules,
                    notes,
                },
                incompatibility: IncompatibilityFile {
                    version: version.clone(),
                    pairs: bundle
                        .constraints
                        .incompatibility
                        .iter()
                        .map(|p| PairEntry {
                            a: p.a.clone(),
                            b: p.b.clone(),
                        })
                        .collect(),
                    notes: PUBLISH_NOTES.to_string(),
                },
                infeasibility: InfeasibilityFile {
                    version: version.clone(),
                    entries,
                    notes: PUBLISH_NOTES.to_string(),
                },
                fact_exclusions: FactExclusionsFile {
                    version,
                    groups: bundle
                        .constraints
                        .fact_exclusions
                        .iter()
                        .map(|g| ExclusionGroupRow {
                            facts: g.facts.iter().cloned().collect(),
                        })
                        .collect(),
                    notes: PUBLISH_NOTES.to_string(),
                },
            },
            proof_report: bundle.proof_report.clone(),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> SnapshotResult<T> {
    let content = fs::read_to_string(path).map_err(|e| SnapshotError::io_error_at_path(path, e))?;
    serde_json::from_str(&content).map_err(|e| SnapshotError::read_error(path, e.to_string()))
}

impl VerifierInputs {
    /// Reads the four verifier documents from a snapshot directory.
    ///
    /// A missing `fact_exclusions.json` means no exclusion groups.
    pub fn read_from_dir(dir: &Path) -> SnapshotResult<Self> {
        let exclusions_path = dir.join(FACT_EXCLUSIONS_FILE);
        let fact_exclusions = if exclusions_path.exists() {
            read_json(&exclusions_path)?
        } else {
            FactExclusionsFile::default()
        };
        Ok(Self {
            ruleset: read_json(&dir.join(RULESET_FILE))?,
            incompatibility: read_json(&dir.join(INCOMPATIBILITY_FILE))?,
            infeasibility: read_json(&dir.join(INFEASIBILITY_FILE))?,
            fact_exclusions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use crate::store::ArtifactStore;

    fn candidate_with(extra: Option<Rule>) -> ArtifactBundle {
        let store = ArtifactStore::new();
        if let Some(rule) = extra {
            store.add_rule(rule, "tester").unwrap();
        }
        store.build_candidate_runtime_bundle().unwrap()
    }

    #[test]
    fn test_unparseable_rules_are_dropped() {
        let bundle = candidate_with(Some(Rule::new(
            "zz_freeform",
            ["Dx.Asthma"],
            "consider delivery",
            "",
        )));
        let payload = SnapshotPayload::from_bundle(&bundle, "obstetrics", Utc::now());
        assert_eq!(payload.inputs.ruleset.rules.len(), bundle.ruleset.len() - 1);
        assert!(!payload.inputs.ruleset.facts.contains(&"Dx.Asthma".to_string()));
    }

    #[test]
    fn test_universe_includes_infeasibility_tokens() {
        let payload = SnapshotPayload::from_bundle(&candidate_with(None), "obstetrics", Utc::now());
        let ruleset = &payload.inputs.ruleset;
        assert!(ruleset.facts.contains(&"Dx.FetalDemise".to_string()));
        assert!(ruleset.facts.contains(&"Ctx.GA_<34w".to_string()));
        assert!(ruleset.actions.contains(&"Action.ExpectantManagement".to_string()));
        let mut sorted = ruleset.facts.clone();
        sorted.sort();
        assert_eq!(ruleset.facts, sorted);
        assert_eq!(ruleset.domain, "obstetrics");
    }

    #[test]
    fn test_rule_source_carries_provenance_and_note() {
        let payload = SnapshotPayload::from_bundle(&candidate_with(None), "obstetrics", Utc::now());
        let rule = &payload.inputs.ruleset.rules[0];
        let source = rule.source.as_deref().unwrap();
        assert!(source.starts_with("by=system | at="));
        assert!(source.ends_with(" | Non-severe early window may allow expectant management."));
    }

    #[test]
    fn test_manifest_uses_camel_case() {
        let payload = SnapshotPayload::from_bundle(&candidate_with(None), "obstetrics", Utc::now());
        let json = serde_json::to_value(&payload.manifest).unwrap();
        assert!(json.get("rulesetVersion").is_some());
        assert!(json.get("publishedAt").is_some());
        assert_eq!(json["revision"], 1);
    }

    #[test]
    fn test_ruleset_out_kind_serializes_as_name() {
        let payload = SnapshotPayload::from_bundle(&candidate_with(None), "obstetrics", Utc::now());
        let json = serde_json::to_value(&payload.inputs.ruleset).unwrap();
        assert_eq!(json["rules"][0]["out"]["kind"], "Allowed");
        assert_eq!(json["rules"][3]["out"]["kind"], "Obligated");
    }
}
