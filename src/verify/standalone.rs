//! Verification outside of publication.
//!
//! Inputs are staged into a fresh temporary directory under the standard
//! snapshot file names and the directory is removed afterwards. Nothing
//! here touches a session store.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::certificate::{generate_certificate, CertificateInput, CERTIFICATE_FILE};
use crate::config::KernelConfig;
use crate::snapshot::{
    write_json_documents, SnapshotError, SnapshotResult, VerifierInputs, FACT_EXCLUSIONS_FILE,
    INCOMPATIBILITY_FILE, INFEASIBILITY_FILE, RULESET_FILE,
};

use super::verifiers::{verifier_for, LightweightVerifier, Verifier};
use super::{VerifyMode, VerifyResult};

/// Caller-supplied verifier documents, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDocuments {
    pub ruleset: Value,
    pub incompatibility: Value,
    pub infeasibility: Value,
    #[serde(default)]
    pub fact_exclusions: Option<Value>,
}

fn staging_dir() -> SnapshotResult<TempDir> {
    tempfile::Builder::new()
        .prefix("rulekernel-verify-")
        .tempdir()
        .map_err(|e| SnapshotError::io_error("Failed to create staging directory", e))
}

fn to_value(what: &str, value: &impl Serialize) -> SnapshotResult<Value> {
    serde_json::to_value(value).map_err(|e| SnapshotError::serialize_error(what, e))
}

/// Runs the lightweight verifier on `documents`.
///
/// A missing fact-exclusions document is staged as `{"groups": []}`.
pub fn verify_artifacts(
    config: &KernelConfig,
    documents: &ArtifactDocuments,
    timeout_seconds: f64,
) -> SnapshotResult<VerifyResult> {
    let staging = staging_dir()?;
    let exclusions = documents
        .fact_exclusions
        .clone()
        .unwrap_or_else(|| json!({ "groups": [] }));
    write_json_documents(
        staging.path(),
        &[
            (RULESET_FILE, &documents.ruleset),
            (INCOMPATIBILITY_FILE, &documents.incompatibility),
            (INFEASIBILITY_FILE, &documents.infeasibility),
            (FACT_EXCLUSIONS_FILE, &exclusions),
        ],
    )?;
    let verifier = LightweightVerifier::new(config.verify_command.clone());
    Ok(verifier.verify(staging.path(), timeout_seconds))
}

/// Re-verifies an existing snapshot directory without modifying it.
///
/// In certificate mode the certificate is regenerated from the snapshot's
/// documents.
pub fn verify_snapshot_dir(
    config: &KernelConfig,
    snapshot_dir: &Path,
    mode: VerifyMode,
    timeout_seconds: f64,
) -> SnapshotResult<VerifyResult> {
    let inputs = VerifierInputs::read_from_dir(snapshot_dir)?;
    let staging = staging_dir()?;
    let ruleset = to_value("ruleset", &inputs.ruleset)?;
    let incompatibility = to_value("incompatibility", &inputs.incompatibility)?;
    let infeasibility = to_value("infeasibility", &inputs.infeasibility)?;
    let exclusions = to_value("fact exclusions", &inputs.fact_exclusions)?;
    write_json_documents(
        staging.path(),
        &[
            (RULESET_FILE, &ruleset),
            (INCOMPATIBILITY_FILE, &incompatibility),
            (INFEASIBILITY_FILE, &infeasibility),
            (FACT_EXCLUSIONS_FILE, &exclusions),
        ],
    )?;
    if mode == VerifyMode::Certificate {
        let path = staging.path().join(CERTIFICATE_FILE);
        let source = generate_certificate(&CertificateInput::from(&inputs));
        std::fs::write(&path, source).map_err(|e| SnapshotError::io_error_at_path(&path, e))?;
    }
    Ok(verifier_for(mode, config).verify(staging.path(), timeout_seconds))
}
