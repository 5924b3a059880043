//! Verification pipeline
//!
//! Two external verifiers share one bounded subprocess runner:
//!
//! - **lightweight**: a configurable command run on the four JSON
//!   documents of a snapshot
//! - **certificate**: the checker binary compiling `certificate.lean`
//!   against a pre-built support library
//!
//! Problems with the external tool (missing binary, missing support
//! library, timeout, non-zero exit) are reported as a failed
//! [`VerifyResult`], never as an error. Verification has no access to the
//! artifact store.

mod process;
mod standalone;
mod verifiers;

pub use process::{resolve_binary, BoundedCommand, OUTPUT_TAIL_BYTES, TIMEOUT_TAIL_BYTES};
pub use standalone::{verify_artifacts, verify_snapshot_dir, ArtifactDocuments};
pub use verifiers::{
    certificate_timeout, lightweight_timeout, verifier_for, CertificateVerifier,
    LightweightVerifier, Verifier, CERTIFICATE_TIMEOUT_MAX_SECS, CERTIFICATE_TIMEOUT_MIN_SECS,
    LIGHTWEIGHT_TIMEOUT_MAX_SECS, LIGHTWEIGHT_TIMEOUT_MIN_SECS,
};

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    #[default]
    Lightweight,
    Certificate,
}

impl VerifyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyMode::Lightweight => "lightweight",
            VerifyMode::Certificate => "certificate",
        }
    }
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a verification did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    BinaryNotFound,
    SupportLibraryMissing,
    InputMissing,
    TimedOut,
    NonZeroExit,
    SpawnFailed,
}

/// Outcome of one verifier invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub ok: bool,
    /// Process exit code; `-1` when the process never ran, was killed or
    /// ended by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<VerifyFailure>,
}

impl VerifyResult {
    /// A result for a verifier that could not be started.
    pub fn unavailable(failure: VerifyFailure, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: message.into(),
            duration_ms: 0,
            failure: Some(failure),
        }
    }

    pub fn timed_out(&self) -> bool {
        self.failure == Some(VerifyFailure::TimedOut)
    }
}
