//! Publication orchestration
//!
//! ```text
//! candidate ──► conflict gate ──► snapshot dir ──► [certificate] ──► [verify] ──► guarded promotion
//! ```
//!
//! Each stage runs only if the previous one succeeded. Unresolvable
//! conflicts and snapshot I/O failures abort before anything is promoted.
//! A failed or unavailable verifier leaves the files on disk and the store
//! untouched. Publication without verification never promotes.

mod errors;
mod pipeline;

pub use errors::{PublishError, PublishResult};
pub use pipeline::Publisher;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::certificate::InvariantReport;
use crate::conflict::ConflictWarning;
use crate::snapshot::{ManifestFile, SnapshotFile};
use crate::verify::{VerifyMode, VerifyResult};

pub const DEFAULT_TIMEOUT_SECONDS: f64 = 30.0;

fn default_true() -> bool {
    true
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECONDS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(default = "default_true")]
    pub verify: bool,
    #[serde(default)]
    pub mode: VerifyMode,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Recorded as `verified_by`; the candidate's `updated_by` when absent.
    #[serde(default)]
    pub published_by: Option<String>,
}

impl Default for PublishRequest {
    fn default() -> Self {
        Self {
            verify: true,
            mode: VerifyMode::Lightweight,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            published_by: None,
        }
    }
}

impl PublishRequest {
    pub fn without_verification() -> Self {
        Self {
            verify: false,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: VerifyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn published_by(mut self, actor: impl Into<String>) -> Self {
        self.published_by = Some(actor.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    pub directory: PathBuf,
    pub manifest: ManifestFile,
    pub files: BTreeMap<String, SnapshotFile>,
    /// Resolvable conflicts present in the published candidate.
    pub conflicts: Vec<ConflictWarning>,
    pub verify_mode: VerifyMode,
    pub verify_result: Option<VerifyResult>,
    pub certificate_generated: bool,
    pub runtime_promoted: bool,
    /// In-process invariant check; diagnostics only.
    pub precheck: Option<InvariantReport>,
}
