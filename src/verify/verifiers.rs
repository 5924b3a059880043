use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::certificate::CERTIFICATE_FILE;
use crate::config::KernelConfig;
use crate::observability::{Event, ObservationScope};
use crate::snapshot::verifier_input_paths;

use super::process::{resolve_binary, BoundedCommand};
use super::{VerifyFailure, VerifyMode, VerifyResult};

pub const LIGHTWEIGHT_TIMEOUT_MIN_SECS: f64 = 0.1;
pub const LIGHTWEIGHT_TIMEOUT_MAX_SECS: f64 = 120.0;
pub const CERTIFICATE_TIMEOUT_MIN_SECS: f64 = 180.0;
pub const CERTIFICATE_TIMEOUT_MAX_SECS: f64 = 1800.0;

fn clamp_secs(requested: f64, min: f64, max: f64) -> Duration {
    let secs = if requested.is_finite() {
        requested.clamp(min, max)
    } else {
        max
    };
    Duration::from_secs_f64(secs)
}

pub fn lightweight_timeout(requested: f64) -> Duration {
    clamp_secs(requested, LIGHTWEIGHT_TIMEOUT_MIN_SECS, LIGHTWEIGHT_TIMEOUT_MAX_SECS)
}

pub fn certificate_timeout(requested: f64) -> Duration {
    clamp_secs(requested, CERTIFICATE_TIMEOUT_MIN_SECS, CERTIFICATE_TIMEOUT_MAX_SECS)
}

/// An external check over a directory laid out like a snapshot.
pub trait Verifier {
    fn mode(&self) -> VerifyMode;

    /// Runs the check. `timeout_seconds` is clamped to the verifier's range.
    fn verify(&self, dir: &Path, timeout_seconds: f64) -> VerifyResult;
}

fn observed(mode: VerifyMode, dir: &Path, run: impl FnOnce() -> VerifyResult) -> VerifyResult {
    let scope = ObservationScope::new(Event::Verify, format!("{}:{}", mode, dir.display()));
    let result = run();
    if result.ok {
        scope.complete("passed");
    } else {
        let reason = match result.failure {
            Some(VerifyFailure::BinaryNotFound) => "binary_not_found",
            Some(VerifyFailure::SupportLibraryMissing) => "support_library_missing",
            Some(VerifyFailure::InputMissing) => "input_missing",
            Some(VerifyFailure::TimedOut) => "timed_out",
            Some(VerifyFailure::SpawnFailed) => "spawn_failed",
            Some(VerifyFailure::NonZeroExit) | None => "rejected",
        };
        scope.fail(reason);
    }
    result
}

/// Runs `command ruleset.json incompatibility.json infeasibility.json fact_exclusions.json`.
#[derive(Debug, Clone)]
pub struct LightweightVerifier {
    command: String,
}

impl LightweightVerifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Verifier for LightweightVerifier {
    fn mode(&self) -> VerifyMode {
        VerifyMode::Lightweight
    }

    fn verify(&self, dir: &Path, timeout_seconds: f64) -> VerifyResult {
        observed(self.mode(), dir, || {
            let Some(program) = resolve_binary(&self.command) else {
                warn!(
                    event = %Event::VerifyUnavailable,
                    command = %self.command,
                    "verifier binary not found"
                );
                return VerifyResult::unavailable(
                    VerifyFailure::BinaryNotFound,
                    format!(
                        "Verifier binary not found: '{}'. Install it or set KERNEL_VERIFY_CMD.",
                        self.command
                    ),
                );
            };
            BoundedCommand::new(program, lightweight_timeout(timeout_seconds))
                .args(verifier_input_paths(dir))
                .run()
        })
    }
}

/// Compiles `certificate.lean` with the checker binary. The support
/// library's build output is put on `LEAN_PATH`.
#[derive(Debug, Clone)]
pub struct CertificateVerifier {
    checker_binary: String,
    support_lib_dir: Option<PathBuf>,
}

impl CertificateVerifier {
    pub fn new(checker_binary: impl Into<String>, support_lib_dir: Option<PathBuf>) -> Self {
        Self {
            checker_binary: checker_binary.into(),
            support_lib_dir,
        }
    }

    fn library_path(lib: &Path) -> PathBuf {
        lib.join(".lake").join("build").join("lib")
    }
}

impl Verifier for CertificateVerifier {
    fn mode(&self) -> VerifyMode {
        VerifyMode::Certificate
    }

    fn verify(&self, dir: &Path, timeout_seconds: f64) -> VerifyResult {
        observed(self.mode(), dir, || {
            let lib = match &self.support_lib_dir {
                Some(lib) if lib.is_dir() => lib,
                other => {
                    warn!(
                        event = %Event::VerifyUnavailable,
                        support_lib_dir = ?other,
                        "support library not available"
                    );
                    return VerifyResult::unavailable(
                        VerifyFailure::SupportLibraryMissing,
                        "Support library not set or not found (KERNEL_SUPPORT_LIB_DIR). \
                         Certificate verification skipped.",
                    );
                }
            };
            let Some(checker) = resolve_binary(&self.checker_binary) else {
                warn!(
                    event = %Event::VerifyUnavailable,
                    checker = %self.checker_binary,
                    "checker binary not found"
                );
                return VerifyResult::unavailable(
                    VerifyFailure::BinaryNotFound,
                    format!(
                        "Checker binary '{}' not found. Certificate verification skipped.",
                        self.checker_binary
                    ),
                );
            };
            let certificate = dir.join(CERTIFICATE_FILE);
            if !certificate.is_file() {
                return VerifyResult::unavailable(
                    VerifyFailure::InputMissing,
                    format!("Certificate not found: {}", certificate.display()),
                );
            }
            BoundedCommand::new(checker, certificate_timeout(timeout_seconds))
                .arg(certificate)
                .env("LEAN_PATH", Self::library_path(lib))
                .run()
        })
    }
}

/// The configured verifier for `mode`.
pub fn verifier_for(mode: VerifyMode, config: &KernelConfig) -> Box<dyn Verifier> {
    match mode {
        VerifyMode::Lightweight => Box::new(LightweightVerifier::new(config.verify_command.clone())),
        VerifyMode::Certificate => Box::new(CertificateVerifier::new(
            config.checker_binary.clone(),
            config.support_lib_dir.clone(),
        )),
    }
}
