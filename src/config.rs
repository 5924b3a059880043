//! Kernel configuration
//!
//! Loaded in three layers: built-in defaults, an optional JSON file, then
//! environment overrides. Every JSON field is optional.
//!
//! | field | environment |
//! |---|---|
//! | `artifact_dir` | `KERNEL_ARTIFACT_DIR` |
//! | `verify_command` | `KERNEL_VERIFY_CMD` |
//! | `support_lib_dir` | `KERNEL_SUPPORT_LIB_DIR` |
//! | `checker_binary` | `KERNEL_CHECKER_BIN` |
//! | `domain` | `KERNEL_DOMAIN` |
//! | `session_ttl_secs` | `KERNEL_SESSION_TTL_SECS` |
//! | `token_registry_path` | `KERNEL_TOKEN_REGISTRY` |

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::TokenRegistry;

pub const ENV_ARTIFACT_DIR: &str = "KERNEL_ARTIFACT_DIR";
pub const ENV_VERIFY_CMD: &str = "KERNEL_VERIFY_CMD";
pub const ENV_SUPPORT_LIB_DIR: &str = "KERNEL_SUPPORT_LIB_DIR";
pub const ENV_CHECKER_BIN: &str = "KERNEL_CHECKER_BIN";
pub const ENV_DOMAIN: &str = "KERNEL_DOMAIN";
pub const ENV_SESSION_TTL_SECS: &str = "KERNEL_SESSION_TTL_SECS";
pub const ENV_TOKEN_REGISTRY: &str = "KERNEL_TOKEN_REGISTRY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Runtime configuration of the kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Root directory under which per-session snapshot directories are created.
    pub artifact_dir: PathBuf,
    /// Lightweight verifier, invoked with the four constraint/ruleset files.
    pub verify_command: String,
    /// Pre-built support library for the certificate toolchain.
    pub support_lib_dir: Option<PathBuf>,
    /// Theorem-prover binary that compiles certificates.
    pub checker_binary: String,
    /// Domain label embedded in published rulesets.
    pub domain: String,
    pub session_ttl_secs: u64,
    /// Alternative token registry document; the built-in one when unset.
    pub token_registry_path: Option<PathBuf>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            artifact_dir: std::env::temp_dir().join("rulekernel-artifacts"),
            verify_command: "cohere-verify".to_string(),
            support_lib_dir: None,
            checker_binary: "lean".to_string(),
            domain: "obstetrics".to_string(),
            session_ttl_secs: 7200,
            token_registry_path: None,
        }
    }
}

impl KernelConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from `lookup` and validates the result.
    ///
    /// Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ARTIFACT_DIR) {
            self.artifact_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_VERIFY_CMD) {
            self.verify_command = v.trim().to_string();
        }
        if let Some(v) = get(ENV_SUPPORT_LIB_DIR) {
            self.support_lib_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_CHECKER_BIN) {
            self.checker_binary = v.trim().to_string();
        }
        if let Some(v) = get(ENV_DOMAIN) {
            self.domain = v.trim().to_string();
        }
        if let Some(v) = get(ENV_SESSION_TTL_SECS) {
            self.session_ttl_secs = v.trim().parse().map_err(|_| {
                ConfigError::invalid("session_ttl_secs", format!("not a whole number: {}", v))
            })?;
        }
        if let Some(v) = get(ENV_TOKEN_REGISTRY) {
            self.token_registry_path = Some(PathBuf::from(v));
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.verify_command.trim().is_empty() {
            return Err(ConfigError::invalid("verify_command", "must not be empty"));
        }
        if self.checker_binary.trim().is_empty() {
            return Err(ConfigError::invalid("checker_binary", "must not be empty"));
        }
        if self.domain.trim().is_empty() {
            return Err(ConfigError::invalid("domain", "must not be empty"));
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::invalid("session_ttl_secs", "must be > 0"));
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// The configured token registry, or the built-in one.
    pub fn load_registry(&self) -> Result<Arc<TokenRegistry>, ConfigError> {
        let Some(path) = &self.token_registry_path else {
            return Ok(TokenRegistry::builtin());
        };
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let registry = TokenRegistry::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        Ok(Arc::new(registry))
    }
}
