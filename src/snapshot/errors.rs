//! Snapshot error types
//!
//! Error codes:
//! - KERNEL_SNAPSHOT_EXISTS: target directory already exists
//! - KERNEL_SNAPSHOT_IO: file system failure while writing or listing
//! - KERNEL_SNAPSHOT_SERIALIZE: JSON projection could not be produced
//! - KERNEL_SNAPSHOT_READ: an existing snapshot could not be read back

use std::fmt;
use std::io;
use std::path::Path;

/// Snapshot-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotErrorCode {
    SnapshotExists,
    SnapshotIo,
    SnapshotSerialize,
    SnapshotRead,
}

impl SnapshotErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotErrorCode::SnapshotExists => "KERNEL_SNAPSHOT_EXISTS",
            SnapshotErrorCode::SnapshotIo => "KERNEL_SNAPSHOT_IO",
            SnapshotErrorCode::SnapshotSerialize => "KERNEL_SNAPSHOT_SERIALIZE",
            SnapshotErrorCode::SnapshotRead => "KERNEL_SNAPSHOT_READ",
        }
    }

    /// HTTP-like status for callers that need one
    pub fn status_code(&self) -> u16 {
        match self {
            SnapshotErrorCode::SnapshotExists => 409,
            SnapshotErrorCode::SnapshotIo => 500,
            SnapshotErrorCode::SnapshotSerialize => 500,
            SnapshotErrorCode::SnapshotRead => 400,
        }
    }
}

impl fmt::Display for SnapshotErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Snapshot error with code, message and optional I/O source
#[derive(Debug)]
pub struct SnapshotError {
    code: SnapshotErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl SnapshotError {
    fn new(code: SnapshotErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source,
        }
    }

    /// The snapshot directory is already present; nothing was overwritten.
    pub fn already_exists(path: &Path) -> Self {
        Self::new(
            SnapshotErrorCode::SnapshotExists,
            format!("Snapshot directory already exists: {}", path.display()),
            None,
        )
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(SnapshotErrorCode::SnapshotIo, message, Some(source))
    }

    pub fn io_error_at_path(path: &Path, source: io::Error) -> Self {
        Self::new(
            SnapshotErrorCode::SnapshotIo,
            format!("I/O error at path: {}", path.display()),
            Some(source),
        )
    }

    pub fn serialize_error(what: &str, err: serde_json::Error) -> Self {
        Self::new(
            SnapshotErrorCode::SnapshotSerialize,
            format!("Failed to serialize {}: {}", what, err),
            None,
        )
    }

    pub fn read_error(path: &Path, message: impl Into<String>) -> Self {
        Self::new(
            SnapshotErrorCode::SnapshotRead,
            format!("Cannot read {}: {}", path.display(), message.into()),
            None,
        )
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn code(&self) -> SnapshotErrorCode {
        self.code
    }

    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SnapshotErrorCode::SnapshotExists.code(), "KERNEL_SNAPSHOT_EXISTS");
        assert_eq!(SnapshotErrorCode::SnapshotIo.status_code(), 500);
        assert_eq!(SnapshotErrorCode::SnapshotRead.status_code(), 400);
    }

    #[test]
    fn test_display_includes_path_and_source() {
        let err = SnapshotError::io_error_at_path(
            Path::new("/snapshots/v1--r2--20260101T000000Z/ruleset.json"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        )
        .with_details("writing ruleset");
        let text = err.to_string();
        assert!(text.contains("KERNEL_SNAPSHOT_IO"));
        assert!(text.contains("ruleset.json"));
        assert!(text.contains("writing ruleset"));
        assert!(text.contains("denied"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_exists_is_conflict() {
        let err = SnapshotError::already_exists(Path::new("/x"));
        assert_eq!(err.code(), SnapshotErrorCode::SnapshotExists);
        assert_eq!(err.status_code(), 409);
    }
}
