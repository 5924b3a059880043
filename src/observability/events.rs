//! Observable kernel events
//!
//! Every significant state transition is logged with one of these names
//! as the `event` field. Events are explicit and typed.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    ConfigLoaded,
    ServeStart,
    ServeStop,

    // Sessions
    SessionCreated,
    SessionEvicted,

    // Draft and candidate
    DraftMutated,
    ValidationRejected,
    CandidateBuilt,
    ConflictsDetected,

    // Publication
    Publish,
    PublishRejected,
    SnapshotCreated,
    CertificateWritten,

    // Verification
    Verify,
    VerifyTimeout,
    VerifyUnavailable,

    // Promotion
    RuntimePromoted,
    PromotionRefused,

    // Retrieval
    RetrievalServed,
    RetrievalRefused,
}

impl Event {
    /// Returns the event name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ServeStart => "SERVE_START",
            Event::ServeStop => "SERVE_STOP",
            Event::SessionCreated => "SESSION_CREATED",
            Event::SessionEvicted => "SESSION_EVICTED",
            Event::DraftMutated => "DRAFT_MUTATED",
            Event::ValidationRejected => "VALIDATION_REJECTED",
            Event::CandidateBuilt => "CANDIDATE_BUILT",
            Event::ConflictsDetected => "CONFLICTS_DETECTED",
            Event::Publish => "PUBLISH",
            Event::PublishRejected => "PUBLISH_REJECTED",
            Event::SnapshotCreated => "SNAPSHOT_CREATED",
            Event::CertificateWritten => "CERTIFICATE_WRITTEN",
            Event::Verify => "VERIFY",
            Event::VerifyTimeout => "VERIFY_TIMEOUT",
            Event::VerifyUnavailable => "VERIFY_UNAVAILABLE",
            Event::RuntimePromoted => "RUNTIME_PROMOTED",
            Event::PromotionRefused => "PROMOTION_REFUSED",
            Event::RetrievalServed => "RETRIEVAL_SERVED",
            Event::RetrievalRefused => "RETRIEVAL_REFUSED",
        }
    }

    /// Returns true for events that are logged at warning level
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::ValidationRejected
                | Event::PublishRejected
                | Event::VerifyTimeout
                | Event::VerifyUnavailable
                | Event::PromotionRefused
                | Event::RetrievalRefused
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        for event in [Event::DraftMutated, Event::RuntimePromoted, Event::VerifyTimeout] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
            assert_eq!(event.to_string(), name);
        }
    }

    #[test]
    fn test_warning_classification() {
        assert!(Event::RetrievalRefused.is_warning());
        assert!(!Event::RuntimePromoted.is_warning());
    }
}
