//! ObservationScope for begin/complete logging around long operations
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` on `complete()`, with elapsed milliseconds
//! - Logs `{name}_FAILED` on `fail()`
//! - Logs `{name}_INCOMPLETE` if dropped without either

use std::time::Instant;

use tracing::{error, info, warn};

use super::events::Event;

/// A scope that logs the start and outcome of an operation.
///
/// ```ignore
/// let scope = ObservationScope::new(Event::Publish, "session-1");
/// // ... do work ...
/// scope.complete("promoted");
/// ```
pub struct ObservationScope {
    event: Event,
    subject: String,
    started: Instant,
    finished: bool,
}

impl ObservationScope {
    /// Logs `{event}_BEGIN` immediately.
    pub fn new(event: Event, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        info!(event = %format!("{}_BEGIN", event), subject = %subject);
        Self {
            event,
            subject,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn complete(mut self, outcome: &str) {
        self.finished = true;
        info!(
            event = %format!("{}_COMPLETE", self.event),
            subject = %self.subject,
            duration_ms = self.elapsed_ms(),
            outcome,
        );
    }

    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        error!(
            event = %format!("{}_FAILED", self.event),
            subject = %self.subject,
            duration_ms = self.elapsed_ms(),
            reason,
        );
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                event = %format!("{}_INCOMPLETE", self.event),
                subject = %self.subject,
                reason = "scope dropped without completion",
            );
        }
    }
}
