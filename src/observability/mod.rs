//! Observability subsystem
//!
//! Structured logging through `tracing`, typed event names, scope-based
//! begin/complete logging and monotonic counters.
//!
//! Logs go to stderr. Stdout is reserved for JSON-lines responses.

mod events;
mod metrics;
mod scope;

pub use events::Event;
pub use metrics::{KernelMetrics, MetricsSnapshot};
pub use scope::ObservationScope;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "rulekernel=info";

/// Installs the global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    // Already initialized (tests, repeated CLI invocations in-process).
    let _ = result;
}
