//! Structured logging with `tracing`.
//!
//! The driver reports protocol conditions (malformed and orphaned
//! responses, server errors, authentication challenges) as `tracing`
//! events with structured fields such as `request_id`, `code` and
//! `generation`. Applications pick the output by installing a subscriber;
//! [`init_subscriber`] is the stock choice.
//!
//! [`capture_logs`] installs a thread-local capturing subscriber so tests
//! can assert on what was reported.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set, otherwise `level`.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install compact, human-readable stderr logging.
///
/// `level` is an `EnvFilter` directive such as `"warn"` or
/// `"gremlin_client=debug"`. Only the first installed subscriber takes
/// effect; later calls do nothing.
pub fn init_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Install stderr logging with one JSON object per event.
pub fn init_json_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .json()
        .try_init();
}
