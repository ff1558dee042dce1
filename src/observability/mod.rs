//! Observability subsystem for chronostamp
//!
//! This module provides:
//! - A typed lifecycle event vocabulary
//! - Structured emission of those events through `tracing`
//! - Subscriber installation for the binary
//!
//! # Usage
//!
//! ```ignore
//! use chronostamp::observability::{log_event, Event};
//!
//! log_event(Event::CommitComplete, &[("stamps", "3")]);
//! ```

mod events;

pub use events::Event;

use tracing_subscriber::EnvFilter;

/// Log a lifecycle event with fields.
///
/// Fatal events go out at `error`, failures at `warn`, everything else at
/// `info`. Fields are sorted by key so the rendered line is deterministic.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let mut sorted: Vec<_> = fields.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let rendered = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");

    if event.is_fatal() {
        tracing::error!(event = event.as_str(), fatal = true, "{}", rendered);
    } else if event.is_failure() {
        tracing::warn!(event = event.as_str(), "{}", rendered);
    } else {
        tracing::info!(event = event.as_str(), "{}", rendered);
    }
}

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks the level
/// (0 = info, 1 = debug, 2+ = trace). Installing twice is a no-op.
pub fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
