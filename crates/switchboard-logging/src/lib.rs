//! # switchboard-logging
//!
//! Process-wide `tracing` setup. Output goes to stderr, either compact text
//! or newline-delimited JSON. `RUST_LOG`, when set and valid, takes
//! precedence over the configured level.
//!
//! [`capture`] holds an in-memory subscriber for asserting on log events in
//! tests.

#![deny(unsafe_code)]

pub mod capture;

use switchboard_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};

/// Build the level filter: `rust_log` if it parses, else `settings.level`.
pub fn build_filter(settings: &LoggingSettings, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(settings.level.as_str()))
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup. Returns `false` if a global subscriber was already
/// installed, in which case nothing changes.
pub fn init_subscriber(settings: &LoggingSettings) -> bool {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(settings, rust_log.as_deref());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if settings.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.is_ok()
}
