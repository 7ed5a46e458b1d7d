//! JSON logging for the service.
//!
//! One JSON object per line, event fields flattened to the top level. Each
//! subsystem logs under its own target (see [`LOG_TARGETS`]), so operators can
//! raise one of them alone, e.g. `RUST_LOG=info,notification_dispatch=debug`.

use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::DEFAULT_LOG_FILTER;

/// Targets used by the workspace's subsystems.
pub const LOG_TARGETS: [&str; 6] = [
    "audit",
    "cache",
    "hash_registry",
    "notification_dispatch",
    "notification_worker",
    "rate_limit",
];

/// Parse `directives`, falling back to [`DEFAULT_LOG_FILTER`] when they do not
/// parse.
pub fn build_filter(directives: &str) -> EnvFilter {
    match EnvFilter::try_new(directives) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("WARN: Invalid log filter {directives:?} ({e}), using {DEFAULT_LOG_FILTER:?}");
            EnvFilter::new(DEFAULT_LOG_FILTER)
        }
    }
}

fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .flatten_event(true)
        .with_writer(writer)
}

/// Install the global subscriber, writing to stdout. Call once at startup.
pub fn init_logging(directives: &str) {
    tracing_subscriber::registry()
        .with(json_layer(std::io::stdout))
        .with(build_filter(directives))
        .init();

    tracing::info!(filter = %directives, "Logging initialized");
}
