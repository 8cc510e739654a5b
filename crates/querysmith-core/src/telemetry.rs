//! Tracing setup for the querysmith binary and embedders.
//!
//! [`init_tracing`] installs one global subscriber. Later calls are no-ops.

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: querysmith crates at `level`,
/// everything else (HTTP client, runtime) at `warn`.
pub fn default_filter(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("warn,querysmith_core={level},querysmith={level}")
}

/// Install the global subscriber.
///
/// * `json` emits newline-delimited JSON, with a close event per question
///   span so each record carries its duration.
/// * `level` applies when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
