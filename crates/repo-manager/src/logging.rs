//! Subscriber setup for binaries and test harnesses embedding the manager.
//!
//! Library code only emits `tracing` events. Cache hits, evictions and
//! listener decisions are logged at `debug`, lifecycle changes at `info`.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Filter used when `RUST_LOG` is unset. Store internals stay quiet.
pub const DEFAULT_DIRECTIVES: &str = "info,repo_store=warn";

fn filter(default: &str) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))
}

/// Install a compact stdout subscriber.
///
/// Events carry thread ids, since concurrent first access and shutdown
/// are the interesting cases to trace. Fails if a global subscriber is
/// already installed.
pub fn init() -> InitResult {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter(DEFAULT_DIRECTIVES)?)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

/// Install a `debug` subscriber writing through the test harness, so output
/// is only shown for failing tests.
///
/// Safe to call from every test: returns `false` when a subscriber was
/// already installed.
pub fn init_for_tests() -> bool {
    let Ok(filter) = filter("debug") else {
        return false;
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer().with_thread_ids(true))
        .try_init()
        .is_ok()
}
