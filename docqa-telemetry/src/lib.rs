//! # docqa-telemetry
//!
//! Logging setup for DocQA services.
//!
//! [`init_telemetry`] installs a human-readable subscriber and [`init_json`] a
//! JSON-lines one. Both honour `RUST_LOG` (default `info`) and only the first
//! call in a process installs anything. [`capture_subscriber`] builds a
//! subscriber that records events in memory, for tests that assert on logs.
//!
//! ```rust,ignore
//! docqa_telemetry::init_telemetry("docqa");
//! tracing::info!(chunk_count = 42, "index ready");
//! ```

pub mod memory;

use std::sync::Once;

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

pub use memory::{CaptureLayer, CapturedEvent, CapturedEvents};

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a human-readable fmt subscriber for the process.
pub fn init_telemetry(service_name: &str) {
    INIT.call_once(|| {
        let installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .is_ok();
        if installed {
            tracing::info!(service = service_name, "telemetry initialized");
        }
    });
}

/// Install a JSON-lines subscriber for the process.
pub fn init_json(service_name: &str) {
    INIT.call_once(|| {
        let installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
            .is_ok();
        if installed {
            tracing::info!(service = service_name, "telemetry initialized");
        }
    });
}

/// A subscriber that records every event into `storage`.
///
/// Use with `tracing::subscriber::set_default` to scope capture to a test.
pub fn capture_subscriber(storage: CapturedEvents) -> impl Subscriber + Send + Sync {
    Registry::default().with(CaptureLayer::new(storage))
}
