//! Subscriber setup for the binary.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Crates whose debug output drowns ours; pinned to `warn`.
pub const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls", "rmcp", "tower"];

/// `RUST_LOG` wins; otherwise `level` with noisy crates quieted.
pub fn build_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let mut directives = String::from(level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{module}=warn"));
    }
    EnvFilter::new(directives)
}

/// Install the global subscriber. `format` is `json` or `pretty`.
pub fn init_logging(level: &str, format: &str) {
    let registry = tracing_subscriber::registry().with(build_filter(level));

    if format == "json" {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr);
        let _ = registry.with(layer).try_init();
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr);
        let _ = registry.with(layer).try_init();
    }

    tracing::debug!(level, format, "logging initialized");
}
