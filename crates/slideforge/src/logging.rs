//! Tracing initialization for embedding applications.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber with an env-driven filter
/// (`RUST_LOG`, default `info`) and bridges `log` macro output into tracing.
///
/// Call once at process start; repeated calls are a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        // A subscriber is already installed; still route `log` records to it.
        let _ = tracing_log::LogTracer::init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
    }
}
