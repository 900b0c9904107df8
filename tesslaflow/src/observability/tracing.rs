//! Log subscriber setup and timing helpers.

use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};

/// Environment variable holding the log filter, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "TESSLAFLOW_LOG";

const DEFAULT_FILTER: &str = "info";

/// Builds the log filter from [`LOG_ENV`], then `RUST_LOG`, then `info`.
#[must_use]
pub fn env_filter() -> EnvFilter {
    let directives = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber writing to stderr, optionally as JSON lines.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("compile_and_run_project");
        assert_eq!(timer.name(), "compile_and_run_project");
        std::thread::sleep(std::time::Duration::from_millis(10));
        let duration = timer.finish();
        assert!(duration >= 10.0);
    }

    #[test]
    fn test_env_filter_builds() {
        let filter = env_filter();
        assert!(!filter.to_string().is_empty());
    }
}
