//! Tracing setup for the binary.
//!
//! Human-readable events go to stderr so stdout stays free for UI output
//! (and for `--ui json`). An optional daily-rotated JSON log file can be
//! added under `.zkguard/logs/`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Environment variable holding an `EnvFilter` directive, e.g. `zkguard=trace`.
pub const ENV_LOG: &str = "ZKGUARD_LOG";

pub const LOG_FILE_PREFIX: &str = "zkguard.log";

/// Default directive when `ZKGUARD_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "zkguard=debug" } else { "zkguard=warn" }
}

pub fn build_filter(directive: Option<&str>, verbose: bool) -> EnvFilter {
    match directive {
        Some(d) if !d.trim().is_empty() => EnvFilter::try_new(d)
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose))),
        _ => EnvFilter::new(default_directive(verbose)),
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// the file writer flushes.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let directive = std::env::var(ENV_LOG).ok();
    let filter = build_filter(directive.as_deref(), verbose);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).context("Failed to create log directory")?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(build_filter(directive.as_deref(), true));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_depends_on_verbose() {
        assert_eq!(default_directive(false), "zkguard=warn");
        assert_eq!(default_directive(true), "zkguard=debug");
    }

    #[test]
    fn test_build_filter_uses_directive() {
        let filter = build_filter(Some("zkguard=trace"), false);
        assert_eq!(filter.to_string(), "zkguard=trace");
    }

    #[test]
    fn test_build_filter_falls_back_on_blank_or_invalid() {
        assert_eq!(build_filter(Some("  "), false).to_string(), "zkguard=warn");
        assert_eq!(
            build_filter(Some("zkguard=loud"), true).to_string(),
            "zkguard=debug"
        );
        assert_eq!(build_filter(None, false).to_string(), "zkguard=warn");
    }
}
