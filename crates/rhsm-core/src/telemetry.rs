//! Log output for the `rhsm` binary.
//!
//! Subscription-manager results go to standard out, so every log line is
//! written to standard error. `RUST_LOG` overrides the level picked on the
//! command line.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the process-wide subscriber, as JSON lines when `json` is set.
///
/// Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter(level));

    let installed = if json {
        registry.with(stderr_layer.json()).try_init()
    } else {
        registry.with(stderr_layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
        tracing::info!("still logging");
    }

    #[test]
    fn test_filter_falls_back_to_level() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(filter(Level::WARN).to_string(), "warn");
        }
    }
}
