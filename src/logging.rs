//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate. Output goes to stderr so rendered pages and command output keep
//! stdout to themselves.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let json = config.format.eq_ignore_ascii_case("json");
    let pretty_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty_layer)
        .with(json_layer)
        .try_init()
}

fn default_directive(config: &LoggingConfig) -> String {
    format!("leafguard={}", config.level.trim().to_lowercase())
}
