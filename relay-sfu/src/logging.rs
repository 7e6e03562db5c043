//! Subscriber setup for processes embedding the forwarder

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

const CRATE_TARGET: &str = "relay_sfu";

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence. Otherwise only this crate's events at
/// `config.level` and above are emitted, so per-packet `debug!`/`trace!`
/// output never pulls in the host application's dependencies.
///
/// # Errors
///
/// Fails on an unknown level or format, when the log file cannot be opened,
/// or when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = parse_log_level(&config.level)?;
    let json = match config.format.to_lowercase().as_str() {
        "json" => true,
        "pretty" => false,
        other => anyhow::bail!("Invalid log format: {other}"),
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let writer = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    // exactly one of the two is Some
    let (json_layer, pretty_layer) = if json {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer);
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(false)
            .with_line_number(true)
            .with_writer(writer);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()?;

    Ok(())
}

fn default_directive(level: Level) -> String {
    format!("{CRATE_TARGET}={}", level.as_str().to_ascii_lowercase())
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
