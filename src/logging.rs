//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after configuration is loaded. Output
//! goes to stderr.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Install the global subscriber.
///
/// `level` is a standard level string (`"error"` … `"trace"`, or `"off"`).
/// It takes precedence; `RUST_LOG` is only consulted when `level` does not
/// parse.
pub fn init(level: &str) -> Result<()> {
    let filter = select_filter(level, std::env::var(EnvFilter::DEFAULT_ENV).ok())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to set subscriber: {e}")))
}

fn select_filter(level: &str, fallback: Option<String>) -> Result<EnvFilter> {
    let level_err = match parse_level(level) {
        Ok(level) => return Ok(EnvFilter::new(level.to_string())),
        Err(e) => e,
    };
    let Some(directives) = fallback else {
        return Err(Error::Config(format!("{level_err}; {} is not set", EnvFilter::DEFAULT_ENV)));
    };
    EnvFilter::try_new(&directives).map_err(|env_err| {
        Error::Config(format!(
            "{level_err}; {} parse failed: {env_err}",
            EnvFilter::DEFAULT_ENV
        ))
    })
}

/// Parse a plain level string, rejecting anything unrecognised.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    if level.is_empty() {
        return Err(Error::Config("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| Error::Config(format!("unrecognised log level: '{level}'")))
}
