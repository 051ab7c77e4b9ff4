//! Shared telemetry bootstrap for benchpress binaries.

use crate::{Error, Result};

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Handle marking that the tracing subscriber has been installed for the
/// lifetime of the process.
pub struct Telemetry;

impl Telemetry {
    /// Initialize the shared tracing subscriber for a binary.
    ///
    /// `BENCHPRESS_LOG_LEVEL` overrides the level passed on the command line.
    pub fn init_for_component(service_name: &str, log_level: &str) -> Result<Self> {
        let raw_level = std::env::var("BENCHPRESS_LOG_LEVEL").unwrap_or_else(|_| log_level.to_string());
        let level = parse_log_level(&raw_level)?;

        FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .try_init()
            .map_err(|e| {
                Error::Config(format!("failed to initialize telemetry subscriber: {e}"))
            })?;

        info!(
            service_name = %service_name,
            log_level = %raw_level.trim().to_ascii_lowercase(),
            "Telemetry bootstrap initialized"
        );

        Ok(Self)
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level_accepts_all_levels() {
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level(" warn ").unwrap(), Level::WARN);
    }

    #[test]
    fn test_parse_log_level_rejects_garbage() {
        assert!(parse_log_level("loud").is_err());
    }
}
