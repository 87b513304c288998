//! Logging setup using `tracing` + `tracing-subscriber`, with task spinners
//! from `tracing-indicatif`.
//!
//! Priority for determining the log filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `TSUMUGI_LOG` environment variable (any `EnvFilter` directive)
//! 3. default to `info`

use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV: &str = "TSUMUGI_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init_logging(cli_level: Option<LogLevel>) -> anyhow::Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let indicatif = IndicatifLayer::new();
    let fmt = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(indicatif.get_stderr_writer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(indicatif)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_level_names_parse() {
        for level in LogLevel::value_variants() {
            assert_eq!(LogLevel::from_str(level.as_str(), true), Ok(*level));
        }
    }
}
