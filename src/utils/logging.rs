use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::settings::{LogFormat, LoggingConfig};
use crate::config::ClientConfig;

const FALLBACK_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Installs the global subscriber for the CLI.
pub fn run(client_config: &ClientConfig, cli_level: Option<LogLevel>) -> Result<()> {
    init_logging(&effective_config(client_config, cli_level))
}

/// The CLI level wins over the configured one. Without a logging block the format
/// comes from `LOG_FORMAT`.
pub fn effective_config(client_config: &ClientConfig, cli_level: Option<LogLevel>) -> LoggingConfig {
    let (level, format) = match &client_config.settings.logging {
        Some(config) => (config.level.to_owned(), config.format.to_owned()),
        None => (FALLBACK_LEVEL.to_owned(), LogFormat::from_env()),
    };
    let level = cli_level.map(|l| l.as_filter().to_owned()).unwrap_or(level);
    LoggingConfig::new(level, format)
}

/// Installs one fmt layer writing to stderr.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL));
    let json = cfg.format == LogFormat::Json;

    // exactly one of the two is Some
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .with_ansi(false)
    });
    let compact_layer = (!json).then(|| {
        fmt::layer()
            .compact()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(compact_layer)
        .try_init()
        .map_err(|e| anyhow!("cannot install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::service::ServiceConfig;
    use crate::config::settings::SettingsConfig;

    fn client_config(logging: Option<LoggingConfig>) -> ClientConfig {
        ClientConfig {
            service: ServiceConfig::new("http://localhost/service/").unwrap(),
            settings: SettingsConfig {
                timeout_ms: None,
                logging,
            },
        }
    }

    #[test]
    fn cli_level_overrides_configured_level() {
        let config = client_config(Some(LoggingConfig::new("warn".to_owned(), LogFormat::Json)));

        let effective = effective_config(&config, Some(LogLevel::Debug));
        assert_eq!(effective.level, "debug");
        assert_eq!(effective.format, LogFormat::Json);

        assert_eq!(effective_config(&config, None).level, "warn");
    }

    #[test]
    fn missing_logging_block_falls_back_to_info() {
        let effective = effective_config(&client_config(None), None);
        assert_eq!(effective.level, "info");
    }
}
