mod validation;

use crate::logging::{LogConfig, LogFormat, LogLevel};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Classify an error message and render it the way a failing command would
    Explain {
        /// The error message to explain
        message: String,

        /// Command that produced the error (e.g. "infra apply")
        #[arg(long)]
        command: Option<String>,
    },

    /// Resolve pagination flags and print the display line
    Paginate {
        /// Total number of items
        #[arg(long)]
        total: u64,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Items per page (max 500)
        #[arg(long, default_value_t = 0)]
        limit: u32,

        /// Fetch everything (page 1, limit 500)
        #[arg(long)]
        all: bool,
    },

    /// Run until SIGINT or SIGTERM, then shut down gracefully
    Wait,
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "atlas-kernel", author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Minimum log level
    #[arg(long, env = "ATLAS_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Log record format
    #[arg(long, env = "ATLAS_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Only log errors
    #[arg(long, short, env = "ATLAS_QUIET", global = true)]
    pub quiet: bool,

    /// Log everything and show error suggestions
    #[arg(long, short, env = "ATLAS_VERBOSE", global = true)]
    pub verbose: bool,

    /// Log API requests and responses
    #[arg(long, env = "ATLAS_ENABLE_API_LOGGING", global = true)]
    pub enable_api_logging: bool,

    /// Do not emit metric records
    #[arg(long, env = "ATLAS_DISABLE_METRICS", global = true)]
    pub disable_metrics: bool,

    /// Log attribute values unmasked
    #[arg(long, env = "ATLAS_NO_MASK_SECRETS", global = true)]
    pub no_mask_secrets: bool,

    /// Include the source location in log records
    #[arg(long, env = "ATLAS_LOG_SOURCE", global = true)]
    pub log_source: bool,

    /// API request timeout in seconds
    #[arg(long, env = "ATLAS_REQUEST_TIMEOUT_SECS", default_value = "30", global = true)]
    pub request_timeout_secs: u64,

    /// Time allowed for cleanup handlers on shutdown, in seconds
    #[arg(long, env = "ATLAS_SHUTDOWN_TIMEOUT_SECS", default_value = "30", global = true)]
    pub shutdown_timeout_secs: u64,

    /// Configuration file path (optional)
    #[arg(long, env = "ATLAS_CONFIG_FILE", global = true)]
    pub config_file: Option<PathBuf>,

    #[serde(skip)]
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            quiet: false,
            verbose: false,
            enable_api_logging: false,
            disable_metrics: false,
            no_mask_secrets: false,
            log_source: false,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            config_file: None,
            command: None,
        }
    }
}

impl Config {
    /// Parses `args`, then replaces the settings with the config file when
    /// one is given. The subcommand always comes from `args`.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let parsed = Config::parse_from(args);
        let config = match &parsed.config_file {
            Some(path) => {
                let mut from_file = Config::from_file(path)?;
                from_file.config_file = Some(path.clone());
                from_file.command = parsed.command;
                from_file
            }
            None => parsed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Logger settings; the sink is standard error.
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            format: self.log_format,
            add_source: self.log_source,
            quiet: self.quiet,
            verbose: self.verbose,
            enable_api_logging: self.enable_api_logging,
            enable_metrics: !self.disable_metrics,
            mask_secrets: !self.no_mask_secrets,
            request_timeout: self.request_timeout(),
            ..LogConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_args() {
        let config = Config::from_args(["atlas-kernel"]).unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert!(config.command.is_none());

        let log = config.log_config();
        assert!(log.mask_secrets);
        assert!(log.enable_metrics);
        assert!(!log.enable_api_logging);
    }

    #[test]
    fn test_flags_map_to_log_config() {
        let config = Config::from_args([
            "atlas-kernel",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--quiet",
            "--no-mask-secrets",
            "--disable-metrics",
            "--enable-api-logging",
            "--request-timeout-secs",
            "5",
            "wait",
        ])
        .unwrap();
        assert_eq!(config.command, Some(Command::Wait));

        let log = config.log_config();
        assert_eq!(log.level, LogLevel::Debug);
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.effective_level(), LogLevel::Error);
        assert!(!log.mask_secrets);
        assert!(!log.enable_metrics);
        assert!(log.enable_api_logging);
        assert_eq!(log.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_subcommand_arguments() {
        let config = Config::from_args([
            "atlas-kernel",
            "paginate",
            "--total",
            "25",
            "--page",
            "3",
            "--limit",
            "10",
        ])
        .unwrap();
        assert_eq!(
            config.command,
            Some(Command::Paginate {
                total: 25,
                page: 3,
                limit: 10,
                all: false
            })
        );
    }

    #[test]
    fn test_config_file_replaces_settings_but_keeps_command() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log_level = \"warn\"\nlog_format = \"json\"\nshutdown_timeout_secs = 5"
        )
        .unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let config =
            Config::from_args(["atlas-kernel", "--config-file", path.as_str(), "wait"]).unwrap();
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.shutdown_timeout_secs, 5);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.command, Some(Command::Wait));
    }

    #[test]
    fn test_broken_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = ").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            Config::from_file("/nonexistent/atlas.toml"),
            Err(ConfigError::FileError(_))
        ));
    }
}
