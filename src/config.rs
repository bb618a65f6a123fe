//! Configuration module for the crud-relay server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the command server
#[derive(Parser, Debug, Default)]
#[command(name = "crud-relay")]
#[command(author = "crud-relay authors")]
#[command(version = "0.1.0")]
#[command(about = "A loopback command server for CRUD-style clients", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Loopback address to bind to (e.g., 127.0.0.1:5555)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Accept backlog for pending connections
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Maximum number of bytes read for a request line
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Drop a client that sends nothing for this many milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Accept backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: default_backlog(),
        }
    }
}

/// Request framing configuration
#[derive(Debug, Deserialize)]
pub struct ProtocolConfig {
    /// Upper bound on a single request line, in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Per-connection read timeout in milliseconds (unset = wait forever)
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
            read_timeout_ms: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Port the CRUD client expects the server on.
pub const DEFAULT_PORT: u16 = 5555;

fn default_listen() -> String {
    format!("127.0.0.1:{DEFAULT_PORT}")
}

fn default_backlog() -> i32 {
    5
}

fn default_max_line_length() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen: SocketAddr,
    pub backlog: i32,
    pub max_line_length: usize,
    pub read_timeout: Option<Duration>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            backlog: default_backlog(),
            max_line_length: default_max_line_length(),
            read_timeout: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve already-parsed CLI args, reading the TOML file they point at.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let listen: SocketAddr = listen
            .parse()
            .map_err(|_| ConfigError::InvalidListen(listen.clone()))?;
        if !listen.ip().is_loopback() {
            return Err(ConfigError::NotLoopback(listen));
        }

        let backlog = cli.backlog.unwrap_or(toml_config.server.backlog);
        if backlog <= 0 {
            return Err(ConfigError::InvalidValue("backlog", backlog.to_string()));
        }

        let max_line_length = cli
            .max_line_length
            .unwrap_or(toml_config.protocol.max_line_length);
        if max_line_length == 0 {
            return Err(ConfigError::InvalidValue("max_line_length", "0".to_string()));
        }

        let read_timeout = cli
            .read_timeout_ms
            .or(toml_config.protocol.read_timeout_ms)
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis);

        Ok(Config {
            listen,
            backlog,
            max_line_length,
            read_timeout,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidListen(String),
    NotLoopback(SocketAddr),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidListen(addr) => {
                write!(f, "Invalid listen address '{}'", addr)
            }
            ConfigError::NotLoopback(addr) => {
                write!(f, "Listen address {} is not a loopback address", addr)
            }
            ConfigError::InvalidValue(name, value) => {
                write!(f, "Invalid value for {}: {}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> CliArgs {
        CliArgs {
            log_level: "info".to_string(),
            ..CliArgs::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:5555");
        assert_eq!(config.server.backlog, 5);
        assert_eq!(config.protocol.max_line_length, 1024);
        assert_eq!(config.protocol.read_timeout_ms, None);

        let resolved = Config::merge(cli(), config).unwrap();
        assert_eq!(resolved, Config::default());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "127.0.0.1:6000"
            backlog = 16

            [protocol]
            max_line_length = 512
            read_timeout_ms = 2500

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:6000");
        assert_eq!(config.server.backlog, 16);
        assert_eq!(config.protocol.max_line_length, 512);
        assert_eq!(config.protocol.read_timeout_ms, Some(2500));
        assert_eq!(config.logging.level, "debug");

        let resolved = Config::merge(cli(), config).unwrap();
        assert_eq!(resolved.read_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(resolved.log_level, "debug");
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: TomlConfig = toml::from_str("[server]\nlisten = \"127.0.0.1:6000\"").unwrap();
        let args = CliArgs {
            listen: Some("127.0.0.1:7000".to_string()),
            backlog: Some(8),
            log_level: "trace".to_string(),
            ..CliArgs::default()
        };

        let config = Config::merge(args, file).unwrap();
        assert_eq!(config.listen.port(), 7000);
        assert_eq!(config.backlog, 8);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_rejects_non_loopback() {
        let args = CliArgs {
            listen: Some("0.0.0.0:5555".to_string()),
            ..cli()
        };
        match Config::merge(args, TomlConfig::default()) {
            Err(ConfigError::NotLoopback(addr)) => assert_eq!(addr.port(), 5555),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        let args = CliArgs {
            listen: Some("localhost".to_string()),
            ..cli()
        };
        assert!(matches!(
            Config::merge(args, TomlConfig::default()),
            Err(ConfigError::InvalidListen(_))
        ));

        let args = CliArgs {
            max_line_length: Some(0),
            ..cli()
        };
        assert!(matches!(
            Config::merge(args, TomlConfig::default()),
            Err(ConfigError::InvalidValue("max_line_length", _))
        ));
    }

    #[test]
    fn test_ipv6_loopback_allowed() {
        let args = CliArgs {
            listen: Some("[::1]:5555".to_string()),
            ..cli()
        };
        let config = Config::merge(args, TomlConfig::default()).unwrap();
        assert!(config.listen.is_ipv6());
    }
}
