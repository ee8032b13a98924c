// ABOUTME: Command-line arguments for the solo-listener binary
//
// Startup-only knobs: where to listen, how many clients to hold, how much to
// read per wakeup, and how log lines are rendered.

use clap::{Parser, ValueEnum};
use std::net::Ipv4Addr;

use crate::config::{
    DEFAULT_CAPACITY, DEFAULT_PORT, DEFAULT_READ_BUFFER_SIZE, ListenerConfig,
};
use crate::error::ConfigError;

/// Single-client TCP listener; SIGHUP closes the active connection
#[derive(Debug, Parser)]
#[command(name = "solo-listener")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// IPv4 address to bind
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub bind: Ipv4Addr,

    /// TCP port to listen on
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of client slots; a new client evicts everyone once they are full
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Bytes read per readiness notification
    #[arg(long, default_value_t = DEFAULT_READ_BUFFER_SIZE)]
    pub read_buffer: usize,

    /// Log output format
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    /// Build a validated listener configuration from the arguments
    pub fn to_config(&self) -> Result<ListenerConfig, ConfigError> {
        let config = ListenerConfig {
            bind_addr: self.bind,
            port: self.port,
            capacity: self.capacity,
            read_buffer_size: self.read_buffer,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["solo-listener"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.to_config().unwrap(), ListenerConfig::default());
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::try_parse_from([
            "solo-listener",
            "--bind",
            "127.0.0.1",
            "-p",
            "4000",
            "--capacity",
            "3",
            "--read-buffer",
            "64",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        let config = cli.to_config().unwrap();
        assert_eq!(config.bind_addr, Ipv4Addr::LOCALHOST);
        assert_eq!(config.port, 4000);
        assert_eq!(config.capacity, 3);
        assert_eq!(config.read_buffer_size, 64);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let cli = Cli::try_parse_from(["solo-listener", "--capacity", "0"]).unwrap();
        assert_eq!(cli.to_config(), Err(ConfigError::ZeroCapacity));
    }

    #[test]
    fn test_invalid_bind_address_fails_parsing() {
        assert!(Cli::try_parse_from(["solo-listener", "--bind", "::1"]).is_err());
        assert!(Cli::try_parse_from(["solo-listener", "--port", "70000"]).is_err());
    }
}
