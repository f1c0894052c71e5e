//! CLI argument parsing with clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::build;

/// Route-aware response caching for axum
#[derive(Parser, Debug)]
#[command(name = "staticize")]
#[command(about = "Route-aware HTTP response caching middleware for axum")]
#[command(long_about = "
Staticize caches HTTP responses per route in memory or Redis and replays
them until the route's TTL expires. This binary runs a demo server behind
the middleware and checks configuration files.

EXAMPLES:
    # Start the demo server with default configuration
    staticize serve

    # Start on a custom host and port
    staticize serve --host 0.0.0.0 --port 8080

    # Use a single configuration file
    staticize --config /etc/staticize/staticize.toml serve

    # Validate configuration and print the compiled route table
    staticize check

    # Validate configuration without starting the server
    staticize serve --dry-run
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute, `serve` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Replaces the layered config/ directory lookup. Environment variable
    /// overrides (STATICIZE_*) still apply.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects the `{environment}.toml` overlay. Overrides STATICIZE_APP_ENV.
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the demo server (default)
    ///
    /// Serves `/cache30s`, `/cache60s` and `/cache0s` with their own TTL
    /// overrides, and every other path under the route table.
    ///
    /// Examples:
    ///   staticize serve                           # Start with defaults
    ///   staticize serve --host 0.0.0.0 --port 80 # Bind to all interfaces on port 80
    ///   staticize serve --dry-run                 # Validate config without starting
    Serve {
        /// Host address to bind to
        #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
        host: Option<String>,

        /// Port number to listen on
        #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
        port: Option<u16>,

        /// Log level override, takes precedence over --verbose/--quiet
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate configuration and print the compiled route table
    Check,
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}
