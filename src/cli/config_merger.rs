//! Configuration merger for CLI arguments and config files
//!
//! CLI arguments override values loaded from files and environment
//! variables.

use super::parser::{Cli, Commands};
use crate::config::{ConfigError, ConfigLoader, Settings};

/// Applies CLI overrides on top of the loaded configuration
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the configuration named by `--config` / `--env`, falling back to
    /// the layered `config/` directory.
    ///
    /// # Errors
    /// Returns ConfigError if configuration loading or validation fails
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let loader = match &cli.config {
            Some(path) => ConfigLoader::from_file(path.clone()),
            None => ConfigLoader::new()?,
        };
        let loader = match cli.env {
            Some(env) => loader.with_environment(env.into()),
            None => loader,
        };

        Ok(Self::new(loader.load()?))
    }

    /// Merge CLI arguments with the base configuration and re-validate
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        Self::apply_global_overrides(&mut config, cli);

        if let Some(ref command) = cli.command {
            Self::apply_command_overrides(&mut config, command);
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_global_overrides(config: &mut Settings, cli: &Cli) {
        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }
    }

    fn apply_command_overrides(config: &mut Settings, command: &Commands) {
        match command {
            Commands::Serve {
                host,
                port,
                log_level,
                dry_run: _,
            } => {
                if let Some(host_addr) = host {
                    config.server.host = host_addr.clone();
                }

                if let Some(port_num) = port {
                    config.server.port = *port_num;
                }

                // Command-specific level beats --verbose/--quiet
                if let Some(level) = log_level {
                    config.logger.level = level.as_str().to_string();
                }
            }
            Commands::Check => {}
        }
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}
