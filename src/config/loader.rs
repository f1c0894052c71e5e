//! Configuration loader for staticize
//!
//! This module provides the `ConfigLoader` struct that handles loading
//! configuration from multiple sources with proper precedence.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Environment variable for configuration directory
const CONFIG_DIR_ENV: &str = "STATICIZE_CONFIG_DIR";

/// Environment variable for specific configuration file
const CONFIG_FILE_ENV: &str = "STATICIZE_CONFIG_FILE";

/// Default configuration directory
const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "STATICIZE";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Configuration loader that handles layered configuration loading
///
/// Sources, lowest priority first:
/// 1. `default.toml` (required)
/// 2. `{environment}.toml` (optional)
/// 3. `local.toml` (optional)
/// 4. `STATICIZE_*` environment variables
///
/// When a single file is given (`STATICIZE_CONFIG_FILE` or `--config`) it
/// replaces the three file layers; environment variables still apply.
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    config_file: Option<PathBuf>,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Create a loader from `STATICIZE_CONFIG_DIR`, `STATICIZE_CONFIG_FILE`
    /// and `STATICIZE_APP_ENV`.
    ///
    /// # Errors
    ///
    /// Returns an error if both `STATICIZE_CONFIG_DIR` and
    /// `STATICIZE_CONFIG_FILE` are set.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from);
        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_dir.is_some() && config_file.is_some() {
            return Err(ConfigError::mutual_exclusivity(
                "STATICIZE_CONFIG_DIR and STATICIZE_CONFIG_FILE cannot both be set. \
                 Use STATICIZE_CONFIG_DIR for layered configuration or \
                 STATICIZE_CONFIG_FILE for a single configuration file.",
            ));
        }

        Ok(Self {
            config_dir: config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            config_file,
            environment: AppEnvironment::from_env(),
        })
    }

    /// Create a loader that reads exactly one file (plus environment overrides)
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: Some(path.into()),
            environment: AppEnvironment::from_env(),
        }
    }

    /// Override the environment used to pick the overlay file
    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    /// Load, deserialize and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a required file is missing, the sources cannot be
    /// parsed, or the resulting settings fail validation.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let config = self.build_config()?;
        let settings: Settings = config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e))
        })?;

        settings.validate()?;

        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = Config::builder();

        let builder = match self.config_file {
            Some(ref config_file) => Self::add_file_source(builder, config_file, true)?,
            None => self.build_layered_config(builder)?,
        };

        // STATICIZE_CACHE__ADAPTER -> cache.adapter
        Self::add_env_source(builder)
            .build()
            .map_err(ConfigError::from)
    }

    fn build_layered_config(
        &self,
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let default_path = self.config_dir.join("default.toml");
        let builder = Self::add_file_source(builder, &default_path, true)?;

        let env_path = self.config_dir.join(self.environment.overlay_file());
        let builder = Self::add_file_source(builder, &env_path, false)?;

        let local_path = self.config_dir.join("local.toml");
        Self::add_file_source(builder, &local_path, false)
    }

    fn add_file_source(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
        required: bool,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        if required && !path.exists() {
            return Err(ConfigError::file_not_found(format!(
                "Required configuration file not found: {}",
                path.display()
            )));
        }

        let path = path.to_str().ok_or_else(|| {
            ConfigError::ParseError(format!(
                "Configuration path is not valid UTF-8: {}",
                path.display()
            ))
        })?;

        Ok(builder.add_source(File::new(path, FileFormat::Toml).required(required)))
    }

    fn add_env_source(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .ignore_empty(true)
                .try_parsing(true),
        )
    }
}
