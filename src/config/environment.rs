//! Deployment environment selection for layered configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;

/// Deployment environment, used to pick the `{environment}.toml` overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    /// Environment variable consulted by [`Environment::from_env`]
    pub const ENV_VAR: &'static str = "STATICIZE_APP_ENV";

    /// Reads `STATICIZE_APP_ENV`, falling back to `Development` when the
    /// variable is unset or unparsable.
    pub fn from_env() -> Self {
        std::env::var(Self::ENV_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Name of the overlay file loaded on top of `default.toml`
    pub fn overlay_file(&self) -> String {
        format!("{}.toml", self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::EnvVarError(format!(
                "Invalid environment '{other}'. Valid values are: development, test, staging, production"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("stage".parse::<Environment>().unwrap(), Environment::Staging);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" Test ".parse::<Environment>().unwrap(), Environment::Test);
    }

    #[test]
    fn test_parse_invalid() {
        let err = "qa".parse::<Environment>().unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarError(msg) if msg.contains("'qa'")));
    }

    #[test]
    fn test_overlay_file() {
        assert_eq!(Environment::Production.overlay_file(), "production.toml");
        assert_eq!(Environment::default().overlay_file(), "development.toml");
    }
}
