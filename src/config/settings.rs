//! Configuration settings structures for staticize
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables, or built in code and handed to
//! [`crate::Staticize::new`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "staticize".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/staticize.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_cache_adapter() -> String {
    "memory".to_string()
}

fn default_cache_max_size() -> usize {
    1000
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> u32 {
    4
}

fn default_redis_connection_timeout() -> u64 {
    5
}

fn default_redis_key_prefix() -> String {
    "staticize".to_string()
}

fn default_body_limit() -> usize {
    8 * 1024 * 1024 // 8MB
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Demo HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl ServerConfig {
    /// Get the full server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    /// Append to an existing file instead of truncating it
    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level or full `EnvFilter` directive, e.g. "info,staticize=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime [`LoggerConfig`]
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let format = self
            .file
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: e.to_string(),
            })?;

        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = FileConfig::new(
            self.file.enabled,
            PathBuf::from(self.file.path),
            self.file.append,
            format,
        );

        LoggerConfig::new(console, file, self.level).map_err(|e| ConfigError::ValidationError {
            field: "logger".to_string(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// Supported cache adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAdapter {
    Memory,
    Redis,
}

impl CacheAdapter {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheAdapter::Memory => "memory",
            CacheAdapter::Redis => "redis",
        }
    }
}

impl FromStr for CacheAdapter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheAdapter::Memory),
            "redis" => Ok(CacheAdapter::Redis),
            _ => Err(ConfigError::UnsupportedAdapter(s.to_string())),
        }
    }
}

impl fmt::Display for CacheAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries kept in process
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
        }
    }
}

/// Redis cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL, `rediss://` enables TLS
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_redis_connection_timeout")]
    pub connection_timeout: u64,

    /// Namespace prepended to every cache key
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            connection_timeout: default_redis_connection_timeout(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Adapter name: "memory" or "redis"
    #[serde(default = "default_cache_adapter")]
    pub adapter: String,

    #[serde(default)]
    pub memory: MemoryCacheConfig,

    #[serde(default)]
    pub redis: RedisCacheConfig,
}

impl CacheConfig {
    /// Resolve the adapter name
    pub fn adapter_kind(&self) -> Result<CacheAdapter, ConfigError> {
        self.adapter.parse()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            adapter: default_cache_adapter(),
            memory: MemoryCacheConfig::default(),
            redis: RedisCacheConfig::default(),
        }
    }
}

// ============================================================================
// Route Configuration
// ============================================================================

/// CORS origin policy of a route, either one origin (`"*"` for any) or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorsSetting {
    Origin(String),
    Origins(Vec<String>),
}

/// Extended route form `{ ttl = 60, cors = "*" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteOptions {
    pub ttl: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsSetting>,
}

/// Value of one `[routes]` entry.
///
/// Anything that is neither a TTL nor a well-formed options table is kept
/// as [`RouteSetting::Invalid`] so that validation can name the offending
/// route instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteSetting {
    Ttl(u64),
    Detailed(RouteOptions),
    Invalid(serde_json::Value),
}

impl RouteSetting {
    pub fn ttl(seconds: u64) -> Self {
        RouteSetting::Ttl(seconds)
    }

    pub fn with_cors(seconds: u64, cors: CorsSetting) -> Self {
        RouteSetting::Detailed(RouteOptions {
            ttl: seconds,
            cors: Some(cors),
        })
    }
}

impl From<u64> for RouteSetting {
    fn from(seconds: u64) -> Self {
        RouteSetting::Ttl(seconds)
    }
}

/// Ordered `"<method> <path>" -> setting` table.
///
/// Registration order is significant: the first matching route wins, so
/// entries keep the order in which they were written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoutesConfig {
    entries: Vec<(String, RouteSetting)>,
}

impl RoutesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route, or replace the setting of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, setting: impl Into<RouteSetting>) {
        let key = key.into();
        let setting = setting.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = setting,
            None => self.entries.push((key, setting)),
        }
    }

    pub fn route(mut self, key: impl Into<String>, setting: impl Into<RouteSetting>) -> Self {
        self.insert(key, setting);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteSetting)> {
        self.entries.iter().map(|(key, setting)| (key.as_str(), setting))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<RouteSetting>> FromIterator<(K, V)> for RoutesConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut routes = RoutesConfig::new();
        for (key, setting) in iter {
            routes.insert(key, setting);
        }
        routes
    }
}

impl Serialize for RoutesConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, setting) in &self.entries {
            map.serialize_entry(key, setting)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RoutesConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoutesVisitor;

        impl<'de> Visitor<'de> for RoutesVisitor {
            type Value = RoutesConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of \"<method> <path>\" = ttl entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut routes = RoutesConfig::new();
                while let Some((key, setting)) = access.next_entry::<String, RouteSetting>()? {
                    routes.insert(key, setting);
                }
                Ok(routes)
            }
        }

        deserializer.deserialize_map(RoutesVisitor)
    }
}

// ============================================================================
// Interceptor Configuration
// ============================================================================

/// Behaviour of the response interceptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorConfig {
    /// Largest request or response body, in bytes, the interceptor buffers
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,

    /// Answer conditional GET/HEAD requests with `304 Not Modified`
    #[serde(default = "default_true")]
    pub conditional: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            body_limit: default_body_limit(),
            conditional: default_true(),
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub routes: RoutesConfig,

    #[serde(default)]
    pub interceptor: InterceptorConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_route_setting() -> impl Strategy<Value = RouteSetting> {
        prop_oneof![
            (0u64..=86_400).prop_map(RouteSetting::Ttl),
            (1u64..=3600).prop_map(|ttl| RouteSetting::with_cors(ttl, CorsSetting::Origin("*".into()))),
            (1u64..=3600, prop::collection::vec("https://[a-z]{1,8}\\.example", 1..4))
                .prop_map(|(ttl, origins)| RouteSetting::with_cors(ttl, CorsSetting::Origins(origins))),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Serializing a route table and reading it back keeps every entry in place.
        #[test]
        fn prop_routes_json_round_trip_keeps_order(
            entries in prop::collection::vec(("(get|post|all) /[a-z]{1,6}", arb_route_setting()), 0..8)
        ) {
            let routes: RoutesConfig = entries.into_iter().collect();
            let json = serde_json::to_string(&routes).expect("routes serialize");
            let back: RoutesConfig = serde_json::from_str(&json).expect("routes deserialize");
            prop_assert_eq!(routes, back);
        }
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.adapter_kind().unwrap(), CacheAdapter::Memory);
        assert_eq!(config.redis.key_prefix, "staticize");
    }

    #[test]
    fn test_unknown_adapter_is_rejected() {
        let config = CacheConfig {
            adapter: "mongodb".to_string(),
            ..Default::default()
        };
        let err = config.adapter_kind().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedAdapter(name) if name == "mongodb"));
    }

    #[test]
    fn test_route_setting_forms_from_toml() {
        let settings: Settings = toml::from_str(
            r#"
[routes]
"get /a" = 60
"get /b" = { ttl = 30, cors = "*" }
"get /c" = { ttl = 10, cors = ["https://x.example", "https://y.example"] }
"get /d" = "sixty"
"#,
        )
        .expect("settings parse");

        let values: Vec<_> = settings.routes.iter().map(|(_, v)| v.clone()).collect();
        assert!(values.contains(&RouteSetting::Ttl(60)));
        assert!(values.contains(&RouteSetting::with_cors(30, CorsSetting::Origin("*".into()))));
        assert!(values.contains(&RouteSetting::with_cors(
            10,
            CorsSetting::Origins(vec!["https://x.example".into(), "https://y.example".into()])
        )));
        assert!(values.contains(&RouteSetting::Invalid(serde_json::json!("sixty"))));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut routes = RoutesConfig::new().route("get /a", 1).route("get /b", 2);
        routes.insert("get /a", 5);
        let keys: Vec<_> = routes.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["get /a", "get /b"]);
        assert_eq!(routes.iter().next().unwrap().1, &RouteSetting::Ttl(5));
    }

    #[test]
    fn test_logger_settings_into_config() {
        let settings = LoggerSettings {
            file: FileSettings {
                format: "compact".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = settings.into_logger_config().expect("valid logger settings");
        assert_eq!(config.file.format, LogFormat::Compact);
    }

    #[test]
    fn test_logger_settings_bad_format() {
        let settings = LoggerSettings {
            file: FileSettings {
                format: "xml".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = settings.into_logger_config().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "logger.file.format")
        );
    }
}
