//! Ordered route table resolving `(method, path)` to a TTL and CORS policy.

use std::fmt;

use axum::http::Method;
use tracing::debug;

use crate::config::{ConfigError, CorsSetting, RouteOptions, RouteSetting, RoutesConfig};
use crate::routing::pattern::PathPattern;

const TTL_MESSAGE: &str = "TTL must be a non-negative integer number of seconds";

/// Which origins get `Access-Control-Allow-Origin` on a replayed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    Any,
    Origins(Vec<String>),
}

impl CorsPolicy {
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            CorsPolicy::Any => true,
            CorsPolicy::Origins(origins) => {
                let origin = origin.trim_end_matches('/');
                origins.iter().any(|allowed| allowed == origin)
            }
        }
    }

    fn from_setting(setting: &CorsSetting) -> Result<Self, String> {
        let origins = match setting {
            CorsSetting::Origin(origin) => vec![origin.clone()],
            CorsSetting::Origins(origins) if origins.is_empty() => {
                return Err("CORS origin list cannot be empty".to_string());
            }
            CorsSetting::Origins(origins) => origins.clone(),
        };

        let mut allowed = Vec::with_capacity(origins.len());
        for origin in origins {
            let origin = origin.trim();
            if origin == "*" {
                return Ok(CorsPolicy::Any);
            }
            if origin.is_empty() {
                return Err("CORS origin cannot be empty".to_string());
            }
            if !origin.contains("://") || origin.contains(char::is_whitespace) {
                return Err(format!(
                    "CORS origin '{origin}' must be \"*\" or a scheme://host origin"
                ));
            }
            allowed.push(origin.trim_end_matches('/').to_string());
        }

        Ok(CorsPolicy::Origins(allowed))
    }
}

impl fmt::Display for CorsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsPolicy::Any => f.write_str("*"),
            CorsPolicy::Origins(origins) => f.write_str(&origins.join(", ")),
        }
    }
}

/// Method selector of a rule; `None` applies to every method.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MethodFilter(Option<Method>);

impl MethodFilter {
    fn parse(token: &str) -> Result<Self, String> {
        let method = match token.to_ascii_lowercase().as_str() {
            "all" | "*" => return Ok(MethodFilter(None)),
            "get" => Method::GET,
            "head" => Method::HEAD,
            "post" => Method::POST,
            "put" => Method::PUT,
            "patch" => Method::PATCH,
            "delete" => Method::DELETE,
            "options" => Method::OPTIONS,
            "trace" => Method::TRACE,
            "connect" => Method::CONNECT,
            other => return Err(format!("unknown HTTP method '{other}'")),
        };
        Ok(MethodFilter(Some(method)))
    }

    // GET rules also answer HEAD, like the router does
    fn accepts(&self, method: &Method) -> bool {
        match &self.0 {
            None => true,
            Some(m) if m == method => true,
            Some(m) => *m == Method::GET && *method == Method::HEAD,
        }
    }

    fn label(&self) -> &str {
        self.0.as_ref().map_or("all", Method::as_str)
    }
}

/// One compiled `[routes]` entry
#[derive(Debug, Clone)]
pub struct RouteRule {
    method: MethodFilter,
    pattern: PathPattern,
    ttl: u64,
    cors: Option<CorsPolicy>,
}

impl RouteRule {
    /// Compile a rule from a method token (`get`, `all`, ...), a path
    /// pattern, a TTL and an optional CORS setting.
    pub fn new(
        method: &str,
        pattern: &str,
        ttl: u64,
        cors: Option<&CorsSetting>,
    ) -> Result<Self, ConfigError> {
        let route = format!("{method} {pattern}");
        let method = MethodFilter::parse(method).map_err(|m| ConfigError::invalid_route(&route, m))?;
        let pattern = match pattern {
            "*" => "/*",
            other => other,
        };
        let pattern = PathPattern::compile(pattern).map_err(|m| ConfigError::invalid_route(&route, m))?;
        let cors = cors
            .map(CorsPolicy::from_setting)
            .transpose()
            .map_err(|m| ConfigError::invalid_route(&route, m))?;

        Ok(Self {
            method,
            pattern,
            ttl,
            cors,
        })
    }

    /// Compile a rule from a configuration key and value
    pub fn from_entry(key: &str, setting: &RouteSetting) -> Result<Self, ConfigError> {
        let (method, path) = split_key(key).map_err(|m| ConfigError::invalid_route(key, m))?;

        let (ttl, cors) = match setting {
            RouteSetting::Ttl(ttl) => (*ttl, None),
            RouteSetting::Detailed(RouteOptions { ttl, cors }) => (*ttl, cors.as_ref()),
            RouteSetting::Invalid(value) => {
                return Err(ConfigError::invalid_route(key, describe_invalid(value)));
            }
        };

        Self::new(method, path, ttl, cors).map_err(|e| match e {
            ConfigError::InvalidRoute { message, .. } => ConfigError::invalid_route(key, message),
            other => other,
        })
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.accepts(method) && self.pattern.is_match(path)
    }

    pub fn method(&self) -> &str {
        self.method.label()
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn cors(&self) -> Option<&CorsPolicy> {
        self.cors.as_ref()
    }
}

fn split_key(key: &str) -> Result<(&str, &str), String> {
    let mut parts = key.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(path), None, None) if path.starts_with('/') || path == "*" => Ok(("all", path)),
        (Some(method), Some(path), None) => Ok((method, path)),
        (None, _, _) => Err("route key cannot be empty".to_string()),
        _ => Err("route key must be \"<method> <path>\" or \"<path>\"".to_string()),
    }
}

fn describe_invalid(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Object(map) => match map.get("ttl") {
            None => "route options need a `ttl`".to_string(),
            Some(ttl) if !ttl.is_u64() => format!("{TTL_MESSAGE}, got {ttl}"),
            Some(_) => match map.keys().find(|k| *k != "ttl" && *k != "cors") {
                Some(unknown) => format!("unknown route option `{unknown}`"),
                None => "CORS must be an origin string or a list of origin strings".to_string(),
            },
        },
        other => format!("{TTL_MESSAGE}, got {other}"),
    }
}

/// Result of a successful lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    pub ttl: u64,
    pub cors: Option<&'a CorsPolicy>,
}

/// Rules in registration order. The first rule that matches wins; there is
/// no ranking by specificity.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Compile every `[routes]` entry, failing on the first invalid one
    pub fn from_config(routes: &RoutesConfig) -> Result<Self, ConfigError> {
        let rules = routes
            .iter()
            .map(|(key, setting)| RouteRule::from_entry(key, setting))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rules = rules.len(), "Route table compiled");
        Ok(Self::new(rules))
    }

    /// Resolve the TTL and CORS policy for a request.
    ///
    /// A positive `override_ttl` wins over the rule TTL but the CORS policy
    /// still comes from the first matching rule. A TTL of zero resolves to
    /// `None`, meaning the response is not cached.
    pub fn resolve(
        &self,
        method: &Method,
        path: &str,
        override_ttl: Option<u64>,
    ) -> Option<ResolvedRoute<'_>> {
        let rule = self.rules.iter().find(|rule| rule.matches(method, path));

        match override_ttl.filter(|ttl| *ttl > 0) {
            Some(ttl) => Some(ResolvedRoute {
                ttl,
                cors: rule.and_then(RouteRule::cors),
            }),
            None => rule.filter(|rule| rule.ttl > 0).map(|rule| ResolvedRoute {
                ttl: rule.ttl,
                cors: rule.cors(),
            }),
        }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
