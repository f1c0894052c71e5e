//! Check command handler: validate configuration and show the route table

use crate::config::Settings;
use crate::error::AppResult;
use crate::routing::RouteTable;

pub struct CheckCommandHandler {
    config: Settings,
}

impl CheckCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> AppResult<()> {
        self.config.validate()?;
        let table = RouteTable::from_config(&self.config.routes)?;
        print!("{}", self.report(&table));
        Ok(())
    }

    /// Human readable summary, rules listed in match order
    pub fn report(&self, table: &RouteTable) -> String {
        let cache = &self.config.cache;
        let state = if cache.enabled { "enabled" } else { "disabled" };
        let mut out = format!("cache: {} ({state})\n", cache.adapter);

        if table.is_empty() {
            out.push_str("routes: none, only layers with a TTL override will cache\n");
            return out;
        }

        out.push_str(&format!("routes ({}, first match wins):\n", table.len()));
        for (i, rule) in table.rules().iter().enumerate() {
            let cors = rule.cors().map_or_else(|| "-".to_string(), ToString::to_string);
            out.push_str(&format!(
                "  {:>2}. {:<7} {:<32} ttl={:<6} cors={}\n",
                i + 1,
                rule.method(),
                rule.pattern().as_str(),
                rule.ttl(),
                cors
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorsSetting, RouteSetting, RoutesConfig};

    #[test]
    fn test_report_lists_rules_in_order() {
        let config = Settings {
            routes: RoutesConfig::new()
                .route("/cache120s", 120)
                .route(
                    "get /posts/:id",
                    RouteSetting::with_cors(60, CorsSetting::Origin("*".into())),
                ),
            ..Default::default()
        };
        let table = RouteTable::from_config(&config.routes).unwrap();
        let report = CheckCommandHandler::new(config).report(&table);

        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines[0], "cache: memory (enabled)");
        assert!(lines[2].contains("all") && lines[2].contains("/cache120s") && lines[2].contains("cors=-"));
        assert!(lines[3].contains("GET") && lines[3].contains("/posts/:id") && lines[3].contains("cors=*"));
    }

    #[test]
    fn test_execute_rejects_invalid_config() {
        let mut config = Settings::default();
        config.cache.adapter = "disk".to_string();
        assert!(CheckCommandHandler::new(config).execute().is_err());
    }

    #[test]
    fn test_report_without_routes() {
        let config = Settings {
            routes: RoutesConfig::new(),
            ..Default::default()
        };
        let table = RouteTable::from_config(&config.routes).unwrap();
        let report = CheckCommandHandler::new(config).report(&table);
        assert_eq!(
            report,
            "cache: memory (enabled)\nroutes: none, only layers with a TTL override will cache\n"
        );
    }
}
