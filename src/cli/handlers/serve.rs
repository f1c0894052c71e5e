//! Serve command handler
//!
//! Handles the serve command including dry-run validation and server startup.

use crate::config::Settings;
use crate::error::AppResult;
use crate::server::Server;

/// Handler for the serve command
pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Run the demo server until shutdown, or only validate with `dry_run`
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Cache backend or bind errors (if not dry-run)
    pub async fn execute(self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            self.validate_only()
        } else {
            Server::new(self.config).run().await
        }
    }

    /// Validate configuration without starting the server
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;

        println!("✓ Configuration is valid");
        println!("✓ Server would bind to: {}", self.config.server.address());
        println!(
            "✓ Cache adapter: {} (enabled: {})",
            self.config.cache.adapter, self.config.cache.enabled
        );
        println!("✓ Routes configured: {}", self.config.routes.len());
        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
