//! Demo server behind the caching middleware
//!
//! This module handles server initialization, startup, and graceful shutdown.

mod request_id;
mod router;

pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use router::demo_router;

use tokio::net::TcpListener;
use tokio::signal;

use crate::Staticize;
use crate::config::{Environment, Settings};
use crate::error::{AppError, AppResult};

/// HTTP server manager
pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Start the server and run until a shutdown signal arrives
    ///
    /// # Errors
    /// - Cache backend initialization errors
    /// - Address binding errors
    /// - Server runtime errors
    pub async fn run(self) -> AppResult<()> {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %Environment::from_env(),
            "Application starting"
        );

        tracing::info!(
            host = %self.settings.server.host,
            port = %self.settings.server.port,
            request_timeout = %self.settings.server.request_timeout,
            "Server configuration loaded"
        );

        tracing::info!(
            level = %self.settings.logger.level,
            console_enabled = %self.settings.logger.console.enabled,
            file_enabled = %self.settings.logger.file.enabled,
            "Logger configuration loaded"
        );

        let staticize = Staticize::new(&self.settings).await?;
        let router = demo_router(&staticize, self.settings.server.request_timeout)?;
        tracing::info!("Router configured");

        let address = self.settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            AppError::Server {
                message: format!("Failed to bind to {address}"),
                source: e,
            }
        })?;

        tracing::info!(address = %address, "Server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::Server {
                message: "Server terminated unexpectedly".to_string(),
                source: e,
            })?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}

/// Waits for Ctrl+C or SIGTERM.
///
/// A signal handler that cannot be installed never fires; the other one
/// still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
