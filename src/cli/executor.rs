//! Command executor for dispatching CLI commands

use super::handlers::{CheckCommandHandler, ServeCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::Settings;
use crate::error::AppResult;

/// Execute a CLI command with merged and validated settings
///
/// `serve` is the default when no subcommand is given.
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    match &cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(*dry_run).await
        }
        None => ServeCommandHandler::new(settings).execute(false).await,
        Some(Commands::Check) => CheckCommandHandler::new(settings).execute(),
    }
}
