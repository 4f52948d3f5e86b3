pub mod migrate;

use crate::Config;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Manage the users schema
    Migrate {
        #[command(subcommand)]
        action: migrate::MigrateAction,
    },
}

/// Run a one-shot command; `Serve` is handled by the caller
pub async fn handle_command(
    command: Commands,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Serve => Ok(()),
        Commands::Migrate { action } => migrate::handle_migrate_command(action, config).await,
    }
}
