use crate::Config;
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Apply pending migrations
    Up,
    /// Roll back applied migrations
    Down {
        #[arg(short, long, default_value = "1", help = "Migrations to roll back")]
        steps: u32,
    },
    /// Log applied and pending migrations
    Status,
}

pub async fn handle_migrate_command(
    action: MigrateAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    use crate::database::DatabaseManager;
    use crate::database::migration::Migrator;
    use sea_orm_migration::MigratorTrait;

    let database = DatabaseManager::new_from_config(&config.database).await?;
    let connection = database.connection();

    match action {
        MigrateAction::Up => {
            Migrator::up(connection, None).await?;
            info!("Users schema is up to date");
        }
        MigrateAction::Down { steps } => {
            Migrator::down(connection, Some(steps)).await?;
            info!(steps, "Rolled back migrations");
        }
        MigrateAction::Status => Migrator::status(connection).await?,
    }

    Ok(())
}
