use anyhow::{bail, Context};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use nexus_erp::{config, db, migrator::Migrator};

/// Applies or inspects schema migrations against the configured database.
///
/// Usage: `migration [up|down|status|fresh]` (default `up`).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    match command.as_str() {
        "up" => db::run_migrations(&pool).await?,
        "down" => {
            info!("Rolling back the latest migration");
            Migrator::down(&pool, Some(1)).await?;
        }
        "status" => Migrator::status(&pool).await?,
        "fresh" => {
            if cfg.is_production() {
                bail!("refusing to drop every table in production");
            }
            info!("Dropping all tables and re-applying migrations");
            Migrator::fresh(&pool).await?;
        }
        other => bail!("unknown command {other}; expected up, down, status or fresh"),
    }

    info!(command = %command, "Migration command completed");
    Ok(())
}
