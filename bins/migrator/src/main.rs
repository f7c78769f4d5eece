//! Database migration runner for Settla.
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations
//!
//! The connection comes from `AppConfig` (`config/*.toml` and `SETTLA__*`).

use anyhow::{Context, bail};
use sea_orm_migration::MigratorTrait;
use settla_db::migration::Migrator;
use settla_shared::AppConfig;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = settla_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    match command.as_str() {
        "up" => {
            Migrator::up(&db, None).await?;
            info!("Migrations applied");
        }
        "down" => {
            Migrator::down(&db, Some(1)).await?;
            info!("Last migration rolled back");
        }
        "status" => Migrator::status(&db).await?,
        "fresh" => {
            Migrator::fresh(&db).await?;
            info!("Schema recreated");
        }
        other => bail!("unknown command '{other}', expected one of: up, down, status, fresh"),
    }

    Ok(())
}
