use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use thrivepath::database::{CURRENT_SCHEMA, MigrationError, migrate_database_declaratively};
use thrivepath::env::{AppConfig, ConfigError, load_environment};
use thrivepath::telemetry::init_tracing;
use thrivepath::{init_rocket, spawn_session_cleanup};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let environment = load_environment()?;
    init_tracing();
    environment.log();

    let config = AppConfig::from_env()?;

    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(options).await?;

    info!("Running declarative schema migration...");
    let changed = migrate_database_declaratively(
        pool.clone(),
        CURRENT_SCHEMA,
        config.allow_destructive_migrations,
    )
    .await?;
    if changed {
        info!("Database schema updated");
    } else {
        info!("Database schema already up to date");
    }

    spawn_session_cleanup(pool.clone(), config.session_cleanup_interval);

    let _rocket = init_rocket(pool, config).launch().await?;

    Ok(())
}
