#[macro_use]
extern crate rocket;

pub mod api;
pub mod auth;
pub mod database;
pub mod db;
pub mod env;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use tracing::{error, info};

use db::clean_expired_sessions;
use env::AppConfig;
use telemetry::{TelemetryFairing, shutdown_telemetry};

pub fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting ThrivePath");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount("/api", api::routes())
        .register("/api", api::catchers())
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async move { shutdown_telemetry() })
        }))
}

/// Deletes expired login sessions every `interval` until the runtime stops.
pub fn spawn_session_cleanup(pool: SqlitePool, interval: std::time::Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(interval).await;
        }
    });
}
