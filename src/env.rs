use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_SESSION_TTL_HOURS: i64 = 1;
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
const DEFAULT_SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Environment variable {key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to load environment file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

/// Env files found (or not) by `load_environment`, logged once tracing is up.
#[derive(Debug, Default)]
pub struct LoadedEnvironment {
    pub loaded: Vec<&'static str>,
    pub missing: Vec<&'static str>,
}

impl LoadedEnvironment {
    pub fn log(&self) {
        for path in &self.loaded {
            info!("Loaded environment from: {}", path);
        }
        for path in &self.missing {
            warn!("Warning: Environment file {} not found, skipping", path);
        }
    }
}

pub fn load_environment() -> Result<LoadedEnvironment, ConfigError> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    let mut environment = LoadedEnvironment::default();
    for env_file in env_files {
        if load_env_file(env_file)? {
            environment.loaded.push(env_file);
        } else {
            environment.missing.push(env_file);
        }
    }

    Ok(environment)
}

pub(crate) fn load_env_file(path: &str) -> Result<bool, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(false);
    }

    dotenvy::from_filename_override(path)?;
    Ok(true)
}

/// Service settings that live outside Rocket's own figment config.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub allow_destructive_migrations: bool,
    pub session_ttl: chrono::Duration,
    pub session_cleanup_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            allow_destructive_migrations: false,
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            session_cleanup_interval: Duration::from_secs(DEFAULT_SESSION_CLEANUP_INTERVAL_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => return Err(ConfigError::Missing("DATABASE_URL")),
        };

        let allow_destructive_migrations =
            parse_var("ALLOW_DESTRUCTIVE_MIGRATIONS")?.unwrap_or(false);

        let ttl_hours: i64 =
            parse_var("SESSION_TTL_HOURS")?.unwrap_or(DEFAULT_SESSION_TTL_HOURS);
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&ttl_hours) {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                value: ttl_hours.to_string(),
            });
        }

        let cleanup_secs: u64 = parse_var("SESSION_CLEANUP_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_SESSION_CLEANUP_INTERVAL_SECS);
        if cleanup_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_CLEANUP_INTERVAL_SECS",
                value: cleanup_secs.to_string(),
            });
        }

        Ok(Self {
            database_url,
            allow_destructive_migrations,
            session_ttl: chrono::Duration::hours(ttl_hours),
            session_cleanup_interval: Duration::from_secs(cleanup_secs),
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(None),
    }
}
