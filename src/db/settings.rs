use serde_json::{Map, Value};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{DbTherapistSettings, TherapistSettings},
};

#[instrument(skip(pool))]
pub async fn get_therapist_settings(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<TherapistSettings, AppError> {
    info!("Getting therapist settings");
    let row = sqlx::query_as::<_, DbTherapistSettings>(
        "SELECT id, user_id, profile_settings, account_settings, updated_at
         FROM therapists WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(settings) => Ok(TherapistSettings::from(settings)),
        _ => Err(AppError::NotFound(format!(
            "Settings for user {} not found",
            user_id
        ))),
    }
}

async fn write_settings_section(
    pool: &Pool<Sqlite>,
    user_id: i64,
    column: &str,
    section: &Map<String, Value>,
) -> Result<TherapistSettings, AppError> {
    let serialized = serde_json::to_string(section)?;

    let res = sqlx::query(&format!(
        "UPDATE therapists SET {} = ?, updated_at = CURRENT_TIMESTAMP WHERE user_id = ?",
        column
    ))
    .bind(serialized)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Settings for user {} not found",
            user_id
        )));
    }

    get_therapist_settings(pool, user_id).await
}

/// Replaces the profile section of the therapist's settings.
#[instrument(skip(pool, section))]
pub async fn update_therapist_profile_settings(
    pool: &Pool<Sqlite>,
    user_id: i64,
    section: &Map<String, Value>,
) -> Result<TherapistSettings, AppError> {
    info!("Updating therapist profile settings");
    write_settings_section(pool, user_id, "profile_settings", section).await
}

/// Replaces the account section of the therapist's settings.
#[instrument(skip(pool, section))]
pub async fn update_therapist_account_settings(
    pool: &Pool<Sqlite>,
    user_id: i64,
    section: &Map<String, Value>,
) -> Result<TherapistSettings, AppError> {
    info!("Updating therapist account settings");
    write_settings_section(pool, user_id, "account_settings", section).await
}
