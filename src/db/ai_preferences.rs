use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{AiPreference, DbAiPreference},
};

/// Stores the instructions for a child, replacing any earlier ones.
#[instrument(skip(pool, ai_instructions))]
pub async fn save_ai_preference(
    pool: &Pool<Sqlite>,
    child_id: i64,
    ai_instructions: &str,
) -> Result<AiPreference, AppError> {
    info!("Saving AI preference");
    sqlx::query(
        "INSERT INTO ai_preferences (child_id, ai_instructions) VALUES (?, ?)
         ON CONFLICT(child_id) DO UPDATE SET
             ai_instructions = excluded.ai_instructions,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(child_id)
    .bind(ai_instructions)
    .execute(pool)
    .await?;

    get_ai_preference(pool, child_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("AI preference for child {} vanished", child_id)))
}

#[instrument(skip(pool))]
pub async fn get_ai_preference(
    pool: &Pool<Sqlite>,
    child_id: i64,
) -> Result<Option<AiPreference>, AppError> {
    info!("Getting AI preference");
    let row = sqlx::query_as::<_, DbAiPreference>(
        "SELECT id, child_id, ai_instructions, created_at, updated_at
         FROM ai_preferences WHERE child_id = ?",
    )
    .bind(child_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(AiPreference::from))
}

#[instrument(skip(pool))]
pub async fn delete_ai_preference(pool: &Pool<Sqlite>, child_id: i64) -> Result<bool, AppError> {
    info!("Deleting AI preference");
    let res = sqlx::query("DELETE FROM ai_preferences WHERE child_id = ?")
        .bind(child_id)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}
