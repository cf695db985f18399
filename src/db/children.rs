use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{Child, DbChild},
};

#[instrument(skip(pool))]
pub async fn create_child(
    pool: &Pool<Sqlite>,
    first_name: &str,
    last_name: &str,
    date_of_birth: Option<NaiveDate>,
    primary_therapist_id: Option<i64>,
) -> Result<Child, AppError> {
    info!("Creating child");
    let res = sqlx::query(
        "INSERT INTO children (first_name, last_name, date_of_birth, primary_therapist_id)
         VALUES (?, ?, ?, ?)",
    )
    .bind(first_name.trim())
    .bind(last_name.trim())
    .bind(date_of_birth)
    .bind(primary_therapist_id)
    .execute(pool)
    .await?;

    get_child(pool, res.last_insert_rowid()).await
}

#[instrument(skip(pool))]
pub async fn get_child(pool: &Pool<Sqlite>, child_id: i64) -> Result<Child, AppError> {
    info!("Getting child");
    let row = sqlx::query_as::<_, DbChild>(
        "SELECT id, first_name, last_name, date_of_birth, primary_therapist_id, created_at, updated_at
         FROM children WHERE id = ?",
    )
    .bind(child_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(child) => Ok(Child::from(child)),
        _ => Err(AppError::NotFound(format!(
            "Child with id {} not found",
            child_id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn get_children_for_therapist(
    pool: &Pool<Sqlite>,
    therapist_id: i64,
) -> Result<Vec<Child>, AppError> {
    info!("Getting children for therapist");
    let rows = sqlx::query_as::<_, DbChild>(
        "SELECT id, first_name, last_name, date_of_birth, primary_therapist_id, created_at, updated_at
         FROM children
         WHERE primary_therapist_id = ?
         ORDER BY last_name, first_name",
    )
    .bind(therapist_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Child::from).collect())
}

#[instrument(skip(pool))]
pub async fn delete_child(pool: &Pool<Sqlite>, child_id: i64) -> Result<bool, AppError> {
    info!("Deleting child");
    let res = sqlx::query("DELETE FROM children WHERE id = ?")
        .bind(child_id)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}
