use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    auth::Role,
    error::AppError,
    models::{DbParent, DbTherapist, Parent, Profile, Therapist},
};

#[instrument(skip(pool))]
pub async fn get_therapist_by_user_id(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Therapist, AppError> {
    info!("Getting therapist by user ID");
    let row = sqlx::query_as::<_, DbTherapist>(
        "SELECT id, user_id, first_name, last_name, email, phone, bio, is_active, created_at, updated_at
         FROM therapists WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(therapist) => Ok(Therapist::from(therapist)),
        _ => Err(AppError::NotFound(format!(
            "Therapist profile for user {} not found",
            user_id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn get_therapist(pool: &Pool<Sqlite>, therapist_id: i64) -> Result<Therapist, AppError> {
    info!("Getting therapist");
    let row = sqlx::query_as::<_, DbTherapist>(
        "SELECT id, user_id, first_name, last_name, email, phone, bio, is_active, created_at, updated_at
         FROM therapists WHERE id = ?",
    )
    .bind(therapist_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(therapist) => Ok(Therapist::from(therapist)),
        _ => Err(AppError::NotFound(format!(
            "Therapist with id {} not found",
            therapist_id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn update_therapist_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    first_name: &str,
    last_name: &str,
    phone: Option<&str>,
    bio: Option<&str>,
) -> Result<Therapist, AppError> {
    info!("Updating therapist profile");
    let res = sqlx::query(
        "UPDATE therapists
         SET first_name = ?, last_name = ?, phone = ?, bio = ?, updated_at = CURRENT_TIMESTAMP
         WHERE user_id = ?",
    )
    .bind(first_name.trim())
    .bind(last_name.trim())
    .bind(phone)
    .bind(bio)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Therapist profile for user {} not found",
            user_id
        )));
    }

    get_therapist_by_user_id(pool, user_id).await
}

#[instrument(skip(pool))]
pub async fn get_active_therapists(pool: &Pool<Sqlite>) -> Result<Vec<Therapist>, AppError> {
    info!("Getting active therapists");
    let rows = sqlx::query_as::<_, DbTherapist>(
        "SELECT id, user_id, first_name, last_name, email, phone, bio, is_active, created_at, updated_at
         FROM therapists
         WHERE is_active = 1
         ORDER BY last_name, first_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Therapist::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_parent_by_user_id(pool: &Pool<Sqlite>, user_id: i64) -> Result<Parent, AppError> {
    info!("Getting parent by user ID");
    let row = sqlx::query_as::<_, DbParent>(
        "SELECT id, user_id, first_name, last_name, email, phone, address, emergency_contact,
                is_active, created_at, updated_at
         FROM parents WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(parent) => Ok(Parent::from(parent)),
        _ => Err(AppError::NotFound(format!(
            "Parent profile for user {} not found",
            user_id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn update_parent_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    first_name: &str,
    last_name: &str,
    phone: Option<&str>,
    address: Option<&str>,
    emergency_contact: Option<&str>,
) -> Result<Parent, AppError> {
    info!("Updating parent profile");
    let res = sqlx::query(
        "UPDATE parents
         SET first_name = ?, last_name = ?, phone = ?, address = ?, emergency_contact = ?,
             updated_at = CURRENT_TIMESTAMP
         WHERE user_id = ?",
    )
    .bind(first_name.trim())
    .bind(last_name.trim())
    .bind(phone)
    .bind(address)
    .bind(emergency_contact)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Parent profile for user {} not found",
            user_id
        )));
    }

    get_parent_by_user_id(pool, user_id).await
}

#[instrument(skip(pool))]
pub async fn get_active_parents(pool: &Pool<Sqlite>) -> Result<Vec<Parent>, AppError> {
    info!("Getting active parents");
    let rows = sqlx::query_as::<_, DbParent>(
        "SELECT id, user_id, first_name, last_name, email, phone, address, emergency_contact,
                is_active, created_at, updated_at
         FROM parents
         WHERE is_active = 1
         ORDER BY last_name, first_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Parent::from).collect())
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Case-insensitive substring match on first or last name across active
/// profiles. Therapists come before parents.
#[instrument(skip(pool))]
pub async fn search_profiles_by_name(
    pool: &Pool<Sqlite>,
    term: &str,
    role: Option<Role>,
) -> Result<Vec<Profile>, AppError> {
    info!("Searching profiles by name");
    let pattern = like_pattern(term);
    let mut profiles = Vec::new();

    if role.is_none_or(|r| r == Role::Therapist) {
        let rows = sqlx::query_as::<_, DbTherapist>(
            "SELECT id, user_id, first_name, last_name, email, phone, bio, is_active, created_at, updated_at
             FROM therapists
             WHERE is_active = 1
               AND (lower(first_name) LIKE ? ESCAPE '\\' OR lower(last_name) LIKE ? ESCAPE '\\')
             ORDER BY last_name, first_name",
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(pool)
        .await?;

        profiles.extend(rows.into_iter().map(|r| Profile::Therapist(r.into())));
    }

    if role.is_none_or(|r| r == Role::Parent) {
        let rows = sqlx::query_as::<_, DbParent>(
            "SELECT id, user_id, first_name, last_name, email, phone, address, emergency_contact,
                    is_active, created_at, updated_at
             FROM parents
             WHERE is_active = 1
               AND (lower(first_name) LIKE ? ESCAPE '\\' OR lower(last_name) LIKE ? ESCAPE '\\')
             ORDER BY last_name, first_name",
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(pool)
        .await?;

        profiles.extend(rows.into_iter().map(|r| Profile::Parent(r.into())));
    }

    Ok(profiles)
}

/// Removes a therapist profile. Their session notes go with it; children
/// they were primary for are left unassigned.
#[instrument(skip(pool))]
pub async fn delete_therapist(pool: &Pool<Sqlite>, therapist_id: i64) -> Result<bool, AppError> {
    info!("Deleting therapist");
    let res = sqlx::query("DELETE FROM therapists WHERE id = ?")
        .bind(therapist_id)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}
