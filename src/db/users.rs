use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::{
    auth::{DbUser, Role, User},
    error::AppError,
    models::NewUser,
};

const BCRYPT_COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

#[derive(sqlx::FromRow)]
struct DbCredentials {
    id: i64,
    password_hash: String,
    is_active: Option<bool>,
}

/// Creates the login record and the matching therapist or parent profile
/// in one transaction. Returns the new user id.
#[instrument(skip(pool, new_user), fields(email = %new_user.email, role = %new_user.role))]
pub async fn create_user(pool: &Pool<Sqlite>, new_user: &NewUser) -> Result<i64, AppError> {
    info!("Creating user with profile");
    let email = normalize_email(&new_user.email);

    if find_user_by_email(pool, &email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "User with email {} already exists",
            email
        )));
    }

    let password_hash = hash_password(&new_user.password)?;

    let mut tx = pool.begin().await?;

    let res = sqlx::query("INSERT INTO users (email, password_hash, role) VALUES (?, ?, ?)")
        .bind(&email)
        .bind(&password_hash)
        .bind(new_user.role.as_str())
        .execute(&mut *tx)
        .await?;
    let user_id = res.last_insert_rowid();

    match new_user.role {
        Role::Therapist => {
            sqlx::query(
                "INSERT INTO therapists (user_id, first_name, last_name, email, phone)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(new_user.first_name.trim())
            .bind(new_user.last_name.trim())
            .bind(&email)
            .bind(new_user.phone.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        Role::Parent => {
            sqlx::query(
                "INSERT INTO parents (user_id, first_name, last_name, email, phone, address, emergency_contact)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(new_user.first_name.trim())
            .bind(new_user.last_name.trim())
            .bind(&email)
            .bind(new_user.phone.as_deref())
            .bind(new_user.address.as_deref())
            .bind(new_user.emergency_contact.as_deref())
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    Ok(user_id)
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, role, is_active, is_verified, last_login, created_at, updated_at
         FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => User::try_from(user),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, AppError> {
    info!("Finding user by email");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, role, is_active, is_verified, last_login, created_at, updated_at
         FROM users WHERE email = ?",
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;

    row.map(User::try_from).transpose()
}

/// Checks an email and password pair without recording a login. Unknown
/// emails, wrong passwords and deactivated accounts all yield `None`.
#[instrument(skip(pool, password))]
pub async fn verify_credentials(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<i64>, AppError> {
    let row = sqlx::query_as::<_, DbCredentials>(
        "SELECT id, password_hash, is_active FROM users WHERE email = ?",
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;

    let Some(credentials) = row else {
        return Ok(None);
    };

    if !credentials.is_active.unwrap_or(true) {
        warn!(user_id = %credentials.id, "Credential check for deactivated account");
        return Ok(None);
    }

    if !bcrypt::verify(password, &credentials.password_hash)? {
        return Ok(None);
    }

    Ok(Some(credentials.id))
}

/// Verifies credentials and stamps `last_login` on success.
#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let Some(user_id) = verify_credentials(pool, email, password).await? else {
        return Ok(None);
    };

    update_last_login(pool, user_id).await?;

    Ok(Some(get_user(pool, user_id).await?))
}

#[instrument(skip(pool))]
pub async fn update_last_login(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    info!("Updating last login");
    sqlx::query("UPDATE users SET last_login = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, new_password))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = hash_password(new_password)?;

    let res = sqlx::query(
        "UPDATE users SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(hashed_password)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
    }

    Ok(())
}

/// Flips the active flag on the user and on its profile row.
#[instrument(skip(pool))]
pub async fn set_user_active(
    pool: &Pool<Sqlite>,
    user_id: i64,
    active: bool,
) -> Result<bool, AppError> {
    info!("Toggling user active status");
    let mut tx = pool.begin().await?;

    let res = sqlx::query("UPDATE users SET is_active = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(active)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
    }

    for table in ["therapists", "parents"] {
        sqlx::query(&format!(
            "UPDATE {} SET is_active = ?, updated_at = CURRENT_TIMESTAMP WHERE user_id = ?",
            table
        ))
        .bind(active)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(active)
}

#[instrument(skip(pool))]
pub async fn set_user_verified(
    pool: &Pool<Sqlite>,
    user_id: i64,
    verified: bool,
) -> Result<bool, AppError> {
    info!("Toggling user verified status");
    let res = sqlx::query(
        "UPDATE users SET is_verified = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(verified)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
    }

    Ok(verified)
}

/// Removes the user. Profiles and login sessions go with it.
#[instrument(skip(pool))]
pub async fn delete_user(pool: &Pool<Sqlite>, user_id: i64) -> Result<bool, AppError> {
    info!("Deleting user");
    let res = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}
