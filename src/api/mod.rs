use rocket::http::Status;
use rocket::{Catcher, Request, Route};
use rocket::serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, User};
use crate::db::get_therapist_by_user_id;
use crate::models::Therapist;
use crate::validation::{ApiError, AppErrorExt, PermissionCheckExt, ToValidationResponse};

pub mod ai_preferences;
pub mod auth;
pub mod children;
pub mod notes;
pub mod profiles;
pub mod settings;

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role.to_string(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            last_login: user.last_login.map(|dt| dt.to_rfc3339()),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Resolves the therapist profile behind the request, checking `permission` first.
pub(crate) async fn therapist_for(
    db: &Pool<Sqlite>,
    user: &User,
    permission: Permission,
) -> Result<Therapist, ApiError> {
    user.require_permission(permission).validate_custom()?;
    get_therapist_by_user_id(db, user.id).await.validate_custom()
}

#[catch(400)]
pub fn bad_request_api(_req: &Request) -> ApiError {
    Status::BadRequest.to_validation_response()
}

#[catch(404)]
pub fn not_found_api(_req: &Request) -> ApiError {
    Status::NotFound.to_validation_response()
}

#[catch(422)]
pub fn unprocessable_api(_req: &Request) -> ApiError {
    Status::UnprocessableEntity.to_validation_response()
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        crate::auth::unauthorized_api,
        crate::auth::forbidden_api,
        bad_request_api,
        not_found_api,
        unprocessable_api,
    ]
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

pub fn routes() -> Vec<Route> {
    routes![
        health,
        auth::api_login,
        auth::api_logout,
        auth::api_me,
        auth::api_me_unauthorized,
        auth::api_register,
        auth::api_change_password,
        profiles::api_get_profile,
        profiles::api_update_profile,
        profiles::api_get_therapists,
        profiles::api_get_parents,
        profiles::api_search_profiles,
        settings::api_get_settings,
        settings::api_update_profile_settings,
        settings::api_update_account_settings,
        notes::api_get_notes_by_date,
        notes::api_get_note_dates,
        notes::api_get_notes_in_range,
        notes::api_create_note,
        notes::api_update_note,
        notes::api_delete_note,
        children::api_get_children,
        children::api_create_child,
        ai_preferences::api_get_ai_preferences,
        ai_preferences::api_save_ai_preferences,
        ai_preferences::api_delete_ai_preferences,
    ]
}
