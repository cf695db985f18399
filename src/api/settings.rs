use rocket::State;
use rocket::serde::{Deserialize, json::Json};
use serde_json::{Map, Value};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, User};
use crate::db::{
    get_therapist_settings, update_therapist_account_settings, update_therapist_profile_settings,
};
use crate::models::TherapistSettings;
use crate::validation::{ApiError, AppErrorExt, PermissionCheckExt};

#[derive(Deserialize)]
pub struct SettingsUpdateRequest {
    settings: Map<String, Value>,
}

#[get("/settings")]
pub async fn api_get_settings(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TherapistSettings>, ApiError> {
    user.require_permission(Permission::ManageSettings)
        .validate_custom()?;

    let settings = get_therapist_settings(db, user.id).await.validate_custom()?;
    Ok(Json(settings))
}

#[put("/settings/profile", data = "<update>")]
pub async fn api_update_profile_settings(
    update: Json<SettingsUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TherapistSettings>, ApiError> {
    user.require_permission(Permission::ManageSettings)
        .validate_custom()?;

    let settings = update_therapist_profile_settings(db, user.id, &update.settings)
        .await
        .validate_custom()?;
    Ok(Json(settings))
}

#[put("/settings/account", data = "<update>")]
pub async fn api_update_account_settings(
    update: Json<SettingsUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TherapistSettings>, ApiError> {
    user.require_permission(Permission::ManageSettings)
        .validate_custom()?;

    let settings = update_therapist_account_settings(db, user.id, &update.settings)
        .await
        .validate_custom()?;
    Ok(Json(settings))
}
