use chrono::{DateTime, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::therapist_for;
use crate::auth::{Permission, User};
use crate::db::{delete_ai_preference, get_ai_preference, get_child, save_ai_preference};
use crate::error::AppError;
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, ToValidationResponse};

#[derive(Deserialize, Validate)]
pub struct AiPreferencesRequest {
    #[validate(length(max = 10000, message = "Instructions must be at most 10000 characters"))]
    ai_instructions: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AiPreferencesResponse {
    pub child_id: i64,
    pub ai_instructions: String,
    pub updated_at: Option<DateTime<Utc>>,
}

// Only the child's primary therapist may read or change its preferences.
async fn authorize_child(
    db: &Pool<Sqlite>,
    user: &User,
    child_id: i64,
) -> Result<(), ApiError> {
    let therapist = therapist_for(db, user, Permission::ManageAiPreferences).await?;
    let child = get_child(db, child_id).await.validate_custom()?;

    if child.primary_therapist_id != Some(therapist.id) {
        return Err(AppError::Authorization(format!(
            "Therapist {} is not the primary therapist for child {}",
            therapist.id, child_id
        ))
        .to_validation_response());
    }

    Ok(())
}

#[get("/learners/<child_id>/ai-preferences")]
pub async fn api_get_ai_preferences(
    child_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AiPreferencesResponse>, ApiError> {
    authorize_child(db, &user, child_id).await?;

    let response = match get_ai_preference(db, child_id).await.validate_custom()? {
        Some(pref) => AiPreferencesResponse {
            child_id,
            ai_instructions: pref.ai_instructions,
            updated_at: Some(pref.updated_at),
        },
        None => AiPreferencesResponse {
            child_id,
            ai_instructions: String::new(),
            updated_at: None,
        },
    };

    Ok(Json(response))
}

#[post("/learners/<child_id>/ai-preferences", data = "<request>")]
pub async fn api_save_ai_preferences(
    child_id: i64,
    request: Json<AiPreferencesRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AiPreferencesResponse>, ApiError> {
    authorize_child(db, &user, child_id).await?;
    let validated = request.validate_custom()?;

    let pref = save_ai_preference(db, child_id, &validated.ai_instructions)
        .await
        .validate_custom()?;

    Ok(Json(AiPreferencesResponse {
        child_id,
        ai_instructions: pref.ai_instructions,
        updated_at: Some(pref.updated_at),
    }))
}

#[delete("/learners/<child_id>/ai-preferences")]
pub async fn api_delete_ai_preferences(
    child_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    authorize_child(db, &user, child_id).await?;

    delete_ai_preference(db, child_id).await.validate_custom()?;
    Ok(Status::NoContent)
}
