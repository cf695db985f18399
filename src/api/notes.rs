use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use super::therapist_for;
use crate::auth::{Permission, User};
use crate::db::{
    create_session_note, delete_session_note, get_note_dates, get_notes_by_date,
    get_notes_by_date_range, update_session_note,
};
use crate::models::{NewSessionNote, SessionNote, SessionNoteUpdate};
use crate::error::AppError;
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, ToValidationResponse, bad_request};

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| bad_request(field, "Date must be formatted as YYYY-MM-DD"))
}

#[get("/notes/<date>")]
pub async fn api_get_notes_by_date(
    date: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SessionNote>>, ApiError> {
    let therapist = therapist_for(db, &user, Permission::WriteSessionNotes).await?;
    let session_date = parse_date("date", date)?;

    let notes = get_notes_by_date(db, therapist.id, session_date)
        .await
        .validate_custom()?;
    Ok(Json(notes))
}

#[get("/notes/dates/all")]
pub async fn api_get_note_dates(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let therapist = therapist_for(db, &user, Permission::WriteSessionNotes).await?;

    let dates = get_note_dates(db, therapist.id).await.validate_custom()?;
    Ok(Json(
        dates
            .into_iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect(),
    ))
}

#[get("/notes?<start_date>&<end_date>")]
pub async fn api_get_notes_in_range(
    start_date: &str,
    end_date: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SessionNote>>, ApiError> {
    let therapist = therapist_for(db, &user, Permission::WriteSessionNotes).await?;
    let start = parse_date("start_date", start_date)?;
    let end = parse_date("end_date", end_date)?;

    let notes = get_notes_by_date_range(db, therapist.id, start, end)
        .await
        .validate_custom()?;
    Ok(Json(notes))
}

#[post("/notes", data = "<note>")]
pub async fn api_create_note(
    note: Json<NewSessionNote>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<SessionNote>>, ApiError> {
    let therapist = therapist_for(db, &user, Permission::WriteSessionNotes).await?;
    let validated = note.validate_custom()?;

    let created = create_session_note(db, therapist.id, &validated)
        .await
        .validate_custom()?;
    Ok(Custom(Status::Created, Json(created)))
}

#[put("/notes/<id>", data = "<update>")]
pub async fn api_update_note(
    id: i64,
    update: Json<SessionNoteUpdate>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SessionNote>, ApiError> {
    let therapist = therapist_for(db, &user, Permission::WriteSessionNotes).await?;
    let validated = update.validate_custom()?;

    let updated = update_session_note(db, id, therapist.id, &validated)
        .await
        .validate_custom()?;
    Ok(Json(updated))
}

#[delete("/notes/<id>")]
pub async fn api_delete_note(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let therapist = therapist_for(db, &user, Permission::WriteSessionNotes).await?;

    if delete_session_note(db, id, therapist.id)
        .await
        .validate_custom()?
    {
        Ok(Status::NoContent)
    } else {
        Err(AppError::NotFound(format!("Session note with id {} not found", id))
            .to_validation_response())
    }
}

