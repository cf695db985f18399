use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{DbSessionNote, NewSessionNote, SessionNote, SessionNoteUpdate},
};

#[instrument(skip(pool, note), fields(session_date = %note.session_date))]
pub async fn create_session_note(
    pool: &Pool<Sqlite>,
    therapist_id: i64,
    note: &NewSessionNote,
) -> Result<SessionNote, AppError> {
    info!("Creating session note");
    let res = sqlx::query(
        "INSERT INTO session_notes (therapist_id, session_date, note_title, session_time, note_content)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(therapist_id)
    .bind(note.session_date)
    .bind(note.note_title.as_deref())
    .bind(note.session_time)
    .bind(&note.note_content)
    .execute(pool)
    .await?;

    get_session_note(pool, res.last_insert_rowid()).await
}

#[instrument(skip(pool))]
pub async fn get_session_note(pool: &Pool<Sqlite>, note_id: i64) -> Result<SessionNote, AppError> {
    info!("Getting session note");
    let row = sqlx::query_as::<_, DbSessionNote>(
        "SELECT notes_id, therapist_id, session_date, note_title, session_time, note_content,
                created_at, last_edited_at
         FROM session_notes WHERE notes_id = ?",
    )
    .bind(note_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(note) => Ok(SessionNote::from(note)),
        _ => Err(AppError::NotFound(format!(
            "Session note with id {} not found",
            note_id
        ))),
    }
}

/// Notes for one session date, newest first.
#[instrument(skip(pool))]
pub async fn get_notes_by_date(
    pool: &Pool<Sqlite>,
    therapist_id: i64,
    session_date: NaiveDate,
) -> Result<Vec<SessionNote>, AppError> {
    info!("Getting session notes by date");
    let rows = sqlx::query_as::<_, DbSessionNote>(
        "SELECT notes_id, therapist_id, session_date, note_title, session_time, note_content,
                created_at, last_edited_at
         FROM session_notes
         WHERE therapist_id = ? AND session_date = ?
         ORDER BY created_at DESC, notes_id DESC",
    )
    .bind(therapist_id)
    .bind(session_date)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SessionNote::from).collect())
}

/// Every date the therapist has at least one note for, ascending.
#[instrument(skip(pool))]
pub async fn get_note_dates(
    pool: &Pool<Sqlite>,
    therapist_id: i64,
) -> Result<Vec<NaiveDate>, AppError> {
    info!("Getting session note dates");
    let dates = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT DISTINCT session_date FROM session_notes
         WHERE therapist_id = ?
         ORDER BY session_date ASC",
    )
    .bind(therapist_id)
    .fetch_all(pool)
    .await?;

    Ok(dates)
}

#[instrument(skip(pool))]
pub async fn get_notes_by_date_range(
    pool: &Pool<Sqlite>,
    therapist_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<SessionNote>, AppError> {
    info!("Getting session notes by date range");
    if start_date > end_date {
        return Err(AppError::Validation(format!(
            "start_date {} is after end_date {}",
            start_date, end_date
        )));
    }

    let rows = sqlx::query_as::<_, DbSessionNote>(
        "SELECT notes_id, therapist_id, session_date, note_title, session_time, note_content,
                created_at, last_edited_at
         FROM session_notes
         WHERE therapist_id = ? AND session_date BETWEEN ? AND ?
         ORDER BY session_date DESC, created_at DESC, notes_id DESC",
    )
    .bind(therapist_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SessionNote::from).collect())
}

/// Applies the fields present in `update` to a note the therapist owns.
/// Notes belonging to someone else are reported as not found.
#[instrument(skip(pool, update))]
pub async fn update_session_note(
    pool: &Pool<Sqlite>,
    note_id: i64,
    therapist_id: i64,
    update: &SessionNoteUpdate,
) -> Result<SessionNote, AppError> {
    info!("Updating session note");
    let res = sqlx::query(
        "UPDATE session_notes
         SET session_date = COALESCE(?, session_date),
             note_title = COALESCE(?, note_title),
             session_time = COALESCE(?, session_time),
             note_content = COALESCE(?, note_content),
             last_edited_at = CURRENT_TIMESTAMP
         WHERE notes_id = ? AND therapist_id = ?",
    )
    .bind(update.session_date)
    .bind(update.note_title.as_deref())
    .bind(update.session_time)
    .bind(update.note_content.as_deref())
    .bind(note_id)
    .bind(therapist_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Session note with id {} not found",
            note_id
        )));
    }

    get_session_note(pool, note_id).await
}

#[instrument(skip(pool))]
pub async fn delete_session_note(
    pool: &Pool<Sqlite>,
    note_id: i64,
    therapist_id: i64,
) -> Result<bool, AppError> {
    info!("Deleting session note");
    let res = sqlx::query("DELETE FROM session_notes WHERE notes_id = ? AND therapist_id = ?")
        .bind(note_id)
        .bind(therapist_id)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}
