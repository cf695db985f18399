use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

pub(crate) fn to_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| dt.and_utc()).unwrap_or_else(Utc::now)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Therapist {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbTherapist {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbTherapist> for Therapist {
    fn from(db: DbTherapist) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            first_name: db.first_name.unwrap_or_default(),
            last_name: db.last_name.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            phone: db.phone,
            bio: db.bio,
            is_active: db.is_active.unwrap_or(true),
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Parent {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbParent {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbParent> for Parent {
    fn from(db: DbParent) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            first_name: db.first_name.unwrap_or_default(),
            last_name: db.last_name.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            phone: db.phone,
            address: db.address,
            emergency_contact: db.emergency_contact,
            is_active: db.is_active.unwrap_or(true),
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

/// Either kind of profile, tagged with the owning role when serialized.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Therapist(Therapist),
    Parent(Parent),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TherapistSettings {
    pub id: i64,
    pub user_id: i64,
    pub profile_section: Map<String, Value>,
    pub account_section: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbTherapistSettings {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub profile_settings: Option<String>,
    pub account_settings: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

// Anything that is not a stored JSON object reads back as an empty section.
fn settings_section(raw: Option<String>) -> Map<String, Value> {
    match raw.as_deref().map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        _ => Map::new(),
    }
}

impl From<DbTherapistSettings> for TherapistSettings {
    fn from(db: DbTherapistSettings) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            profile_section: settings_section(db.profile_settings),
            account_section: settings_section(db.account_settings),
            updated_at: to_utc(db.updated_at),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionNote {
    pub id: i64,
    pub therapist_id: i64,
    pub session_date: NaiveDate,
    pub note_title: Option<String>,
    pub session_time: Option<NaiveTime>,
    pub note_content: String,
    pub created_at: DateTime<Utc>,
    pub last_edited_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbSessionNote {
    pub notes_id: Option<i64>,
    pub therapist_id: Option<i64>,
    pub session_date: Option<NaiveDate>,
    pub note_title: Option<String>,
    pub session_time: Option<NaiveTime>,
    pub note_content: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub last_edited_at: Option<NaiveDateTime>,
}

impl From<DbSessionNote> for SessionNote {
    fn from(db: DbSessionNote) -> Self {
        Self {
            id: db.notes_id.unwrap_or_default(),
            therapist_id: db.therapist_id.unwrap_or_default(),
            session_date: db.session_date.unwrap_or_default(),
            note_title: db.note_title,
            session_time: db.session_time,
            note_content: db.note_content.unwrap_or_default(),
            created_at: to_utc(db.created_at),
            last_edited_at: to_utc(db.last_edited_at),
        }
    }
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct NewSessionNote {
    pub session_date: NaiveDate,
    #[validate(custom(function = "crate::validation::validate_not_blank"))]
    pub note_content: String,
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub note_title: Option<String>,
    pub session_time: Option<NaiveTime>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Child {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub primary_therapist_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbChild {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub primary_therapist_id: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbChild> for Child {
    fn from(db: DbChild) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            first_name: db.first_name.unwrap_or_default(),
            last_name: db.last_name.unwrap_or_default(),
            date_of_birth: db.date_of_birth,
            primary_therapist_id: db.primary_therapist_id,
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AiPreference {
    pub id: i64,
    pub child_id: i64,
    pub ai_instructions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbAiPreference {
    pub id: Option<i64>,
    pub child_id: Option<i64>,
    pub ai_instructions: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbAiPreference> for AiPreference {
    fn from(db: DbAiPreference) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            child_id: db.child_id.unwrap_or_default(),
            ai_instructions: db.ai_instructions.unwrap_or_default(),
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub role: crate::auth::Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Partial edit of a session note; `None` leaves the stored value alone.
#[derive(Deserialize, Validate, Debug, Clone, Default)]
pub struct SessionNoteUpdate {
    pub session_date: Option<NaiveDate>,
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub note_title: Option<String>,
    pub session_time: Option<NaiveTime>,
    #[validate(custom(function = "crate::validation::validate_not_blank"))]
    pub note_content: Option<String>,
}
