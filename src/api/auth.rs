use chrono::Utc;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::UserData;
use crate::auth::{Role, SESSION_COOKIE, User, UserSession};
use crate::db::{
    authenticate_user, create_user, create_user_session, get_user, invalidate_session,
    update_user_password, verify_credentials,
};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::models::NewUser;
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Must be a valid email address"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<LoginResponse>, ApiError> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.email, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = Utc::now()
                .checked_add_signed(config.session_ttl)
                .ok_or_else(|| AppError::Internal("Session expiry is out of range".to_string()))
                .validate_custom()?;

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let max_age = rocket::time::Duration::seconds(config.session_ttl.num_seconds());
            cookies.add_private(
                Cookie::build((SESSION_COOKIE, token))
                    .same_site(SameSite::Lax)
                    .http_only(true)
                    .max_age(max_age),
            );

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid email or password".to_string()),
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Status::Ok
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[validate(email(message = "Must be a valid email address"))]
    email: String,
    #[validate(custom(function = "crate::validation::validate_password_strength"))]
    password: String,
    role: Role,
    #[validate(
        length(min = 1, max = 100, message = "First name must be 1-100 characters"),
        custom(function = "crate::validation::validate_not_blank")
    )]
    first_name: String,
    #[validate(
        length(min = 1, max = 100, message = "Last name must be 1-100 characters"),
        custom(function = "crate::validation::validate_not_blank")
    )]
    last_name: String,
    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    phone: Option<String>,
    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    address: Option<String>,
    #[validate(length(max = 200, message = "Emergency contact must be at most 200 characters"))]
    emergency_contact: Option<String>,
}

#[post("/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<RegistrationRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<UserData>>, ApiError> {
    let validated = registration.validate_custom()?;

    let new_user = NewUser {
        email: validated.email,
        password: validated.password,
        role: validated.role,
        first_name: validated.first_name,
        last_name: validated.last_name,
        phone: validated.phone,
        address: validated.address,
        emergency_contact: validated.emergency_contact,
    };

    let user_id = create_user(db, &new_user).await.validate_custom()?;
    let user = get_user(db, user_id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(UserData::from(user))))
}

#[derive(Deserialize, Validate)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    current_password: String,
    #[validate(custom(function = "crate::validation::validate_password_strength"))]
    new_password: String,
}

#[post("/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let validated = password.validate_custom()?;

    let verified = verify_credentials(db, &user.email, &validated.current_password)
        .await
        .validate_custom()?;

    match verified {
        Some(_) => {
            update_user_password(db, user.id, &validated.new_password)
                .await
                .validate_custom()?;

            Ok(Status::Ok)
        }
        _ => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "current_password",
                "Current password is incorrect",
            )),
        )),
    }
}
