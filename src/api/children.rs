use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::therapist_for;
use crate::auth::{Permission, User};
use crate::db::{create_child, get_children_for_therapist};
use crate::models::Child;
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt};

#[derive(Deserialize, Validate)]
pub struct CreateChildRequest {
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
    date_of_birth: Option<NaiveDate>,
}

/// Children the calling therapist is primary for.
#[get("/children")]
pub async fn api_get_children(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Child>>, ApiError> {
    let therapist = therapist_for(db, &user, Permission::ManageChildren).await?;

    let children = get_children_for_therapist(db, therapist.id)
        .await
        .validate_custom()?;
    Ok(Json(children))
}

#[post("/children", data = "<child>")]
pub async fn api_create_child(
    child: Json<CreateChildRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Child>>, ApiError> {
    let therapist = therapist_for(db, &user, Permission::ManageChildren).await?;
    let validated = child.validate_custom()?;

    let created = create_child(
        db,
        &validated.first_name,
        &validated.last_name,
        validated.date_of_birth,
        Some(therapist.id),
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(created)))
}
