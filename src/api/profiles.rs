use rocket::State;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, Role, User};
use crate::db::{
    get_active_parents, get_active_therapists, get_parent_by_user_id, get_therapist_by_user_id,
    search_profiles_by_name, update_parent_profile, update_therapist_profile,
};
use crate::models::{Parent, Profile, Therapist};
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, PermissionCheckExt, bad_request};

#[get("/profile")]
pub async fn api_get_profile(user: User, db: &State<Pool<Sqlite>>) -> Result<Json<Profile>, ApiError> {
    user.require_permission(Permission::ViewOwnProfile)
        .validate_custom()?;

    let profile = match user.role {
        Role::Therapist => Profile::Therapist(
            get_therapist_by_user_id(db, user.id)
                .await
                .validate_custom()?,
        ),
        Role::Parent => Profile::Parent(get_parent_by_user_id(db, user.id).await.validate_custom()?),
    };

    Ok(Json(profile))
}

/// Partial profile edit. Fields that do not apply to the caller's role are ignored.
#[derive(Deserialize, Validate, Clone)]
pub struct ProfileUpdateRequest {
    #[validate(
        length(min = 1, max = 100, message = "First name must be 1-100 characters"),
        custom(function = "crate::validation::validate_not_blank")
    )]
    first_name: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Last name must be 1-100 characters"),
        custom(function = "crate::validation::validate_not_blank")
    )]
    last_name: Option<String>,
    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    phone: Option<String>,
    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    bio: Option<String>,
    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    address: Option<String>,
    #[validate(length(max = 200, message = "Emergency contact must be at most 200 characters"))]
    emergency_contact: Option<String>,
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Profile>, ApiError> {
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;
    let update = profile.validate_custom()?;

    let updated = match user.role {
        Role::Therapist => {
            let current = get_therapist_by_user_id(db, user.id)
                .await
                .validate_custom()?;

            Profile::Therapist(
                update_therapist_profile(
                    db,
                    user.id,
                    update.first_name.as_deref().unwrap_or(&current.first_name),
                    update.last_name.as_deref().unwrap_or(&current.last_name),
                    update.phone.as_deref().or(current.phone.as_deref()),
                    update.bio.as_deref().or(current.bio.as_deref()),
                )
                .await
                .validate_custom()?,
            )
        }
        Role::Parent => {
            let current = get_parent_by_user_id(db, user.id).await.validate_custom()?;

            Profile::Parent(
                update_parent_profile(
                    db,
                    user.id,
                    update.first_name.as_deref().unwrap_or(&current.first_name),
                    update.last_name.as_deref().unwrap_or(&current.last_name),
                    update.phone.as_deref().or(current.phone.as_deref()),
                    update.address.as_deref().or(current.address.as_deref()),
                    update
                        .emergency_contact
                        .as_deref()
                        .or(current.emergency_contact.as_deref()),
                )
                .await
                .validate_custom()?,
            )
        }
    };

    Ok(Json(updated))
}

#[get("/therapists")]
pub async fn api_get_therapists(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Therapist>>, ApiError> {
    let therapists = get_active_therapists(db).await.validate_custom()?;
    Ok(Json(therapists))
}

#[get("/parents")]
pub async fn api_get_parents(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Parent>>, ApiError> {
    user.require_permission(Permission::ViewParentProfiles)
        .validate_custom()?;

    let parents = get_active_parents(db).await.validate_custom()?;
    Ok(Json(parents))
}

#[get("/profiles/search?<q>&<role>")]
pub async fn api_search_profiles(
    q: &str,
    role: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    user.require_permission(Permission::SearchProfiles)
        .validate_custom()?;

    if q.trim().is_empty() {
        return Err(bad_request("q", "Search term must not be empty"));
    }

    let role = match role {
        Some(role) => Some(
            role.parse::<Role>()
                .map_err(|e| bad_request("role", &e.to_string()))?,
        ),
        None => None,
    };

    let profiles = search_profiles_by_name(db, q, role)
        .await
        .validate_custom()?;

    Ok(Json(profiles))
}
