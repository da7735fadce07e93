/// Current-user endpoints
///
/// # Endpoints
///
/// - `GET /v1/users/me` - Profile
/// - `PATCH /v1/users/me` - Update name and/or email
/// - `DELETE /v1/users/me` - Deactivate the account (204)
/// - `POST /v1/users/me/password` - Change password (204)

use crate::{
    app::{AppState, CurrentUser},
    error::ApiResult,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use quadrant_shared::{
    models::user::User,
    services::{PasswordChange, ProfileUpdate},
};

pub async fn get_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}

/// Partial profile update
///
/// ```text
/// PATCH /v1/users/me
///
/// { "full_name": "Ada Lovelace", "email": "ada@example.com" }
/// ```
///
/// A new email must not belong to another account (409) and resets the
/// verified flag.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.update_profile(&user, req).await?))
}

/// Deactivates the account; data is kept, tokens stop working
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    state.users.deactivate(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<PasswordChange>,
) -> ApiResult<StatusCode> {
    state.users.change_password(&user, req).await?;
    Ok(StatusCode::NO_CONTENT)
}
