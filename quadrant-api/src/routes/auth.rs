/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register a password account (201)
/// - `POST /v1/auth/login` - Login with email and password
/// - `POST /v1/auth/google` - Login with a Google ID token
/// - `POST /v1/auth/refresh` - Exchange a refresh token for a new pair
/// - `GET /v1/auth/me` - Current user (authenticated)
///
/// Every token endpoint answers with the same body:
///
/// ```json
/// {
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "token_type": "bearer"
/// }
/// ```

use crate::{
    app::{AppState, CurrentUser},
    error::ApiResult,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use quadrant_shared::{
    models::user::User,
    services::{Registration, TokenPair},
};
use serde::Deserialize;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Google login request
#[derive(Debug, Deserialize)]
pub struct GoogleAuthRequest {
    /// ID token issued to the client by Google
    pub token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Register a new user
///
/// # Errors
///
/// - `422 Unprocessable Entity`: malformed email or weak password
/// - `409 Conflict`: email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<Registration>,
) -> ApiResult<(StatusCode, Json<TokenPair>)> {
    let user = state.auth.register(req).await?;
    let tokens = state.auth.create_session_tokens(user.id)?;

    Ok((StatusCode::CREATED, Json(tokens)))
}

/// Login with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: any credential failure, undifferentiated
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let user = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(state.auth.create_session_tokens(user.id)?))
}

/// Login with a Google ID token, creating or linking the account
///
/// # Errors
///
/// - `401 Unauthorized`: token rejected by the provider, OAuth not
///   configured, or the account is deactivated
pub async fn google(
    State(state): State<AppState>,
    Json(req): Json<GoogleAuthRequest>,
) -> ApiResult<Json<TokenPair>> {
    let user = state.auth.login_with_oauth(&req.token).await?;
    Ok(Json(state.auth.create_session_tokens(user.id)?))
}

/// Token refresh
///
/// Issues a new access token and, alongside it, a fresh refresh token. The
/// presented refresh token is not revoked.
///
/// # Errors
///
/// - `401 Unauthorized`: invalid, expired or non-refresh token, or the user
///   is gone or deactivated
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    Ok(Json(state.auth.refresh_session(&req.refresh_token).await?))
}

/// Current user profile
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}
