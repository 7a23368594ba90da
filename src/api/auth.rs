//! Session endpoints backed by the identity provider

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        auth::{AuthTokens, LoginRequest},
        user::User,
    },
    AppState,
};

use super::BearerHeader;

/// Log in with provider credentials
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthTokens),
        (status = 400, description = "Missing or invalid credentials", body = crate::error::ErrorResponse),
        (status = 404, description = "No local user for this account", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthTokens>> {
    let tokens = state.services.users.login(request).await?;
    Ok(Json(tokens))
}

/// Revoke the caller's refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Logged out"),
        (status = 403, description = "Missing or malformed token", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    BearerHeader(authorization): BearerHeader,
) -> AppResult<StatusCode> {
    state.services.users.logout(&authorization).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 403, description = "Missing or malformed token", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    BearerHeader(authorization): BearerHeader,
) -> AppResult<Json<User>> {
    let user = state.services.users.current_user(&authorization).await?;
    Ok(Json(user))
}
