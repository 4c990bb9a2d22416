/// Authentication endpoints
///
/// ```text
/// POST /v1/auth/register   {email, password, full_name?}  -> 201 {user, access_token, refresh_token}
/// POST /v1/auth/login      {email, password}              -> {user, access_token, refresh_token}
/// POST /v1/auth/refresh    {refresh_token}                -> {access_token}
/// GET  /v1/auth/me                                         -> user
/// ```
///
/// Sign-out is client-side: tokens are stateless and the client discards them.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::detached,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskdeck_shared::{
    auth::{jwt, AuthContext},
    models::user::User,
    services::identity::{self, Registration},
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (strength is checked again by the service)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

fn issue_tokens(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let access_claims = jwt::Claims::new(user.id, user.email.clone(), jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(user.id, user.email.clone(), jwt::TokenType::Refresh);

    Ok(AuthResponse {
        access_token: jwt::create_token(&access_claims, state.jwt_secret())?,
        refresh_token: jwt::create_token(&refresh_claims, state.jwt_secret())?,
        user,
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    let store = state.store.clone();
    let user = detached(async move {
        identity::register(
            store.as_ref(),
            Registration {
                email: req.email,
                password: req.password,
                full_name: req.full_name,
            },
        )
        .await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let user = identity::authenticate(state.store.as_ref(), &req.email, &req.password).await?;
    Ok(Json(issue_tokens(&state, user)?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    // The account may have been removed since the refresh token was issued
    let user = identity::current_user(state.store.as_ref(), claims.sub).await?;

    let access_claims = jwt::Claims::new(user.id, user.email, jwt::TokenType::Access);
    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    Ok(Json(identity::current_user(state.store.as_ref(), auth.user_id).await?))
}
