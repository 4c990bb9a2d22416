/// Bearer token authentication
///
/// Extracts and validates the access token from the `Authorization` header,
/// then injects an [`AuthContext`] into the request extensions. Handlers behind
/// this layer take `Extension<AuthContext>`.
///
/// ```text
/// Authorization: Bearer <access token>
/// ```

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use taskdeck_shared::auth::{jwt, AuthContext};

use crate::{app::AppState, error::ApiError};

/// Pulls the token out of a `Bearer` authorization value
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects requests without a valid access token
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = bearer_token(auth_header)
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    req.extensions_mut().insert(AuthContext::from(claims));

    Ok(next.run(req).await)
}
