/// The caller's own profile
///
/// ```text
/// GET   /v1/profile
/// PATCH /v1/profile   {full_name?, avatar_url?}
/// ```
///
/// Email is fixed at registration.

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use taskdeck_shared::{
    auth::AuthContext,
    models::user::{UpdateProfile, User},
    services::identity,
};
use validator::Validate;

use crate::{app::AppState, error::ApiResult, routes::detached};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub full_name: Option<String>,

    #[validate(length(max = 2048, message = "Avatar URL is too long"))]
    pub avatar_url: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    Ok(Json(identity::current_user(state.store.as_ref(), auth.user_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let store = state.store.clone();
    let user = detached(async move {
        identity::update_profile(
            store.as_ref(),
            auth.user_id,
            UpdateProfile {
                full_name: req.full_name,
                avatar_url: req.avatar_url,
            },
        )
        .await
    })
    .await?;

    Ok(Json(user))
}
