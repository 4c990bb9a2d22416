/// Per-user overview
///
/// ```text
/// GET /v1/dashboard
/// ```

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use taskdeck_shared::{
    auth::AuthContext,
    services::dashboard::{self, Dashboard},
};

use crate::{app::AppState, error::ApiResult};

/// Tasks the caller created or is assigned, their counters, upcoming work,
/// teams and latest notifications
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Dashboard>> {
    let today = Utc::now().date_naive();
    Ok(Json(
        dashboard::dashboard(state.store.as_ref(), auth.user_id, today).await?,
    ))
}
