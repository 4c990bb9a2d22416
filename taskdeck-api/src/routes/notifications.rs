/// Notification inbox endpoints
///
/// ```text
/// GET    /v1/notifications?limit=&unread_only=   newest first
/// GET    /v1/notifications/unread-count
/// POST   /v1/notifications/read-all
/// POST   /v1/notifications/:id/read
/// DELETE /v1/notifications/:id                   -> 204
/// ```
///
/// Live updates come from `GET /v1/notifications/events`, see
/// [`super::events`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskdeck_shared::{
    auth::AuthContext,
    models::notification::Notification,
    services::notifications::{self, NotificationQuery},
};
use uuid::Uuid;

use crate::{app::AppState, error::ApiResult, routes::detached};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,

    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkedRead {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Notification>>> {
    let query = NotificationQuery {
        limit: params.limit,
        unread_only: params.unread_only,
    };

    Ok(Json(
        notifications::list(
            state.store.as_ref(),
            auth.user_id,
            query,
            state.config.notifications.page_size,
        )
        .await?,
    ))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UnreadCount>> {
    let count = notifications::unread_count(state.store.as_ref(), auth.user_id).await?;
    Ok(Json(UnreadCount { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    let store = state.store.clone();
    let notification = detached(async move {
        notifications::mark_read(store.as_ref(), notification_id, auth.user_id).await
    })
    .await?;

    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MarkedRead>> {
    let store = state.store.clone();
    let updated =
        detached(async move { notifications::mark_all_read(store.as_ref(), auth.user_id).await })
            .await?;

    Ok(Json(MarkedRead { updated }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let store = state.store.clone();
    detached(async move {
        notifications::delete(store.as_ref(), notification_id, auth.user_id).await
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
