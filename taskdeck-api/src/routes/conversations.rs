/// Messaging endpoints
///
/// ```text
/// GET  /v1/conversations                    the caller's conversations, latest activity first
/// POST /v1/conversations                    {user_id} -> direct conversation (reused if it exists)
/// POST /v1/teams/:id/conversations          {name} -> 201 team conversation
/// GET  /v1/conversations/:id/messages?limit=
/// POST /v1/conversations/:id/messages       {content} -> 201
/// ```

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskdeck_shared::{
    auth::AuthContext,
    models::conversation::{Conversation, Message},
    services::messages::{self, ConversationSummary},
};
use uuid::Uuid;
use validator::Validate;

use crate::{app::AppState, error::ApiResult, routes::detached};

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TeamConversationRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageParams {
    pub limit: Option<i64>,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(
        messages::list_conversations(state.store.as_ref(), auth.user_id).await?,
    ))
}

pub async fn start_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<StartConversationRequest>,
) -> ApiResult<Json<Conversation>> {
    let store = state.store.clone();
    let conversation = detached(async move {
        messages::start_direct_conversation(store.as_ref(), auth.user_id, req.user_id).await
    })
    .await?;

    Ok(Json(conversation))
}

pub async fn create_team_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    Json(req): Json<TeamConversationRequest>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    req.validate()?;

    let store = state.store.clone();
    let conversation = detached(async move {
        messages::create_team_conversation(store.as_ref(), auth.user_id, team_id, &req.name).await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<MessageParams>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(
        messages::list_messages(state.store.as_ref(), auth.user_id, conversation_id, params.limit)
            .await?,
    ))
}

/// Posts a message of at most [`messages::MAX_MESSAGE_LENGTH`] characters
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let store = state.store.clone();
    let message = detached(async move {
        messages::send_message(store.as_ref(), auth.user_id, conversation_id, &req.content).await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
