/// Server-sent change feeds
///
/// ```text
/// GET /v1/projects/:id/board/events    task changes in one project (any project role)
/// GET /v1/notifications/events         the caller's notification changes
/// ```
///
/// Each change arrives as a `change` event carrying table, operation and row
/// id; clients re-fetch what they show. A `resync` event means changes may
/// have been missed (slow consumer or database reconnect) and everything
/// should be re-fetched. The connection is kept alive with a comment every
/// 25 seconds. Streams end when the server shuts down.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{Stream, StreamExt as _};
use std::{convert::Infallible, time::Duration};
use taskdeck_shared::{
    auth::{
        authorization::{require_project_action, ProjectAction},
        AuthContext,
    },
    realtime::{ChangeFilter, ChangeSignal},
};
use uuid::Uuid;

use crate::{app::AppState, error::ApiResult};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// SSE form of a change signal
pub fn signal_event(signal: &ChangeSignal) -> Event {
    let name = match signal {
        ChangeSignal::Changed(_) => "change",
        ChangeSignal::Resync => "resync",
    };

    match Event::default().event(name).json_data(signal) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode change event");
            Event::default().event("resync").data("{}")
        }
    }
}

fn event_stream(
    state: &AppState,
    filter: ChangeFilter,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let stream = state
        .feed
        .subscribe(filter)
        .into_stream()
        .map(|signal| Ok(signal_event(&signal)))
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// Streams task changes for one project board
pub async fn board_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    require_project_action(state.store.as_ref(), auth.user_id, project_id, ProjectAction::View)
        .await?;

    tracing::debug!(project_id = %project_id, user_id = %auth.user_id, "Board subscriber connected");
    Ok(event_stream(&state, ChangeFilter::Project(project_id)))
}

/// Streams the caller's notification changes
pub async fn notification_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    tracing::debug!(user_id = %auth.user_id, "Inbox subscriber connected");
    Ok(event_stream(&state, ChangeFilter::User(auth.user_id)))
}
