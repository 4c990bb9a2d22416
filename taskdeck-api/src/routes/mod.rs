/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: register, login, refresh, current user
/// - `profile`: the caller's own profile
/// - `dashboard`: per-user overview
/// - `projects`: projects and project membership
/// - `tasks`: tasks, status changes and project reports
/// - `teams`: teams, team membership and invitations
/// - `notifications`: the caller's notification inbox
/// - `conversations`: direct and team messaging
/// - `events`: SSE change feeds for boards and inboxes

pub mod auth;
pub mod conversations;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod notifications;
pub mod profile;
pub mod projects;
pub mod tasks;
pub mod teams;

use std::future::Future;

use taskdeck_shared::services::ServiceResult;

use crate::error::{ApiError, ApiResult};

/// Runs a mutating service call on its own task
///
/// A client that disconnects mid-request drops the handler future; the
/// spawned write still runs to completion so multi-step operations are never
/// cut in half.
pub(crate) async fn detached<T, F>(operation: F) -> ApiResult<T>
where
    F: Future<Output = ServiceResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| ApiError::InternalError(format!("Request task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Deserializes a present field (including `null`) as `Some`
///
/// With `#[serde(default)]` this tells "absent" (`None`) apart from
/// "explicitly null" (`Some(None)`) for PATCH bodies.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}
