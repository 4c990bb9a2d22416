/// Task endpoints
///
/// ```text
/// POST   /v1/tasks                        create (project admin/manager) -> 201
/// GET    /v1/tasks/:id                    task with project name, assignee, creator
/// PATCH  /v1/tasks/:id                    edit fields; `null` clears (admin/manager)
/// DELETE /v1/tasks/:id                    (admin/manager) -> 204
/// PUT    /v1/tasks/:id/status             {status} (any project member)
/// GET    /v1/projects/:id/tasks           board cards
/// GET    /v1/projects/:id/report          completion report (admin/manager)
/// ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use taskdeck_shared::{
    auth::AuthContext,
    models::task::{Task, TaskPriority, TaskStatus, UpdateTask},
    services::tasks::{self, ProjectReport, StatusUpdate, TaskCard, TaskDetail, TaskDraft},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{detached, double_option},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Required; a missing project is reported as a field error by the service
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: String,

    #[validate(length(max = 10000, message = "Description is too long"))]
    pub description: Option<String>,

    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,

    #[validate(length(max = 50, message = "Tag must be at most 50 characters"))]
    pub tag: Option<String>,

    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub priority: Option<Option<TaskPriority>>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_time: Option<Option<NaiveTime>>,

    #[serde(default, deserialize_with = "double_option")]
    pub tag: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,
}

impl From<UpdateTaskRequest> for UpdateTask {
    fn from(req: UpdateTaskRequest) -> Self {
        UpdateTask {
            title: req.title,
            description: req.description,
            priority: req.priority,
            due_date: req.due_date,
            due_time: req.due_time,
            tag: req.tag,
            assigned_to: req.assigned_to,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    let draft = TaskDraft {
        project_id: req.project_id,
        title: req.title,
        description: req.description,
        priority: req.priority,
        due_date: req.due_date,
        due_time: req.due_time,
        tag: req.tag,
        assigned_to: req.assigned_to,
    };

    let store = state.store.clone();
    let task = detached(async move { tasks::create_task(store.as_ref(), auth.user_id, draft).await })
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskDetail>> {
    Ok(Json(tasks::get_task(state.store.as_ref(), auth.user_id, task_id).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;

    let store = state.store.clone();
    let update = UpdateTask::from(req);
    let task = detached(async move {
        tasks::update_task(store.as_ref(), auth.user_id, task_id, update).await
    })
    .await?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let store = state.store.clone();
    detached(async move { tasks::delete_task(store.as_ref(), auth.user_id, task_id).await }).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Moves a task between board columns
///
/// The response carries the completion notification, if one was sent, and a
/// `warning` when sending it failed; the status change stands either way.
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<StatusUpdate>> {
    let store = state.store.clone();
    let update = detached(async move {
        tasks::update_task_status(store.as_ref(), auth.user_id, task_id, req.status).await
    })
    .await?;

    Ok(Json(update))
}

pub async fn list_project_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TaskCard>>> {
    Ok(Json(
        tasks::list_project_tasks(state.store.as_ref(), auth.user_id, project_id).await?,
    ))
}

pub async fn project_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectReport>> {
    Ok(Json(
        tasks::project_report(state.store.as_ref(), auth.user_id, project_id).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"title":"Ship it","assigned_to":null,"due_date":"2025-06-01"}"#)
                .unwrap();
        let update = UpdateTask::from(req);

        assert_eq!(update.title.as_deref(), Some("Ship it"));
        assert_eq!(update.assigned_to, Some(None));
        assert_eq!(
            update.due_date,
            Some(Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()))
        );
        assert_eq!(update.tag, None);
        assert_eq!(update.priority, None);
    }

    #[test]
    fn test_status_request_uses_snake_case() {
        let req: UpdateStatusRequest = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(req.status, TaskStatus::InProgress);
    }
}
