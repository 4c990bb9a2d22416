/// Project endpoints
///
/// ```text
/// GET    /v1/projects                         projects the caller can see
/// POST   /v1/projects                         {name, description?} -> 201
/// GET    /v1/projects/:id                     project, owner, caller's role
/// PATCH  /v1/projects/:id                     {name?, description?, status?} (admin)
/// DELETE /v1/projects/:id                     (admin) -> 204
/// GET    /v1/projects/:id/members
/// POST   /v1/projects/:id/members             {email, role} (admin) -> 201
/// PATCH  /v1/projects/:id/members/:user_id    {role} (admin)
/// DELETE /v1/projects/:id/members/:user_id    (admin) -> 204
/// ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskdeck_shared::{
    auth::AuthContext,
    models::{
        project::{Project, ProjectOverview, ProjectStatus, UpdateProject},
        project_member::{ProjectMember, ProjectMemberDetail, ProjectRole},
    },
    services::projects::{self, ProjectDetail},
};
use uuid::Uuid;
use validator::Validate;

use crate::{app::AppState, error::ApiResult, routes::detached};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,

    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default = "default_member_role")]
    pub role: ProjectRole,
}

fn default_member_role() -> ProjectRole {
    ProjectRole::Member
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: ProjectRole,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ProjectOverview>>> {
    Ok(Json(projects::list_projects(state.store.as_ref(), auth.user_id).await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    req.validate()?;

    let store = state.store.clone();
    let project = detached(async move {
        projects::create_project(store.as_ref(), auth.user_id, &req.name, req.description).await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetail>> {
    Ok(Json(
        projects::get_project(state.store.as_ref(), auth.user_id, project_id).await?,
    ))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    req.validate()?;

    let store = state.store.clone();
    let update = UpdateProject {
        name: req.name,
        description: req.description,
        status: req.status,
    };
    let project = detached(async move {
        projects::update_project(store.as_ref(), auth.user_id, project_id, update).await
    })
    .await?;

    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let store = state.store.clone();
    detached(async move { projects::delete_project(store.as_ref(), auth.user_id, project_id).await })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ProjectMemberDetail>>> {
    Ok(Json(
        projects::list_project_members(state.store.as_ref(), auth.user_id, project_id).await?,
    ))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<ProjectMember>)> {
    req.validate()?;

    let store = state.store.clone();
    let member = detached(async move {
        projects::invite_project_member(store.as_ref(), auth.user_id, project_id, &req.email, req.role)
            .await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<ProjectMember>> {
    let store = state.store.clone();
    let member = detached(async move {
        projects::update_project_member_role(store.as_ref(), auth.user_id, project_id, user_id, req.role)
            .await
    })
    .await?;

    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let store = state.store.clone();
    detached(async move {
        projects::remove_project_member(store.as_ref(), auth.user_id, project_id, user_id).await
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
