/// Projects and their members.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::error::{optional_text, required_text, ServiceError, ServiceResult};
use super::notifications::notify_best_effort;
use crate::auth::authorization::{require_project_action, ProjectAction};
use crate::models::{
    notification::NotificationType,
    project::{CreateProject, Project, ProjectOverview, UpdateProject},
    project_member::{CreateProjectMember, ProjectMember, ProjectMemberDetail, ProjectRole},
    user::UserSummary,
};
use crate::store::Store;

/// A project as seen by one caller
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub owner: Option<UserSummary>,
    pub role: ProjectRole,
}

/// Creates a project owned by the caller, who becomes its admin
pub async fn create_project(
    store: &dyn Store,
    caller: Uuid,
    name: &str,
    description: Option<String>,
) -> ServiceResult<Project> {
    let project = store
        .create_project_with_owner(CreateProject {
            name: required_text("name", name)?,
            description: optional_text(description),
            owner_id: caller,
        })
        .await?;

    info!(project_id = %project.id, owner_id = %caller, "Project created");
    Ok(project)
}

pub async fn list_projects(store: &dyn Store, caller: Uuid) -> ServiceResult<Vec<ProjectOverview>> {
    Ok(store.list_projects_for_user(caller).await?)
}

pub async fn get_project(
    store: &dyn Store,
    caller: Uuid,
    project_id: Uuid,
) -> ServiceResult<ProjectDetail> {
    let access = require_project_action(store, caller, project_id, ProjectAction::View).await?;
    let owner = store
        .find_user(access.project.owner_id)
        .await?
        .map(|u| u.summary());

    Ok(ProjectDetail {
        project: access.project,
        owner,
        role: access.role,
    })
}

pub async fn update_project(
    store: &dyn Store,
    caller: Uuid,
    project_id: Uuid,
    update: UpdateProject,
) -> ServiceResult<Project> {
    let mut project = require_project_action(store, caller, project_id, ProjectAction::Manage)
        .await?
        .project;

    let update = UpdateProject {
        name: update.name.as_deref().map(|n| required_text("name", n)).transpose()?,
        description: update.description.map(|d| d.trim().to_string()),
        status: update.status,
    };
    project.apply(update);

    store
        .save_project(&project)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))
}

/// Deletes the project together with its members and tasks
pub async fn delete_project(store: &dyn Store, caller: Uuid, project_id: Uuid) -> ServiceResult<()> {
    require_project_action(store, caller, project_id, ProjectAction::Manage).await?;

    if !store.delete_project(project_id).await? {
        return Err(ServiceError::not_found("project"));
    }
    info!(project_id = %project_id, deleted_by = %caller, "Project deleted");
    Ok(())
}

pub async fn list_project_members(
    store: &dyn Store,
    caller: Uuid,
    project_id: Uuid,
) -> ServiceResult<Vec<ProjectMemberDetail>> {
    require_project_action(store, caller, project_id, ProjectAction::ListMembers).await?;
    Ok(store.list_project_members(project_id).await?)
}

/// Adds an existing account to the project
///
/// # Errors
///
/// - `NotFound` if no account uses `email`
/// - `Conflict` if the account is already a member
pub async fn invite_project_member(
    store: &dyn Store,
    caller: Uuid,
    project_id: Uuid,
    email: &str,
    role: ProjectRole,
) -> ServiceResult<ProjectMember> {
    let access = require_project_action(store, caller, project_id, ProjectAction::Manage).await?;

    let invitee = store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| ServiceError::NotFound("user with this email".to_string()))?;

    let member = store
        .add_project_member(CreateProjectMember {
            project_id,
            user_id: invitee.id,
            role,
        })
        .await
        .map_err(|e| {
            if e.is_conflict() {
                ServiceError::Conflict("User is already a member of this project".to_string())
            } else {
                e.into()
            }
        })?;

    info!(
        project_id = %project_id,
        user_id = %invitee.id,
        role = role.as_str(),
        "Project member added"
    );

    notify_best_effort(
        store,
        invitee.id,
        NotificationType::ProjectInvitation,
        format!("You have been added to the project \"{}\"", access.project.name),
        Some(project_id),
    )
    .await;

    Ok(member)
}

pub async fn update_project_member_role(
    store: &dyn Store,
    caller: Uuid,
    project_id: Uuid,
    user_id: Uuid,
    role: ProjectRole,
) -> ServiceResult<ProjectMember> {
    let access = require_project_action(store, caller, project_id, ProjectAction::Manage).await?;
    if access.is_owner(user_id) {
        return Err(ServiceError::PermissionDenied(
            "The project owner is always an admin".to_string(),
        ));
    }

    store
        .update_project_member_role(project_id, user_id, role)
        .await?
        .ok_or_else(|| ServiceError::not_found("member"))
}

pub async fn remove_project_member(
    store: &dyn Store,
    caller: Uuid,
    project_id: Uuid,
    user_id: Uuid,
) -> ServiceResult<()> {
    let access = require_project_action(store, caller, project_id, ProjectAction::Manage).await?;
    if access.is_owner(user_id) {
        return Err(ServiceError::PermissionDenied(
            "The project owner cannot be removed".to_string(),
        ));
    }

    if !store.remove_project_member(project_id, user_id).await? {
        return Err(ServiceError::not_found("member"));
    }
    info!(project_id = %project_id, user_id = %user_id, "Project member removed");
    Ok(())
}
