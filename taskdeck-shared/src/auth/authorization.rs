/// Role resolution and permission checks
///
/// # Permission Model
///
/// Projects have roles {admin, manager, member}. The owner is always an
/// admin, whatever its membership row says. A caller with no role is told the
/// project does not exist.
///
/// | Action | Roles |
/// |---|---|
/// | view, update task status, list members | any |
/// | create, edit, delete tasks, view reports | admin, manager |
/// | manage (edit, delete, invite, roles) | admin |
///
/// Teams have roles {owner, admin, member}. The team owner is implicitly
/// `owner` even without a row. Only the owner changes roles, edits or deletes
/// the team; owner and admins invite and remove members; any member views.
///
/// # Example
///
/// ```no_run
/// use taskdeck_shared::auth::authorization::{require_project_action, ProjectAction};
/// use taskdeck_shared::store::Store;
/// use uuid::Uuid;
///
/// async fn create_task_allowed(store: &dyn Store, caller: Uuid, project: Uuid) -> bool {
///     require_project_action(store, caller, project, ProjectAction::CreateTask)
///         .await
///         .is_ok()
/// }
/// ```

use uuid::Uuid;

use crate::models::{
    project::Project, project_member::ProjectRole, team::Team, team_member::TeamRole,
};
use crate::store::{Store, StoreError};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Target missing or invisible to the caller
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Caller can see the target but lacks the role for the action
    #[error("Not allowed to {action}")]
    Forbidden { action: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Actions checked against a project role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    View,
    ListMembers,
    UpdateTaskStatus,
    CreateTask,
    EditTask,
    DeleteTask,
    ViewReports,
    Manage,
}

impl ProjectAction {
    pub fn allowed_for(&self, role: ProjectRole) -> bool {
        match self {
            ProjectAction::View | ProjectAction::ListMembers | ProjectAction::UpdateTaskStatus => {
                true
            }
            ProjectAction::CreateTask | ProjectAction::EditTask | ProjectAction::DeleteTask => {
                role.can_manage_tasks()
            }
            ProjectAction::ViewReports => role.can_view_reports(),
            ProjectAction::Manage => role.can_manage_project(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ProjectAction::View => "view this project",
            ProjectAction::ListMembers => "list project members",
            ProjectAction::UpdateTaskStatus => "update task status",
            ProjectAction::CreateTask => "create tasks in this project",
            ProjectAction::EditTask => "edit tasks in this project",
            ProjectAction::DeleteTask => "delete tasks in this project",
            ProjectAction::ViewReports => "view project reports",
            ProjectAction::Manage => "manage this project",
        }
    }
}

/// Actions checked against a team role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamAction {
    View,
    CreateConversation,
    InviteMember,
    RemoveMember,
    ChangeRole,
    Update,
    Delete,
}

impl TeamAction {
    pub fn allowed_for(&self, role: TeamRole) -> bool {
        match self {
            TeamAction::View | TeamAction::CreateConversation => true,
            TeamAction::InviteMember | TeamAction::RemoveMember => role.can_manage_members(),
            TeamAction::ChangeRole | TeamAction::Update | TeamAction::Delete => role.is_owner(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TeamAction::View => "view this team",
            TeamAction::CreateConversation => "start team conversations",
            TeamAction::InviteMember => "invite team members",
            TeamAction::RemoveMember => "remove team members",
            TeamAction::ChangeRole => "change member roles",
            TeamAction::Update => "edit this team",
            TeamAction::Delete => "delete this team",
        }
    }
}

/// Project plus the caller's effective role on it
#[derive(Debug, Clone)]
pub struct ProjectAccess {
    pub project: Project,
    pub role: ProjectRole,
}

impl ProjectAccess {
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.project.owner_id == user_id
    }
}

/// Team plus the caller's effective role on it
#[derive(Debug, Clone)]
pub struct TeamAccess {
    pub team: Team,
    pub role: TeamRole,
}

/// Effective project role of `user_id`, `None` when they have no access
pub async fn resolve_project_role(
    store: &dyn Store,
    user_id: Uuid,
    project: &Project,
) -> Result<Option<ProjectRole>, StoreError> {
    if project.owner_id == user_id {
        return Ok(Some(ProjectRole::Admin));
    }

    Ok(store
        .find_project_member(project.id, user_id)
        .await?
        .map(|member| member.role))
}

/// Loads a project and checks the caller may perform `action` on it
///
/// # Errors
///
/// - `NotFound` if the project is missing or the caller has no role on it
/// - `Forbidden` if the role is too low
pub async fn require_project_action(
    store: &dyn Store,
    user_id: Uuid,
    project_id: Uuid,
    action: ProjectAction,
) -> Result<ProjectAccess, AuthzError> {
    let project = store
        .find_project(project_id)
        .await?
        .ok_or(AuthzError::NotFound("project"))?;

    let role = resolve_project_role(store, user_id, &project)
        .await?
        .ok_or(AuthzError::NotFound("project"))?;

    if !action.allowed_for(role) {
        return Err(AuthzError::Forbidden {
            action: action.describe(),
        });
    }

    Ok(ProjectAccess { project, role })
}

/// Effective team role of `user_id`, `None` when they are not in the team
pub async fn resolve_team_role(
    store: &dyn Store,
    user_id: Uuid,
    team: &Team,
) -> Result<Option<TeamRole>, StoreError> {
    if team.owner_id == user_id {
        return Ok(Some(TeamRole::Owner));
    }

    Ok(store
        .find_team_member(team.id, user_id)
        .await?
        .map(|member| member.role))
}

/// Loads a team and checks the caller may perform `action` on it
///
/// # Errors
///
/// - `NotFound` if the team is missing or the caller is not a member
/// - `Forbidden` if the role is too low
pub async fn require_team_action(
    store: &dyn Store,
    user_id: Uuid,
    team_id: Uuid,
    action: TeamAction,
) -> Result<TeamAccess, AuthzError> {
    let team = store
        .find_team(team_id)
        .await?
        .ok_or(AuthzError::NotFound("team"))?;

    let role = resolve_team_role(store, user_id, &team)
        .await?
        .ok_or(AuthzError::NotFound("team"))?;

    if !action.allowed_for(role) {
        return Err(AuthzError::Forbidden {
            action: action.describe(),
        });
    }

    Ok(TeamAccess { team, role })
}
