/// Entity store port.
///
/// Services talk to storage only through the [`Store`] trait object. Two
/// adapters implement it: [`postgres::PgStore`] for production and
/// [`memory::MemoryStore`] for tests and local experiments. Operations that
/// must be atomic (project creation, team creation, invitation acceptance,
/// direct conversation creation) are single trait methods so each adapter can
/// run them in one transaction or critical section.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    conversation::{Conversation, CreateMessage, Message},
    notification::{CreateNotification, Notification},
    project::{CreateProject, Project, ProjectOverview},
    project_member::{CreateProjectMember, ProjectMember, ProjectMemberDetail, ProjectRole},
    task::{CreateTask, StatusChange, Task, TaskStatus},
    team::{CreateTeam, Team, TeamOverview},
    team_invitation::{
        CreateInvitation, InvitationDetail, InvitationResponse, TeamInvitation,
    },
    team_member::{TeamMember, TeamMemberDetail, TeamRole},
    user::{CreateUser, UpdateProfile, User, UserSummary},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },

    /// A foreign key pointed at a row that does not exist.
    #[error("referenced row does not exist: {constraint}")]
    MissingReference { constraint: String },

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// The store cannot serve requests (for example a poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            if db_err.is_unique_violation() {
                return StoreError::Conflict { constraint };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::MissingReference { constraint };
            }
        }
        StoreError::Database(err)
    }
}

/// Team creation as one atomic unit.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub team: CreateTeam,

    /// Project to link; linked only if the team owner owns it.
    pub link_project: Option<Uuid>,

    /// Addresses to invite as `member`, inviter = team owner.
    pub invite_emails: Vec<String>,
}

/// Outcome of [`TeamStore::create_team`].
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTeam {
    pub team: Team,

    /// Whether the requested project was linked. `false` when none was
    /// requested or the caller does not own it.
    pub linked_project: bool,

    pub invitations: Vec<TeamInvitation>,
}

/// Outcome of [`TeamStore::resolve_invitation`].
#[derive(Debug, Clone)]
pub struct ResolvedInvitation {
    pub invitation: TeamInvitation,

    /// Whether acceptance inserted a new team membership row.
    pub joined: bool,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; `Conflict` if the email is taken in any letter case.
    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn update_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>>;

    /// Summaries for the given IDs; unknown IDs are skipped.
    async fn find_user_summaries(&self, ids: &[Uuid]) -> StoreResult<Vec<UserSummary>>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Inserts the project and the owner's `admin` membership atomically.
    async fn create_project_with_owner(&self, data: CreateProject) -> StoreResult<Project>;

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>>;

    /// Projects the user owns or belongs to, newest first.
    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectOverview>>;

    /// Persists name, description and status.
    async fn save_project(&self, project: &Project) -> StoreResult<Option<Project>>;

    /// Deletes the project with its members and tasks.
    async fn delete_project(&self, id: Uuid) -> StoreResult<bool>;

    async fn count_owned_projects(&self, owner_id: Uuid) -> StoreResult<i64>;

    async fn find_project_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>>;

    /// `Conflict` when the (project, user) pair already exists.
    async fn add_project_member(&self, data: CreateProjectMember) -> StoreResult<ProjectMember>;

    async fn list_project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMemberDetail>>;

    async fn update_project_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<Option<ProjectMember>>;

    async fn remove_project_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    /// Inserts the team, the owner's `owner` membership, the optional project
    /// link and the invitations atomically.
    async fn create_team(&self, data: NewTeam) -> StoreResult<CreatedTeam>;

    async fn find_team(&self, id: Uuid) -> StoreResult<Option<Team>>;

    /// Teams the user belongs to or owns, newest first.
    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TeamOverview>>;

    async fn save_team(&self, team: &Team) -> StoreResult<Option<Team>>;

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool>;

    async fn find_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamMember>>;

    async fn list_team_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMemberDetail>>;

    async fn update_team_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<Option<TeamMember>>;

    async fn remove_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// `Conflict` when the team already has a pending invitation for the
    /// address in any letter case.
    async fn create_invitation(&self, data: CreateInvitation) -> StoreResult<TeamInvitation>;

    async fn find_invitation(&self, id: Uuid) -> StoreResult<Option<TeamInvitation>>;

    /// Pending invitations addressed to `email`, newest first.
    async fn list_pending_invitations(&self, email: &str) -> StoreResult<Vec<InvitationDetail>>;

    /// Resolves a pending invitation atomically.
    ///
    /// On accept, inserts a membership for `user_id` with the invitation's
    /// role unless one already exists. Returns `None` when the invitation is
    /// missing or already terminal; nothing is written in that case.
    async fn resolve_invitation(
        &self,
        id: Uuid,
        response: InvitationResponse,
        user_id: Uuid,
    ) -> StoreResult<Option<ResolvedInvitation>>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, data: CreateTask) -> StoreResult<Task>;

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// Newest first.
    async fn list_project_tasks(&self, project_id: Uuid) -> StoreResult<Vec<Task>>;

    /// Tasks assigned to or created by the user, newest first.
    async fn list_tasks_involving(&self, user_id: Uuid) -> StoreResult<Vec<Task>>;

    /// Persists every editable field except status.
    async fn save_task(&self, task: &Task) -> StoreResult<Option<Task>>;

    /// Writes a status and reports the status it replaced.
    async fn set_task_status(&self, id: Uuid, status: TaskStatus) -> StoreResult<Option<StatusChange>>;

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, data: CreateNotification) -> StoreResult<Notification>;

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>>;

    /// Most recent first.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>>;

    async fn count_unread(&self, user_id: Uuid) -> StoreResult<i64>;

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<Option<Notification>>;

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<u64>;

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_direct_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<Option<Conversation>>;

    /// Creates a direct conversation with both participants atomically;
    /// `Conflict` when the pair already has one.
    async fn create_direct_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<Conversation>;

    async fn create_team_conversation(&self, team_id: Uuid, name: &str) -> StoreResult<Conversation>;

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>>;

    async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// Direct conversations of the user and conversations of their teams.
    async fn list_conversations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>>;

    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> StoreResult<Vec<Message>>;

    /// Newest `limit` messages, returned oldest first.
    async fn list_messages(&self, conversation_id: Uuid, limit: i64) -> StoreResult<Vec<Message>>;

    async fn create_message(&self, data: CreateMessage) -> StoreResult<Message>;
}

/// The complete entity store.
#[async_trait]
pub trait Store:
    UserStore + ProjectStore + TeamStore + TaskStore + NotificationStore + MessageStore
{
    /// Verifies the backing storage is reachable.
    async fn ping(&self) -> StoreResult<()>;
}
