/// PostgreSQL adapter for the entity store.
///
/// Single-statement operations delegate to the model functions against the
/// pool; multi-row operations open a transaction and pass it to the same
/// functions.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{
    CreatedTeam, MessageStore, NewTeam, NotificationStore, ProjectStore, ResolvedInvitation, Store,
    StoreResult, TaskStore, TeamStore, UserStore,
};
use crate::db::pool::health_check;
use crate::models::{
    conversation::{Conversation, ConversationKind, CreateMessage, Message},
    notification::{CreateNotification, Notification},
    project::{CreateProject, Project, ProjectOverview},
    project_member::{CreateProjectMember, ProjectMember, ProjectMemberDetail, ProjectRole},
    task::{CreateTask, StatusChange, Task, TaskStatus},
    team::{Team, TeamOverview},
    team_invitation::{
        CreateInvitation, InvitationDetail, InvitationResponse, TeamInvitation,
    },
    team_member::{TeamMember, TeamMemberDetail, TeamRole},
    user::{CreateUser, UpdateProfile, User, UserSummary},
};

/// Entity store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, &data).await?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn update_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        Ok(User::update_profile(&self.pool, id, &data).await?)
    }

    async fn find_user_summaries(&self, ids: &[Uuid]) -> StoreResult<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(User::find_summaries(&self.pool, ids).await?)
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project_with_owner(&self, data: CreateProject) -> StoreResult<Project> {
        let mut tx = self.pool.begin().await?;

        let project = Project::create(&mut *tx, &data).await?;
        ProjectMember::create(
            &mut *tx,
            &CreateProjectMember {
                project_id: project.id,
                user_id: data.owner_id,
                role: ProjectRole::Admin,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(Project::find_by_id(&self.pool, id).await?)
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectOverview>> {
        Ok(Project::list_for_user(&self.pool, user_id).await?)
    }

    async fn save_project(&self, project: &Project) -> StoreResult<Option<Project>> {
        Ok(project.save(&self.pool).await?)
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Project::delete(&self.pool, id).await?)
    }

    async fn count_owned_projects(&self, owner_id: Uuid) -> StoreResult<i64> {
        Ok(Project::count_owned(&self.pool, owner_id).await?)
    }

    async fn find_project_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>> {
        Ok(ProjectMember::find(&self.pool, project_id, user_id).await?)
    }

    async fn add_project_member(&self, data: CreateProjectMember) -> StoreResult<ProjectMember> {
        Ok(ProjectMember::create(&self.pool, &data).await?)
    }

    async fn list_project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMemberDetail>> {
        Ok(ProjectMember::list_for_project(&self.pool, project_id).await?)
    }

    async fn update_project_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<Option<ProjectMember>> {
        Ok(ProjectMember::update_role(&self.pool, project_id, user_id, role).await?)
    }

    async fn remove_project_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(ProjectMember::delete(&self.pool, project_id, user_id).await?)
    }
}

#[async_trait]
impl TeamStore for PgStore {
    async fn create_team(&self, data: NewTeam) -> StoreResult<CreatedTeam> {
        let owner_id = data.team.owner_id;
        let mut tx = self.pool.begin().await?;

        let team = Team::create(&mut *tx, &data.team).await?;
        TeamMember::create(&mut *tx, team.id, owner_id, TeamRole::Owner).await?;

        let linked_project = match data.link_project {
            Some(project_id) => Project::link_team(&mut *tx, project_id, team.id, owner_id).await?,
            None => false,
        };

        let mut invitations = Vec::with_capacity(data.invite_emails.len());
        for email in &data.invite_emails {
            let invitation = TeamInvitation::create(
                &mut *tx,
                &CreateInvitation {
                    team_id: team.id,
                    email: email.clone(),
                    role: TeamRole::Member,
                    invited_by: owner_id,
                },
            )
            .await?;
            invitations.push(invitation);
        }

        tx.commit().await?;

        debug!(
            team_id = %team.id,
            linked_project,
            invitations = invitations.len(),
            "Team created"
        );

        Ok(CreatedTeam {
            team,
            linked_project,
            invitations,
        })
    }

    async fn find_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(Team::find_by_id(&self.pool, id).await?)
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TeamOverview>> {
        Ok(Team::list_for_user(&self.pool, user_id).await?)
    }

    async fn save_team(&self, team: &Team) -> StoreResult<Option<Team>> {
        Ok(team.save(&self.pool).await?)
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Team::delete(&self.pool, id).await?)
    }

    async fn find_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamMember>> {
        Ok(TeamMember::find(&self.pool, team_id, user_id).await?)
    }

    async fn list_team_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMemberDetail>> {
        Ok(TeamMember::list_for_team(&self.pool, team_id).await?)
    }

    async fn update_team_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<Option<TeamMember>> {
        Ok(TeamMember::update_role(&self.pool, team_id, user_id, role).await?)
    }

    async fn remove_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(TeamMember::delete(&self.pool, team_id, user_id).await?)
    }

    async fn create_invitation(&self, data: CreateInvitation) -> StoreResult<TeamInvitation> {
        Ok(TeamInvitation::create(&self.pool, &data).await?)
    }

    async fn find_invitation(&self, id: Uuid) -> StoreResult<Option<TeamInvitation>> {
        Ok(TeamInvitation::find_by_id(&self.pool, id).await?)
    }

    async fn list_pending_invitations(&self, email: &str) -> StoreResult<Vec<InvitationDetail>> {
        Ok(TeamInvitation::list_pending_for_email(&self.pool, email).await?)
    }

    async fn resolve_invitation(
        &self,
        id: Uuid,
        response: InvitationResponse,
        user_id: Uuid,
    ) -> StoreResult<Option<ResolvedInvitation>> {
        let mut tx = self.pool.begin().await?;

        // The conditional update locks the row, so a concurrent response
        // waits here and then sees a terminal status.
        let Some(invitation) =
            TeamInvitation::resolve(&mut *tx, id, response.resulting_status()).await?
        else {
            return Ok(None);
        };

        let joined = match response {
            InvitationResponse::Accept => {
                TeamMember::create_if_absent(&mut *tx, invitation.team_id, user_id, invitation.role)
                    .await?
            }
            InvitationResponse::Reject => false,
        };

        tx.commit().await?;
        Ok(Some(ResolvedInvitation { invitation, joined }))
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, data: CreateTask) -> StoreResult<Task> {
        Ok(Task::create(&self.pool, &data).await?)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn list_project_tasks(&self, project_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(Task::list_for_project(&self.pool, project_id).await?)
    }

    async fn list_tasks_involving(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(Task::list_involving_user(&self.pool, user_id).await?)
    }

    async fn save_task(&self, task: &Task) -> StoreResult<Option<Task>> {
        Ok(task.save(&self.pool).await?)
    }

    async fn set_task_status(&self, id: Uuid, status: TaskStatus) -> StoreResult<Option<StatusChange>> {
        Ok(Task::set_status(&self.pool, id, status).await?)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Task::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn create_notification(&self, data: CreateNotification) -> StoreResult<Notification> {
        Ok(Notification::create(&self.pool, &data).await?)
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(Notification::find_by_id(&self.pool, id).await?)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>> {
        Ok(Notification::list_for_user(&self.pool, user_id, limit, unread_only).await?)
    }

    async fn count_unread(&self, user_id: Uuid) -> StoreResult<i64> {
        Ok(Notification::count_unread(&self.pool, user_id).await?)
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(Notification::mark_read(&self.pool, id).await?)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(Notification::mark_all_read(&self.pool, user_id).await?)
    }

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Notification::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn find_direct_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<Option<Conversation>> {
        Ok(Conversation::find_direct(&self.pool, a, b).await?)
    }

    async fn create_direct_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<Conversation> {
        let mut tx = self.pool.begin().await?;

        let conversation = Conversation::create_direct(&mut *tx, a, b).await?;
        Conversation::add_participant(&mut *tx, conversation.id, a).await?;
        Conversation::add_participant(&mut *tx, conversation.id, b).await?;

        tx.commit().await?;
        Ok(conversation)
    }

    async fn create_team_conversation(&self, team_id: Uuid, name: &str) -> StoreResult<Conversation> {
        Ok(Conversation::create(&self.pool, ConversationKind::Team, Some(team_id), Some(name)).await?)
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        Ok(Conversation::find_by_id(&self.pool, id).await?)
    }

    async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(Conversation::is_participant(&self.pool, conversation_id, user_id).await?)
    }

    async fn list_conversations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
        Ok(Conversation::list_for_user(&self.pool, user_id).await?)
    }

    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> StoreResult<Vec<Message>> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Message::latest_per_conversation(&self.pool, conversation_ids).await?)
    }

    async fn list_messages(&self, conversation_id: Uuid, limit: i64) -> StoreResult<Vec<Message>> {
        Ok(Message::list_recent(&self.pool, conversation_id, limit).await?)
    }

    async fn create_message(&self, data: CreateMessage) -> StoreResult<Message> {
        Ok(Message::create(&self.pool, &data).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }
}
