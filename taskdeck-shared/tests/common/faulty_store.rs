/// `MemoryStore` wrapper that fails selected operations on demand

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use taskdeck_shared::models::{
    conversation::{Conversation, CreateMessage, Message},
    notification::{CreateNotification, Notification},
    project::{CreateProject, Project, ProjectOverview},
    project_member::{CreateProjectMember, ProjectMember, ProjectMemberDetail, ProjectRole},
    task::{CreateTask, StatusChange, Task, TaskStatus},
    team::{Team, TeamOverview},
    team_invitation::{CreateInvitation, InvitationDetail, InvitationResponse, TeamInvitation},
    team_member::{TeamMember, TeamMemberDetail, TeamRole},
    user::{CreateUser, UpdateProfile, User, UserSummary},
};
use taskdeck_shared::store::{
    CreatedTeam, MemoryStore, MessageStore, NewTeam, NotificationStore, ProjectStore,
    ResolvedInvitation, Store, StoreError, StoreResult, TaskStore, TeamStore, UserStore,
};
use uuid::Uuid;

#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_notifications: AtomicBool,
    fail_email_lookup: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    pub fn fail_email_lookup(&self, fail: bool) {
        self.fail_email_lookup.store(fail, Ordering::SeqCst);
    }

    fn injected(what: &str) -> StoreError {
        StoreError::Unavailable(format!("injected {} failure", what))
    }
}

#[async_trait]
impl UserStore for FaultyStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        self.inner.create_user(data).await
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        if self.fail_email_lookup.load(Ordering::SeqCst) {
            return Err(Self::injected("email lookup"));
        }
        self.inner.find_user_by_email(email).await
    }

    async fn update_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        self.inner.update_profile(id, data).await
    }

    async fn find_user_summaries(&self, ids: &[Uuid]) -> StoreResult<Vec<UserSummary>> {
        self.inner.find_user_summaries(ids).await
    }
}

#[async_trait]
impl ProjectStore for FaultyStore {
    async fn create_project_with_owner(&self, data: CreateProject) -> StoreResult<Project> {
        self.inner.create_project_with_owner(data).await
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        self.inner.find_project(id).await
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectOverview>> {
        self.inner.list_projects_for_user(user_id).await
    }

    async fn save_project(&self, project: &Project) -> StoreResult<Option<Project>> {
        self.inner.save_project(project).await
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_project(id).await
    }

    async fn count_owned_projects(&self, owner_id: Uuid) -> StoreResult<i64> {
        self.inner.count_owned_projects(owner_id).await
    }

    async fn find_project_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>> {
        self.inner.find_project_member(project_id, user_id).await
    }

    async fn add_project_member(&self, data: CreateProjectMember) -> StoreResult<ProjectMember> {
        self.inner.add_project_member(data).await
    }

    async fn list_project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMemberDetail>> {
        self.inner.list_project_members(project_id).await
    }

    async fn update_project_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<Option<ProjectMember>> {
        self.inner
            .update_project_member_role(project_id, user_id, role)
            .await
    }

    async fn remove_project_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.inner.remove_project_member(project_id, user_id).await
    }
}

#[async_trait]
impl TeamStore for FaultyStore {
    async fn create_team(&self, data: NewTeam) -> StoreResult<CreatedTeam> {
        self.inner.create_team(data).await
    }

    async fn find_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        self.inner.find_team(id).await
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TeamOverview>> {
        self.inner.list_teams_for_user(user_id).await
    }

    async fn save_team(&self, team: &Team) -> StoreResult<Option<Team>> {
        self.inner.save_team(team).await
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_team(id).await
    }

    async fn find_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamMember>> {
        self.inner.find_team_member(team_id, user_id).await
    }

    async fn list_team_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMemberDetail>> {
        self.inner.list_team_members(team_id).await
    }

    async fn update_team_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<Option<TeamMember>> {
        self.inner.update_team_member_role(team_id, user_id, role).await
    }

    async fn remove_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.inner.remove_team_member(team_id, user_id).await
    }

    async fn create_invitation(&self, data: CreateInvitation) -> StoreResult<TeamInvitation> {
        self.inner.create_invitation(data).await
    }

    async fn find_invitation(&self, id: Uuid) -> StoreResult<Option<TeamInvitation>> {
        self.inner.find_invitation(id).await
    }

    async fn list_pending_invitations(&self, email: &str) -> StoreResult<Vec<InvitationDetail>> {
        self.inner.list_pending_invitations(email).await
    }

    async fn resolve_invitation(
        &self,
        id: Uuid,
        response: InvitationResponse,
        user_id: Uuid,
    ) -> StoreResult<Option<ResolvedInvitation>> {
        self.inner.resolve_invitation(id, response, user_id).await
    }
}

#[async_trait]
impl TaskStore for FaultyStore {
    async fn create_task(&self, data: CreateTask) -> StoreResult<Task> {
        self.inner.create_task(data).await
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        self.inner.find_task(id).await
    }

    async fn list_project_tasks(&self, project_id: Uuid) -> StoreResult<Vec<Task>> {
        self.inner.list_project_tasks(project_id).await
    }

    async fn list_tasks_involving(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        self.inner.list_tasks_involving(user_id).await
    }

    async fn save_task(&self, task: &Task) -> StoreResult<Option<Task>> {
        self.inner.save_task(task).await
    }

    async fn set_task_status(&self, id: Uuid, status: TaskStatus) -> StoreResult<Option<StatusChange>> {
        self.inner.set_task_status(id, status).await
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_task(id).await
    }
}

#[async_trait]
impl NotificationStore for FaultyStore {
    async fn create_notification(&self, data: CreateNotification) -> StoreResult<Notification> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(Self::injected("notification"));
        }
        self.inner.create_notification(data).await
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        self.inner.find_notification(id).await
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>> {
        self.inner.list_notifications(user_id, limit, unread_only).await
    }

    async fn count_unread(&self, user_id: Uuid) -> StoreResult<i64> {
        self.inner.count_unread(user_id).await
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        self.inner.mark_notification_read(id).await
    }

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<u64> {
        self.inner.mark_all_read(user_id).await
    }

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_notification(id).await
    }
}

#[async_trait]
impl MessageStore for FaultyStore {
    async fn find_direct_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<Option<Conversation>> {
        self.inner.find_direct_conversation(a, b).await
    }

    async fn create_direct_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<Conversation> {
        self.inner.create_direct_conversation(a, b).await
    }

    async fn create_team_conversation(&self, team_id: Uuid, name: &str) -> StoreResult<Conversation> {
        self.inner.create_team_conversation(team_id, name).await
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        self.inner.find_conversation(id).await
    }

    async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.inner.is_participant(conversation_id, user_id).await
    }

    async fn list_conversations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
        self.inner.list_conversations_for_user(user_id).await
    }

    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> StoreResult<Vec<Message>> {
        self.inner.latest_messages(conversation_ids).await
    }

    async fn list_messages(&self, conversation_id: Uuid, limit: i64) -> StoreResult<Vec<Message>> {
        self.inner.list_messages(conversation_id, limit).await
    }

    async fn create_message(&self, data: CreateMessage) -> StoreResult<Message> {
        self.inner.create_message(data).await
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}
