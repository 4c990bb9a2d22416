/// In-memory entity store.
///
/// Emulates what the Postgres schema enforces: unique keys, foreign keys,
/// cascading deletes and atomic multi-row writes (one write lock per
/// operation). When built with a [`ChangeFeed`] it also publishes the task and
/// notification changes the database triggers would.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{
    CreatedTeam, MessageStore, NewTeam, NotificationStore, ProjectStore, ResolvedInvitation, Store,
    StoreError, StoreResult, TaskStore, TeamStore, UserStore,
};
use crate::models::{
    conversation::{Conversation, ConversationKind, CreateMessage, Message},
    notification::{CreateNotification, Notification},
    project::{CreateProject, Project, ProjectOverview, ProjectStatus},
    project_member::{CreateProjectMember, ProjectMember, ProjectMemberDetail, ProjectRole},
    task::{CreateTask, StatusChange, Task, TaskStatus},
    team::{Team, TeamOverview},
    team_invitation::{
        CreateInvitation, InvitationDetail, InvitationResponse, InvitationStatus, TeamInvitation,
    },
    team_member::{TeamMember, TeamMemberDetail, TeamRole},
    user::{normalize_email, CreateUser, UpdateProfile, User, UserSummary},
};
use crate::realtime::changes::{ChangeEvent, ChangeFeed, ChangeOp};

/// Thread-safe in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    feed: Option<ChangeFeed>,
}

#[derive(Debug, Default)]
struct State {
    last_timestamp: Option<DateTime<Utc>>,
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    project_members: HashMap<(Uuid, Uuid), ProjectMember>,
    teams: HashMap<Uuid, Team>,
    team_members: HashMap<(Uuid, Uuid), TeamMember>,
    invitations: HashMap<Uuid, TeamInvitation>,
    tasks: HashMap<Uuid, Task>,
    notifications: HashMap<Uuid, Notification>,
    conversations: HashMap<Uuid, Conversation>,
    participants: HashSet<(Uuid, Uuid)>,
    messages: Vec<Message>,
}

impl State {
    /// Strictly increasing timestamps so "newest first" is deterministic.
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    fn require_user(&self, id: Uuid, constraint: &str) -> StoreResult<()> {
        require(self.users.contains_key(&id), constraint)
    }

    fn summary(&self, id: Uuid) -> Option<UserSummary> {
        self.users.get(&id).map(User::summary)
    }

    fn team_role(&self, team: &Team, user_id: Uuid) -> Option<TeamRole> {
        if team.owner_id == user_id {
            return Some(TeamRole::Owner);
        }
        self.team_members.get(&(team.id, user_id)).map(|m| m.role)
    }

    fn insert_invitation(&mut self, data: &CreateInvitation) -> StoreResult<TeamInvitation> {
        require(self.teams.contains_key(&data.team_id), "team_invitations_team_id_fkey")?;
        self.require_user(data.invited_by, "team_invitations_invited_by_fkey")?;
        if data.role == TeamRole::Owner {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "team_invitations_role_check".to_string(),
            )));
        }

        let email = normalize_email(&data.email);
        let pending = self.invitations.values().any(|i| {
            i.team_id == data.team_id && i.status == InvitationStatus::Pending && i.email == email
        });
        if pending {
            return Err(conflict("team_invitations_pending_email_key"));
        }

        let invitation = TeamInvitation {
            id: Uuid::new_v4(),
            team_id: data.team_id,
            email,
            role: data.role,
            invited_by: data.invited_by,
            status: InvitationStatus::Pending,
            created_at: self.now(),
            responded_at: None,
        };
        self.invitations.insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    fn remove_conversations(&mut self, doomed: &HashSet<Uuid>) {
        self.conversations.retain(|id, _| !doomed.contains(id));
        self.participants.retain(|(c, _)| !doomed.contains(c));
        self.messages.retain(|m| !doomed.contains(&m.conversation_id));
    }
}

fn require(condition: bool, constraint: &str) -> StoreResult<()> {
    if condition {
        Ok(())
    } else {
        Err(StoreError::MissingReference {
            constraint: constraint.to_string(),
        })
    }
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict {
        constraint: constraint.to_string(),
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

impl MemoryStore {
    /// Creates an empty store that publishes no change events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that publishes task and notification changes.
    #[must_use]
    pub fn with_change_feed(feed: ChangeFeed) -> Self {
        Self {
            state: Arc::default(),
            feed: Some(feed),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    fn publish(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        if let Some(feed) = &self.feed {
            for event in events {
                feed.publish(event);
            }
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut state = self.write()?;
        let email = normalize_email(&data.email);
        if state.users.values().any(|u| u.email == email) {
            return Err(conflict("users_email_lower_key"));
        }

        let now = state.now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: data.password_hash,
            full_name: data.full_name,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        let mut state = self.write()?;
        let now = state.now();
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(full_name) = data.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(avatar_url) = data.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn find_user_summaries(&self, ids: &[Uuid]) -> StoreResult<Vec<UserSummary>> {
        let state = self.read()?;
        let unique: HashSet<&Uuid> = ids.iter().collect();
        Ok(unique.into_iter().filter_map(|id| state.summary(*id)).collect())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project_with_owner(&self, data: CreateProject) -> StoreResult<Project> {
        let mut state = self.write()?;
        state.require_user(data.owner_id, "projects_owner_id_fkey")?;

        let now = state.now();
        let project = Project {
            id: Uuid::new_v4(),
            name: data.name,
            description: data.description,
            owner_id: data.owner_id,
            status: ProjectStatus::Active,
            team_id: None,
            created_at: now,
            updated_at: now,
        };
        state.projects.insert(project.id, project.clone());
        state.project_members.insert(
            (project.id, data.owner_id),
            ProjectMember {
                project_id: project.id,
                user_id: data.owner_id,
                role: ProjectRole::Admin,
                created_at: now,
            },
        );
        Ok(project)
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.read()?.projects.get(&id).cloned())
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectOverview>> {
        let state = self.read()?;
        let mut overviews: Vec<ProjectOverview> = state
            .projects
            .values()
            .filter_map(|project| {
                let role = if project.owner_id == user_id {
                    ProjectRole::Admin
                } else {
                    state.project_members.get(&(project.id, user_id))?.role
                };
                let task_count = state
                    .tasks
                    .values()
                    .filter(|t| t.project_id == project.id)
                    .count() as i64;
                Some(ProjectOverview {
                    project: project.clone(),
                    role,
                    task_count,
                })
            })
            .collect();
        newest_first(&mut overviews, |o| o.project.created_at);
        Ok(overviews)
    }

    async fn save_project(&self, project: &Project) -> StoreResult<Option<Project>> {
        let mut state = self.write()?;
        let now = state.now();
        let Some(stored) = state.projects.get_mut(&project.id) else {
            return Ok(None);
        };
        stored.name = project.name.clone();
        stored.description = project.description.clone();
        stored.status = project.status;
        stored.updated_at = now;
        Ok(Some(stored.clone()))
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.write()?;
        if state.projects.remove(&id).is_none() {
            return Ok(false);
        }
        state.project_members.retain(|(project_id, _), _| *project_id != id);

        let removed: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.project_id == id)
            .cloned()
            .collect();
        state.tasks.retain(|_, t| t.project_id != id);
        drop(state);

        self.publish(removed.iter().map(|t| ChangeEvent::task(ChangeOp::Delete, t)));
        Ok(true)
    }

    async fn count_owned_projects(&self, owner_id: Uuid) -> StoreResult<i64> {
        let state = self.read()?;
        Ok(state.projects.values().filter(|p| p.owner_id == owner_id).count() as i64)
    }

    async fn find_project_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ProjectMember>> {
        Ok(self.read()?.project_members.get(&(project_id, user_id)).cloned())
    }

    async fn add_project_member(&self, data: CreateProjectMember) -> StoreResult<ProjectMember> {
        let mut state = self.write()?;
        require(
            state.projects.contains_key(&data.project_id),
            "project_members_project_id_fkey",
        )?;
        state.require_user(data.user_id, "project_members_user_id_fkey")?;

        let key = (data.project_id, data.user_id);
        if state.project_members.contains_key(&key) {
            return Err(conflict("project_members_pkey"));
        }

        let member = ProjectMember {
            project_id: data.project_id,
            user_id: data.user_id,
            role: data.role,
            created_at: state.now(),
        };
        state.project_members.insert(key, member.clone());
        Ok(member)
    }

    async fn list_project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMemberDetail>> {
        let state = self.read()?;
        let mut members: Vec<ProjectMemberDetail> = state
            .project_members
            .values()
            .filter(|m| m.project_id == project_id)
            .filter_map(|m| {
                let user = state.users.get(&m.user_id)?;
                Some(ProjectMemberDetail {
                    user_id: m.user_id,
                    role: m.role,
                    created_at: m.created_at,
                    email: user.email.clone(),
                    full_name: user.full_name.clone(),
                    avatar_url: user.avatar_url.clone(),
                })
            })
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }

    async fn update_project_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> StoreResult<Option<ProjectMember>> {
        let mut state = self.write()?;
        Ok(state
            .project_members
            .get_mut(&(project_id, user_id))
            .map(|member| {
                member.role = role;
                member.clone()
            }))
    }

    async fn remove_project_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .write()?
            .project_members
            .remove(&(project_id, user_id))
            .is_some())
    }
}

#[async_trait]
impl TeamStore for MemoryStore {
    async fn create_team(&self, data: NewTeam) -> StoreResult<CreatedTeam> {
        let mut state = self.write()?;
        let owner_id = data.team.owner_id;
        state.require_user(owner_id, "teams_owner_id_fkey")?;

        let now = state.now();
        let team = Team {
            id: Uuid::new_v4(),
            name: data.team.name,
            description: data.team.description,
            owner_id,
            created_at: now,
            updated_at: now,
        };

        state.teams.insert(team.id, team.clone());
        state.team_members.insert(
            (team.id, owner_id),
            TeamMember {
                team_id: team.id,
                user_id: owner_id,
                role: TeamRole::Owner,
                created_at: now,
            },
        );

        let linked_project = match data.link_project {
            Some(project_id) => match state.projects.get_mut(&project_id) {
                Some(project) if project.owner_id == owner_id => {
                    project.team_id = Some(team.id);
                    project.updated_at = now;
                    true
                }
                _ => false,
            },
            None => false,
        };

        let mut invitations = Vec::with_capacity(data.invite_emails.len());
        for email in &data.invite_emails {
            invitations.push(state.insert_invitation(&CreateInvitation {
                team_id: team.id,
                email: email.clone(),
                role: TeamRole::Member,
                invited_by: owner_id,
            })?);
        }

        Ok(CreatedTeam {
            team,
            linked_project,
            invitations,
        })
    }

    async fn find_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.read()?.teams.get(&id).cloned())
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TeamOverview>> {
        let state = self.read()?;
        let mut overviews: Vec<TeamOverview> = state
            .teams
            .values()
            .filter_map(|team| {
                let role = state.team_role(team, user_id)?;
                let member_count = state
                    .team_members
                    .keys()
                    .filter(|(team_id, _)| *team_id == team.id)
                    .count() as i64;
                Some(TeamOverview {
                    team: team.clone(),
                    role,
                    member_count,
                })
            })
            .collect();
        newest_first(&mut overviews, |o| o.team.created_at);
        Ok(overviews)
    }

    async fn save_team(&self, team: &Team) -> StoreResult<Option<Team>> {
        let mut state = self.write()?;
        let now = state.now();
        let Some(stored) = state.teams.get_mut(&team.id) else {
            return Ok(None);
        };
        stored.name = team.name.clone();
        stored.description = team.description.clone();
        stored.updated_at = now;
        Ok(Some(stored.clone()))
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.write()?;
        if state.teams.remove(&id).is_none() {
            return Ok(false);
        }
        state.team_members.retain(|(team_id, _), _| *team_id != id);
        state.invitations.retain(|_, i| i.team_id != id);
        for project in state.projects.values_mut() {
            if project.team_id == Some(id) {
                project.team_id = None;
            }
        }
        let doomed: HashSet<Uuid> = state
            .conversations
            .values()
            .filter(|c| c.team_id == Some(id))
            .map(|c| c.id)
            .collect();
        state.remove_conversations(&doomed);
        Ok(true)
    }

    async fn find_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamMember>> {
        Ok(self.read()?.team_members.get(&(team_id, user_id)).cloned())
    }

    async fn list_team_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMemberDetail>> {
        let state = self.read()?;
        let mut members: Vec<TeamMemberDetail> = state
            .team_members
            .values()
            .filter(|m| m.team_id == team_id)
            .filter_map(|m| {
                let user = state.users.get(&m.user_id)?;
                Some(TeamMemberDetail {
                    user_id: m.user_id,
                    role: m.role,
                    created_at: m.created_at,
                    email: user.email.clone(),
                    full_name: user.full_name.clone(),
                    avatar_url: user.avatar_url.clone(),
                })
            })
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }

    async fn update_team_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<Option<TeamMember>> {
        let mut state = self.write()?;
        Ok(state.team_members.get_mut(&(team_id, user_id)).map(|member| {
            member.role = role;
            member.clone()
        }))
    }

    async fn remove_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.write()?.team_members.remove(&(team_id, user_id)).is_some())
    }

    async fn create_invitation(&self, data: CreateInvitation) -> StoreResult<TeamInvitation> {
        self.write()?.insert_invitation(&data)
    }

    async fn find_invitation(&self, id: Uuid) -> StoreResult<Option<TeamInvitation>> {
        Ok(self.read()?.invitations.get(&id).cloned())
    }

    async fn list_pending_invitations(&self, email: &str) -> StoreResult<Vec<InvitationDetail>> {
        let state = self.read()?;
        let email = normalize_email(email);
        let mut pending: Vec<InvitationDetail> = state
            .invitations
            .values()
            .filter(|i| i.status == InvitationStatus::Pending && i.email == email)
            .filter_map(|i| {
                let team = state.teams.get(&i.team_id)?;
                let inviter = state.users.get(&i.invited_by)?;
                Some(InvitationDetail {
                    invitation: i.clone(),
                    team_name: team.name.clone(),
                    inviter_name: inviter.full_name.clone(),
                    inviter_email: inviter.email.clone(),
                })
            })
            .collect();
        newest_first(&mut pending, |d| d.invitation.created_at);
        Ok(pending)
    }

    async fn resolve_invitation(
        &self,
        id: Uuid,
        response: InvitationResponse,
        user_id: Uuid,
    ) -> StoreResult<Option<ResolvedInvitation>> {
        let mut state = self.write()?;
        let now = state.now();

        let Some(invitation) = state.invitations.get(&id).cloned() else {
            return Ok(None);
        };
        if invitation.status.is_terminal() {
            return Ok(None);
        }

        let joined = match response {
            InvitationResponse::Accept => {
                state.require_user(user_id, "team_members_user_id_fkey")?;
                let key = (invitation.team_id, user_id);
                if state.team_members.contains_key(&key) {
                    false
                } else {
                    state.team_members.insert(
                        key,
                        TeamMember {
                            team_id: invitation.team_id,
                            user_id,
                            role: invitation.role,
                            created_at: now,
                        },
                    );
                    true
                }
            }
            InvitationResponse::Reject => false,
        };

        let resolved = TeamInvitation {
            status: response.resulting_status(),
            responded_at: Some(now),
            ..invitation
        };
        state.invitations.insert(id, resolved.clone());

        Ok(Some(ResolvedInvitation {
            invitation: resolved,
            joined,
        }))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, data: CreateTask) -> StoreResult<Task> {
        let mut state = self.write()?;
        require(state.projects.contains_key(&data.project_id), "tasks_project_id_fkey")?;
        state.require_user(data.created_by, "tasks_created_by_fkey")?;
        if let Some(assignee) = data.assigned_to {
            state.require_user(assignee, "tasks_assigned_to_fkey")?;
        }

        let now = state.now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: data.project_id,
            title: data.title,
            description: data.description,
            status: TaskStatus::Pending,
            priority: data.priority,
            due_date: data.due_date,
            due_time: data.due_time,
            tag: data.tag,
            assigned_to: data.assigned_to,
            created_by: data.created_by,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(task.id, task.clone());
        drop(state);

        self.publish([ChangeEvent::task(ChangeOp::Insert, &task)]);
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.read()?.tasks.get(&id).cloned())
    }

    async fn list_project_tasks(&self, project_id: Uuid) -> StoreResult<Vec<Task>> {
        let state = self.read()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        newest_first(&mut tasks, |t| t.created_at);
        Ok(tasks)
    }

    async fn list_tasks_involving(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        let state = self.read()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.assigned_to == Some(user_id) || t.created_by == user_id)
            .cloned()
            .collect();
        newest_first(&mut tasks, |t| t.created_at);
        Ok(tasks)
    }

    async fn save_task(&self, task: &Task) -> StoreResult<Option<Task>> {
        let mut state = self.write()?;
        if let Some(assignee) = task.assigned_to {
            state.require_user(assignee, "tasks_assigned_to_fkey")?;
        }
        let now = state.now();
        let Some(stored) = state.tasks.get_mut(&task.id) else {
            return Ok(None);
        };
        *stored = Task {
            status: stored.status,
            project_id: stored.project_id,
            created_by: stored.created_by,
            created_at: stored.created_at,
            updated_at: now,
            ..task.clone()
        };
        let saved = stored.clone();
        drop(state);

        self.publish([ChangeEvent::task(ChangeOp::Update, &saved)]);
        Ok(Some(saved))
    }

    async fn set_task_status(&self, id: Uuid, status: TaskStatus) -> StoreResult<Option<StatusChange>> {
        let mut state = self.write()?;
        let now = state.now();
        let Some(stored) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };
        let previous_status = stored.status;
        stored.status = status;
        stored.updated_at = now;
        let task = stored.clone();
        drop(state);

        self.publish([ChangeEvent::task(ChangeOp::Update, &task)]);
        Ok(Some(StatusChange {
            task,
            previous_status,
        }))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let removed = self.write()?.tasks.remove(&id);
        match removed {
            Some(task) => {
                self.publish([ChangeEvent::task(ChangeOp::Delete, &task)]);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_notification(&self, data: CreateNotification) -> StoreResult<Notification> {
        let mut state = self.write()?;
        state.require_user(data.user_id, "notifications_user_id_fkey")?;

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            kind: data.kind,
            message: data.message,
            related_id: data.related_id,
            read: false,
            created_at: state.now(),
        };
        state.notifications.insert(notification.id, notification.clone());
        drop(state);

        self.publish([ChangeEvent::notification(ChangeOp::Insert, &notification)]);
        Ok(notification)
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(self.read()?.notifications.get(&id).cloned())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>> {
        let state = self.read()?;
        let mut notifications: Vec<Notification> = state
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        newest_first(&mut notifications, |n| n.created_at);
        notifications.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(notifications)
    }

    async fn count_unread(&self, user_id: Uuid) -> StoreResult<i64> {
        let state = self.read()?;
        Ok(state
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as i64)
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let updated = self.write()?.notifications.get_mut(&id).map(|n| {
            n.read = true;
            n.clone()
        });
        if let Some(n) = &updated {
            self.publish([ChangeEvent::notification(ChangeOp::Update, n)]);
        }
        Ok(updated)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut state = self.write()?;
        let mut changed = Vec::new();
        for n in state.notifications.values_mut() {
            if n.user_id == user_id && !n.read {
                n.read = true;
                changed.push(ChangeEvent::notification(ChangeOp::Update, n));
            }
        }
        drop(state);

        let count = changed.len() as u64;
        self.publish(changed);
        Ok(count)
    }

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool> {
        let removed = self.write()?.notifications.remove(&id);
        match removed {
            Some(n) => {
                self.publish([ChangeEvent::notification(ChangeOp::Delete, &n)]);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn find_direct_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<Option<Conversation>> {
        let state = self.read()?;
        let mut candidates: Vec<&Conversation> = state
            .conversations
            .values()
            .filter(|c| {
                c.kind == ConversationKind::Direct
                    && state.participants.contains(&(c.id, a))
                    && state.participants.contains(&(c.id, b))
            })
            .collect();
        candidates.sort_by_key(|c| c.created_at);
        Ok(candidates.first().map(|c| (*c).clone()))
    }

    async fn create_direct_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<Conversation> {
        let mut state = self.write()?;
        state.require_user(a, "conversation_participants_user_id_fkey")?;
        state.require_user(b, "conversation_participants_user_id_fkey")?;

        let exists = state.conversations.values().any(|c| {
            c.kind == ConversationKind::Direct
                && state.participants.contains(&(c.id, a))
                && state.participants.contains(&(c.id, b))
        });
        if exists {
            return Err(conflict("conversations_direct_pair_key"));
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Direct,
            team_id: None,
            name: None,
            created_at: state.now(),
        };
        state.conversations.insert(conversation.id, conversation.clone());
        state.participants.insert((conversation.id, a));
        state.participants.insert((conversation.id, b));
        Ok(conversation)
    }

    async fn create_team_conversation(&self, team_id: Uuid, name: &str) -> StoreResult<Conversation> {
        let mut state = self.write()?;
        require(state.teams.contains_key(&team_id), "conversations_team_id_fkey")?;

        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Team,
            team_id: Some(team_id),
            name: Some(name.to_string()),
            created_at: state.now(),
        };
        state.conversations.insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        Ok(self.read()?.conversations.get(&id).cloned())
    }

    async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.read()?.participants.contains(&(conversation_id, user_id)))
    }

    async fn list_conversations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
        let state = self.read()?;
        Ok(state
            .conversations
            .values()
            .filter(|c| match c.kind {
                ConversationKind::Direct => state.participants.contains(&(c.id, user_id)),
                ConversationKind::Team => c
                    .team_id
                    .and_then(|team_id| state.teams.get(&team_id))
                    .and_then(|team| state.team_role(team, user_id))
                    .is_some(),
            })
            .cloned()
            .collect())
    }

    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> StoreResult<Vec<Message>> {
        let state = self.read()?;
        let wanted: HashSet<&Uuid> = conversation_ids.iter().collect();
        let mut latest: HashMap<Uuid, &Message> = HashMap::new();
        for message in state.messages.iter().filter(|m| wanted.contains(&m.conversation_id)) {
            latest
                .entry(message.conversation_id)
                .and_modify(|current| {
                    if message.created_at > current.created_at {
                        *current = message;
                    }
                })
                .or_insert(message);
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn list_messages(&self, conversation_id: Uuid, limit: i64) -> StoreResult<Vec<Message>> {
        let state = self.read()?;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        let keep = usize::try_from(limit).unwrap_or(0);
        let skip = messages.len().saturating_sub(keep);
        Ok(messages.split_off(skip))
    }

    async fn create_message(&self, data: CreateMessage) -> StoreResult<Message> {
        let mut state = self.write()?;
        require(
            state.conversations.contains_key(&data.conversation_id),
            "messages_conversation_id_fkey",
        )?;
        state.require_user(data.sender_id, "messages_sender_id_fkey")?;

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: data.conversation_id,
            sender_id: data.sender_id,
            content: data.content,
            created_at: state.now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "hash".to_string(),
                full_name: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_email_unique_ignoring_case() {
        let store = MemoryStore::new();
        user(&store, "ada@example.com").await;

        let err = store
            .create_user(CreateUser {
                email: "ADA@Example.com".to_string(),
                password_hash: "hash".to_string(),
                full_name: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let b = user(&store, "b@x.com").await;
        assert!(b.created_at > a.created_at);
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@x.com").await;
        let project = store
            .create_project_with_owner(CreateProject {
                name: "P".to_string(),
                description: None,
                owner_id: owner.id,
            })
            .await
            .unwrap();
        store
            .create_task(CreateTask {
                project_id: project.id,
                title: "T".to_string(),
                created_by: owner.id,
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(store.delete_project(project.id).await.unwrap());
        assert!(store.list_project_tasks(project.id).await.unwrap().is_empty());
        assert!(store
            .find_project_member(project.id, owner.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_reference() {
        let store = MemoryStore::new();
        let err = store
            .create_notification(CreateNotification {
                user_id: Uuid::new_v4(),
                kind: crate::models::notification::NotificationType::TaskCompleted,
                message: "x".to_string(),
                related_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference { .. }));
    }

    #[tokio::test]
    async fn test_list_messages_keeps_most_recent_window() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let b = user(&store, "b@x.com").await;
        let conversation = store.create_direct_conversation(a.id, b.id).await.unwrap();
        let err = store.create_direct_conversation(b.id, a.id).await.unwrap_err();
        assert!(err.is_conflict());

        for i in 0..5 {
            store
                .create_message(CreateMessage {
                    conversation_id: conversation.id,
                    sender_id: a.id,
                    content: format!("m{}", i),
                })
                .await
                .unwrap();
        }

        let window = store.list_messages(conversation.id, 2).await.unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);

        let latest = store.latest_messages(&[conversation.id]).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].content, "m4");
    }

    #[tokio::test]
    async fn test_one_pending_invitation_per_team_and_email() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@x.com").await;
        let created = store
            .create_team(NewTeam {
                team: crate::models::team::CreateTeam {
                    name: "Eng".to_string(),
                    description: None,
                    owner_id: owner.id,
                },
                link_project: None,
                invite_emails: vec!["ada@x.com".to_string()],
            })
            .await
            .unwrap();

        let invite = |email: &str| CreateInvitation {
            team_id: created.team.id,
            email: email.to_string(),
            role: TeamRole::Member,
            invited_by: owner.id,
        };

        let err = store.create_invitation(invite("ADA@x.com")).await.unwrap_err();
        assert!(err.is_conflict());

        store
            .resolve_invitation(created.invitations[0].id, InvitationResponse::Reject, owner.id)
            .await
            .unwrap();
        store.create_invitation(invite("ada@x.com")).await.unwrap();
    }
}
