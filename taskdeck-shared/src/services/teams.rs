/// Teams, team membership and invitations.

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{optional_text, required_text, valid_email, ServiceError, ServiceResult};
use super::notifications::notify_best_effort;
use crate::auth::authorization::{require_team_action, TeamAction};
use crate::models::{
    notification::NotificationType,
    team::{CreateTeam, Team, TeamOverview, UpdateTeam},
    team_invitation::{
        CreateInvitation, InvitationDetail, InvitationResponse, InvitationStatus, TeamInvitation,
    },
    team_member::{TeamMember, TeamMemberDetail, TeamRole},
    user::normalize_email,
};
use crate::store::{CreatedTeam, NewTeam, Store};

/// Input for [`create_team`]
#[derive(Debug, Clone, Default)]
pub struct TeamDraft {
    pub name: String,
    pub description: Option<String>,

    /// Project to link; only linked when the caller owns it
    pub project_id: Option<Uuid>,

    /// Addresses invited as `member`
    pub invite_emails: Vec<String>,
}

/// A team as seen by one caller
#[derive(Debug, Clone, Serialize)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    pub role: TeamRole,
    pub members: Vec<TeamMemberDetail>,
}

fn assignable(role: TeamRole) -> ServiceResult<TeamRole> {
    if !role.is_assignable() {
        return Err(ServiceError::validation(
            "role",
            "Role must be admin or member",
        ));
    }
    Ok(role)
}

/// Creates a team owned by the caller
///
/// The project link, when requested for a project the caller does not own, is
/// skipped without error; `linked_project` in the result says which happened.
pub async fn create_team(store: &dyn Store, caller: Uuid, draft: TeamDraft) -> ServiceResult<CreatedTeam> {
    let name = required_text("name", &draft.name)?;

    let mut invite_emails: Vec<String> = Vec::with_capacity(draft.invite_emails.len());
    for raw in draft.invite_emails.iter().filter(|e| !e.trim().is_empty()) {
        let email = valid_email("invite_emails", raw)?;
        if !invite_emails.contains(&email) {
            invite_emails.push(email);
        }
    }

    let created = store
        .create_team(NewTeam {
            team: CreateTeam {
                name,
                description: optional_text(draft.description),
                owner_id: caller,
            },
            link_project: draft.project_id,
            invite_emails,
        })
        .await?;

    info!(
        team_id = %created.team.id,
        owner_id = %caller,
        linked_project = created.linked_project,
        invitations = created.invitations.len(),
        "Team created"
    );
    if draft.project_id.is_some() && !created.linked_project {
        debug!(team_id = %created.team.id, "Project link skipped, caller does not own it");
    }

    for invitation in &created.invitations {
        notify_invitee(store, invitation, &created.team.name).await;
    }

    Ok(created)
}

/// Notifies an invitee who already has an account; failures are only logged
async fn notify_invitee(store: &dyn Store, invitation: &TeamInvitation, team_name: &str) {
    let invitee = match store.find_user_by_email(&invitation.email).await {
        Ok(Some(invitee)) => invitee,
        Ok(None) => return,
        Err(e) => {
            warn!(
                invitation_id = %invitation.id,
                error = %e,
                "Failed to look up invitee, skipping notification"
            );
            return;
        }
    };

    notify_best_effort(
        store,
        invitee.id,
        NotificationType::TeamInvitation,
        format!("You have been invited to join the team \"{}\"", team_name),
        Some(invitation.team_id),
    )
    .await;
}

pub async fn list_teams(store: &dyn Store, caller: Uuid) -> ServiceResult<Vec<TeamOverview>> {
    Ok(store.list_teams_for_user(caller).await?)
}

pub async fn get_team(store: &dyn Store, caller: Uuid, team_id: Uuid) -> ServiceResult<TeamDetail> {
    let access = require_team_action(store, caller, team_id, TeamAction::View).await?;
    let members = store.list_team_members(team_id).await?;

    Ok(TeamDetail {
        team: access.team,
        role: access.role,
        members,
    })
}

pub async fn update_team(
    store: &dyn Store,
    caller: Uuid,
    team_id: Uuid,
    update: UpdateTeam,
) -> ServiceResult<Team> {
    let mut team = require_team_action(store, caller, team_id, TeamAction::Update)
        .await?
        .team;

    team.apply(UpdateTeam {
        name: update.name.as_deref().map(|n| required_text("name", n)).transpose()?,
        description: update.description.map(|d| d.trim().to_string()),
    });

    store
        .save_team(&team)
        .await?
        .ok_or_else(|| ServiceError::not_found("team"))
}

pub async fn delete_team(store: &dyn Store, caller: Uuid, team_id: Uuid) -> ServiceResult<()> {
    require_team_action(store, caller, team_id, TeamAction::Delete).await?;

    if !store.delete_team(team_id).await? {
        return Err(ServiceError::not_found("team"));
    }
    info!(team_id = %team_id, deleted_by = %caller, "Team deleted");
    Ok(())
}

pub async fn list_team_members(
    store: &dyn Store,
    caller: Uuid,
    team_id: Uuid,
) -> ServiceResult<Vec<TeamMemberDetail>> {
    require_team_action(store, caller, team_id, TeamAction::View).await?;
    Ok(store.list_team_members(team_id).await?)
}

/// Invites an email address to the team
///
/// The invitee does not need an account yet; if they have one they are also
/// notified.
pub async fn invite_team_member(
    store: &dyn Store,
    caller: Uuid,
    team_id: Uuid,
    email: &str,
    role: TeamRole,
) -> ServiceResult<TeamInvitation> {
    let access = require_team_action(store, caller, team_id, TeamAction::InviteMember).await?;
    let role = assignable(role)?;
    let email = valid_email("email", email)?;

    if let Some(user) = store.find_user_by_email(&email).await? {
        let is_member = user.id == access.team.owner_id
            || store.find_team_member(team_id, user.id).await?.is_some();
        if is_member {
            return Err(ServiceError::Conflict(
                "User is already a member of this team".to_string(),
            ));
        }
    }

    let already_pending = store
        .list_pending_invitations(&email)
        .await?
        .iter()
        .any(|d| d.invitation.team_id == team_id);
    if already_pending {
        return Err(ServiceError::Conflict(
            "An invitation is already pending for this email".to_string(),
        ));
    }

    let invitation = store
        .create_invitation(CreateInvitation {
            team_id,
            email,
            role,
            invited_by: caller,
        })
        .await
        .map_err(|e| {
            if e.is_conflict() {
                ServiceError::Conflict("An invitation is already pending for this email".to_string())
            } else {
                e.into()
            }
        })?;

    info!(
        team_id = %team_id,
        invitation_id = %invitation.id,
        role = role.as_str(),
        "Team invitation created"
    );
    notify_invitee(store, &invitation, &access.team.name).await;

    Ok(invitation)
}

/// Changes a member's role; owner only
pub async fn update_member_role(
    store: &dyn Store,
    caller: Uuid,
    team_id: Uuid,
    user_id: Uuid,
    role: TeamRole,
) -> ServiceResult<TeamMember> {
    let access = require_team_action(store, caller, team_id, TeamAction::ChangeRole).await?;
    let role = assignable(role)?;
    if access.team.owner_id == user_id {
        return Err(ServiceError::PermissionDenied(
            "The team owner's role cannot be changed".to_string(),
        ));
    }

    store
        .update_team_member_role(team_id, user_id, role)
        .await?
        .ok_or_else(|| ServiceError::not_found("member"))
}

/// Removes a member; owner or admin
pub async fn remove_member(
    store: &dyn Store,
    caller: Uuid,
    team_id: Uuid,
    user_id: Uuid,
) -> ServiceResult<()> {
    let access = require_team_action(store, caller, team_id, TeamAction::RemoveMember).await?;
    if access.team.owner_id == user_id {
        return Err(ServiceError::PermissionDenied(
            "The team owner cannot be removed".to_string(),
        ));
    }

    if !store.remove_team_member(team_id, user_id).await? {
        return Err(ServiceError::not_found("member"));
    }
    info!(team_id = %team_id, user_id = %user_id, "Team member removed");
    Ok(())
}

async fn caller_email(store: &dyn Store, caller: Uuid) -> ServiceResult<String> {
    store
        .find_user(caller)
        .await?
        .map(|u| u.email)
        .ok_or_else(|| ServiceError::Unauthorized("Account no longer exists".to_string()))
}

/// Pending invitations addressed to the caller's email
pub async fn list_my_invitations(store: &dyn Store, caller: Uuid) -> ServiceResult<Vec<InvitationDetail>> {
    let email = caller_email(store, caller).await?;
    Ok(store.list_pending_invitations(&email).await?)
}

/// Outcome of answering an already-answered invitation
fn settled(
    invitation: &TeamInvitation,
    response: InvitationResponse,
) -> ServiceResult<Option<TeamInvitation>> {
    match invitation.status {
        InvitationStatus::Pending => Ok(None),
        status if status == response.resulting_status() => Ok(Some(invitation.clone())),
        InvitationStatus::Accepted => Err(ServiceError::Conflict(
            "Invitation was already accepted".to_string(),
        )),
        InvitationStatus::Rejected => Err(ServiceError::Conflict(
            "Invitation was already rejected".to_string(),
        )),
    }
}

/// Accepts or rejects an invitation addressed to the caller
///
/// Repeating the same answer is a no-op; answering a resolved invitation
/// differently is a `Conflict`.
pub async fn respond_to_invitation(
    store: &dyn Store,
    caller: Uuid,
    invitation_id: Uuid,
    response: InvitationResponse,
) -> ServiceResult<TeamInvitation> {
    let email = normalize_email(&caller_email(store, caller).await?);

    let invitation = store
        .find_invitation(invitation_id)
        .await?
        .filter(|i| normalize_email(&i.email) == email)
        .ok_or_else(|| ServiceError::not_found("invitation"))?;

    if let Some(unchanged) = settled(&invitation, response)? {
        return Ok(unchanged);
    }

    match store.resolve_invitation(invitation_id, response, caller).await? {
        Some(resolved) => {
            info!(
                invitation_id = %invitation_id,
                team_id = %resolved.invitation.team_id,
                user_id = %caller,
                status = ?resolved.invitation.status,
                joined = resolved.joined,
                "Invitation answered"
            );
            Ok(resolved.invitation)
        }
        // Answered concurrently between the read and the write.
        None => {
            let current = store
                .find_invitation(invitation_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("invitation"))?;
            settled(&current, response)?.ok_or_else(|| {
                ServiceError::Conflict("Invitation changed while answering".to_string())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::CreateUser;
    use crate::store::{MemoryStore, NotificationStore, UserStore};

    async fn user(store: &MemoryStore, email: &str) -> Uuid {
        store
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "hash".to_string(),
                full_name: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn team(store: &MemoryStore, owner: Uuid) -> Team {
        create_team(
            store,
            owner,
            TeamDraft {
                name: "Eng".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .team
    }

    #[tokio::test]
    async fn test_create_team_dedupes_and_validates_emails() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@x.com").await;

        let created = create_team(
            &store,
            owner,
            TeamDraft {
                name: "Eng".to_string(),
                invite_emails: vec![
                    "a@x.com".to_string(),
                    "A@X.com".to_string(),
                    " ".to_string(),
                ],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(created.invitations.len(), 1);
        assert!(!created.linked_project);

        let err = create_team(
            &store,
            owner,
            TeamDraft {
                name: "Ops".to_string(),
                invite_emails: vec!["nope".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "invite_emails", .. }));
    }

    #[tokio::test]
    async fn test_invite_rules() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@x.com").await;
        let member = user(&store, "member@x.com").await;
        let team = team(&store, owner).await;

        assert!(matches!(
            invite_team_member(&store, owner, team.id, "x@x.com", TeamRole::Owner).await,
            Err(ServiceError::Validation { field: "role", .. })
        ));
        assert!(matches!(
            invite_team_member(&store, owner, team.id, "owner@x.com", TeamRole::Member).await,
            Err(ServiceError::Conflict(_))
        ));

        let invitation = invite_team_member(&store, owner, team.id, "member@x.com", TeamRole::Member)
            .await
            .unwrap();
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert!(matches!(
            invite_team_member(&store, owner, team.id, "member@x.com", TeamRole::Admin).await,
            Err(ServiceError::Conflict(_))
        ));

        let inbox = store.list_notifications(member, 10, false).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationType::TeamInvitation);

        respond_to_invitation(&store, member, invitation.id, InvitationResponse::Accept)
            .await
            .unwrap();
        assert!(matches!(
            invite_team_member(&store, member, team.id, "z@x.com", TeamRole::Member).await,
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_respond_is_idempotent() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@x.com").await;
        let bob = user(&store, "bob@x.com").await;
        let team = team(&store, owner).await;
        let invitation = invite_team_member(&store, owner, team.id, "Bob@X.com", TeamRole::Admin)
            .await
            .unwrap();

        let first = respond_to_invitation(&store, bob, invitation.id, InvitationResponse::Accept)
            .await
            .unwrap();
        assert_eq!(first.status, InvitationStatus::Accepted);
        let again = respond_to_invitation(&store, bob, invitation.id, InvitationResponse::Accept)
            .await
            .unwrap();
        assert_eq!(again.status, InvitationStatus::Accepted);

        let members = list_team_members(&store, bob, team.id).await.unwrap();
        assert_eq!(members.iter().filter(|m| m.user_id == bob).count(), 1);
        assert_eq!(
            members.iter().find(|m| m.user_id == bob).unwrap().role,
            TeamRole::Admin
        );

        assert!(matches!(
            respond_to_invitation(&store, bob, invitation.id, InvitationResponse::Reject).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_respond_requires_matching_email() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@x.com").await;
        let eve = user(&store, "eve@x.com").await;
        let team = team(&store, owner).await;
        let invitation = invite_team_member(&store, owner, team.id, "bob@x.com", TeamRole::Member)
            .await
            .unwrap();

        assert!(matches!(
            respond_to_invitation(&store, eve, invitation.id, InvitationResponse::Accept).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(list_my_invitations(&store, eve).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_member_management() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@x.com").await;
        let admin = user(&store, "admin@x.com").await;
        let carol = user(&store, "carol@x.com").await;
        let team = team(&store, owner).await;

        for (email, id, role) in [("admin@x.com", admin, TeamRole::Admin), ("carol@x.com", carol, TeamRole::Member)] {
            let inv = invite_team_member(&store, owner, team.id, email, role).await.unwrap();
            respond_to_invitation(&store, id, inv.id, InvitationResponse::Accept)
                .await
                .unwrap();
        }

        assert!(matches!(
            update_member_role(&store, admin, team.id, carol, TeamRole::Admin).await,
            Err(ServiceError::PermissionDenied(_))
        ));
        assert!(matches!(
            remove_member(&store, admin, team.id, owner).await,
            Err(ServiceError::PermissionDenied(_))
        ));

        let promoted = update_member_role(&store, owner, team.id, carol, TeamRole::Admin)
            .await
            .unwrap();
        assert_eq!(promoted.role, TeamRole::Admin);

        remove_member(&store, admin, team.id, carol).await.unwrap();
        assert!(matches!(
            get_team(&store, carol, team.id).await,
            Err(ServiceError::NotFound(_))
        ));

        assert!(matches!(
            delete_team(&store, admin, team.id).await,
            Err(ServiceError::PermissionDenied(_))
        ));
        delete_team(&store, owner, team.id).await.unwrap();
        assert!(list_teams(&store, owner).await.unwrap().is_empty());
    }
}
