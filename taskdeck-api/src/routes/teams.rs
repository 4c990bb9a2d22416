/// Team and invitation endpoints
///
/// ```text
/// GET    /v1/teams                          teams the caller belongs to
/// POST   /v1/teams                          {name, description?, project_id?, invite_emails?} -> 201
/// GET    /v1/teams/:id                      team, caller's role, members
/// PATCH  /v1/teams/:id                      (owner)
/// DELETE /v1/teams/:id                      (owner) -> 204
/// GET    /v1/teams/:id/members
/// POST   /v1/teams/:id/invitations          {email, role?} (owner/admin) -> 201
/// PATCH  /v1/teams/:id/members/:user_id     {role} (owner)
/// DELETE /v1/teams/:id/members/:user_id     (owner/admin) -> 204
/// GET    /v1/invitations                    pending invitations for the caller's email
/// POST   /v1/invitations/:id/respond        {response: "accept" | "reject"}
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
        team::{Team, TeamOverview, UpdateTeam},
        team_invitation::{InvitationDetail, InvitationResponse, TeamInvitation},
        team_member::{TeamMember, TeamMemberDetail, TeamRole},
    },
    services::teams::{self, TeamDetail, TeamDraft},
    store::CreatedTeam,
};
use uuid::Uuid;
use validator::Validate;

use crate::{app::AppState, error::ApiResult, routes::detached};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,

    /// Linked only if the caller owns it
    pub project_id: Option<Uuid>,

    #[serde(default)]
    #[validate(length(max = 50, message = "At most 50 invitations at once"))]
    pub invite_emails: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default = "default_team_role")]
    pub role: TeamRole,
}

fn default_team_role() -> TeamRole {
    TeamRole::Member
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: TeamRole,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub response: InvitationResponse,
}

pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TeamOverview>>> {
    Ok(Json(teams::list_teams(state.store.as_ref(), auth.user_id).await?))
}

/// Creates a team, links the project and sends invitations in one step
///
/// `linked_project` in the response is `false` when the project was not the
/// caller's to link.
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<CreatedTeam>)> {
    req.validate()?;

    let draft = TeamDraft {
        name: req.name,
        description: req.description,
        project_id: req.project_id,
        invite_emails: req.invite_emails,
    };

    let store = state.store.clone();
    let created = detached(async move { teams::create_team(store.as_ref(), auth.user_id, draft).await })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<TeamDetail>> {
    Ok(Json(teams::get_team(state.store.as_ref(), auth.user_id, team_id).await?))
}

pub async fn update_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    Json(req): Json<UpdateTeamRequest>,
) -> ApiResult<Json<Team>> {
    req.validate()?;

    let store = state.store.clone();
    let update = UpdateTeam {
        name: req.name,
        description: req.description,
    };
    let team = detached(async move {
        teams::update_team(store.as_ref(), auth.user_id, team_id, update).await
    })
    .await?;

    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let store = state.store.clone();
    detached(async move { teams::delete_team(store.as_ref(), auth.user_id, team_id).await }).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TeamMemberDetail>>> {
    Ok(Json(
        teams::list_team_members(state.store.as_ref(), auth.user_id, team_id).await?,
    ))
}

pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    Json(req): Json<InviteMemberRequest>,
) -> ApiResult<(StatusCode, Json<TeamInvitation>)> {
    req.validate()?;

    let store = state.store.clone();
    let invitation = detached(async move {
        teams::invite_team_member(store.as_ref(), auth.user_id, team_id, &req.email, req.role).await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(invitation)))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<TeamMember>> {
    let store = state.store.clone();
    let member = detached(async move {
        teams::update_member_role(store.as_ref(), auth.user_id, team_id, user_id, req.role).await
    })
    .await?;

    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let store = state.store.clone();
    detached(async move {
        teams::remove_member(store.as_ref(), auth.user_id, team_id, user_id).await
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_my_invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<InvitationDetail>>> {
    Ok(Json(
        teams::list_my_invitations(state.store.as_ref(), auth.user_id).await?,
    ))
}

/// Accepts or rejects an invitation addressed to the caller's email
///
/// Repeating the same answer returns the settled invitation; a different
/// answer to a settled invitation is a conflict.
pub async fn respond_to_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(invitation_id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> ApiResult<Json<TeamInvitation>> {
    let store = state.store.clone();
    let invitation = detached(async move {
        teams::respond_to_invitation(store.as_ref(), auth.user_id, invitation_id, req.response).await
    })
    .await?;

    Ok(Json(invitation))
}
