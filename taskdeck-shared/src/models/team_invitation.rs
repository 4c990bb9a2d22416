/// Team invitation model
///
/// An invitation targets an email address, not an account: the invitee may
/// not have signed up yet. It is resolved by the account whose email matches,
/// ignoring letter case, and moves from `pending` to exactly one terminal
/// status. Invitations are never deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE invitation_status AS ENUM ('pending', 'accepted', 'rejected');
///
/// CREATE TABLE team_invitations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     email TEXT NOT NULL,
///     role team_role NOT NULL DEFAULT 'member',
///     invited_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     status invitation_status NOT NULL DEFAULT 'pending',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     responded_at TIMESTAMPTZ,
///     CONSTRAINT team_invitations_role_check CHECK (role <> 'owner')
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::team_member::TeamRole;
use super::user::normalize_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

/// The invitee's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationResponse {
    Accept,
    Reject,
}

impl InvitationResponse {
    /// Status an invitation ends in after this response
    pub fn resulting_status(&self) -> InvitationStatus {
        match self {
            InvitationResponse::Accept => InvitationStatus::Accepted,
            InvitationResponse::Reject => InvitationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamInvitation {
    pub id: Uuid,
    pub team_id: Uuid,

    /// Invitee address, stored normalized
    pub email: String,

    /// Role granted on acceptance; never `owner`
    pub role: TeamRole,

    pub invited_by: Uuid,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateInvitation {
    pub team_id: Uuid,
    pub email: String,
    pub role: TeamRole,
    pub invited_by: Uuid,
}

/// A pending invitation as shown to its invitee
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InvitationDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invitation: TeamInvitation,

    pub team_name: String,
    pub inviter_name: Option<String>,
    pub inviter_email: String,
}

impl TeamInvitation {
    /// Inserts a pending invitation; the email is normalized
    pub async fn create<'e, E>(executor: E, data: &CreateInvitation) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamInvitation>(
            r#"
            INSERT INTO team_invitations (team_id, email, role, invited_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, team_id, email, role, invited_by, status, created_at, responded_at
            "#,
        )
        .bind(data.team_id)
        .bind(normalize_email(&data.email))
        .bind(data.role)
        .bind(data.invited_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamInvitation>(
            r#"
            SELECT id, team_id, email, role, invited_by, status, created_at, responded_at
            FROM team_invitations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Pending invitations addressed to `email`, newest first
    pub async fn list_pending_for_email<'e, E>(
        executor: E,
        email: &str,
    ) -> Result<Vec<InvitationDetail>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, InvitationDetail>(
            r#"
            SELECT i.id, i.team_id, i.email, i.role, i.invited_by, i.status,
                   i.created_at, i.responded_at,
                   t.name AS team_name, u.full_name AS inviter_name, u.email AS inviter_email
            FROM team_invitations i
            JOIN teams t ON t.id = i.team_id
            JOIN users u ON u.id = i.invited_by
            WHERE lower(i.email) = $1 AND i.status = 'pending'
            ORDER BY i.created_at DESC
            "#,
        )
        .bind(normalize_email(email))
        .fetch_all(executor)
        .await
    }

    /// Moves a pending invitation to `status`
    ///
    /// Returns `None` when the invitation is missing or no longer pending, so
    /// a terminal invitation can never be rewritten.
    pub async fn resolve<'e, E>(
        executor: E,
        id: Uuid,
        status: InvitationStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamInvitation>(
            r#"
            UPDATE team_invitations
            SET status = $2, responded_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING id, team_id, email, role, invited_by, status, created_at, responded_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await
    }
}
