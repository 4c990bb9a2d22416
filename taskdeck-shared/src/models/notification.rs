/// Notification model and database operations
///
/// Notifications are append-only messages to one recipient. Duplicates are
/// acceptable; the only mutation is flipping `read`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE notification_type AS ENUM ('task_completed', 'team_invitation', 'project_invitation');
///
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     type notification_type NOT NULL,
///     message TEXT NOT NULL,
///     related_id UUID,
///     read BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskCompleted,
    TeamInvitation,
    ProjectInvitation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,

    /// Recipient
    pub user_id: Uuid,

    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,

    pub message: String,

    /// Entity the notification is about (task, team or project id)
    pub related_id: Option<Uuid>,

    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub kind: NotificationType,
    pub message: String,
    pub related_id: Option<Uuid>,
}

impl Notification {
    pub async fn create<'e, E>(executor: E, data: &CreateNotification) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, type, message, related_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, type, message, related_id, read, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.kind)
        .bind(&data.message)
        .bind(data.related_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, type, message, related_id, read, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Most recent first, at most `limit` rows
    pub async fn list_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
        limit: i64,
        unread_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, type, message, related_id, read, created_at
            FROM notifications
            WHERE user_id = $1 AND (NOT $3 OR NOT read)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(unread_only)
        .fetch_all(executor)
        .await
    }

    pub async fn count_unread<'e, E>(executor: E, user_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .fetch_one(executor)
            .await
    }

    pub async fn mark_read<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE id = $1
            RETURNING id, user_id, type, message, related_id, read, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Marks every unread notification of the user; returns how many changed
    pub async fn mark_all_read<'e, E>(executor: E, user_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
