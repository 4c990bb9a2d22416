/// Conversations and messages
///
/// A direct conversation has exactly two rows in
/// `conversation_participants`. A team conversation has none: every member of
/// its team can read and post.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "conversation_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Team,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub team_id: Option<Uuid>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
}

impl Conversation {
    pub async fn create<'e, E>(
        executor: E,
        kind: ConversationKind,
        team_id: Option<Uuid>,
        name: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (kind, team_id, name)
            VALUES ($1, $2, $3)
            RETURNING id, kind, team_id, name, created_at
            "#,
        )
        .bind(kind)
        .bind(team_id)
        .bind(name)
        .fetch_one(executor)
        .await
    }

    pub async fn add_participant<'e, E>(
        executor: E,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Conversation>(
            "SELECT id, kind, team_id, name, created_at FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Inserts a direct conversation keyed by its ordered participant pair
    ///
    /// Fails with a unique violation on `conversations_direct_pair_key` when
    /// the pair already has one.
    pub async fn create_direct<'e, E>(executor: E, a: Uuid, b: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (kind, direct_low, direct_high)
            VALUES ('direct', LEAST($1::uuid, $2::uuid), GREATEST($1::uuid, $2::uuid))
            RETURNING id, kind, team_id, name, created_at
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(executor)
        .await
    }

    /// The direct conversation between two users, if one exists
    pub async fn find_direct<'e, E>(
        executor: E,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, kind, team_id, name, created_at
            FROM conversations
            WHERE kind = 'direct'
              AND direct_low = LEAST($1::uuid, $2::uuid)
              AND direct_high = GREATEST($1::uuid, $2::uuid)
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(executor)
        .await
    }

    pub async fn is_participant<'e, E>(
        executor: E,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM conversation_participants
                WHERE conversation_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Direct conversations the user takes part in plus conversations of
    /// teams the user belongs to or owns
    pub async fn list_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.id, c.kind, c.team_id, c.name, c.created_at
            FROM conversations c
            WHERE (c.kind = 'direct' AND EXISTS (
                      SELECT 1 FROM conversation_participants p
                      WHERE p.conversation_id = c.id AND p.user_id = $1))
               OR (c.kind = 'team' AND (
                      EXISTS (SELECT 1 FROM team_members tm
                              WHERE tm.team_id = c.team_id AND tm.user_id = $1)
                      OR EXISTS (SELECT 1 FROM teams t
                                 WHERE t.id = c.team_id AND t.owner_id = $1)))
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }
}

impl Message {
    pub async fn create<'e, E>(executor: E, data: &CreateMessage) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, conversation_id, sender_id, content, created_at
            "#,
        )
        .bind(data.conversation_id)
        .bind(data.sender_id)
        .bind(&data.content)
        .fetch_one(executor)
        .await
    }

    /// The newest `limit` messages of a conversation, returned oldest first
    pub async fn list_recent<'e, E>(
        executor: E,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, content, created_at
            FROM (
                SELECT id, conversation_id, sender_id, content, created_at
                FROM messages
                WHERE conversation_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    /// Latest message of each listed conversation
    pub async fn latest_per_conversation<'e, E>(
        executor: E,
        conversation_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT DISTINCT ON (conversation_id) id, conversation_id, sender_id, content, created_at
            FROM messages
            WHERE conversation_id = ANY($1)
            ORDER BY conversation_id, created_at DESC
            "#,
        )
        .bind(conversation_ids)
        .fetch_all(executor)
        .await
    }
}
