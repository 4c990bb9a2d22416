/// Direct and team conversations.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{required_text, ServiceError, ServiceResult};
use crate::auth::authorization::{require_team_action, resolve_team_role, TeamAction};
use crate::models::conversation::{Conversation, ConversationKind, CreateMessage, Message};
use crate::store::Store;

/// Longest accepted message, in characters
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Messages returned when the caller does not say how many
pub const DEFAULT_MESSAGE_LIMIT: i64 = 50;

/// Most messages returned in one call
pub const MAX_MESSAGE_LIMIT: i64 = 200;

/// A conversation with its latest message
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub latest_message: Option<Message>,
}

impl ConversationSummary {
    fn last_activity(&self) -> chrono::DateTime<chrono::Utc> {
        self.latest_message
            .as_ref()
            .map_or(self.conversation.created_at, |m| m.created_at)
    }
}

/// Conversations the caller can read, most recently active first
pub async fn list_conversations(
    store: &dyn Store,
    caller: Uuid,
) -> ServiceResult<Vec<ConversationSummary>> {
    let conversations = store.list_conversations_for_user(caller).await?;
    let ids: Vec<Uuid> = conversations.iter().map(|c| c.id).collect();
    let mut latest: HashMap<Uuid, Message> = store
        .latest_messages(&ids)
        .await?
        .into_iter()
        .map(|m| (m.conversation_id, m))
        .collect();

    let mut summaries: Vec<ConversationSummary> = conversations
        .into_iter()
        .map(|conversation| ConversationSummary {
            latest_message: latest.remove(&conversation.id),
            conversation,
        })
        .collect();
    summaries.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
    Ok(summaries)
}

/// Returns the direct conversation between the caller and `other`, creating
/// it on first contact
pub async fn start_direct_conversation(
    store: &dyn Store,
    caller: Uuid,
    other: Uuid,
) -> ServiceResult<Conversation> {
    if caller == other {
        return Err(ServiceError::validation(
            "user_id",
            "You cannot start a conversation with yourself",
        ));
    }
    if store.find_user(other).await?.is_none() {
        return Err(ServiceError::not_found("user"));
    }

    if let Some(existing) = store.find_direct_conversation(caller, other).await? {
        debug!(conversation_id = %existing.id, "Reusing direct conversation");
        return Ok(existing);
    }

    match store.create_direct_conversation(caller, other).await {
        Ok(conversation) => {
            info!(conversation_id = %conversation.id, "Direct conversation started");
            Ok(conversation)
        }
        // Lost a race with the other participant
        Err(e) if e.is_conflict() => store
            .find_direct_conversation(caller, other)
            .await?
            .ok_or_else(|| ServiceError::Store(e)),
        Err(e) => Err(e.into()),
    }
}

/// Opens a named conversation visible to every team member
pub async fn create_team_conversation(
    store: &dyn Store,
    caller: Uuid,
    team_id: Uuid,
    name: &str,
) -> ServiceResult<Conversation> {
    let name = required_text("name", name)?;
    require_team_action(store, caller, team_id, TeamAction::CreateConversation).await?;

    let conversation = store.create_team_conversation(team_id, &name).await?;
    info!(conversation_id = %conversation.id, team_id = %team_id, "Team conversation created");
    Ok(conversation)
}

/// Loads a conversation the caller may read; anything else is "not found"
async fn readable(store: &dyn Store, caller: Uuid, conversation_id: Uuid) -> ServiceResult<Conversation> {
    let not_found = || ServiceError::not_found("conversation");
    let conversation = store
        .find_conversation(conversation_id)
        .await?
        .ok_or_else(not_found)?;

    let allowed = match (conversation.kind, conversation.team_id) {
        (ConversationKind::Team, Some(team_id)) => match store.find_team(team_id).await? {
            Some(team) => resolve_team_role(store, caller, &team).await?.is_some(),
            None => false,
        },
        _ => store.is_participant(conversation_id, caller).await?,
    };

    if !allowed {
        return Err(not_found());
    }
    Ok(conversation)
}

/// The most recent `limit` messages, oldest first
pub async fn list_messages(
    store: &dyn Store,
    caller: Uuid,
    conversation_id: Uuid,
    limit: Option<i64>,
) -> ServiceResult<Vec<Message>> {
    readable(store, caller, conversation_id).await?;
    let limit = limit
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .clamp(1, MAX_MESSAGE_LIMIT);
    Ok(store.list_messages(conversation_id, limit).await?)
}

pub async fn send_message(
    store: &dyn Store,
    caller: Uuid,
    conversation_id: Uuid,
    content: &str,
) -> ServiceResult<Message> {
    let content = required_text("content", content)?;
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ServiceError::validation(
            "content",
            format!("Message must be at most {} characters", MAX_MESSAGE_LENGTH),
        ));
    }
    readable(store, caller, conversation_id).await?;

    Ok(store
        .create_message(CreateMessage {
            conversation_id,
            sender_id: caller,
            content,
        })
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{team::CreateTeam, user::CreateUser};
    use crate::store::{MemoryStore, NewTeam, TeamStore, UserStore};

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

    #[tokio::test]
    async fn test_direct_conversation_is_reused() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@x.com").await;
        let bob = user(&store, "bob@x.com").await;

        let first = start_direct_conversation(&store, ada, bob).await.unwrap();
        let second = start_direct_conversation(&store, bob, ada).await.unwrap();
        assert_eq!(first.id, second.id);

        assert!(matches!(
            start_direct_conversation(&store, ada, ada).await,
            Err(ServiceError::Validation { .. })
        ));
        assert!(matches!(
            start_direct_conversation(&store, ada, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_share_one_conversation() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@x.com").await;
        let bob = user(&store, "bob@x.com").await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let (caller, other) = if i % 2 == 0 { (ada, bob) } else { (bob, ada) };
                tokio::spawn(async move { start_direct_conversation(&store, caller, other).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(list_conversations(&store, ada).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_outsiders_see_nothing() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@x.com").await;
        let bob = user(&store, "bob@x.com").await;
        let eve = user(&store, "eve@x.com").await;
        let conversation = start_direct_conversation(&store, ada, bob).await.unwrap();

        send_message(&store, ada, conversation.id, "hello").await.unwrap();
        assert!(matches!(
            list_messages(&store, eve, conversation.id, None).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            send_message(&store, eve, conversation.id, "hi").await,
            Err(ServiceError::NotFound(_))
        ));

        let too_long = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(
            send_message(&store, ada, conversation.id, &too_long).await,
            Err(ServiceError::Validation { field: "content", .. })
        ));
        assert!(matches!(
            send_message(&store, ada, conversation.id, "  ").await,
            Err(ServiceError::Validation { field: "content", .. })
        ));
    }

    #[tokio::test]
    async fn test_listing_orders_by_activity() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@x.com").await;
        let bob = user(&store, "bob@x.com").await;
        let carol = user(&store, "carol@x.com").await;

        let team = store
            .create_team(NewTeam {
                team: CreateTeam {
                    name: "Eng".to_string(),
                    description: None,
                    owner_id: ada,
                },
                link_project: None,
                invite_emails: Vec::new(),
            })
            .await
            .unwrap()
            .team;

        let with_bob = start_direct_conversation(&store, ada, bob).await.unwrap();
        let with_carol = start_direct_conversation(&store, ada, carol).await.unwrap();
        let general = create_team_conversation(&store, ada, team.id, "general")
            .await
            .unwrap();
        send_message(&store, bob, with_bob.id, "ping").await.unwrap();

        let listed = list_conversations(&store, ada).await.unwrap();
        let order: Vec<Uuid> = listed.iter().map(|s| s.conversation.id).collect();
        assert_eq!(order, vec![with_bob.id, general.id, with_carol.id]);
        assert_eq!(listed[0].latest_message.as_ref().unwrap().content, "ping");

        assert!(matches!(
            create_team_conversation(&store, bob, team.id, "random").await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(list_conversations(&store, bob).await.unwrap().len(), 1);
    }
}
