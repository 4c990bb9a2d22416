/// Notification dispatch and the recipient's inbox.

use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::models::notification::{CreateNotification, Notification, NotificationType};
use crate::store::Store;

/// Page size when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Inbox listing parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
    pub unread_only: bool,
}

impl NotificationQuery {
    /// Effective limit, clamped to `1..=MAX_PAGE_SIZE`
    pub fn page_size(&self, default_size: i64) -> i64 {
        self.limit.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE)
    }
}

/// Appends a notification for `user_id`; duplicates are fine
pub async fn notify(
    store: &dyn Store,
    user_id: Uuid,
    kind: NotificationType,
    message: impl Into<String>,
    related_id: Option<Uuid>,
) -> ServiceResult<Notification> {
    let notification = store
        .create_notification(CreateNotification {
            user_id,
            kind,
            message: message.into(),
            related_id,
        })
        .await?;

    debug!(
        notification_id = %notification.id,
        user_id = %user_id,
        kind = ?kind,
        "Notification created"
    );
    Ok(notification)
}

/// Like [`notify`], but a failure is only logged
///
/// Returns whether the notification was written.
pub async fn notify_best_effort(
    store: &dyn Store,
    user_id: Uuid,
    kind: NotificationType,
    message: impl Into<String>,
    related_id: Option<Uuid>,
) -> bool {
    match notify(store, user_id, kind, message, related_id).await {
        Ok(_) => true,
        Err(e) => {
            warn!(user_id = %user_id, kind = ?kind, error = %e, "Failed to send notification");
            false
        }
    }
}

/// The caller's notifications, newest first
pub async fn list(
    store: &dyn Store,
    user_id: Uuid,
    query: NotificationQuery,
    default_size: i64,
) -> ServiceResult<Vec<Notification>> {
    Ok(store
        .list_notifications(user_id, query.page_size(default_size), query.unread_only)
        .await?)
}

pub async fn unread_count(store: &dyn Store, user_id: Uuid) -> ServiceResult<i64> {
    Ok(store.count_unread(user_id).await?)
}

async fn owned(store: &dyn Store, notification_id: Uuid, user_id: Uuid) -> ServiceResult<Notification> {
    let notification = store
        .find_notification(notification_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("notification"))?;

    if notification.user_id != user_id {
        return Err(ServiceError::PermissionDenied(
            "This notification belongs to someone else".to_string(),
        ));
    }
    Ok(notification)
}

/// Marks one notification read
///
/// # Errors
///
/// `PermissionDenied` if the caller is not the recipient.
pub async fn mark_read(
    store: &dyn Store,
    notification_id: Uuid,
    user_id: Uuid,
) -> ServiceResult<Notification> {
    owned(store, notification_id, user_id).await?;

    store
        .mark_notification_read(notification_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("notification"))
}

/// Marks every unread notification of the caller read; returns how many
pub async fn mark_all_read(store: &dyn Store, user_id: Uuid) -> ServiceResult<u64> {
    Ok(store.mark_all_read(user_id).await?)
}

/// Deletes one notification, with the same ownership rule as [`mark_read`]
pub async fn delete(store: &dyn Store, notification_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
    owned(store, notification_id, user_id).await?;

    if !store.delete_notification(notification_id).await? {
        return Err(ServiceError::not_found("notification"));
    }
    Ok(())
}
