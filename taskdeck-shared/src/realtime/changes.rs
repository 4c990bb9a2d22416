/// In-process change feed.
///
/// Every signal means "something you are looking at changed, re-fetch it".
/// Delivery is at-most-once: a subscriber that falls more than the channel
/// capacity behind loses the skipped events and receives a single
/// [`ChangeSignal::Resync`] instead.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use tracing::debug;
use uuid::Uuid;

use crate::models::{notification::Notification, task::Task};

/// Postgres `NOTIFY` channel the change triggers publish on
pub const CHANNEL: &str = "entity_changes";

/// Default broadcast buffer
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTable {
    Tasks,
    Notifications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One changed row, as published by the `notify_entity_change` trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub id: Uuid,

    /// Set for task changes
    pub project_id: Option<Uuid>,

    /// Set for notification changes (the recipient)
    pub user_id: Option<Uuid>,
}

impl ChangeEvent {
    pub fn task(op: ChangeOp, task: &Task) -> Self {
        Self {
            table: ChangeTable::Tasks,
            op,
            id: task.id,
            project_id: Some(task.project_id),
            user_id: None,
        }
    }

    pub fn notification(op: ChangeOp, notification: &Notification) -> Self {
        Self {
            table: ChangeTable::Notifications,
            op,
            id: notification.id,
            project_id: None,
            user_id: Some(notification.user_id),
        }
    }

    /// Parses a trigger payload
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// What a subscriber is watching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    /// Task changes on one project board
    Project(Uuid),

    /// One user's notifications
    User(Uuid),
}

impl ChangeFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            ChangeFilter::Project(id) => {
                event.table == ChangeTable::Tasks && event.project_id == Some(*id)
            }
            ChangeFilter::User(id) => {
                event.table == ChangeTable::Notifications && event.user_id == Some(*id)
            }
        }
    }
}

/// What subscribers receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeSignal {
    Changed(ChangeEvent),

    /// Events may have been missed; re-fetch everything
    Resync,
}

/// Fan-out point between change sources and subscribers
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeSignal>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event; returns how many subscribers were reached
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(ChangeSignal::Changed(event)).unwrap_or(0)
    }

    /// Tells every subscriber to re-fetch, e.g. after the source reconnected
    pub fn resync_all(&self) -> usize {
        self.sender.send(ChangeSignal::Resync).unwrap_or(0)
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A filtered view of the feed
#[derive(Debug)]
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ChangeSignal>,
    filter: ChangeFilter,
}

impl ChangeSubscription {
    pub fn filter(&self) -> ChangeFilter {
        self.filter
    }

    /// Waits for the next signal relevant to this subscription
    ///
    /// Returns `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeSignal> {
        loop {
            match self.receiver.recv().await {
                Ok(ChangeSignal::Changed(event)) if self.filter.matches(&event) => {
                    return Some(ChangeSignal::Changed(event))
                }
                Ok(ChangeSignal::Changed(_)) => continue,
                Ok(ChangeSignal::Resync) => return Some(ChangeSignal::Resync),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Change subscriber lagged");
                    return Some(ChangeSignal::Resync);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Converts the subscription into a stream of relevant signals
    pub fn into_stream(self) -> impl Stream<Item = ChangeSignal> + Send + 'static {
        let filter = self.filter;
        BroadcastStream::new(self.receiver).filter_map(move |item| match item {
            Ok(ChangeSignal::Changed(event)) => {
                filter.matches(&event).then_some(ChangeSignal::Changed(event))
            }
            Ok(ChangeSignal::Resync) => Some(ChangeSignal::Resync),
            Err(BroadcastStreamRecvError::Lagged(_)) => Some(ChangeSignal::Resync),
        })
    }
}
