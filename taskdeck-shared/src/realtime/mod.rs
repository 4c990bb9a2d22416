/// Realtime change notifications
///
/// Database triggers publish row changes on the `entity_changes` channel;
/// [`listener`] relays them into an in-process [`changes::ChangeFeed`], which
/// fans them out to per-board and per-user subscribers.

pub mod changes;
pub mod listener;

pub use changes::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeSignal, ChangeSubscription};
