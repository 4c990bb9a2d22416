/// Postgres `LISTEN` relay feeding the [`ChangeFeed`].

use std::time::Duration;

use sqlx::{postgres::PgListener, PgPool};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::changes::{ChangeEvent, ChangeFeed, CHANNEL};

/// Pause before retrying after the listener failed to reconnect
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Publishes one raw trigger payload; returns whether it parsed
pub fn relay_payload(feed: &ChangeFeed, payload: &str) -> bool {
    match ChangeEvent::parse(payload) {
        Ok(event) => {
            feed.publish(event);
            true
        }
        Err(e) => {
            warn!(error = %e, payload, "Ignoring malformed change payload");
            false
        }
    }
}

/// Connects and subscribes to the change channel, retrying until it succeeds
///
/// Returns `None` if `shutdown` is cancelled first.
async fn connect_listener(pool: &PgPool, shutdown: &CancellationToken) -> Option<PgListener> {
    loop {
        let attempt = async {
            let mut listener = PgListener::connect_with(pool).await?;
            listener.listen(CHANNEL).await?;
            Ok::<_, sqlx::Error>(listener)
        };

        tokio::select! {
            _ = shutdown.cancelled() => return None,
            connected = attempt => match connected {
                Ok(listener) => return Some(listener),
                Err(e) => {
                    error!(error = %e, "Change relay failed to listen, retrying");
                }
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return None,
            _ = tokio::time::sleep(RETRY_DELAY) => {}
        }
    }
}

/// Listens on the change channel until `shutdown` is cancelled
///
/// When the connection drops, notifications sent meanwhile are lost, so every
/// subscriber is told to resync.
pub async fn run_change_relay(pool: PgPool, feed: ChangeFeed, shutdown: CancellationToken) {
    let Some(mut listener) = connect_listener(&pool, &shutdown).await else {
        info!("Change relay stopped before connecting");
        return;
    };
    info!(channel = CHANNEL, "Change relay listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Change relay stopping");
                return;
            }
            received = listener.try_recv() => match received {
                Ok(Some(notification)) => {
                    relay_payload(&feed, notification.payload());
                }
                Ok(None) => {
                    warn!("Change relay connection lost, reconnecting");
                    feed.resync_all();
                }
                Err(e) => {
                    warn!(error = %e, "Change relay receive failed");
                    feed.resync_all();
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
}

/// Runs [`run_change_relay`] on its own task
pub fn spawn_change_relay(
    pool: PgPool,
    feed: ChangeFeed,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_change_relay(pool, feed, shutdown))
}
