//! # TaskDeck API Server
//!
//! Serves the TaskDeck HTTP API on top of PostgreSQL.
//!
//! Startup order: configuration, database pool, migrations, realtime change
//! relay, HTTP listener. Ctrl-C stops accepting connections, lets in-flight
//! requests finish, then stops the relay and closes the pool.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/taskdeck JWT_SECRET=... cargo run -p taskdeck-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs.

use std::sync::Arc;

use taskdeck_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskdeck_shared::{
    db::{migrations::run_migrations, pool},
    realtime::{listener::spawn_change_relay, ChangeFeed},
    store::PgStore,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskdeck_api=debug,taskdeck_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("TaskDeck API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db = pool::create_pool(pool::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..pool::DatabaseConfig::default()
    })
    .await?;
    run_migrations(&db).await?;

    let feed = ChangeFeed::new(config.realtime.change_feed_capacity);
    let bind_address = config.bind_address();
    let state = AppState::new(Arc::new(PgStore::new(db.clone())), feed.clone(), config);
    let shutdown = state.shutdown.clone();

    let relay = spawn_change_relay(db.clone(), feed, shutdown.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = relay.await {
        tracing::warn!(error = %e, "Change relay task ended abnormally");
    }
    pool::close_pool(&db).await;

    tracing::info!("Server stopped");
    Ok(())
}
