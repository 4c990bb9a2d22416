/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdeck_api::{app::{build_router, AppState}, config::Config};
/// use taskdeck_shared::{realtime::ChangeFeed, store::MemoryStore};
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let feed = ChangeFeed::new(config.realtime.change_feed_capacity);
/// let store = MemoryStore::with_change_feed(feed.clone());
/// let app = build_router(AppState::new(Arc::new(store), feed, config));
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::{auth::require_auth, security::SecurityHeadersLayer}};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use taskdeck_shared::{realtime::ChangeFeed, store::Store};
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Persistence port (Postgres in production, in-memory in tests)
    pub store: Arc<dyn Store>,

    /// Realtime change fan-out for SSE subscribers
    pub feed: ChangeFeed,

    /// Application configuration
    pub config: Arc<Config>,

    /// Cancelled on shutdown; ends long-lived SSE streams
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, feed: ChangeFeed, config: Config) -> Self {
        Self {
            store,
            feed,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1/
///     ├── /auth/                       register, login, refresh (public); GET /me
///     ├── /profile                     GET, PATCH
///     ├── GET /dashboard
///     ├── /projects/                   GET, POST
///     │   └── /:id                     GET, PATCH, DELETE
///     │       ├── /members             GET, POST; /:user_id PATCH, DELETE
///     │       ├── GET /tasks
///     │       ├── GET /report
///     │       └── GET /board/events    (SSE)
///     ├── /tasks/                      POST; /:id GET, PATCH, DELETE; PUT /:id/status
///     ├── /teams/                      GET, POST
///     │   └── /:id                     GET, PATCH, DELETE
///     │       ├── GET /members; /members/:user_id PATCH, DELETE
///     │       ├── POST /invitations
///     │       └── POST /conversations
///     ├── /invitations/                GET; POST /:id/respond
///     ├── /notifications/              GET; GET /unread-count; POST /read-all;
///     │                                POST /:id/read; DELETE /:id; GET /events (SSE)
///     └── /conversations/              GET, POST; /:id/messages GET, POST
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Compression (skips `text/event-stream`)
/// 4. Logging (tower-http TraceLayer)
/// 5. Authentication (everything but `/health` and the public auth routes)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/:id/members",
            get(routes::projects::list_members).post(routes::projects::add_member),
        )
        .route(
            "/:id/members/:user_id",
            axum::routing::patch(routes::projects::update_member_role)
                .delete(routes::projects::remove_member),
        )
        .route("/:id/tasks", get(routes::tasks::list_project_tasks))
        .route("/:id/report", get(routes::tasks::project_report))
        .route("/:id/board/events", get(routes::events::board_events));

    let task_routes = Router::new()
        .route("/", post(routes::tasks::create_task))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/status", put(routes::tasks::update_task_status));

    let team_routes = Router::new()
        .route(
            "/",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route(
            "/:id",
            get(routes::teams::get_team)
                .patch(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route("/:id/members", get(routes::teams::list_members))
        .route(
            "/:id/members/:user_id",
            axum::routing::patch(routes::teams::update_member_role)
                .delete(routes::teams::remove_member),
        )
        .route("/:id/invitations", post(routes::teams::invite_member))
        .route(
            "/:id/conversations",
            post(routes::conversations::create_team_conversation),
        );

    let invitation_routes = Router::new()
        .route("/", get(routes::teams::list_my_invitations))
        .route("/:id/respond", post(routes::teams::respond_to_invitation));

    let notification_routes = Router::new()
        .route("/", get(routes::notifications::list_notifications))
        .route("/unread-count", get(routes::notifications::unread_count))
        .route("/read-all", post(routes::notifications::mark_all_read))
        .route("/events", get(routes::events::notification_events))
        .route("/:id", axum::routing::delete(routes::notifications::delete_notification))
        .route("/:id/read", post(routes::notifications::mark_read));

    let conversation_routes = Router::new()
        .route(
            "/",
            get(routes::conversations::list_conversations)
                .post(routes::conversations::start_conversation),
        )
        .route(
            "/:id/messages",
            get(routes::conversations::list_messages).post(routes::conversations::send_message),
        );

    // Everything here requires a valid access token
    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route(
            "/profile",
            get(routes::profile::get_profile).patch(routes::profile::update_profile),
        )
        .route("/dashboard", get(routes::dashboard::get_dashboard))
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .nest("/teams", team_routes)
        .nest("/invitations", invitation_routes)
        .nest("/notifications", notification_routes)
        .nest("/conversations", conversation_routes)
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    let v1_routes = Router::new()
        .nest("/auth", public_auth_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
