#![allow(dead_code)]

/// Common test utilities for API tests
///
/// Builds the full router over an in-memory store wired to a change feed, and
/// offers request helpers that return status plus parsed JSON.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use taskdeck_api::{
    app::{build_router, AppState},
    config::{ApiConfig, Config, DatabaseConfig, JwtConfig, NotificationConfig, RealtimeConfig},
};
use taskdeck_shared::{
    auth::jwt::{create_token, Claims, TokenType},
    models::user::CreateUser,
    realtime::ChangeFeed,
    store::{MemoryStore, UserStore},
};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
        notifications: NotificationConfig { page_size: 20 },
        realtime: RealtimeConfig {
            change_feed_capacity: 64,
        },
    }
}

/// A signed-in test user
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

/// Test context containing the router and its backing store
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub feed: ChangeFeed,
}

impl TestContext {
    pub fn new() -> Self {
        let feed = ChangeFeed::new(64);
        let store = Arc::new(MemoryStore::with_change_feed(feed.clone()));
        let state = AppState::new(store.clone(), feed.clone(), test_config());

        Self {
            app: build_router(state),
            store,
            feed,
        }
    }

    /// Seeds a user straight into the store and signs a token for them
    ///
    /// Skips password hashing; use `/v1/auth/register` to test that path.
    pub async fn user(&self, email: &str) -> TestUser {
        let user = self
            .store
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "not-a-real-hash".to_string(),
                full_name: Some(email.split('@').next().unwrap_or(email).to_string()),
            })
            .await
            .unwrap();

        let claims = Claims::new(user.id, user.email.clone(), TokenType::Access);
        TestUser {
            id: user.id,
            email: user.email,
            token: create_token(&claims, JWT_SECRET).unwrap(),
        }
    }

    /// Sends a request and returns the raw response
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Sends a request and parses the JSON body (`Null` when empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send_raw(method, uri, token, body).await;
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("non-JSON body: {}", String::from_utf8_lossy(&bytes))
            })
        };

        (status, json)
    }

    pub async fn get(&self, user: &TestUser, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(&user.token), None).await
    }

    pub async fn post(&self, user: &TestUser, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(&user.token), Some(body)).await
    }

    pub async fn put(&self, user: &TestUser, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(&user.token), Some(body)).await
    }

    pub async fn patch(&self, user: &TestUser, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete(&self, user: &TestUser, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(&user.token), None).await
    }
}

/// Id field of a JSON object
pub fn id_of(value: &Value) -> String {
    value["id"]
        .as_str()
        .unwrap_or_else(|| panic!("no id in {}", value))
        .to_string()
}
