#![allow(dead_code)]

/// Shared fixtures for the service-level integration tests
///
/// Everything runs against `MemoryStore`, so no database is needed.

use taskdeck_shared::models::{project::Project, user::CreateUser};
use taskdeck_shared::services::projects;
use taskdeck_shared::store::{MemoryStore, UserStore};
use uuid::Uuid;

pub mod faulty_store;

pub async fn create_user(store: &MemoryStore, email: &str) -> Uuid {
    store
        .create_user(CreateUser {
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            full_name: Some(email.split('@').next().unwrap_or(email).to_string()),
        })
        .await
        .expect("Failed to create user")
        .id
}

pub async fn create_project(store: &MemoryStore, owner: Uuid, name: &str) -> Project {
    projects::create_project(store, owner, name, None)
        .await
        .expect("Failed to create project")
}
