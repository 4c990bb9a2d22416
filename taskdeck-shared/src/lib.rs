//! # TaskDeck Shared Library
//!
//! Domain types, persistence and business rules shared by the TaskDeck
//! binaries.
//!
//! ## Module Organization
//!
//! - `models`: database rows and their queries
//! - `store`: the entity store port with Postgres and in-memory adapters
//! - `auth`: passwords, tokens and role resolution
//! - `services`: the operations exposed to users
//! - `realtime`: change notifications for live boards and inboxes
//! - `db`: connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod realtime;
pub mod services;
pub mod store;

/// Current version of the TaskDeck shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
