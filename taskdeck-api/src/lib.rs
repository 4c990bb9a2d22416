//! # TaskDeck API Server Library
//!
//! HTTP surface over the TaskDeck services: projects, tasks, teams,
//! notifications and messaging, plus SSE change feeds.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: authentication and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
