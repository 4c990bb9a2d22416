/// Middleware modules for the API server
///
/// - `auth`: bearer token validation, inserts the caller's `AuthContext`
/// - `security`: security response headers

pub mod auth;
pub mod security;
