/// Service error taxonomy.

use thiserror::Error;
use validator::ValidateEmail;

use crate::auth::authorization::AuthzError;
use crate::models::user::normalize_email;
use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by service operations
///
/// The first five variants are the caller-facing taxonomy; `Store` carries
/// infrastructure failures that the caller cannot fix.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Failure unrelated to the request, such as password hashing
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        ServiceError::NotFound(what.to_string())
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotFound(what) => ServiceError::not_found(what),
            AuthzError::Forbidden { action } => {
                ServiceError::PermissionDenied(format!("You are not allowed to {}", action))
            }
            AuthzError::Store(e) => ServiceError::Store(e),
        }
    }
}

/// Trims `value` and rejects it when blank
pub(crate) fn required_text(field: &'static str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(field, format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Trims optional text, mapping blank to `None`
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Normalizes an email and rejects malformed ones
pub(crate) fn valid_email(field: &'static str, email: &str) -> ServiceResult<String> {
    let email = normalize_email(email);
    if !email.validate_email() {
        return Err(ServiceError::validation(field, "Invalid email format"));
    }
    Ok(email)
}
