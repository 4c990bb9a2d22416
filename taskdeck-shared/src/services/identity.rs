/// Accounts: registration, sign-in and profile.
///
/// Token issue stays with the HTTP layer; these functions only deal with
/// users and credentials.

use tracing::{debug, info};
use uuid::Uuid;

use super::error::{optional_text, valid_email, ServiceError, ServiceResult};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::models::user::{CreateUser, UpdateProfile, User};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Creates an account
///
/// # Errors
///
/// - `Validation` for a malformed email or weak password
/// - `Conflict` if the email is already registered, in any letter case
pub async fn register(store: &dyn Store, registration: Registration) -> ServiceResult<User> {
    let email = valid_email("email", &registration.email)?;
    validate_password_strength(&registration.password)
        .map_err(|e| ServiceError::validation("password", e.to_string()))?;

    let password_hash =
        hash_password(&registration.password).map_err(|e| ServiceError::Internal(e.to_string()))?;

    let user = store
        .create_user(CreateUser {
            email,
            password_hash,
            full_name: optional_text(registration.full_name),
        })
        .await
        .map_err(|e| {
            if e.is_conflict() {
                ServiceError::Conflict("An account with this email already exists".to_string())
            } else {
                e.into()
            }
        })?;

    info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// Checks credentials
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn authenticate(store: &dyn Store, email: &str, password: &str) -> ServiceResult<User> {
    let invalid = || ServiceError::Unauthorized("Invalid email or password".to_string());

    let Some(user) = store.find_user_by_email(email).await? else {
        debug!("Login for unknown email");
        return Err(invalid());
    };

    match verify_password(password, &user.password_hash) {
        Ok(true) => Ok(user),
        Ok(false) => Err(invalid()),
        Err(e) => {
            debug!(user_id = %user.id, error = %e, "Stored password hash unreadable");
            Err(invalid())
        }
    }
}

/// The signed-in user; `Unauthorized` when the account no longer exists
pub async fn current_user(store: &dyn Store, user_id: Uuid) -> ServiceResult<User> {
    store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("Account no longer exists".to_string()))
}

/// Updates display name and avatar; email is immutable
pub async fn update_profile(
    store: &dyn Store,
    user_id: Uuid,
    update: UpdateProfile,
) -> ServiceResult<User> {
    let update = UpdateProfile {
        full_name: optional_text(update.full_name),
        avatar_url: optional_text(update.avatar_url),
    };

    store
        .update_profile(user_id, update)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("Account no longer exists".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "correct horse 1".to_string(),
            full_name: Some(" Ada Lovelace ".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let store = MemoryStore::new();
        let user = register(&store, registration(" Ada@Example.com")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.full_name.as_deref(), Some("Ada Lovelace"));

        let signed_in = authenticate(&store, "ADA@example.com", "correct horse 1")
            .await
            .unwrap();
        assert_eq!(signed_in.id, user.id);

        assert!(matches!(
            authenticate(&store, "ada@example.com", "wrong password 1").await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&store, "nobody@example.com", "correct horse 1").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let store = MemoryStore::new();
        register(&store, registration("ada@example.com")).await.unwrap();

        assert!(matches!(
            register(&store, registration("ADA@example.com")).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            register(&store, registration("not-an-email")).await,
            Err(ServiceError::Validation { field: "email", .. })
        ));

        let weak = Registration {
            password: "short".to_string(),
            ..registration("grace@example.com")
        };
        assert!(matches!(
            register(&store, weak).await,
            Err(ServiceError::Validation { field: "password", .. })
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = MemoryStore::new();
        let user = register(&store, registration("ada@example.com")).await.unwrap();

        let updated = update_profile(
            &store,
            user.id,
            UpdateProfile {
                full_name: None,
                avatar_url: Some("https://example.com/a.png".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(updated.avatar_url.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(updated.email, "ada@example.com");

        assert!(matches!(
            current_user(&store, Uuid::new_v4()).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
