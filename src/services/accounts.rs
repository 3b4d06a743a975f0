use rusqlite::Connection;
use serde::Serialize;

use crate::auth::password::{hash_password_off_thread, verify_password_off_thread};
use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Identity, PublicUser};
use crate::services::validation::{Credentials, Registration};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

fn email_taken() -> AppError {
    AppError::InvalidInput("Email already exists".to_string())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_string())
}

/// Hashes off the runtime first, then takes the connection lock only for the
/// insert.
pub async fn register(state: &AppState, registration: Registration) -> Result<PublicUser, AppError> {
    let password_hash = hash_password_off_thread(registration.password.clone()).await?;

    let db = state.db()?;
    insert_account(&db, registration, &password_hash)
}

fn insert_account(
    conn: &Connection,
    registration: Registration,
    password_hash: &str,
) -> Result<PublicUser, AppError> {
    if queries::find_user_by_email(conn, &registration.email)?.is_some() {
        return Err(email_taken());
    }

    let id = match queries::insert_user(
        conn,
        &registration.name,
        &registration.email,
        password_hash,
        registration.role,
    ) {
        Ok(id) => id,
        Err(e) if db::is_unique_violation(&e) => return Err(email_taken()),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = id, role = registration.role.as_str(), "user registered");

    Ok(PublicUser {
        id,
        name: registration.name,
        email: registration.email,
        role: registration.role,
    })
}

/// The user row is read under the lock; the password check runs after the
/// guard is released.
pub async fn login(state: &AppState, credentials: Credentials) -> Result<LoginResponse, AppError> {
    let user = {
        let db = state.db()?;
        queries::find_user_by_email(&db, &credentials.email)?
    }
    .ok_or_else(invalid_credentials)?;

    if !verify_password_off_thread(credentials.password, user.password_hash.clone()).await? {
        return Err(invalid_credentials());
    }

    let token = state.tokens.issue(Identity {
        id: user.id,
        role: user.role,
    })?;

    tracing::info!(user_id = user.id, "user logged in");

    Ok(LoginResponse {
        token,
        user: user.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::Role;

    fn test_state() -> AppState {
        AppState::new(db::init_db(":memory:").unwrap(), AppConfig::for_tests())
    }

    fn registration(email: &str) -> Registration {
        Registration {
            name: "Ann".to_string(),
            email: email.to_string(),
            password: "123456".to_string(),
            role: Role::Customer,
        }
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let state = test_state();

        let user = register(&state, registration("ann@example.com")).await.unwrap();
        let res = login(&state, credentials("ann@example.com", "123456"))
            .await
            .unwrap();

        assert_eq!(res.user, user);
        assert_eq!(
            state.tokens.verify(&res.token).unwrap(),
            Identity {
                id: user.id,
                role: Role::Customer
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let state = test_state();
        register(&state, registration("ann@example.com")).await.unwrap();

        let err = register(&state, registration("ann@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_unauthorized() {
        let state = test_state();
        register(&state, registration("ann@example.com")).await.unwrap();

        let wrong = login(&state, credentials("ann@example.com", "wrongpass")).await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

        let unknown = login(&state, credentials("nobody@example.com", "123456")).await;
        assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_clear() {
        let state = test_state();
        register(&state, registration("ann@example.com")).await.unwrap();

        let stored = queries::find_user_by_email(&state.db().unwrap(), "ann@example.com")
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, "123456");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connection_is_free_while_password_hashes() {
        let state = std::sync::Arc::new(test_state());

        let registering = {
            let state = state.clone();
            tokio::spawn(async move { register(&state, registration("ann@example.com")).await })
        };

        // While the hash runs on the blocking pool the lock must stay available.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if !registering.is_finished() {
            assert!(state.db.try_lock().is_ok());
        }

        registering.await.unwrap().unwrap();
    }
}
