use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::errors::AppError;
use crate::models::Identity;
use crate::state::AppState;

/// Any caller presenting a valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

/// A caller whose token carries the ADMIN role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Identity);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized("Access denied. No token provided.".to_string())
        })?;

        let identity = state.tokens.verify(token)?;
        Ok(AuthUser(identity))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;

        if !identity.is_admin() {
            tracing::warn!(user_id = identity.id, "non-admin caller on admin route");
            return Err(AppError::Forbidden("Access denied. Admins only.".to_string()));
        }
        Ok(AdminUser(identity))
    }
}
