//! Signed access tokens carrying the caller's id and role.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Identity, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, identity: Identity) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            id: identity.id,
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let validation = Validation::new(Algorithm::HS256);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AppError::InvalidToken("Invalid token.".to_string())
        })?;

        Ok(Identity {
            id: data.claims.id,
            role: data.claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Identity {
        Identity {
            id: 7,
            role: Role::Customer,
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = TokenService::new("test-secret", 24);
        let token = tokens.issue(customer()).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), customer());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenService::new("one", 24).issue(customer()).unwrap();
        let err = TokenService::new("two", 24).verify(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new("test-secret", -2);
        let token = tokens.issue(customer()).unwrap();
        assert!(matches!(tokens.verify(&token), Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = TokenService::new("test-secret", 24);
        assert!(tokens.verify("not.a.token").is_err());
    }
}
