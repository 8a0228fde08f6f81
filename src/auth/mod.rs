/*!
 * # Authentication
 *
 * Sellers authenticate with HS256 bearer tokens. Handlers that need a
 * caller take an [`AuthenticatedUser`] argument; requests without a valid
 * token are rejected with 401 before the handler runs. Ownership checks
 * (caller owns the shop) live in the services.
 */

use axum::http::{header, request::Parts, HeaderMap};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (user ID)
    pub email: String, // Seller's email
    pub jti: String,   // JWT ID
    pub iat: i64,      // Issued at time
    pub exp: i64,      // Expiration time
}

/// Caller identity extracted from a verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Issues and verifies seller tokens.
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    ttl: Duration,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl AuthService {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn issue_token(&self, user_id: Uuid, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.ttl)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the caller
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthenticatedUser {
            user_id,
            email: claims.email,
        })
    }

    /// Reads `Authorization: Bearer <token>` and verifies it.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AuthError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

#[axum::async_trait]
impl axum::extract::FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .services
            .auth
            .authenticate(&parts.headers)
            .map_err(|e| {
                debug!(error = %e, "rejecting unauthenticated request");
                e.into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    const SECRET: &str = "k9Qz7Lw2Rt5Yx8Vb3Nm6Pc1Hd4Gf0JsW";

    #[test]
    fn issued_tokens_verify() {
        let auth = AuthService::new(SECRET, Duration::from_secs(3600));
        let user_id = Uuid::new_v4();
        let token = auth.issue_token(user_id, "seller@example.com").unwrap();

        let user = auth.verify(&token).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.email, "seller@example.com");
    }

    #[test]
    fn tokens_from_other_secrets_are_rejected() {
        let issuer = AuthService::new("another-secret-that-is-long-enough!!", Duration::from_secs(60));
        let token = issuer.issue_token(Uuid::new_v4(), "x@example.com").unwrap();

        let auth = AuthService::new(SECRET, Duration::from_secs(60));
        assert_matches!(auth.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "seller@example.com".into(),
            jti: Uuid::new_v4().to_string(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let auth = AuthService::new(SECRET, Duration::from_secs(60));
        assert_matches!(auth.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn bearer_header_is_required() {
        let auth = AuthService::new(SECRET, Duration::from_secs(60));
        let mut headers = HeaderMap::new();
        assert_matches!(auth.authenticate(&headers), Err(AuthError::MissingToken));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_matches!(auth.authenticate(&headers), Err(AuthError::MissingToken));

        let token = auth.issue_token(Uuid::new_v4(), "s@example.com").unwrap();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert!(auth.authenticate(&headers).is_ok());
    }
}
