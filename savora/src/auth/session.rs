//! JWT session token creation and verification.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    api::models::accounts::{CurrentPrincipal, Role},
    config::Config,
    errors::Error,
    types::AccountId,
};

/// JWT session claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: AccountId,   // Subject (account ID)
    pub email: String,    // Account email
    pub username: String, // Username
    pub role: Role,       // Account role
    pub exp: i64,         // Expiration time
    pub iat: i64,         // Issued at
}

impl SessionClaims {
    /// Create new session claims for an account
    pub fn new(principal: &CurrentPrincipal, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.jwt_expiry;

        Self {
            sub: principal.id,
            email: principal.email.clone(),
            username: principal.username.clone(),
            role: principal.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<SessionClaims> for CurrentPrincipal {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Create a signed HS256 token for an account session
pub fn create_session_token(principal: &CurrentPrincipal, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(principal, config);
    let key = EncodingKey::from_secret(config.signing_secret().as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode a session token.
///
/// Expiry is checked by the library during decode, so an expired token is
/// rejected here and never reaches a handler.
pub fn verify_session_token(token: &str, config: &Config) -> Result<CurrentPrincipal, Error> {
    let key = DecodingKey::from_secret(config.signing_secret().as_bytes());
    let validation = Validation::default();

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Auth {
            message: Some("invalid token".to_string()),
        },

        // Server errors (500) - key issues, internal failures
        jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
        | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
        | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
        | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        // Catch-all for any future error variants (default to server error for safety)
        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    Ok(CurrentPrincipal::from(token_data.claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn create_test_config() -> Config {
        let mut config = Config {
            secret_key: Some("test-secret-key-for-jwt".to_string()),
            ..Default::default()
        };
        config.auth.jwt_expiry = Duration::from_secs(3600);
        config
    }

    fn create_test_principal() -> CurrentPrincipal {
        CurrentPrincipal {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            username: "testuser".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn test_create_and_verify_session_token() {
        let config = create_test_config();
        let principal = create_test_principal();

        let token = create_session_token(&principal, &config).unwrap();
        assert!(!token.is_empty());

        let verified = verify_session_token(&token, &config).unwrap();
        assert_eq!(verified.id, principal.id);
        assert_eq!(verified.email, principal.email);
        assert_eq!(verified.username, principal.username);
        assert_eq!(verified.role, principal.role);
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let mut config = create_test_config();
        let principal = create_test_principal();

        let token = create_session_token(&principal, &config).unwrap();

        config.secret_key = Some("different-secret".to_string());
        let result = verify_session_token(&token, &config);
        // Should be Auth (InvalidSignature) with the invalid-token message,
        // distinguishable from missing credentials
        match result.unwrap_err() {
            Error::Auth { message } => assert_eq!(message.as_deref(), Some("invalid token")),
            other => panic!("expected Auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_expired_token() {
        let config = create_test_config();
        let principal = create_test_principal();

        // Manually create an expired token by setting exp in the past
        let now = Utc::now();
        let claims = SessionClaims {
            sub: principal.id,
            email: principal.email.clone(),
            username: principal.username.clone(),
            role: principal.role,
            exp: (now - chrono::Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        };

        let key = EncodingKey::from_secret(config.signing_secret().as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let result = verify_session_token(&token, &config);
        // Should be Auth (ExpiredSignature), not Internal error
        match result.unwrap_err() {
            Error::Auth { message } => assert_eq!(message.as_deref(), Some("invalid token")),
            other => panic!("expected Auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_malformed_token() {
        let config = create_test_config();

        let malformed_tokens = vec!["not.a.token", "invalid", "", "too.many.parts.in.this.token"];

        for token in malformed_tokens {
            let result = verify_session_token(token, &config);
            assert!(
                matches!(result.unwrap_err(), Error::Auth { .. }),
                "Expected Auth error for token: {}",
                token
            );
        }
    }
}
