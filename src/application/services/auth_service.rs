//! Credential & Session Verification
//!
//! Verifies bearer tokens minted by the external issuer and binds live
//! connections to sessions. The gateway never signs tokens; it only checks
//! them against the shared secret. A missing secret fails closed.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::infrastructure::stores::{Session, SessionStore};
use crate::shared::error::AppError;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Stateless bearer-token verifier.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Option<String>,
}

impl TokenVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Decode and validate a bearer token, returning the user id.
    pub fn verify(&self, token: &str) -> Result<i64, AppError> {
        let secret = self.secret.as_deref().ok_or_else(|| {
            AppError::ServerConfiguration("Token verification secret is not configured".into())
        })?;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Authentication("Token expired".into())
            }
            _ => AppError::Authentication("Invalid token".into()),
        })?;

        token_data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Authentication("Invalid token claims".into()))
    }

    /// Authenticate a connection handshake and mint its session.
    ///
    /// The token comes from the auth payload or an Authorization-style
    /// header; absence is an authentication failure, not a validation one.
    pub fn authenticate_connection(
        &self,
        token: Option<&str>,
        sessions: &SessionStore,
    ) -> Result<Session, AppError> {
        let token =
            token.ok_or_else(|| AppError::Authentication("Missing bearer token".into()))?;
        let user_id = self.verify(token)?;
        Ok(sessions.create(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "unit-test-secret-at-least-32-chars!!";

    fn token_for(user_id: i64, expires_in: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + expires_in).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_user_id() {
        let verifier = TokenVerifier::new(Some(SECRET.into()));
        let token = token_for(42, Duration::minutes(15));
        assert_eq!(verifier.verify(&token).unwrap(), 42);
    }

    #[test]
    fn missing_secret_fails_closed() {
        let verifier = TokenVerifier::new(None);
        let token = token_for(42, Duration::minutes(15));
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, AppError::ServerConfiguration(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = TokenVerifier::new(Some(SECRET.into()));
        let token = token_for(42, Duration::minutes(-5));
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let verifier = TokenVerifier::new(Some("a-completely-different-secret-value".into()));
        let token = token_for(42, Duration::minutes(15));
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn handshake_without_token_is_rejected() {
        let verifier = TokenVerifier::new(Some(SECRET.into()));
        let sessions = SessionStore::new(24);
        let err = verifier
            .authenticate_connection(None, &sessions)
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
        assert!(sessions.is_empty());
    }

    #[test]
    fn handshake_mints_a_session() {
        let verifier = TokenVerifier::new(Some(SECRET.into()));
        let sessions = SessionStore::new(24);
        let token = token_for(7, Duration::minutes(15));

        let session = verifier
            .authenticate_connection(Some(&token), &sessions)
            .unwrap();
        assert_eq!(session.user_id, 7);
        assert!(sessions.validate(&session.session_id).is_ok());
    }
}
