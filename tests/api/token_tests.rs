//! Token Verification Tests
//!
//! Exercises the verifier with tokens minted exactly as the external issuer
//! mints them.

use chrono::Duration;

use chat_gateway::application::TokenVerifier;
use chat_gateway::infrastructure::stores::SessionStore;

use crate::common::{mint_token, TEST_SECRET};

#[tokio::test]
async fn issuer_tokens_verify_and_mint_sessions() {
    let verifier = TokenVerifier::new(Some(TEST_SECRET.into()));
    let sessions = SessionStore::new(24);

    let token = mint_token(1001, Duration::minutes(15));
    let session = verifier
        .authenticate_connection(Some(&token), &sessions)
        .expect("handshake should succeed");

    assert_eq!(session.user_id, 1001);
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn stale_issuer_tokens_are_rejected_at_handshake() {
    let verifier = TokenVerifier::new(Some(TEST_SECRET.into()));
    let sessions = SessionStore::new(24);

    let token = mint_token(1001, Duration::minutes(-1));
    let result = verifier.authenticate_connection(Some(&token), &sessions);

    assert!(result.is_err());
    assert!(sessions.is_empty(), "no session minted for a stale token");
}
