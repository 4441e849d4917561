//! In-memory session table.
//!
//! One entry per live connection, keyed by session id. Sessions carry an
//! absolute expiry measured from creation, not a sliding one: a connection
//! that outlives its credential is cut off even if it stays active.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::shared::error::AppError;

/// Server-side record binding a live connection to an authenticated user.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Process-wide session table with TTL-based lifecycle.
///
/// Lost on restart by design; clients reconnect and re-authenticate.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Mint a session for an authenticated user and return it.
    pub fn create(&self, user_id: i64) -> Session {
        let now = Utc::now();
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            last_activity: now,
        };
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        session
    }

    /// Re-validate a session before processing a command.
    ///
    /// Fails closed: unknown or expired sessions yield an authentication
    /// error and the caller must terminate the connection. Valid sessions
    /// get their activity timestamp advanced.
    pub fn validate(&self, session_id: &str) -> Result<Session, AppError> {
        self.validate_at(session_id, Utc::now())
    }

    fn validate_at(&self, session_id: &str, now: DateTime<Utc>) -> Result<Session, AppError> {
        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::Authentication("Session not found".into()))?;

        if now - entry.created_at > self.ttl {
            drop(entry);
            self.sessions.remove(session_id);
            return Err(AppError::Authentication("Session expired".into()));
        }

        entry.last_activity = now;
        Ok(entry.clone())
    }

    /// Remove a session on disconnect.
    pub fn remove(&self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id).map(|(_, s)| s)
    }

    /// Drop sessions past their absolute expiry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.created_at <= self.ttl);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_validate_roundtrips() {
        let store = SessionStore::new(24);
        let session = store.create(42);

        let validated = store.validate(&session.session_id).unwrap();
        assert_eq!(validated.user_id, 42);
    }

    #[test]
    fn unknown_session_fails_closed() {
        let store = SessionStore::new(24);
        let err = store.validate("no-such-session").unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn expired_session_is_rejected_and_evicted() {
        let store = SessionStore::new(24);
        let session = store.create(7);

        let later = Utc::now() + Duration::hours(25);
        let err = store.validate_at(&session.session_id, later).unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
        // the stale entry is gone, not just rejected
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn expiry_is_absolute_not_sliding() {
        let store = SessionStore::new(24);
        let session = store.create(7);

        // activity 23h in keeps the session alive...
        let at_23h = Utc::now() + Duration::hours(23);
        assert!(store.validate_at(&session.session_id, at_23h).is_ok());

        // ...but does not push the expiry past 24h from creation
        let at_25h = Utc::now() + Duration::hours(25);
        assert!(store.validate_at(&session.session_id, at_25h).is_err());
    }

    #[test]
    fn sweep_removes_only_expired_sessions() {
        let store = SessionStore::new(24);
        store.create(1);
        store.create(2);

        assert_eq!(store.sweep_at(Utc::now() + Duration::hours(1)), 0);
        assert_eq!(store.len(), 2);

        assert_eq!(store.sweep_at(Utc::now() + Duration::hours(25)), 2);
        assert!(store.is_empty());
    }
}
