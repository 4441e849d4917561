//! Security Event Log
//!
//! Append-only, auto-expiring audit trail of suspicious actions per user.
//! Entries roll over hourly; users idle for more than a day are purged by
//! the periodic sweep.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// One recorded suspicious action.
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug)]
struct UserSecurityLog {
    events: Vec<SecurityEvent>,
    last_reset: DateTime<Utc>,
}

/// Process-wide audit trail keyed by user id.
pub struct SecurityEventLog {
    logs: DashMap<i64, UserSecurityLog>,
}

const ROLLOVER: Duration = Duration::hours(1);
const RETENTION: Duration = Duration::hours(24);

impl SecurityEventLog {
    pub fn new() -> Self {
        Self {
            logs: DashMap::new(),
        }
    }

    /// Append an event for a user, rolling the hourly window if it elapsed.
    pub fn record(&self, user_id: i64, message: impl Into<String>) {
        self.record_at(user_id, message.into(), Utc::now());
    }

    fn record_at(&self, user_id: i64, message: String, now: DateTime<Utc>) {
        let mut entry = self.logs.entry(user_id).or_insert_with(|| UserSecurityLog {
            events: Vec::new(),
            last_reset: now,
        });

        if now - entry.last_reset > ROLLOVER {
            entry.events.clear();
            entry.last_reset = now;
        }

        tracing::warn!(user_id, event = %message, "Security event recorded");
        entry.events.push(SecurityEvent { at: now, message });
    }

    /// Events currently retained for a user (operator/diagnostic use).
    pub fn events_for(&self, user_id: i64) -> Vec<SecurityEvent> {
        self.logs
            .get(&user_id)
            .map(|l| l.events.clone())
            .unwrap_or_default()
    }

    /// Purge users whose window went stale more than 24h ago.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.logs.len();
        self.logs.retain(|_, l| now - l.last_reset <= RETENTION);
        before - self.logs.len()
    }
}

impl Default for SecurityEventLog {
    fn default() -> Self {
        Self::new()
    }
}
