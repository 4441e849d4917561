//! In-process Rate Limiter
//!
//! Sliding-minute counters per (user, category). Each category has an
//! independent budget; the window is anchored at the first action and the
//! counter resets to zero when it elapses. Exceeding a budget records a
//! security event.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::config::RateLimitSettings;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

use super::security_log::SecurityEventLog;

/// Independent rate-limit budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCategory {
    /// Message sends
    Messages,
    /// Typing notifications
    Typing,
    /// Room create/join/leave operations
    RoomOperations,
}

impl RateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Typing => "typing",
            Self::RoomOperations => "room_operations",
        }
    }
}

#[derive(Debug)]
struct Bucket {
    count: u32,
    window_started_at: DateTime<Utc>,
}

/// Counting window length.
const WINDOW: Duration = Duration::seconds(60);
/// Grace period after a window closes before its bucket is swept.
const SWEEP_DELAY: Duration = Duration::seconds(60);

/// Sliding-minute rate limiter over in-memory buckets.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    limits: RateLimitSettings,
    security_log: Arc<SecurityEventLog>,
}

impl RateLimiter {
    pub fn new(limits: RateLimitSettings, security_log: Arc<SecurityEventLog>) -> Self {
        Self {
            buckets: DashMap::new(),
            limits,
            security_log,
        }
    }

    fn limit_for(&self, category: RateCategory) -> u32 {
        match category {
            RateCategory::Messages => self.limits.messages_per_minute,
            RateCategory::Typing => self.limits.typing_per_minute,
            RateCategory::RoomOperations => self.limits.room_operations_per_minute,
        }
    }

    /// Admit or reject one action for a user in a category.
    pub fn check(&self, user_id: i64, category: RateCategory) -> Result<(), AppError> {
        self.check_at(user_id, category, Utc::now())
    }

    fn check_at(
        &self,
        user_id: i64,
        category: RateCategory,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let key = format!("{}:{}", category.as_str(), user_id);
        let limit = self.limit_for(category);

        let mut bucket = self.buckets.entry(key).or_insert_with(|| Bucket {
            count: 0,
            window_started_at: now,
        });

        // window elapsed: counter starts over, anchored at this action
        if now - bucket.window_started_at >= WINDOW {
            bucket.count = 0;
            bucket.window_started_at = now;
        }

        if bucket.count >= limit {
            drop(bucket);
            metrics::record_rate_limit_rejection(category.as_str());
            self.security_log.record(
                user_id,
                format!("rate limit exceeded: {}", category.as_str()),
            );
            return Err(AppError::RateLimited(format!(
                "{} limit reached, slow down",
                category.as_str()
            )));
        }

        bucket.count += 1;
        Ok(())
    }

    /// Drop buckets whose window closed more than [`SWEEP_DELAY`] ago.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, b| now - b.window_started_at <= WINDOW + SWEEP_DELAY);
        before - self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            RateLimitSettings {
                messages_per_minute: 10,
                typing_per_minute: 30,
                room_operations_per_minute: 20,
            },
            Arc::new(SecurityEventLog::new()),
        )
    }

    #[test_case(RateCategory::Messages, 10 ; "messages budget")]
    #[test_case(RateCategory::Typing, 30 ; "typing budget")]
    #[test_case(RateCategory::RoomOperations, 20 ; "room operations budget")]
    fn limit_is_enforced_within_one_window(category: RateCategory, limit: u32) {
        let limiter = limiter();
        let now = Utc::now();

        for _ in 0..limit {
            limiter.check_at(1, category, now).unwrap();
        }
        let err = limiter.check_at(1, category, now).unwrap_err();
        assert!(matches!(err, AppError::RateLimited(_)));
    }

    #[test]
    fn counter_resets_exactly_at_rollover() {
        let limiter = limiter();
        let start = Utc::now();

        for _ in 0..10 {
            limiter.check_at(1, RateCategory::Messages, start).unwrap();
        }
        assert!(limiter
            .check_at(1, RateCategory::Messages, start + Duration::seconds(59))
            .is_err());

        // the window rolled: the budget is whole again
        let rolled = start + Duration::seconds(60);
        for _ in 0..10 {
            limiter.check_at(1, RateCategory::Messages, rolled).unwrap();
        }
        assert!(limiter.check_at(1, RateCategory::Messages, rolled).is_err());
    }

    #[test]
    fn categories_have_independent_budgets() {
        let limiter = limiter();
        let now = Utc::now();

        for _ in 0..10 {
            limiter.check_at(1, RateCategory::Messages, now).unwrap();
        }
        assert!(limiter.check_at(1, RateCategory::Messages, now).is_err());

        // exhausting messages leaves typing untouched
        assert!(limiter.check_at(1, RateCategory::Typing, now).is_ok());
    }

    #[test]
    fn users_do_not_share_buckets() {
        let limiter = limiter();
        let now = Utc::now();

        for _ in 0..10 {
            limiter.check_at(1, RateCategory::Messages, now).unwrap();
        }
        assert!(limiter.check_at(2, RateCategory::Messages, now).is_ok());
    }

    #[test]
    fn rejection_records_a_security_event() {
        let log = Arc::new(SecurityEventLog::new());
        let limiter = RateLimiter::new(
            RateLimitSettings {
                messages_per_minute: 1,
                typing_per_minute: 1,
                room_operations_per_minute: 1,
            },
            log.clone(),
        );
        let now = Utc::now();

        limiter.check_at(9, RateCategory::Messages, now).unwrap();
        let _ = limiter.check_at(9, RateCategory::Messages, now);

        let events = log.events_for(9);
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("messages"));
    }

    #[test]
    fn sweep_drops_long_closed_windows() {
        let limiter = limiter();
        let start = Utc::now();

        limiter.check_at(1, RateCategory::Messages, start).unwrap();
        assert_eq!(limiter.sweep_at(start + Duration::seconds(90)), 0);
        assert_eq!(limiter.sweep_at(start + Duration::seconds(121)), 1);
    }
}
