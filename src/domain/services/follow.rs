//! Follow-check dependency contract.
//!
//! Room creation consults the social graph to enforce mutual-follow rules.
//! The graph lives outside the chat domain; calls to it are guarded by the
//! circuit breaker in `infrastructure::stores`.

use async_trait::async_trait;

use crate::shared::error::AppError;

/// Directed follow lookup against the social graph.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FollowChecker: Send + Sync {
    /// Does `follower` follow `followee`?
    async fn is_following(&self, follower: i64, followee: i64) -> Result<bool, AppError>;
}
