//! Follow-Check Implementation
//!
//! PostgreSQL lookup against the social graph's follows table. The table is
//! owned by the follow service; this adapter only reads it. Calls are
//! guarded upstream by the circuit breaker.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::FollowChecker;
use crate::shared::error::AppError;

/// PostgreSQL follow-check implementation.
#[derive(Clone)]
pub struct PgFollowChecker {
    pool: PgPool,
}

impl PgFollowChecker {
    /// Create a new PgFollowChecker with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowChecker for PgFollowChecker {
    async fn is_following(&self, follower: i64, followee: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM follows
                WHERE follower_id = $1 AND followee_id = $2
            )
            "#,
        )
        .bind(follower)
        .bind(followee)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
