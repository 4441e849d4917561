//! Member Repository Implementation
//!
//! PostgreSQL implementation of the MemberRepository trait. Handles room
//! membership, last-read bookkeeping, and unread counting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{MemberRepository, RoomMember};
use crate::shared::error::AppError;

/// Database row matching the chat_room_members table schema.
#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    chat_room_id: Uuid,
    user_id: i64,
    joined_at: DateTime<Utc>,
    last_read_at: DateTime<Utc>,
}

impl MemberRow {
    fn into_member(self) -> RoomMember {
        RoomMember {
            id: self.id,
            chat_room_id: self.chat_room_id,
            user_id: self.user_id,
            joined_at: self.joined_at,
            last_read_at: self.last_read_at,
        }
    }
}

/// PostgreSQL member repository implementation.
#[derive(Clone)]
pub struct PgMemberRepository {
    pool: PgPool,
}

impl PgMemberRepository {
    /// Create a new PgMemberRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn is_member(&self, chat_room_id: Uuid, user_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM chat_room_members
                WHERE chat_room_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(chat_room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn add_member(&self, chat_room_id: Uuid, user_id: i64) -> Result<RoomMember, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO chat_room_members (id, chat_room_id, user_id, joined_at, last_read_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, chat_room_id, user_id, joined_at, last_read_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(chat_room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_member())
    }

    async fn remove_member(&self, chat_room_id: Uuid, user_id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM chat_room_members
            WHERE chat_room_id = $1 AND user_id = $2
            "#,
        )
        .bind(chat_room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "User {} is not a member of room {}",
                user_id, chat_room_id
            )));
        }

        Ok(())
    }

    /// Advance the last-read mark. GREATEST keeps it monotonic: a stale
    /// timestamp from a delayed command never moves the mark backwards.
    async fn update_last_read(
        &self,
        chat_room_id: Uuid,
        user_id: i64,
        read_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE chat_room_members
            SET last_read_at = GREATEST(last_read_at, $3)
            WHERE chat_room_id = $1 AND user_id = $2
            "#,
        )
        .bind(chat_room_id)
        .bind(user_id)
        .bind(read_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn member_count(&self, chat_room_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM chat_room_members WHERE chat_room_id = $1
            "#,
        )
        .bind(chat_room_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn member_ids(&self, chat_room_id: Uuid) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id FROM chat_room_members
            WHERE chat_room_id = $1
            ORDER BY joined_at
            "#,
        )
        .bind(chat_room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Messages from other authors newer than the member's last-read mark.
    async fn unread_count(&self, chat_room_id: Uuid, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages m
            JOIN chat_room_members cm
              ON cm.chat_room_id = m.chat_room_id AND cm.user_id = $2
            WHERE m.chat_room_id = $1
              AND m.author_id <> $2
              AND m.created_at > cm.last_read_at
            "#,
        )
        .bind(chat_room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
