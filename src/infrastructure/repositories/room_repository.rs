//! Room Repository Implementation
//!
//! PostgreSQL implementation of chat room operations. DM lookup is made
//! atomic through a canonical `dm_key` unique constraint rather than a
//! select-then-insert race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{ChatRoom, RoomRepository, RoomType};
use crate::shared::error::AppError;

/// PostgreSQL room repository implementation.
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    /// Create a new PgRoomRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type matching the chat_rooms table.
#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    name: Option<String>,
    room_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_room(self) -> ChatRoom {
        ChatRoom {
            id: self.id,
            name: self.name,
            room_type: RoomType::from_str(&self.room_type),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Canonical key for the DM room between two users, order-independent.
fn dm_key(user_a: i64, user_b: i64) -> String {
    let (low, high) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("{}:{}", low, high)
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChatRoom>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, name, room_type::text as room_type, created_at, updated_at
            FROM chat_rooms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_room()))
    }

    /// Persist a room and its initial memberships in one transaction.
    async fn create_with_members(
        &self,
        room: &ChatRoom,
        member_ids: &[i64],
    ) -> Result<ChatRoom, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            INSERT INTO chat_rooms (id, name, room_type, created_at, updated_at)
            VALUES ($1, $2, $3::room_type, $4, $5)
            RETURNING id, name, room_type::text as room_type, created_at, updated_at
            "#,
        )
        .bind(room.id)
        .bind(&room.name)
        .bind(room.room_type.as_str())
        .bind(room.created_at)
        .bind(room.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for user_id in member_ids {
            sqlx::query(
                r#"
                INSERT INTO chat_room_members (id, chat_room_id, user_id, joined_at, last_read_at)
                VALUES ($1, $2, $3, NOW(), NOW())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(room.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(row.into_room())
    }

    /// Find the DM between two users, creating it if absent.
    ///
    /// The unique dm_key absorbs concurrent creation: the losing insert is a
    /// no-op and both callers converge on the surviving row.
    async fn find_or_create_dm(&self, user_a: i64, user_b: i64) -> Result<ChatRoom, AppError> {
        let key = dm_key(user_a, user_b);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO chat_rooms (id, name, room_type, dm_key, created_at, updated_at)
            VALUES ($1, NULL, 'DM', $2, NOW(), NOW())
            ON CONFLICT (dm_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&key)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, name, room_type::text as room_type, created_at, updated_at
            FROM chat_rooms
            WHERE dm_key = $1
            "#,
        )
        .bind(&key)
        .fetch_one(&mut *tx)
        .await?;

        for user_id in [user_a, user_b] {
            sqlx::query(
                r#"
                INSERT INTO chat_room_members (id, chat_room_id, user_id, joined_at, last_read_at)
                VALUES ($1, $2, $3, NOW(), NOW())
                ON CONFLICT (chat_room_id, user_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(row.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(row.into_room())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dm_key_is_order_independent() {
        assert_eq!(dm_key(1, 2), dm_key(2, 1));
        assert_eq!(dm_key(1, 2), "1:2");
    }
}
