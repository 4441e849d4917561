//! Message Repository Implementation
//!
//! PostgreSQL implementation of message operations with cursor-based
//! pagination. Stores ciphertext verbatim; encryption is the caller's
//! concern.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Message, MessageRepository, MessageType};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    chat_room_id: Uuid,
    author_id: i64,
    content: String,
    message_type: String, // PostgreSQL enum maps to string
    is_encrypted: bool,
    iv: Option<String>,
    tag: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            chat_room_id: self.chat_room_id,
            author_id: self.author_id,
            content: self.content,
            message_type: MessageType::from_str(&self.message_type),
            is_encrypted: self.is_encrypted,
            iv: self.iv,
            tag: self.tag,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, chat_room_id, author_id, content,
    message_type::text as message_type,
    is_encrypted, iv, tag, created_at, updated_at
"#;

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM messages
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    /// Find messages in a room with keyset pagination, newest first.
    async fn find_by_room(
        &self,
        chat_room_id: Uuid,
        before: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM messages
            WHERE chat_room_id = $1
              AND ($2::uuid IS NULL OR created_at < (
                  SELECT created_at FROM messages WHERE id = $2
              ))
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(chat_room_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            INSERT INTO messages
                (id, chat_room_id, author_id, content, message_type,
                 is_encrypted, iv, tag, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5::message_type, $6, $7, $8, $9, $10)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(message.id)
        .bind(message.chat_room_id)
        .bind(message.author_id)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(message.is_encrypted)
        .bind(&message.iv)
        .bind(&message.tag)
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message())
    }

    async fn update(&self, message: &Message) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            UPDATE messages
            SET content = $2, is_encrypted = $3, iv = $4, tag = $5, updated_at = $6
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(message.id)
        .bind(&message.content)
        .bind(message.is_encrypted)
        .bind(&message.iv)
        .bind(&message.tag)
        .bind(message.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message())
    }
}
