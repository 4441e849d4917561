//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema. When room encryption
//! is enabled, `content`, `iv`, and `tag` hold hex ciphertext, nonce, and
//! authentication tag; plaintext is never persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Message types matching the PostgreSQL ENUM `message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A regular user message
    #[default]
    Text,
    /// An image reference
    Image,
    /// Server-generated notice (member joined, room renamed)
    System,
}

impl MessageType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "image" => Self::Image,
            "system" => Self::System,
            _ => Self::Text,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a message in a chat room.
///
/// Maps to the `messages` table:
/// - id: UUID PRIMARY KEY
/// - chat_room_id: UUID NOT NULL REFERENCES chat_rooms(id)
/// - author_id: BIGINT NOT NULL
/// - content: TEXT NOT NULL (plaintext or hex ciphertext)
/// - message_type: message_type NOT NULL DEFAULT 'text'
/// - is_encrypted: BOOLEAN NOT NULL DEFAULT FALSE
/// - iv: TEXT NULL, tag: TEXT NULL (hex nonce and auth tag when encrypted)
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,

    pub chat_room_id: Uuid,

    pub author_id: i64,

    pub content: String,

    #[serde(rename = "type")]
    pub message_type: MessageType,

    pub is_encrypted: bool,

    pub iv: Option<String>,

    pub tag: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn is_edited(&self) -> bool {
        self.updated_at > self.created_at
    }
}

/// Repository trait for message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Find a message by its id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError>;

    /// Find messages in a room with cursor-based pagination.
    ///
    /// Returns messages older than the `before` cursor (newest first).
    async fn find_by_room(
        &self,
        chat_room_id: Uuid,
        before: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Create a new message.
    async fn create(&self, message: &Message) -> Result<Message, AppError>;

    /// Update a message (for editing content).
    async fn update(&self, message: &Message) -> Result<Message, AppError>;
}
