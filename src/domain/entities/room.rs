//! Chat room entity and repository trait.
//!
//! Maps to the `chat_rooms` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Number of members a direct-message room must have.
pub const DM_MEMBER_COUNT: usize = 2;

/// Room types matching the PostgreSQL ENUM `room_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    /// One-to-one conversation, exactly two members
    Dm,
    /// Multi-member conversation
    #[default]
    Group,
}

impl RoomType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "DM" => Self::Dm,
            _ => Self::Group,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dm => "DM",
            Self::Group => "GROUP",
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a conversation container.
///
/// Maps to the `chat_rooms` table:
/// - id: UUID PRIMARY KEY
/// - name: TEXT NULL (group rooms only)
/// - room_type: room_type NOT NULL DEFAULT 'GROUP'
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: Uuid,

    /// Display name; DM rooms are unnamed
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub room_type: RoomType,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ChatRoom {
    /// Construct a new room with generated id and current timestamps.
    pub fn new(name: Option<String>, room_type: RoomType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            room_type,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_dm(&self) -> bool {
        self.room_type == RoomType::Dm
    }
}

/// Repository trait for chat room data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Find a room by its id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChatRoom>, AppError>;

    /// Persist a room together with its initial memberships atomically.
    async fn create_with_members(
        &self,
        room: &ChatRoom,
        member_ids: &[i64],
    ) -> Result<ChatRoom, AppError>;

    /// Find the DM room between two users, creating it atomically if absent.
    ///
    /// Concurrent calls for the same pair must converge on one room.
    async fn find_or_create_dm(&self, user_a: i64, user_b: i64) -> Result<ChatRoom, AppError>;
}
