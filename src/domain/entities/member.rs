//! Room membership entity and repository trait.
//!
//! Maps to the `chat_room_members` table; composite-unique on
//! (chat_room_id, user_id).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Represents one user's membership in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMember {
    pub id: Uuid,

    pub chat_room_id: Uuid,

    pub user_id: i64,

    pub joined_at: DateTime<Utc>,

    /// High-water mark of what this member has read.
    /// Advances monotonically, never decreases.
    pub last_read_at: DateTime<Utc>,
}

/// Repository trait for room membership data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Check whether a user currently belongs to a room.
    async fn is_member(&self, chat_room_id: Uuid, user_id: i64) -> Result<bool, AppError>;

    /// Add a user to a room. Fails on duplicate membership.
    async fn add_member(&self, chat_room_id: Uuid, user_id: i64) -> Result<RoomMember, AppError>;

    /// Remove a user from a room.
    async fn remove_member(&self, chat_room_id: Uuid, user_id: i64) -> Result<(), AppError>;

    /// Advance a member's last-read timestamp.
    ///
    /// Implementations must keep the timestamp monotonic: an older value
    /// than the stored one is a no-op.
    async fn update_last_read(
        &self,
        chat_room_id: Uuid,
        user_id: i64,
        read_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Count members of a room.
    async fn member_count(&self, chat_room_id: Uuid) -> Result<i64, AppError>;

    /// List the user ids of all members of a room.
    async fn member_ids(&self, chat_room_id: Uuid) -> Result<Vec<i64>, AppError>;

    /// Count messages in the room newer than the member's last-read mark.
    async fn unread_count(&self, chat_room_id: Uuid, user_id: i64) -> Result<i64, AppError>;
}
