//! Gateway Wire Types
//!
//! JSON message formats for the real-time channel. Inbound commands and
//! outbound events are both `{"event": ..., "data": ...}` envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{MessageDto, RoomDto};
use crate::domain::MessageType;
use crate::shared::error::AppError;

/// Inbound command from a connected client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom {
        chat_room_id: Uuid,
    },
    LeaveRoom {
        chat_room_id: Uuid,
    },
    SendMessage {
        chat_room_id: Uuid,
        content: String,
        #[serde(default, rename = "type")]
        message_type: Option<MessageType>,
        /// Client-supplied id for idempotent retries
        #[serde(default)]
        message_id: Option<String>,
    },
    Typing {
        chat_room_id: Uuid,
        is_typing: bool,
    },
}

impl ClientCommand {
    /// Command name for logging and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::SendMessage { .. } => "send_message",
            Self::Typing { .. } => "typing",
        }
    }
}

/// Outbound event pushed to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once after a successful handshake
    Ready {
        session_id: String,
        user_id: i64,
        encryption_enabled: bool,
    },
    JoinedRoom {
        chat_room_id: Uuid,
    },
    LeftRoom {
        chat_room_id: Uuid,
    },
    UserJoined {
        chat_room_id: Uuid,
        user_id: i64,
    },
    UserLeft {
        chat_room_id: Uuid,
        user_id: i64,
    },
    NewMessage {
        message: MessageDto,
        chat_room: RoomDto,
    },
    TypingStatus {
        chat_room_id: Uuid,
        user_id: i64,
        is_typing: bool,
    },
    UnreadCountUpdated {
        chat_room_id: Uuid,
        unread_count: i64,
    },
    Notification {
        message: String,
    },
    Error(ErrorEvent),
}

/// Structured error event; rejected commands emit this instead of closing
/// the connection.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub code: u16,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&AppError> for ErrorEvent {
    fn from(error: &AppError) -> Self {
        Self {
            error_type: error.kind(),
            code: error.code(),
            message: error.client_message(),
            timestamp: Utc::now(),
        }
    }
}

impl From<&AppError> for ServerEvent {
    fn from(error: &AppError) -> Self {
        ServerEvent::Error(ErrorEvent::from(error))
    }
}
