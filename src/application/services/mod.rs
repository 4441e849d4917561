//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **TokenVerifier**: bearer-token verification and session minting
//! - **RoomService**: room creation, DM find-or-create, membership checks
//! - **MessageService**: send/edit/read with sanitize + encryption
//! - **UnreadPropagator**: presence-aware unread fan-out

pub mod auth_service;
pub mod message_service;
pub mod room_service;
pub mod unread_service;

pub use auth_service::{Claims, TokenVerifier};
pub use message_service::{MessageDto, MessageService, MessageServiceImpl, SendMessageDto};
pub use room_service::{CreateRoomDto, RoomDto, RoomService, RoomServiceImpl};
pub use unread_service::{UnreadPropagator, UnreadUpdate};
