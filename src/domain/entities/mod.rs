//! Domain entities and repository traits.

pub mod member;
pub mod message;
pub mod room;

pub use member::{MemberRepository, RoomMember};
pub use message::{Message, MessageRepository, MessageType};
pub use room::{ChatRoom, RoomRepository, RoomType, DM_MEMBER_COUNT};

#[cfg(test)]
pub use member::MockMemberRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use room::MockRoomRepository;
