//! Repository Implementations
//!
//! PostgreSQL-backed implementations of the domain repository traits.

pub mod follow_repository;
pub mod member_repository;
pub mod message_repository;
pub mod room_repository;

pub use follow_repository::PgFollowChecker;
pub use member_repository::PgMemberRepository;
pub use message_repository::PgMessageRepository;
pub use room_repository::PgRoomRepository;
