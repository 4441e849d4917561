//! Domain service contracts.

pub mod follow;

pub use follow::FollowChecker;

#[cfg(test)]
pub use follow::MockFollowChecker;
