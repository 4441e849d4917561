//! Unread Propagation
//!
//! Computes who must be told about unread changes after a message lands.
//! Pure with respect to the transport: the result is a list of per-user
//! events for the gateway to push, which keeps the fan-out testable without
//! a live connection.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::MemberRepository;
use crate::shared::error::AppError;

/// One pending `unread_count_updated` push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadUpdate {
    pub user_id: i64,
    pub chat_room_id: Uuid,
    pub unread_count: i64,
}

/// Fans unread-count changes out to room members after a send.
pub struct UnreadPropagator<Mem: MemberRepository> {
    member_repo: Arc<Mem>,
}

impl<Mem: MemberRepository> UnreadPropagator<Mem> {
    pub fn new(member_repo: Arc<Mem>) -> Self {
        Self { member_repo }
    }

    /// Compute the fan-out for a freshly sent message.
    ///
    /// Active users are viewing the room, and viewing implies reading: their
    /// last-read mark advances to the send time and they get no unread push.
    /// Everyone else is re-validated as a member (they may have left since
    /// last seen) and, if still one, gets the freshly computed total.
    pub async fn after_message(
        &self,
        chat_room_id: Uuid,
        author_id: i64,
        active_users: &HashSet<i64>,
        sent_at: DateTime<Utc>,
    ) -> Result<Vec<UnreadUpdate>, AppError> {
        let members = self.member_repo.member_ids(chat_room_id).await?;
        let mut updates = Vec::new();

        for user_id in members {
            if user_id == author_id {
                continue;
            }

            if active_users.contains(&user_id) {
                self.member_repo
                    .update_last_read(chat_room_id, user_id, sent_at)
                    .await?;
                continue;
            }

            if !self.member_repo.is_member(chat_room_id, user_id).await? {
                continue;
            }

            let unread_count = self.member_repo.unread_count(chat_room_id, user_id).await?;
            updates.push(UnreadUpdate {
                user_id,
                chat_room_id,
                unread_count,
            });
        }

        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockMemberRepository;
    use mockall::predicate::{always, eq};

    #[tokio::test]
    async fn inactive_members_receive_fresh_unread_totals() {
        let room = Uuid::new_v4();
        let mut member_repo = MockMemberRepository::new();
        member_repo
            .expect_member_ids()
            .returning(|_| Ok(vec![1, 2, 3]));
        member_repo.expect_is_member().returning(|_, _| Ok(true));
        member_repo
            .expect_unread_count()
            .with(always(), eq(2))
            .returning(|_, _| Ok(4));
        member_repo
            .expect_unread_count()
            .with(always(), eq(3))
            .returning(|_, _| Ok(7));

        let propagator = UnreadPropagator::new(Arc::new(member_repo));
        let updates = propagator
            .after_message(room, 1, &HashSet::new(), Utc::now())
            .await
            .unwrap();

        assert_eq!(
            updates,
            vec![
                UnreadUpdate {
                    user_id: 2,
                    chat_room_id: room,
                    unread_count: 4
                },
                UnreadUpdate {
                    user_id: 3,
                    chat_room_id: room,
                    unread_count: 7
                },
            ]
        );
    }

    #[tokio::test]
    async fn active_members_get_last_read_advanced_instead() {
        let room = Uuid::new_v4();
        let sent_at = Utc::now();

        let mut member_repo = MockMemberRepository::new();
        member_repo.expect_member_ids().returning(|_| Ok(vec![1, 2]));
        member_repo
            .expect_update_last_read()
            .with(always(), eq(2), eq(sent_at))
            .times(1)
            .returning(|_, _, _| Ok(()));
        member_repo.expect_unread_count().never();

        let propagator = UnreadPropagator::new(Arc::new(member_repo));
        let active = HashSet::from([2]);
        let updates = propagator
            .after_message(room, 1, &active, sent_at)
            .await
            .unwrap();

        assert!(updates.is_empty(), "viewing implies reading, no push");
    }

    #[tokio::test]
    async fn author_is_never_notified() {
        let room = Uuid::new_v4();
        let mut member_repo = MockMemberRepository::new();
        member_repo.expect_member_ids().returning(|_| Ok(vec![1]));
        member_repo.expect_is_member().never();
        member_repo.expect_unread_count().never();

        let propagator = UnreadPropagator::new(Arc::new(member_repo));
        let updates = propagator
            .after_message(room, 1, &HashSet::new(), Utc::now())
            .await
            .unwrap();
        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn members_who_left_since_last_seen_are_skipped() {
        let room = Uuid::new_v4();
        let mut member_repo = MockMemberRepository::new();
        member_repo.expect_member_ids().returning(|_| Ok(vec![1, 2]));
        // user 2 left between enumeration and fan-out
        member_repo
            .expect_is_member()
            .with(always(), eq(2))
            .returning(|_, _| Ok(false));
        member_repo.expect_unread_count().never();

        let propagator = UnreadPropagator::new(Arc::new(member_repo));
        let updates = propagator
            .after_message(room, 1, &HashSet::new(), Utc::now())
            .await
            .unwrap();
        assert!(updates.is_empty());
    }
}
