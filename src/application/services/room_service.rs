//! Room Service
//!
//! Room creation, DM find-or-create, and membership checks. Mutual-follow
//! enforcement runs behind the circuit breaker: while the breaker is open,
//! creation proceeds without the check rather than failing outright, and the
//! bypass is logged for operators.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    ChatRoom, FollowChecker, MemberRepository, RoomRepository, RoomType, DM_MEMBER_COUNT,
};
use crate::infrastructure::metrics;
use crate::infrastructure::stores::{CircuitBreaker, RateCategory, RateLimiter};
use crate::shared::error::AppError;

/// Room service trait
#[async_trait]
pub trait RoomService: Send + Sync {
    /// Create a group or DM room with its initial members.
    async fn create_room(
        &self,
        creator_id: i64,
        request: CreateRoomDto,
    ) -> Result<RoomDto, AppError>;

    /// Find the DM between requester and peer, creating it if absent.
    async fn find_or_create_dm(&self, requester_id: i64, peer_id: i64)
        -> Result<RoomDto, AppError>;

    /// Fetch a room by id.
    async fn get_room(&self, room_id: Uuid) -> Result<RoomDto, AppError>;

    /// Fail with an authorization error unless the user is a member.
    ///
    /// Called on every command; never trusts a cached membership result.
    async fn require_membership(&self, room_id: Uuid, user_id: i64) -> Result<(), AppError>;
}

/// Create room request
#[derive(Debug, Clone)]
pub struct CreateRoomDto {
    pub name: Option<String>,
    pub room_type: RoomType,
    pub member_ids: Vec<i64>,
}

/// Room data transfer object
#[derive(Debug, Clone, Serialize)]
pub struct RoomDto {
    pub id: Uuid,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChatRoom> for RoomDto {
    fn from(room: ChatRoom) -> Self {
        Self {
            id: room.id,
            name: room.name,
            room_type: room.room_type,
            created_at: room.created_at,
            updated_at: room.updated_at,
        }
    }
}

/// RoomService implementation
pub struct RoomServiceImpl<R, M, F>
where
    R: RoomRepository,
    M: MemberRepository,
    F: FollowChecker,
{
    room_repo: Arc<R>,
    member_repo: Arc<M>,
    follow_checker: Arc<F>,
    follow_breaker: Arc<CircuitBreaker>,
    rate_limiter: Arc<RateLimiter>,
}

impl<R, M, F> RoomServiceImpl<R, M, F>
where
    R: RoomRepository,
    M: MemberRepository,
    F: FollowChecker,
{
    pub fn new(
        room_repo: Arc<R>,
        member_repo: Arc<M>,
        follow_checker: Arc<F>,
        follow_breaker: Arc<CircuitBreaker>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            room_repo,
            member_repo,
            follow_checker,
            follow_breaker,
            rate_limiter,
        }
    }

    /// Enforce mutuality for every directed pair, as one breaker-guarded call.
    ///
    /// Pairs are checked in one concurrent fan-out to bound latency. A pair
    /// that resolves to "not following" is an authorization failure naming
    /// both users. A dependency error records a breaker failure and degrades
    /// to a bypass: availability over strict enforcement.
    async fn ensure_mutual_follows(&self, user_ids: &[i64]) -> Result<(), AppError> {
        let pairs: Vec<(i64, i64)> = user_ids
            .iter()
            .flat_map(|&a| {
                user_ids
                    .iter()
                    .filter(move |&&b| a != b)
                    .map(move |&b| (a, b))
            })
            .collect();

        if pairs.is_empty() {
            return Ok(());
        }

        if !self.follow_breaker.can_execute() {
            metrics::record_follow_check_bypass();
            tracing::warn!(
                members = ?user_ids,
                "Follow-check circuit open, creating room without mutual-follow validation"
            );
            return Ok(());
        }

        let checks = pairs
            .iter()
            .map(|&(a, b)| self.follow_checker.is_following(a, b));
        let results = futures::future::join_all(checks).await;

        let mut failed_call = false;
        for (&(follower, followee), result) in pairs.iter().zip(results) {
            match result {
                Ok(true) => {}
                Ok(false) => {
                    self.follow_breaker.record_success();
                    return Err(AppError::Authorization(format!(
                        "Users {} and {} must follow each other",
                        follower, followee
                    )));
                }
                Err(e) => {
                    failed_call = true;
                    tracing::error!(
                        follower,
                        followee,
                        error = %e,
                        "Follow check call failed"
                    );
                }
            }
        }

        if failed_call {
            self.follow_breaker.record_failure();
            metrics::record_follow_check_bypass();
            tracing::warn!(
                members = ?user_ids,
                "Follow check unavailable, creating room without mutual-follow validation"
            );
        } else {
            self.follow_breaker.record_success();
        }

        Ok(())
    }
}

#[async_trait]
impl<R, M, F> RoomService for RoomServiceImpl<R, M, F>
where
    R: RoomRepository + 'static,
    M: MemberRepository + 'static,
    F: FollowChecker + 'static,
{
    async fn create_room(
        &self,
        creator_id: i64,
        request: CreateRoomDto,
    ) -> Result<RoomDto, AppError> {
        self.rate_limiter
            .check(creator_id, RateCategory::RoomOperations)?;

        if !request.member_ids.contains(&creator_id) {
            return Err(AppError::Validation(
                "Room creator must be included in the member list".into(),
            ));
        }

        if request.room_type == RoomType::Dm && request.member_ids.len() != DM_MEMBER_COUNT {
            return Err(AppError::Validation(format!(
                "DM rooms require exactly {} members",
                DM_MEMBER_COUNT
            )));
        }

        self.ensure_mutual_follows(&request.member_ids).await?;

        let room = ChatRoom::new(request.name, request.room_type);
        let created = self
            .room_repo
            .create_with_members(&room, &request.member_ids)
            .await?;

        tracing::info!(
            room_id = %created.id,
            room_type = %created.room_type,
            members = request.member_ids.len(),
            "Room created"
        );

        Ok(RoomDto::from(created))
    }

    async fn find_or_create_dm(
        &self,
        requester_id: i64,
        peer_id: i64,
    ) -> Result<RoomDto, AppError> {
        self.rate_limiter
            .check(requester_id, RateCategory::RoomOperations)?;

        if requester_id == peer_id {
            return Err(AppError::Validation(
                "Cannot open a DM with yourself".into(),
            ));
        }

        self.ensure_mutual_follows(&[requester_id, peer_id]).await?;

        let room = self.room_repo.find_or_create_dm(requester_id, peer_id).await?;
        Ok(RoomDto::from(room))
    }

    async fn get_room(&self, room_id: Uuid) -> Result<RoomDto, AppError> {
        let room = self
            .room_repo
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".into()))?;
        Ok(RoomDto::from(room))
    }

    async fn require_membership(&self, room_id: Uuid, user_id: i64) -> Result<(), AppError> {
        if !self.member_repo.is_member(room_id, user_id).await? {
            return Err(AppError::Authorization(
                "You are not a member of this room".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitSettings;
    use crate::domain::{MockFollowChecker, MockMemberRepository, MockRoomRepository};
    use crate::infrastructure::stores::{CircuitBreakerConfig, SecurityEventLog};
    use mockall::predicate::eq;
    use std::time::Duration as StdDuration;

    fn limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(
            RateLimitSettings {
                messages_per_minute: 100,
                typing_per_minute: 100,
                room_operations_per_minute: 100,
            },
            Arc::new(SecurityEventLog::new()),
        ))
    }

    fn breaker() -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::with_config(
            "follow_check_test",
            CircuitBreakerConfig {
                failure_threshold: 5,
                open_timeout: StdDuration::from_millis(50),
            },
        ))
    }

    fn service(
        room_repo: MockRoomRepository,
        member_repo: MockMemberRepository,
        follow: MockFollowChecker,
        follow_breaker: Arc<CircuitBreaker>,
    ) -> RoomServiceImpl<MockRoomRepository, MockMemberRepository, MockFollowChecker> {
        RoomServiceImpl::new(
            Arc::new(room_repo),
            Arc::new(member_repo),
            Arc::new(follow),
            follow_breaker,
            limiter(),
        )
    }

    #[tokio::test]
    async fn dm_with_wrong_member_count_fails_regardless_of_follows() {
        let mut room_repo = MockRoomRepository::new();
        room_repo.expect_create_with_members().never();
        let mut follow = MockFollowChecker::new();
        follow.expect_is_following().never();

        let svc = service(room_repo, MockMemberRepository::new(), follow, breaker());
        let err = svc
            .create_room(
                1,
                CreateRoomDto {
                    name: None,
                    room_type: RoomType::Dm,
                    member_ids: vec![1, 2, 3],
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn creator_must_be_among_members() {
        let mut room_repo = MockRoomRepository::new();
        room_repo.expect_create_with_members().never();

        let svc = service(
            room_repo,
            MockMemberRepository::new(),
            MockFollowChecker::new(),
            breaker(),
        );
        let err = svc
            .create_room(
                9,
                CreateRoomDto {
                    name: Some("plans".into()),
                    room_type: RoomType::Group,
                    member_ids: vec![1, 2],
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn non_mutual_dm_is_rejected_without_persisting() {
        let mut room_repo = MockRoomRepository::new();
        room_repo.expect_find_or_create_dm().never();

        let mut follow = MockFollowChecker::new();
        // A follows B, but B does not follow A
        follow
            .expect_is_following()
            .with(eq(1), eq(2))
            .returning(|_, _| Ok(true));
        follow
            .expect_is_following()
            .with(eq(2), eq(1))
            .returning(|_, _| Ok(false));

        let svc = service(room_repo, MockMemberRepository::new(), follow, breaker());
        let err = svc.find_or_create_dm(1, 2).await.unwrap_err();

        match err {
            AppError::Authorization(msg) => {
                assert!(msg.contains('1') && msg.contains('2'), "names both users: {msg}");
            }
            other => panic!("expected authorization error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mutual_dm_is_created_with_both_members() {
        let mut room_repo = MockRoomRepository::new();
        room_repo
            .expect_find_or_create_dm()
            .with(eq(1), eq(2))
            .returning(|_, _| Ok(ChatRoom::new(None, RoomType::Dm)));

        let mut follow = MockFollowChecker::new();
        follow.expect_is_following().returning(|_, _| Ok(true));

        let svc = service(room_repo, MockMemberRepository::new(), follow, breaker());
        let room = svc.find_or_create_dm(1, 2).await.unwrap();
        assert_eq!(room.room_type, RoomType::Dm);
    }

    #[tokio::test]
    async fn group_creation_checks_all_directed_pairs() {
        let mut room_repo = MockRoomRepository::new();
        room_repo
            .expect_create_with_members()
            .returning(|room, _| Ok(room.clone()));

        let mut follow = MockFollowChecker::new();
        // 3 members -> 6 directed pairs
        follow.expect_is_following().times(6).returning(|_, _| Ok(true));

        let svc = service(room_repo, MockMemberRepository::new(), follow, breaker());
        svc.create_room(
            1,
            CreateRoomDto {
                name: Some("trio".into()),
                room_type: RoomType::Group,
                member_ids: vec![1, 2, 3],
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn open_breaker_bypasses_the_follow_check() {
        // default 60s cooldown keeps the breaker firmly open for this test
        let follow_breaker = Arc::new(CircuitBreaker::new("follow_check_bypass_test"));
        for _ in 0..5 {
            follow_breaker.record_failure();
        }

        let mut room_repo = MockRoomRepository::new();
        room_repo
            .expect_find_or_create_dm()
            .returning(|_, _| Ok(ChatRoom::new(None, RoomType::Dm)));

        let mut follow = MockFollowChecker::new();
        follow.expect_is_following().never();

        let svc = service(room_repo, MockMemberRepository::new(), follow, follow_breaker);
        // no follow relation exists, yet the DM is created while the breaker is open
        svc.find_or_create_dm(1, 2).await.unwrap();
    }

    #[tokio::test]
    async fn dependency_errors_degrade_to_bypass_and_count_against_breaker() {
        let follow_breaker = breaker();

        let mut room_repo = MockRoomRepository::new();
        room_repo
            .expect_find_or_create_dm()
            .returning(|_, _| Ok(ChatRoom::new(None, RoomType::Dm)));

        let mut follow = MockFollowChecker::new();
        follow
            .expect_is_following()
            .returning(|_, _| Err(AppError::Internal("follow service unreachable".into())));

        let svc = service(
            room_repo,
            MockMemberRepository::new(),
            follow,
            follow_breaker.clone(),
        );
        svc.find_or_create_dm(1, 2).await.unwrap();
        assert_eq!(follow_breaker.failure_count(), 1);
    }

    #[tokio::test]
    async fn membership_is_required_for_room_access() {
        let mut member_repo = MockMemberRepository::new();
        member_repo.expect_is_member().returning(|_, _| Ok(false));

        let svc = service(
            MockRoomRepository::new(),
            member_repo,
            MockFollowChecker::new(),
            breaker(),
        );
        let err = svc
            .require_membership(Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }
}
