//! Room Handlers
//!
//! HTTP surface for room creation and DM find-or-create. Everything else in
//! the chat domain rides the real-time channel.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::application::{CreateRoomDto, RoomDto, RoomService, RoomServiceImpl};
use crate::domain::RoomType;
use crate::infrastructure::repositories::{
    PgFollowChecker, PgMemberRepository, PgRoomRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

fn room_service(
    state: &AppState,
) -> RoomServiceImpl<PgRoomRepository, PgMemberRepository, PgFollowChecker> {
    RoomServiceImpl::new(
        Arc::new(PgRoomRepository::new(state.db.clone())),
        Arc::new(PgMemberRepository::new(state.db.clone())),
        Arc::new(PgFollowChecker::new(state.db.clone())),
        state.follow_breaker.clone(),
        state.rate_limiter.clone(),
    )
}

/// Create room request body
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub room_type: RoomType,
    #[validate(length(min = 1, message = "at least one member is required"))]
    pub member_ids: Vec<i64>,
}

/// Create DM request body
#[derive(Debug, Deserialize)]
pub struct CreateDmRequest {
    pub peer_id: i64,
}

/// POST /api/v1/rooms
pub async fn create_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomDto>), AppError> {
    payload.validate().map_err(validation_error)?;

    let room = room_service(&state)
        .create_room(
            auth.user_id,
            CreateRoomDto {
                name: payload.name,
                room_type: payload.room_type,
                member_ids: payload.member_ids,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

/// POST /api/v1/rooms/dm
pub async fn create_dm(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateDmRequest>,
) -> Result<Json<RoomDto>, AppError> {
    let room = room_service(&state)
        .find_or_create_dm(auth.user_id, payload.peer_id)
        .await?;
    Ok(Json(room))
}
