//! Message Handlers
//!
//! HTTP surface for message history, edits, and read marks.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::application::{MessageDto, MessageService, MessageServiceImpl};
use crate::infrastructure::repositories::{PgMemberRepository, PgMessageRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

fn message_service(
    state: &AppState,
) -> MessageServiceImpl<PgMessageRepository, PgMemberRepository> {
    MessageServiceImpl::new(
        Arc::new(PgMessageRepository::new(state.db.clone())),
        Arc::new(PgMemberRepository::new(state.db.clone())),
        state.cipher.clone(),
        state.rate_limiter.clone(),
        state.dedup.clone(),
    )
}

/// Message history query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Edit message request body
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessageRequest {
    #[validate(length(min = 1))]
    pub content: String,
}

/// GET /api/v1/rooms/{room_id}/messages
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    let messages = message_service(&state)
        .get_messages(auth.user_id, room_id, query.before, query.limit)
        .await?;
    Ok(Json(messages))
}

/// POST /api/v1/rooms/{room_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    message_service(&state)
        .mark_read(auth.user_id, room_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/messages/{message_id}
pub async fn update_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<UpdateMessageRequest>,
) -> Result<Json<MessageDto>, AppError> {
    payload.validate().map_err(validation_error)?;

    let message = message_service(&state)
        .update_message(auth.user_id, message_id, &payload.content)
        .await?;
    Ok(Json(message))
}
