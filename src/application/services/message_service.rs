//! Message Service
//!
//! The send/read/edit state machine: rate limit, membership re-check,
//! dedup, sanitize, conditional encryption, persistence, last-read
//! bookkeeping. Callers always receive decrypted views; ciphertext never
//! leaves the service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{MemberRepository, Message, MessageRepository, MessageType};
use crate::infrastructure::crypto::{RoomCipher, DECRYPT_PLACEHOLDER};
use crate::infrastructure::metrics;
use crate::infrastructure::stores::{MessageDeduplicator, RateCategory, RateLimiter};
use crate::shared::error::AppError;
use crate::shared::sanitize::sanitize_content;

/// Message service trait
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Send a message to a room.
    ///
    /// Returns `None` when the send was a duplicate retry and was silently
    /// dropped; the transport must not emit anything in that case.
    async fn send_message(
        &self,
        author_id: i64,
        chat_room_id: Uuid,
        request: SendMessageDto,
    ) -> Result<Option<MessageDto>, AppError>;

    /// Edit a message. Only the original author may edit.
    async fn update_message(
        &self,
        author_id: i64,
        message_id: Uuid,
        content: &str,
    ) -> Result<MessageDto, AppError>;

    /// Get messages from a room with cursor-based pagination.
    async fn get_messages(
        &self,
        user_id: i64,
        chat_room_id: Uuid,
        before: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<Vec<MessageDto>, AppError>;

    /// Advance the user's last-read mark to now.
    async fn mark_read(&self, user_id: i64, chat_room_id: Uuid) -> Result<(), AppError>;
}

/// Send message request
#[derive(Debug, Clone)]
pub struct SendMessageDto {
    pub content: String,
    pub message_type: Option<MessageType>,
    /// Client-supplied id for idempotent retries over the at-least-once
    /// transport
    pub client_message_id: Option<String>,
}

/// Message data transfer object: the decrypted view handed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub chat_room_id: Uuid,
    pub author_id: i64,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub is_encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// MessageService implementation
pub struct MessageServiceImpl<M, Mem>
where
    M: MessageRepository,
    Mem: MemberRepository,
{
    message_repo: Arc<M>,
    member_repo: Arc<Mem>,
    cipher: RoomCipher,
    rate_limiter: Arc<RateLimiter>,
    dedup: Arc<MessageDeduplicator>,
}

impl<M, Mem> MessageServiceImpl<M, Mem>
where
    M: MessageRepository,
    Mem: MemberRepository,
{
    pub fn new(
        message_repo: Arc<M>,
        member_repo: Arc<Mem>,
        cipher: RoomCipher,
        rate_limiter: Arc<RateLimiter>,
        dedup: Arc<MessageDeduplicator>,
    ) -> Self {
        Self {
            message_repo,
            member_repo,
            cipher,
            rate_limiter,
            dedup,
        }
    }

    async fn require_membership(&self, chat_room_id: Uuid, user_id: i64) -> Result<(), AppError> {
        if !self.member_repo.is_member(chat_room_id, user_id).await? {
            return Err(AppError::Authorization(
                "You are not a member of this room".into(),
            ));
        }
        Ok(())
    }

    /// Produce the decrypted view of a stored message.
    ///
    /// Any decryption failure degrades to the placeholder so one corrupt
    /// message cannot block retrieval of the rest of the history.
    async fn to_view(&self, message: Message) -> MessageDto {
        let content = if !message.is_encrypted {
            message.content.clone()
        } else {
            match (&message.iv, &message.tag) {
                (Some(iv), Some(tag)) if self.cipher.is_enabled() => self
                    .cipher
                    .decrypt(message.chat_room_id, &message.content, iv, tag)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!(
                            message_id = %message.id,
                            room_id = %message.chat_room_id,
                            error = %e,
                            "Message decryption failed, substituting placeholder"
                        );
                        DECRYPT_PLACEHOLDER.to_string()
                    }),
                _ => {
                    tracing::warn!(
                        message_id = %message.id,
                        "Encrypted message missing key material, substituting placeholder"
                    );
                    DECRYPT_PLACEHOLDER.to_string()
                }
            }
        };

        MessageDto {
            id: message.id,
            chat_room_id: message.chat_room_id,
            author_id: message.author_id,
            content,
            message_type: message.message_type,
            is_encrypted: message.is_encrypted,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }

    /// Sanitize plaintext and seal it for storage if encryption is on.
    async fn seal(
        &self,
        chat_room_id: Uuid,
        raw_content: &str,
    ) -> Result<(String, bool, Option<String>, Option<String>), AppError> {
        let plaintext = sanitize_content(raw_content)?;

        if !self.cipher.is_enabled() {
            return Ok((plaintext, false, None, None));
        }

        let sealed = self.cipher.encrypt(chat_room_id, &plaintext).await?;
        Ok((sealed.ciphertext, true, Some(sealed.iv), Some(sealed.tag)))
    }
}

#[async_trait]
impl<M, Mem> MessageService for MessageServiceImpl<M, Mem>
where
    M: MessageRepository + 'static,
    Mem: MemberRepository + 'static,
{
    async fn send_message(
        &self,
        author_id: i64,
        chat_room_id: Uuid,
        request: SendMessageDto,
    ) -> Result<Option<MessageDto>, AppError> {
        self.rate_limiter
            .check(author_id, RateCategory::Messages)?;
        self.require_membership(chat_room_id, author_id).await?;

        // idempotent retry: drop silently, no error, no side effect
        if let Some(client_id) = &request.client_message_id {
            if !self.dedup.insert(author_id, client_id) {
                metrics::record_dedup_drop();
                tracing::debug!(
                    author_id,
                    client_message_id = %client_id,
                    "Duplicate send dropped"
                );
                return Ok(None);
            }
        }

        let (content, is_encrypted, iv, tag) = self.seal(chat_room_id, &request.content).await?;

        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            chat_room_id,
            author_id,
            content,
            message_type: request.message_type.unwrap_or_default(),
            is_encrypted,
            iv,
            tag,
            created_at: now,
            updated_at: now,
        };

        let created = self.message_repo.create(&message).await?;

        // sending implies having read everything up to this point
        self.member_repo
            .update_last_read(chat_room_id, author_id, created.created_at)
            .await?;

        metrics::record_message_sent(is_encrypted);
        Ok(Some(self.to_view(created).await))
    }

    async fn update_message(
        &self,
        author_id: i64,
        message_id: Uuid,
        content: &str,
    ) -> Result<MessageDto, AppError> {
        let mut message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".into()))?;

        if message.author_id != author_id {
            return Err(AppError::Authorization(
                "Only the author can edit a message".into(),
            ));
        }

        let (sealed, is_encrypted, iv, tag) = self.seal(message.chat_room_id, content).await?;
        message.content = sealed;
        message.is_encrypted = is_encrypted;
        message.iv = iv;
        message.tag = tag;
        message.updated_at = Utc::now();

        let updated = self.message_repo.update(&message).await?;
        Ok(self.to_view(updated).await)
    }

    async fn get_messages(
        &self,
        user_id: i64,
        chat_room_id: Uuid,
        before: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<Vec<MessageDto>, AppError> {
        self.require_membership(chat_room_id, user_id).await?;

        let limit = limit.unwrap_or(50).clamp(1, 100);
        let messages = self
            .message_repo
            .find_by_room(chat_room_id, before, limit)
            .await?;

        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            views.push(self.to_view(message).await);
        }
        Ok(views)
    }

    async fn mark_read(&self, user_id: i64, chat_room_id: Uuid) -> Result<(), AppError> {
        self.require_membership(chat_room_id, user_id).await?;
        self.member_repo
            .update_last_read(chat_room_id, user_id, Utc::now())
            .await
    }
}
