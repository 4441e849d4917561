//! WebSocket Connection Handler
//!
//! Handles individual connections: handshake authentication, session
//! minting, the per-connection command loop, and fan-out of room events.
//! Commands from one connection are processed strictly in arrival order;
//! there is no ordering guarantee across connections.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{ClientCommand, ServerEvent};
use crate::application::{
    MessageService, MessageServiceImpl, RoomService, RoomServiceImpl, SendMessageDto,
    UnreadPropagator,
};
use crate::infrastructure::metrics;
use crate::infrastructure::repositories::{
    PgFollowChecker, PgMemberRepository, PgMessageRepository, PgRoomRepository,
};
use crate::infrastructure::stores::{RateCategory, Session};
use crate::shared::error::AppError;
use crate::startup::AppState;

type RoomSvc = RoomServiceImpl<PgRoomRepository, PgMemberRepository, PgFollowChecker>;
type MessageSvc = MessageServiceImpl<PgMessageRepository, PgMemberRepository>;

/// Handshake query parameters; the bearer token may ride here instead of an
/// Authorization header.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Authentication happens before the upgrade: a bad credential is rejected
/// with a 401 response instead of a doomed socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let header_token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    let token = header_token.or(query.token.as_deref());

    let session = match state.verifier.authenticate_connection(token, &state.sessions) {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!(error = %e, "WebSocket handshake rejected");
            return e.into_response();
        }
    };

    let max_message_size = state.settings.websocket.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, session))
}

/// Handle one authenticated WebSocket connection until it closes.
async fn handle_socket(socket: WebSocket, state: AppState, session: Session) {
    let session_id = session.session_id.clone();
    let user_id = session.user_id;

    tracing::info!(user_id, session_id = %session_id, "User connected");
    metrics::WS_CONNECTIONS_ACTIVE.inc();

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Channel for outgoing events
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Forward events from the channel to the socket
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    state
        .gateway
        .register_session(session_id.clone(), user_id, tx.clone());

    let _ = tx.send(ServerEvent::Ready {
        session_id: session_id.clone(),
        user_id,
        encryption_enabled: state.cipher.is_enabled(),
    });

    let handler = CommandHandler::new(state.clone(), session_id.clone(), user_id);

    // Main loop: commands are awaited one at a time, preserving per-connection
    // arrival order.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handler.handle(&text, &tx).await {
                    let fatal = e.is_fatal();
                    let _ = tx.send(ServerEvent::from(&e));
                    if fatal {
                        tracing::info!(
                            user_id,
                            session_id = %session_id,
                            error = %e,
                            "Terminating connection"
                        );
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(session_id = %session_id, "Connection closed by client");
                break;
            }
            Ok(Message::Ping(_)) => {
                // Pong is handled automatically by axum
            }
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Cleanup: disconnection never aborts in-flight writes, it only releases
    // presence and session state.
    let rooms = state.gateway.unregister_session(&session_id);
    for room_id in rooms {
        state.gateway.send_to_room(
            room_id,
            ServerEvent::UserLeft {
                chat_room_id: room_id,
                user_id,
            },
        );
    }
    state.sessions.remove(&session_id);
    sender_task.abort();
    metrics::WS_CONNECTIONS_ACTIVE.dec();

    tracing::info!(user_id, session_id = %session_id, "User disconnected");
}

/// Per-connection command dispatcher.
///
/// Owns the service instances for this connection; every command re-validates
/// the session and the relevant membership before touching state.
struct CommandHandler {
    state: AppState,
    session_id: String,
    user_id: i64,
    room_service: RoomSvc,
    message_service: MessageSvc,
    unread: UnreadPropagator<PgMemberRepository>,
}

impl CommandHandler {
    fn new(state: AppState, session_id: String, user_id: i64) -> Self {
        let room_service = RoomServiceImpl::new(
            Arc::new(PgRoomRepository::new(state.db.clone())),
            Arc::new(PgMemberRepository::new(state.db.clone())),
            Arc::new(PgFollowChecker::new(state.db.clone())),
            state.follow_breaker.clone(),
            state.rate_limiter.clone(),
        );
        let message_service = MessageServiceImpl::new(
            Arc::new(PgMessageRepository::new(state.db.clone())),
            Arc::new(PgMemberRepository::new(state.db.clone())),
            state.cipher.clone(),
            state.rate_limiter.clone(),
            state.dedup.clone(),
        );
        let unread = UnreadPropagator::new(Arc::new(PgMemberRepository::new(state.db.clone())));

        Self {
            state,
            session_id,
            user_id,
            room_service,
            message_service,
            unread,
        }
    }

    /// Parse and dispatch one inbound frame.
    async fn handle(
        &self,
        text: &str,
        tx: &mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(), AppError> {
        // fails closed: a revoked or expired session kills the connection
        self.state.sessions.validate(&self.session_id)?;

        let command: ClientCommand = serde_json::from_str(text)
            .map_err(|e| AppError::Validation(format!("Malformed command: {}", e)))?;

        let name = command.name();
        let result = match command {
            ClientCommand::JoinRoom { chat_room_id } => self.join_room(chat_room_id, tx).await,
            ClientCommand::LeaveRoom { chat_room_id } => self.leave_room(chat_room_id, tx).await,
            ClientCommand::SendMessage {
                chat_room_id,
                content,
                message_type,
                message_id,
            } => {
                self.send_message(
                    chat_room_id,
                    SendMessageDto {
                        content,
                        message_type,
                        client_message_id: message_id,
                    },
                )
                .await
            }
            ClientCommand::Typing {
                chat_room_id,
                is_typing,
            } => self.typing(chat_room_id, is_typing).await,
        };

        metrics::record_command(name, if result.is_ok() { "ok" } else { "error" });
        result
    }

    /// Subscribe to a room. Joining resets the unread count to zero, since
    /// the member is now looking at the history.
    async fn join_room(
        &self,
        chat_room_id: Uuid,
        tx: &mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(), AppError> {
        self.state
            .rate_limiter
            .check(self.user_id, RateCategory::RoomOperations)?;

        self.room_service.get_room(chat_room_id).await?;
        self.room_service
            .require_membership(chat_room_id, self.user_id)
            .await?;

        self.state
            .gateway
            .subscribe_to_room(&self.session_id, chat_room_id);
        self.message_service
            .mark_read(self.user_id, chat_room_id)
            .await?;

        let _ = tx.send(ServerEvent::JoinedRoom { chat_room_id });
        let _ = tx.send(ServerEvent::UnreadCountUpdated {
            chat_room_id,
            unread_count: 0,
        });
        self.state.gateway.send_to_room_except(
            chat_room_id,
            &self.session_id,
            ServerEvent::UserJoined {
                chat_room_id,
                user_id: self.user_id,
            },
        );

        tracing::debug!(
            user_id = self.user_id,
            room_id = %chat_room_id,
            "Joined room"
        );
        Ok(())
    }

    async fn leave_room(
        &self,
        chat_room_id: Uuid,
        tx: &mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(), AppError> {
        self.state
            .rate_limiter
            .check(self.user_id, RateCategory::RoomOperations)?;
        self.room_service
            .require_membership(chat_room_id, self.user_id)
            .await?;

        self.state
            .gateway
            .unsubscribe_from_room(&self.session_id, chat_room_id);

        let _ = tx.send(ServerEvent::LeftRoom { chat_room_id });
        self.state.gateway.send_to_room_except(
            chat_room_id,
            &self.session_id,
            ServerEvent::UserLeft {
                chat_room_id,
                user_id: self.user_id,
            },
        );
        Ok(())
    }

    /// Send a message and fan out the consequences: broadcast to active
    /// subscribers, advance their read marks, and push unread totals to
    /// everyone else.
    async fn send_message(
        &self,
        chat_room_id: Uuid,
        request: SendMessageDto,
    ) -> Result<(), AppError> {
        let Some(message) = self
            .message_service
            .send_message(self.user_id, chat_room_id, request)
            .await?
        else {
            // duplicate retry: dropped with no error and no side effect
            return Ok(());
        };

        let chat_room = self.room_service.get_room(chat_room_id).await?;
        let sent_at = message.created_at;

        self.state.gateway.send_to_room(
            chat_room_id,
            ServerEvent::NewMessage {
                message,
                chat_room,
            },
        );

        let active_users = self.state.gateway.active_users(chat_room_id);
        let updates = self
            .unread
            .after_message(chat_room_id, self.user_id, &active_users, sent_at)
            .await?;

        for update in updates {
            self.state.gateway.send_to_user(
                update.user_id,
                ServerEvent::UnreadCountUpdated {
                    chat_room_id: update.chat_room_id,
                    unread_count: update.unread_count,
                },
            );
        }

        Ok(())
    }

    async fn typing(&self, chat_room_id: Uuid, is_typing: bool) -> Result<(), AppError> {
        self.state
            .rate_limiter
            .check(self.user_id, RateCategory::Typing)?;
        self.room_service
            .require_membership(chat_room_id, self.user_id)
            .await?;

        self.state.gateway.send_to_room_except(
            chat_room_id,
            &self.session_id,
            ServerEvent::TypingStatus {
                chat_room_id,
                user_id: self.user_id,
                is_typing,
            },
        );
        Ok(())
    }
}
