//! WebSocket Gateway
//!
//! Connection registry and room presence tracking. Presence is explicit:
//! subscriptions are updated synchronously on join/leave/disconnect, so the
//! active-user set for a room is derived from live connections without
//! introspecting transport internals.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::ServerEvent;

/// Connected session with its outbound event channel.
pub struct ConnectedSession {
    pub user_id: i64,
    pub session_id: String,
    pub sender: mpsc::UnboundedSender<ServerEvent>,
}

/// WebSocket gateway managing all connections and room subscriptions.
pub struct ChatGateway {
    /// Active sessions by session_id
    sessions: DashMap<String, Arc<ConnectedSession>>,
    /// User ID to session IDs mapping (one user can have multiple sessions)
    user_sessions: DashMap<i64, Vec<String>>,
    /// Room ID to subscribed session IDs (presence)
    room_sessions: DashMap<Uuid, Vec<String>>,
    /// Session ID to subscribed room IDs (reverse index for cleanup)
    session_rooms: DashMap<String, Vec<Uuid>>,
}

impl ChatGateway {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            user_sessions: DashMap::new(),
            room_sessions: DashMap::new(),
            session_rooms: DashMap::new(),
        }
    }

    /// Register a new connected session.
    pub fn register_session(
        &self,
        session_id: String,
        user_id: i64,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        let session = Arc::new(ConnectedSession {
            user_id,
            session_id: session_id.clone(),
            sender,
        });

        self.sessions.insert(session_id.clone(), session);
        self.user_sessions
            .entry(user_id)
            .or_default()
            .push(session_id.clone());

        tracing::info!(user_id, session_id = %session_id, "Session registered");
    }

    /// Unregister a session, dropping all its room subscriptions.
    ///
    /// Returns the rooms the session was subscribed to so the caller can
    /// broadcast departure events.
    pub fn unregister_session(&self, session_id: &str) -> Vec<Uuid> {
        let rooms = self
            .session_rooms
            .remove(session_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default();

        for room_id in &rooms {
            if let Some(mut sessions) = self.room_sessions.get_mut(room_id) {
                sessions.retain(|s| s != session_id);
            }
        }

        if let Some((_, session)) = self.sessions.remove(session_id) {
            if let Some(mut sessions) = self.user_sessions.get_mut(&session.user_id) {
                sessions.retain(|s| s != session_id);
            }
            tracing::info!(
                user_id = session.user_id,
                session_id = %session_id,
                "Session unregistered"
            );
        }

        rooms
    }

    /// Subscribe a session to a room's events.
    pub fn subscribe_to_room(&self, session_id: &str, room_id: Uuid) {
        let mut sessions = self.room_sessions.entry(room_id).or_default();
        if !sessions.iter().any(|s| s == session_id) {
            sessions.push(session_id.to_string());
        }
        drop(sessions);

        let mut rooms = self.session_rooms.entry(session_id.to_string()).or_default();
        if !rooms.contains(&room_id) {
            rooms.push(room_id);
        }
    }

    /// Unsubscribe a session from a room's events.
    pub fn unsubscribe_from_room(&self, session_id: &str, room_id: Uuid) {
        if let Some(mut sessions) = self.room_sessions.get_mut(&room_id) {
            sessions.retain(|s| s != session_id);
        }
        if let Some(mut rooms) = self.session_rooms.get_mut(session_id) {
            rooms.retain(|r| *r != room_id);
        }
    }

    /// User ids with at least one live connection subscribed to the room.
    ///
    /// Best-effort by design: a user who joined but already disconnected is
    /// not in the set.
    pub fn active_users(&self, room_id: Uuid) -> HashSet<i64> {
        let Some(session_ids) = self.room_sessions.get(&room_id) else {
            return HashSet::new();
        };

        session_ids
            .iter()
            .filter_map(|sid| self.sessions.get(sid).map(|s| s.user_id))
            .collect()
    }

    /// Send an event to every session subscribed to a room.
    pub fn send_to_room(&self, room_id: Uuid, event: ServerEvent) {
        self.send_to_room_filtered(room_id, event, None)
    }

    /// Send an event to a room, skipping one session (usually the origin).
    pub fn send_to_room_except(&self, room_id: Uuid, except_session: &str, event: ServerEvent) {
        self.send_to_room_filtered(room_id, event, Some(except_session))
    }

    fn send_to_room_filtered(
        &self,
        room_id: Uuid,
        event: ServerEvent,
        except_session: Option<&str>,
    ) {
        if let Some(session_ids) = self.room_sessions.get(&room_id) {
            for session_id in session_ids.iter() {
                if Some(session_id.as_str()) == except_session {
                    continue;
                }
                if let Some(session) = self.sessions.get(session_id) {
                    let _ = session.sender.send(event.clone());
                }
            }
        }
    }

    /// Send an event to all sessions of a user.
    pub fn send_to_user(&self, user_id: i64, event: ServerEvent) {
        if let Some(session_ids) = self.user_sessions.get(&user_id) {
            for session_id in session_ids.iter() {
                if let Some(session) = self.sessions.get(session_id) {
                    let _ = session.sender.send(event.clone());
                }
            }
        }
    }

    /// Get session count.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Check if user is online (has at least one session).
    pub fn is_user_online(&self, user_id: i64) -> bool {
        self.user_sessions
            .get(&user_id)
            .map(|sessions| !sessions.is_empty())
            .unwrap_or(false)
    }
}

impl Default for ChatGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(gateway: &ChatGateway, user_id: i64) -> (String, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4().to_string();
        gateway.register_session(session_id.clone(), user_id, tx);
        (session_id, rx)
    }

    #[test]
    fn active_users_reflects_subscriptions() {
        let gateway = ChatGateway::new();
        let room = Uuid::new_v4();
        let (alice, _rx_a) = connect(&gateway, 1);
        let (bob, _rx_b) = connect(&gateway, 2);
        let (_carol, _rx_c) = connect(&gateway, 3);

        gateway.subscribe_to_room(&alice, room);
        gateway.subscribe_to_room(&bob, room);

        assert_eq!(gateway.active_users(room), HashSet::from([1, 2]));

        gateway.unsubscribe_from_room(&bob, room);
        assert_eq!(gateway.active_users(room), HashSet::from([1]));
    }

    #[test]
    fn disconnect_clears_presence() {
        let gateway = ChatGateway::new();
        let room = Uuid::new_v4();
        let (alice, _rx) = connect(&gateway, 1);
        gateway.subscribe_to_room(&alice, room);

        let rooms = gateway.unregister_session(&alice);
        assert_eq!(rooms, vec![room]);
        assert!(gateway.active_users(room).is_empty());
        assert!(!gateway.is_user_online(1));
    }

    #[test]
    fn room_broadcast_skips_the_excepted_session() {
        let gateway = ChatGateway::new();
        let room = Uuid::new_v4();
        let (alice, mut rx_a) = connect(&gateway, 1);
        let (bob, mut rx_b) = connect(&gateway, 2);
        gateway.subscribe_to_room(&alice, room);
        gateway.subscribe_to_room(&bob, room);

        gateway.send_to_room_except(
            room,
            &alice,
            ServerEvent::UserJoined {
                chat_room_id: room,
                user_id: 1,
            },
        );

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn send_to_user_reaches_every_session_of_that_user() {
        let gateway = ChatGateway::new();
        let (_first, mut rx1) = connect(&gateway, 1);
        let (_second, mut rx2) = connect(&gateway, 1);

        gateway.send_to_user(
            1,
            ServerEvent::Notification {
                message: "hello".into(),
            },
        );

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn duplicate_subscription_is_idempotent() {
        let gateway = ChatGateway::new();
        let room = Uuid::new_v4();
        let (alice, mut rx) = connect(&gateway, 1);
        gateway.subscribe_to_room(&alice, room);
        gateway.subscribe_to_room(&alice, room);

        gateway.send_to_room(
            room,
            ServerEvent::Notification {
                message: "once".into(),
            },
        );
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "no duplicate delivery");
    }
}
