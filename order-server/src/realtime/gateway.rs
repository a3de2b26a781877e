//! WebSocket gateway
//!
//! GET /ws?token=<JWT>
//!
//! The token is optional. Browsers cannot set headers on WebSocket requests,
//! so a staff identity travels in the query string; it is validated once at
//! upgrade and then offered to the room join policy.
//!
//! Protocol:
//! - Client → Server: `join_restaurant`, `join_order`, `leave_restaurant`,
//!   `leave_order`
//! - Server → Client: `new_order`, `order_status`, `error`

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::error::AppError;
use shared::message::{ClientEvent, ServerEvent};
use tokio::time::Duration;

use super::ConnectionId;
use crate::auth::{CurrentUser, JwtError};
use crate::core::ServerState;
use crate::security_log;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<ServerState> {
    Router::new().route("/ws", get(handle_ws))
}

#[derive(Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    token: Option<String>,
}

/// GET /ws
pub async fn handle_ws(
    State(state): State<ServerState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let user = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => match state.jwt_service().validate_token(token) {
            Ok(claims) => Some(CurrentUser::from(claims)),
            Err(e) => {
                security_log!("WARN", "ws_auth_failed", error = format!("{}", e));
                return Err(match e {
                    JwtError::ExpiredToken => AppError::token_expired(),
                    _ => AppError::invalid_token("Invalid token"),
                });
            }
        },
        None => None,
    };

    Ok(ws.on_upgrade(move |socket| ws_session(socket, state, user)))
}

async fn ws_session(socket: WebSocket, state: ServerState, user: Option<CurrentUser>) {
    let (mut sink, mut stream) = socket.split();
    let (conn, mut events) = state.bus.connect();

    tracing::info!(
        connection_id = %conn,
        user_id = user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
        "Realtime connection opened"
    );

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            event = events.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_frame(&state, conn, user.as_ref(), text.as_str()).await
                            && send_event(&mut sink, &reply).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    let rooms = state.bus.disconnect(conn);
    tracing::info!(connection_id = %conn, rooms, "Realtime connection closed");
}

/// Apply one inbound frame; returns an error frame for the sender, if any
pub async fn handle_frame(
    state: &ServerState,
    conn: ConnectionId,
    user: Option<&CurrentUser>,
    text: &str,
) -> Option<ServerEvent> {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(connection_id = %conn, error = %e, "Unrecognized frame");
            return Some(error_frame("Unrecognized message"));
        }
    };

    let room = event.room();
    if event.is_join() {
        if let Err(denied) = state.room_access.authorize_join(&event, user).await {
            security_log!(
                "WARN",
                "room_join_denied",
                connection_id = conn.to_string(),
                room = room.to_string(),
                reason = denied.to_string()
            );
            return Some(error_frame(&denied.to_string()));
        }
        if let Err(e) = state.bus.join(conn, room) {
            return Some(error_frame(&e.to_string()));
        }
    } else if let Err(e) = state.bus.leave(conn, &room) {
        return Some(error_frame(&e.to_string()));
    }
    None
}

fn error_frame(message: &str) -> ServerEvent {
    ServerEvent::Error {
        message: message.to_string(),
    }
}

async fn send_event<S>(sink: &mut S, event: &ServerEvent) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(event).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::ROLE_STAFF;
    use crate::core::Config;
    use crate::directory::{InMemoryDirectory, Restaurant};
    use crate::realtime::RoomAccessMode;
    use shared::message::RoomKey;
    use std::sync::Arc;

    const SECRET: &str = "gateway-test-secret-long-enough-for-hs256";

    fn state(mode: RoomAccessMode) -> ServerState {
        let directory = InMemoryDirectory::new();
        directory.upsert_restaurant(Restaurant {
            id: "r1".into(),
            name: "Bistro".into(),
            address: String::new(),
            owner_id: "owner".into(),
            staff_ids: vec![],
        });
        let mut config = Config::for_tests(SECRET);
        config.room_access = mode;
        ServerState::in_memory(config, Arc::new(directory)).unwrap()
    }

    #[tokio::test]
    async fn test_join_and_leave_frames() {
        let state = state(RoomAccessMode::Open);
        let (conn, _rx) = state.bus.connect();

        let reply = handle_frame(
            &state,
            conn,
            None,
            r#"{"event":"join_restaurant","data":"r1"}"#,
        )
        .await;
        assert!(reply.is_none());
        assert!(state.bus.is_member(conn, &RoomKey::restaurant("r1")));

        handle_frame(&state, conn, None, r#"{"event":"join_order","data":{"id":"o1"}}"#).await;
        assert!(state.bus.is_member(conn, &RoomKey::order("o1")));

        handle_frame(&state, conn, None, r#"{"event":"leave_restaurant","data":"r1"}"#).await;
        assert!(!state.bus.is_member(conn, &RoomKey::restaurant("r1")));
        assert_eq!(state.bus.room_size(&RoomKey::restaurant("r1")), 0);
    }

    #[tokio::test]
    async fn test_garbage_frame_gets_error() {
        let state = state(RoomAccessMode::Open);
        let (conn, _rx) = state.bus.connect();

        let reply = handle_frame(&state, conn, None, "hello").await;
        assert!(matches!(reply, Some(ServerEvent::Error { .. })));
        assert_eq!(state.bus.membership_size(), 0);
    }

    #[tokio::test]
    async fn test_staff_token_mode_rejects_anonymous_join() {
        let state = state(RoomAccessMode::StaffToken);
        let (conn, _rx) = state.bus.connect();

        let reply = handle_frame(
            &state,
            conn,
            None,
            r#"{"event":"join_restaurant","data":"r1"}"#,
        )
        .await;
        assert!(matches!(reply, Some(ServerEvent::Error { .. })));
        assert!(!state.bus.is_member(conn, &RoomKey::restaurant("r1")));

        let owner = CurrentUser {
            id: "owner".into(),
            username: "owner".into(),
            role: ROLE_STAFF.into(),
        };
        let reply = handle_frame(
            &state,
            conn,
            Some(&owner),
            r#"{"event":"join_restaurant","data":"r1"}"#,
        )
        .await;
        assert!(reply.is_none());
        assert!(state.bus.is_member(conn, &RoomKey::restaurant("r1")));
    }
}
