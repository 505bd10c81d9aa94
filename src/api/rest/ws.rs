use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::auth::Caller;
use crate::error::AppError;
use crate::notify::Room;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsParams {
    pub token: String,
}

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinBiddingRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveBiddingRoom { room_id: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
) -> Response {
    let Some(caller) = state.identity.resolve(&params.token) else {
        return AppError::Unauthorized("Invalid or expired token".to_string()).into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, caller))
}

/// A connection may listen to any bidding or load room, but only to its own
/// user room.
fn may_join(caller: &Caller, room: Room) -> bool {
    match room {
        Room::User(user_id) => user_id == caller.user_id,
        Room::Bidding(_) | Room::Load(_) => true,
    }
}

async fn reply(sender: &mut SplitSink<WebSocket, Message>, body: serde_json::Value) -> bool {
    sender.send(Message::Text(body.to_string())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, caller: Caller) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.notifier.subscribe();
    let mut rooms: HashSet<Room> = HashSet::from([Room::User(caller.user_id)]);

    info!(user_id = %caller.user_id, "websocket client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !rooms.contains(&event.room) {
                        continue;
                    }
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize room event for ws");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %caller.user_id, skipped, "websocket client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                };

                let response = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::JoinBiddingRoom { room_id }) => match room_id.parse::<Room>() {
                        Ok(room) if may_join(&caller, room) => {
                            rooms.insert(room);
                            debug!(user_id = %caller.user_id, %room, "joined room");
                            json!({ "event": "joined-room", "roomId": room })
                        }
                        Ok(room) => json!({ "event": "error", "message": format!("Not allowed to join {room}") }),
                        Err(err) => json!({ "event": "error", "message": err }),
                    },
                    Ok(ClientMessage::LeaveBiddingRoom { room_id }) => match room_id.parse::<Room>() {
                        Ok(room) => {
                            rooms.remove(&room);
                            json!({ "event": "left-room", "roomId": room })
                        }
                        Err(err) => json!({ "event": "error", "message": err }),
                    },
                    Err(err) => json!({ "event": "error", "message": format!("Unrecognized message: {err}") }),
                };

                if !reply(&mut sender, response).await {
                    break;
                }
            }
        }
    }

    info!(user_id = %caller.user_id, "websocket client disconnected");
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::may_join;
    use crate::auth::Caller;
    use crate::models::user::Role;
    use crate::notify::Room;

    #[test]
    fn user_rooms_are_private() {
        let caller = Caller {
            user_id: Uuid::new_v4(),
            role: Role::VehicleOwner,
        };

        assert!(may_join(&caller, Room::User(caller.user_id)));
        assert!(!may_join(&caller, Room::User(Uuid::new_v4())));
        assert!(may_join(&caller, Room::Bidding(Uuid::new_v4())));
        assert!(may_join(&caller, Room::Load(Uuid::new_v4())));
    }
}
