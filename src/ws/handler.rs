//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Dispatcher, InputState, JoinProfile, WorldEvent};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::hub::{ConnectionChannels, ConnectionHub};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let channels = state.hub.register(connection_id);

    run_session(connection_id, ws_sink, ws_stream, channels, &state).await;

    // Body and session go away inside the world task; the hub entry after.
    state
        .world
        .send(WorldEvent::Disconnect { id: connection_id })
        .await;
    state.hub.unregister(&connection_id);

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut channels: ConnectionChannels,
    state: &AppState,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Writer task: direct + broadcast messages -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = next_outbound(connection_id, &mut channels).await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> world
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                let Some(event) = to_world_event(connection_id, client_msg, &rate_limiter, &state.hub) else {
                    continue;
                };

                if !state.world.send(event).await {
                    debug!(connection_id = %connection_id, "World stopped");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(connection_id = %connection_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Map a client message onto a world event. Rate-limited frames yield
/// `None`; pings are answered here and never reach the world.
fn to_world_event(
    connection_id: Uuid,
    msg: ClientMsg,
    rate_limiter: &ConnectionRateLimiter,
    hub: &ConnectionHub,
) -> Option<WorldEvent> {
    match msg {
        ClientMsg::Join {
            nickname,
            vehicle_model,
            color,
        } => Some(WorldEvent::Join {
            id: connection_id,
            profile: JoinProfile {
                nickname,
                vehicle_model,
                color,
            },
        }),
        ClientMsg::Input {
            accelerate,
            brake,
            steer_left,
            steer_right,
            gear,
        } => {
            if !rate_limiter.check_input() {
                warn!(connection_id = %connection_id, "Rate limited input message");
                return None;
            }
            Some(WorldEvent::Input {
                id: connection_id,
                input: InputState {
                    accelerate,
                    brake,
                    steer_left,
                    steer_right,
                    gear,
                },
            })
        }
        ClientMsg::Chat { message } => {
            if !rate_limiter.check_chat() {
                warn!(connection_id = %connection_id, "Rate limited chat message");
                return None;
            }
            Some(WorldEvent::Chat {
                id: connection_id,
                message,
            })
        }
        ClientMsg::Ping { t } => {
            hub.emit(connection_id, ServerMsg::Pong { t });
            None
        }
    }
}

/// Next message for the writer. Direct messages win over fan-out so
/// identity_assigned always precedes the roster push that follows a join.
async fn next_outbound(connection_id: Uuid, channels: &mut ConnectionChannels) -> Option<ServerMsg> {
    loop {
        tokio::select! {
            biased;
            direct = channels.direct_rx.recv() => return direct,
            fanout = channels.fanout_rx.recv() => match fanout {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        connection_id = %connection_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(connection_id = %connection_id, "Broadcast channel closed");
                    return None;
                }
            },
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
