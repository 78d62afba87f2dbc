//! The realtime websocket route: register the connection with the
//! process-local socket registry, relay outbound pushes to the wire, and
//! accept inbound subscribe/unsubscribe commands for rooms (group chats,
//! message threads).

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_realtime::SocketLocalRealtime;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SocketCommand {
    Subscribe { room: String },
    Unsubscribe { room: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(sockets): Extension<Arc<SocketLocalRealtime>>,
    Extension(auth): Extension<AuthenticatedClaw>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, sockets, auth.claw_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, sockets: Arc<SocketLocalRealtime>, claw_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let socket_id = sockets.register_socket(&claw_id, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&payload) else { continue };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let realtime = state.realtime.clone();
    let recv_claw_id = claw_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(Message::Text(text))) = receiver.next().await {
            let Ok(command) = serde_json::from_str::<SocketCommand>(&text) else { continue };
            match command {
                SocketCommand::Subscribe { room } => {
                    let _ = realtime.subscribe(&recv_claw_id, &room).await;
                }
                SocketCommand::Unsubscribe { room } => {
                    let _ = realtime.unsubscribe(&recv_claw_id, &room).await;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    sockets.remove_socket(socket_id);
}
