use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use beamline_protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let connections = state.gateway.connections().clone();

    // Create channel for outbound messages
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = Uuid::new_v4();
    connections.add_connection(connection_id, tx).await;
    connections
        .send_to_connection(connection_id, &ServerMessage::Connected { connection_id })
        .await;

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let client_msg: ClientMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("Invalid message from {}: {}", connection_id, e);
                        connections
                            .send_to_connection(
                                connection_id,
                                &ServerMessage::Error {
                                    message: "Invalid message format".to_string(),
                                },
                            )
                            .await;
                        continue;
                    }
                };

                handle_client_message(&state, connection_id, client_msg).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::error!("WebSocket error for {}: {}", connection_id, e);
                break;
            }
            _ => {}
        }
    }

    // Cleanup on disconnect
    connections.remove_connection(connection_id).await;
    send_task.abort();
}

async fn handle_client_message(state: &AppState, connection_id: Uuid, message: ClientMessage) {
    match message {
        ClientMessage::Sdp { payload } => {
            if let Err(e) = state.gateway.receive(connection_id, payload).await {
                tracing::error!("Dropping offer from {}: {}", connection_id, e);
                state
                    .gateway
                    .connections()
                    .send_to_connection(
                        connection_id,
                        &ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }
        ClientMessage::Ping => {
            state
                .gateway
                .connections()
                .send_to_connection(connection_id, &ServerMessage::Pong)
                .await;
        }
    }
}
