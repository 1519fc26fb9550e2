use crate::game_manager::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use shared::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Connection id of a live session member to take over.
    pub resume: Option<String>,
    /// The `resumeToken` that member was given in its `welcome`.
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, params: ConnectParams) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Forward messages from the channel to the WebSocket
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode server message");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let player_id = match (params.resume, params.token) {
        (Some(id), Some(token)) if state.resume_connection(&id, &token, tx.clone()) => id,
        _ => {
            let id = uuid::Uuid::new_v4().to_string();
            state.add_connection(id.clone(), tx.clone());
            id
        }
    };

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => dispatch(&state, &player_id, client_msg).await,
                Err(e) => {
                    tracing::debug!(player_id = %player_id, error = %e, "Ignoring malformed frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Client disconnected
    state.remove_connection(&player_id, &tx).await;
    writer.abort();
}

async fn dispatch(state: &Arc<AppState>, player_id: &str, msg: ClientMessage) {
    match msg {
        ClientMessage::JoinMatchmaking => state.find_match(player_id.to_string()).await,
        ClientMessage::CancelMatchmaking => {
            state.cancel_matchmaking(player_id).await;
        }
        ClientMessage::SetTeam(request) => state.set_team(player_id, request),
        ClientMessage::SetReady(request) => state.set_ready(player_id, &request),
        ClientMessage::MoveUnit(request) => state.move_unit(player_id, request),
        ClientMessage::AttackUnit(request) => state.attack_unit(player_id, request),
        ClientMessage::RequestGameState(request) => {
            state.request_game_state(player_id, &request.session_id);
        }
        ClientMessage::LeaveGame => state.leave_game(player_id).await,
    }
}
