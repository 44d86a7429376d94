//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! The first message starts a workout session; every later message is handed
//! to the `WorkoutConnection` that drives it.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    session_task::{Flow, WorkoutConnection},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitStream, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;
use workout_core::{ActiveWorkoutSession, PortError, SessionError, UserContext};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New WebSocket connection established for user: {}", user_id);

    // All outgoing frames go through one channel so the rest timer can report
    // ticks without sharing the socket.
    let (mut sender, mut receiver) = socket.split();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {:?}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                warn!("Failed to send message, client disconnected.");
                break;
            }
        }
        let _ = sender.close().await;
    });

    // --- 1. Initialization Phase ---
    let session = match start_session(&app_state, user_id, &mut receiver).await {
        Ok(session) => session,
        Err(message) => {
            let _ = events_tx.send(ServerMessage::Error { message });
            drop(events_tx);
            let _ = writer.await;
            return;
        }
    };
    let mut connection =
        WorkoutConnection::new(session, events_tx, app_state.config.rest_tick);

    // --- 2. Main Message Loop ---
    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                info!("Client sent close frame.");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                error!("WebSocket receive error: {:?}", e);
                break;
            }
        };

        if connection.handle_text(&text).await == Flow::Close {
            break;
        }
    }

    // --- 3. Teardown ---
    // Dropping the connection drops the last event sender, which ends the writer.
    connection.close().await;
    let _ = writer.await;
    info!("WebSocket connection closed for user: {}", user_id);
}

/// Waits for the `start` message and opens the session in the store.
/// Errors are returned as the message to show the client.
async fn start_session(
    app_state: &AppState,
    user_id: Uuid,
    receiver: &mut SplitStream<WebSocket>,
) -> Result<ActiveWorkoutSession, String> {
    let workout_id = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => {
            match serde_json::from_str::<ClientMessage>(&init_json) {
                Ok(ClientMessage::Start { workout_id }) => workout_id,
                _ => {
                    error!("First message was not a valid start message.");
                    return Err("The first message must start a workout.".to_string());
                }
            }
        }
        _ => {
            error!("Client disconnected before starting a workout.");
            return Err("No workout was started.".to_string());
        }
    };

    info!("Starting workout {} for user {}", workout_id, user_id);
    let workout = app_state
        .db
        .get_workout(user_id, workout_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => "Workout not found.".to_string(),
            other => {
                error!("Failed to load workout {}: {:?}", workout_id, other);
                "Failed to load workout data.".to_string()
            }
        })?;

    ActiveWorkoutSession::start(
        UserContext { user_id },
        app_state.store.clone(),
        app_state.clock.clone(),
        workout,
    )
    .await
    .map_err(|e| match e {
        SessionError::Persistence(_) => "Could not start the workout. Please try again.".to_string(),
        other => other.to_string(),
    })
}
