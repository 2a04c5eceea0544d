use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    broadcast::topic_for,
    error::{AppError, Result},
    notification::RecipientId,
    state::AppState,
    websocket::types::{AllReadPayload, ClientMessage, ErrorPayload, NotificationReadPayload, WsMessage},
};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(recipient_id): Path<RecipientId>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, recipient_id, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, recipient_id: RecipientId, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    tracing::info!("Recipient {} connected via WebSocket", recipient_id);

    // Forward the recipient's topic into the outgoing channel
    let events_tx = tx.clone();
    let mut events = Box::pin(state.notification_bus.subscribe(topic_for(recipient_id)));
    let mut events_task = tokio::spawn(async move {
        while let Some(message) = events.next().await {
            if events_tx.send(WsMessage::Notification(message)).is_err() {
                break;
            }
        }
    });

    // Spawn task to send messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Spawn task to receive messages from WebSocket
    let state_clone = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match process_client_message(&text, recipient_id, &state_clone).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            tracing::error!("Error processing message: {:?}", e);
                            WsMessage::Error(ErrorPayload {
                                message: e.to_string(),
                            })
                        }
                    };
                    if tx.send(reply).is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for any task to finish
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            events_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
            events_task.abort();
        }
        _ = &mut events_task => {
            send_task.abort();
            recv_task.abort();
        }
    }

    tracing::info!("WebSocket connection closed for recipient {}", recipient_id);
}

/// Process incoming client messages
pub(crate) async fn process_client_message(
    text: &str,
    recipient_id: RecipientId,
    state: &AppState,
) -> Result<WsMessage> {
    let client_msg: ClientMessage = serde_json::from_str(text)
        .map_err(|e| AppError::BadRequest(format!("Invalid message format: {}", e)))?;

    match client_msg {
        ClientMessage::MarkRead { id } => {
            let notification = state.store.mark_read_for_recipient(recipient_id, id).await?;
            let read_at = notification
                .read_at
                .map(|t| t.to_rfc3339())
                .ok_or(AppError::InternalError)?;

            Ok(WsMessage::NotificationRead(NotificationReadPayload { id, read_at }))
        }
        ClientMessage::MarkAllRead => {
            let affected = state.store.mark_all_read(recipient_id).await?;
            Ok(WsMessage::AllRead(AllReadPayload { affected }))
        }
    }
}
