//! WebSocket transport: one route at `/`, one text frame per protocol message.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::dispatcher;
use crate::error::AppError;
use crate::state::AppState;

// ── Server startup ───────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_upgrade))
        .with_state(state)
}

/// Bind the configured address and serve until the runtime shuts down.
/// Only a failed bind is reported; connection errors end that connection.
pub async fn serve(state: Arc<AppState>) -> Result<(), AppError> {
    let addr = format!("{}:{}", state.settings.bind, state.settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::IoError {
            message: format!("Failed to bind {addr}: {e}"),
        })?;
    log::info!("Listening on ws://{addr}/");

    axum::serve(listener, router(state))
        .await
        .map_err(AppError::from)
}

async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

// ── Per-connection loop ──────────────────────────────────────────

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (frames_tx, frames_rx) = mpsc::unbounded_channel::<String>();
    let (echo_tx, echo_rx) = mpsc::unbounded_channel::<Bytes>();

    // Greeting goes into the queue before registration so it is always first.
    for frame in state.greeting() {
        let _ = frames_tx.send(frame.to_string());
    }
    let client = state.clients.add(frames_tx);

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(forward_outbound(sink, frames_rx, echo_rx));

    loop {
        tokio::select! {
            _ = &mut writer => break,
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    dispatcher::handle_frame(&state, client, text.as_str()).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = echo_tx.send(data);
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.clients.remove(client);
    writer.abort();
}

/// Write queued frames to the socket until either queue closes or a write fails.
async fn forward_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::UnboundedReceiver<String>,
    mut echoes: mpsc::UnboundedReceiver<Bytes>,
) {
    loop {
        let msg = tokio::select! {
            Some(text) = frames.recv() => Message::Text(text.into()),
            Some(data) = echoes.recv() => Message::Binary(data),
            else => break,
        };
        if sink.send(msg).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}
