//! Chat WebSocket handler
//!
//! Each connection runs three tasks:
//! - a sender task draining [`ChatMessageRoute`]s into the socket
//! - a reader task forwarding text frames into a bounded inbound queue
//! - a worker task owning the [`Session`] and processing the queue in order
//!
//! The reader cancels the session token whenever the client side ends, which
//! makes the worker abandon any in-flight backend call.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::llm::{SharedGenerator, generate_with_timeout};
use crate::core::registry::SessionEntry;
use crate::core::session::{Session, SessionId};
use crate::errors::{SessionError, SessionResult};
use crate::middleware::ClientIp;
use crate::state::AppState;

use super::messages::{ChatMessageRoute, ChatOutgoingMessage};

/// Outgoing route buffer
const CHANNEL_BUFFER_SIZE: usize = 64;

/// Utterances queued behind the one being processed
const INBOUND_QUEUE_SIZE: usize = 32;

/// Maximum WebSocket frame size (1 MiB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MiB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Time allowed for the close frame to flush before the sender is aborted
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Chat WebSocket handler
///
/// Upgrades the connection and runs one conversation session until either
/// side closes it.
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let client_ip = client_ip.map(|Extension(ClientIp(ip))| ip);
    debug!(client_ip = ?client_ip, "Chat WebSocket connection upgrade requested");

    let failed_state = state.clone();
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_failed_upgrade(move |e| {
            warn!(client_ip = ?client_ip, "Chat WebSocket upgrade failed: {}", e);
            if let Some(ip) = client_ip {
                failed_state.release_connection(ip);
            }
        })
        .on_upgrade(move |socket| handle_chat_socket(socket, state, client_ip))
}

/// Run one session over an upgraded socket.
async fn handle_chat_socket(socket: WebSocket, state: Arc<AppState>, client_ip: Option<IpAddr>) {
    let session_id = SessionId::new();
    let entry = SessionEntry::new(session_id, client_ip);
    let shutdown = entry.shutdown.clone();

    // Deregisters and frees the connection slot however this function exits
    let mut registration = state.sessions.register(entry);
    if let Some(ip) = client_ip {
        let slot_state = state.clone();
        registration = registration.with_release(move || slot_state.release_connection(ip));
    }

    let mut session = Session::new(session_id, state.context_builder());
    if let Err(e) = session.activate() {
        error!(session_id = %session_id, "Failed to activate session: {}", e);
        return;
    }

    info!(
        session_id = %session_id,
        client_ip = ?client_ip,
        active_sessions = state.sessions.len(),
        "Chat session connected"
    );

    let (mut sender, receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<ChatMessageRoute>(CHANNEL_BUFFER_SIZE);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(INBOUND_QUEUE_SIZE);

    // Sender task for outgoing messages
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                ChatMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                ChatMessageRoute::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let reader_task = tokio::spawn(read_frames(
        receiver,
        inbound_tx,
        message_tx.clone(),
        shutdown.clone(),
        session_id,
    ));

    let worker = tokio::spawn(run_worker(
        session,
        inbound_rx,
        message_tx.clone(),
        state.generator.clone(),
        state.generation_timeout(),
        shutdown.clone(),
    ));

    match worker_outcome(worker.await) {
        Ok(()) => {
            debug!(session_id = %session_id, "Chat worker finished");
        }
        Err(e @ (SessionError::Transport(_) | SessionError::Protocol(_))) => {
            warn!(session_id = %session_id, kind = e.kind(), "Chat session ended: {}", e);
        }
        Err(e) => {
            error!(session_id = %session_id, kind = e.kind(), "Chat session failed: {}", e);
        }
    }

    // Cleanup
    shutdown.cancel();
    reader_task.abort();
    let _ = message_tx.send(ChatMessageRoute::Close).await;
    drop(message_tx);
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }

    drop(registration);
    info!(session_id = %session_id, client_ip = ?client_ip, "Chat session closed");
}

/// Fold the joined worker into a session result. A panic or abort inside the
/// worker becomes [`SessionError::Unexpected`].
fn worker_outcome(joined: Result<SessionResult<()>, JoinError>) -> SessionResult<()> {
    match joined {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => {
            let payload = join_error.into_panic();
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(SessionError::Unexpected(format!("worker panicked: {reason}")))
        }
        Err(join_error) => Err(SessionError::Unexpected(format!(
            "worker cancelled: {join_error}"
        ))),
    }
}

/// Forward client frames into the inbound queue.
///
/// Always cancels `shutdown` on exit so the worker stops with it.
async fn read_frames(
    mut receiver: SplitStream<WebSocket>,
    inbound_tx: mpsc::Sender<String>,
    message_tx: mpsc::Sender<ChatMessageRoute>,
    shutdown: CancellationToken,
    session_id: SessionId,
) {
    loop {
        let frame = select! {
            _ = shutdown.cancelled() => break,
            frame = receiver.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                debug!(session_id = %session_id, "Received text message: {} bytes", text.len());
                if inbound_tx.send(text.to_string()).await.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Binary(data))) => {
                let e = SessionError::Protocol(format!(
                    "binary frame of {} bytes on a text-only channel",
                    data.len()
                ));
                warn!(session_id = %session_id, kind = e.kind(), "{}", e);
                let _ = message_tx.send(ChatMessageRoute::Close).await;
                break;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => {
                debug!(session_id = %session_id, "Chat WebSocket closed by client");
                break;
            }
            Some(Err(e)) => {
                let e = SessionError::Transport(e.to_string());
                warn!(session_id = %session_id, kind = e.kind(), "{}", e);
                break;
            }
        }
    }

    shutdown.cancel();
}

/// Process queued utterances strictly one at a time.
async fn run_worker(
    mut session: Session,
    mut inbound_rx: mpsc::Receiver<String>,
    message_tx: mpsc::Sender<ChatMessageRoute>,
    generator: SharedGenerator,
    timeout: Duration,
    shutdown: CancellationToken,
) -> SessionResult<()> {
    loop {
        let utterance = select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = inbound_rx.recv() => match next {
                Some(utterance) => utterance,
                None => break,
            },
        };

        let window = session.begin_turn(utterance)?;

        let outcome = select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(session_id = %session.id(), "Discarding in-flight generation for closed session");
                break;
            }
            outcome = generate_with_timeout(generator.as_ref(), &window, timeout) => outcome,
        };

        let reply = session.complete_turn(outcome)?;
        message_tx
            .send(ChatMessageRoute::Outgoing(ChatOutgoingMessage::from(reply)))
            .await
            .map_err(|_| SessionError::Transport("outgoing channel closed".to_string()))?;
    }

    session.close();
    Ok(())
}
