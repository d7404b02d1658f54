//! HTTP/WebSocket front end: socket lifecycle, frame decoding, and the axum
//! router.
//!
//! Each WebSocket connection gets a session in the shared [`Hub`], a writer
//! task draining its outbox, and a reader task feeding decoded frames to the
//! hub. When either side stops, the session is reconciled out of its room.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use lantern_proto::codec;
use lantern_proto::signal::ServerMessage;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;

use crate::config::{DEFAULT_MAX_MESSAGE_SIZE, HubConfig};
use crate::hub::Hub;
use crate::rooms::{self, RoomRegistry};
use crate::session::ConnectionId;

/// Shared server state: the hub plus transport-level limits.
pub struct ServerState {
    /// Signaling state shared by all connections.
    pub hub: Hub,
    /// Frames larger than this are dropped unparsed.
    max_message_size: usize,
    /// Directory served for non-API paths, if any.
    static_dir: Option<PathBuf>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// Creates server state with default limits and no static files.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hub: Hub::new(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            static_dir: None,
        }
    }

    /// Creates server state from a resolved [`HubConfig`].
    #[must_use]
    pub fn with_config(config: &HubConfig) -> Self {
        let registry =
            RoomRegistry::with_limits(config.max_rooms, Box::new(rooms::random_access_code));
        Self {
            hub: Hub::with_registry(registry),
            max_message_size: config.max_message_size,
            static_dir: config.static_dir.clone(),
        }
    }

    /// Creates server state around an existing hub.
    #[must_use]
    pub const fn with_hub(hub: Hub, max_message_size: usize) -> Self {
        Self {
            hub,
            max_message_size,
            static_dir: None,
        }
    }
}

/// Handles an upgraded WebSocket connection.
///
/// The connection lifecycle:
/// 1. Create a session with an outbox channel.
/// 2. Spawn a writer task that encodes outbox messages as text frames.
/// 3. Read frames, decode them, and hand them to the hub.
/// 4. When either task ends, abort the other and reconcile the session.
pub async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let conn = state.hub.connect(tx);
    tracing::info!(conn = %conn, "connection opened");

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match codec::encode_server(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(conn = %conn, error = %e, "failed to encode outbound message");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                tracing::warn!(conn = %conn, "WebSocket write failed");
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => handle_frame(conn, text.as_str().as_bytes(), &reader_state),
                Message::Binary(data) => handle_frame(conn, &data, &reader_state),
                Message::Close(_) => {
                    tracing::debug!(conn = %conn, "received close frame");
                    break;
                }
                _ => {
                    // Ping/pong are answered by axum.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
            // An abort does not interrupt a frame already being applied.
            let _ = read_task.await;
        }
    }

    state.hub.disconnect(conn);
    tracing::info!(conn = %conn, "connection closed");
}

/// Decodes one inbound frame and applies it. Malformed frames are dropped.
fn handle_frame(conn: ConnectionId, bytes: &[u8], state: &ServerState) {
    match codec::decode_client(bytes, state.max_message_size) {
        Ok(msg) => state.hub.handle(conn, msg),
        Err(e) => {
            tracing::warn!(conn = %conn, error = %e, "dropping undecodable message");
        }
    }
}

/// Builds the axum router: `/ws`, `/api/status`, and optional static files.
pub fn router(state: Arc<ServerState>) -> axum::Router {
    let static_dir = state.static_dir.clone();

    let mut app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .route("/api/status", axum::routing::get(status_handler))
        .with_state(state);

    if let Some(dir) = static_dir {
        if dir.is_dir() {
            tracing::info!(dir = %dir.display(), "serving static files");
            app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
        } else {
            tracing::warn!(dir = %dir.display(), "static directory does not exist, skipping static file serving");
        }
    }

    app
}

/// Starts the hub on the given address with default state and returns the
/// bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ServerState::new())).await
}

/// Starts the hub with a pre-configured [`ServerState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ServerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_shutdown(addr, state, std::future::pending()).await
}

/// Starts the hub and stops accepting connections once `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_shutdown(
    addr: &str,
    state: Arc<ServerState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts the hub in-process for testing on an OS-assigned port.
#[cfg(test)]
pub async fn start_test_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server")
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// `GET /api/status`: room and connection counts.
async fn status_handler(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "rooms": state.hub.room_count(),
        "connections": state.hub.connection_count(),
    }))
}
