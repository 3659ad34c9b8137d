//! MJPEG stream server.
//!
//! This module provides the HTTP server that handles:
//! - `GET /stream` with a multipart MJPEG response
//! - Single-viewer access to the capture device
//! - Bridging the blocking responder loop into an async response body

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use camstream_core::{serve_stream, CaptureDevice};

use crate::connection::{ChannelConnection, StreamMessage};

/// Route serving the MJPEG stream.
pub const STREAM_ROUTE: &str = "/stream";

/// Chunks buffered between the responder loop and the socket. One keeps
/// writes blocking until the transport has taken the previous chunk.
pub const CHUNK_QUEUE_DEPTH: usize = 1;

/// Capture device shared between requests. Only one stream may hold it.
pub type SharedCamera<D> = Arc<Mutex<D>>;

/// Errors from running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration for the host stream server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Directory with the JPEG files to play back.
    pub frames_dir: PathBuf,
    /// Delay between frames in milliseconds.
    pub frame_interval_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            frames_dir: PathBuf::from("frames"),
            frame_interval_ms: 100,
        }
    }
}

impl HostConfig {
    /// Load the config from a JSON file, or use defaults if it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ServerError::Io(e)),
        };
        serde_json::from_str(&text).map_err(|source| ServerError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// The MJPEG stream server.
pub struct StreamServer<D> {
    bind_addr: SocketAddr,
    camera: SharedCamera<D>,
}

impl<D> StreamServer<D>
where
    D: CaptureDevice + Send + 'static,
{
    /// Create a server that will stream from `camera`.
    pub fn new(bind_addr: SocketAddr, camera: D) -> Self {
        Self {
            bind_addr,
            camera: Arc::new(Mutex::new(camera)),
        }
    }

    /// Handle to the shared capture device.
    pub fn camera(&self) -> SharedCamera<D> {
        self.camera.clone()
    }

    /// Build the HTTP router.
    pub fn router(&self) -> Router {
        router(self.camera.clone())
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        info!("Stream server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Router with the stream route bound to `camera`.
pub fn router<D>(camera: SharedCamera<D>) -> Router
where
    D: CaptureDevice + Send + 'static,
{
    Router::new()
        .route(STREAM_ROUTE, get(stream_handler::<D>))
        .layer(TraceLayer::new_for_http())
        .with_state(camera)
}

/// Take over the request and stream camera frames until it fails.
async fn stream_handler<D>(State(camera): State<SharedCamera<D>>) -> Response
where
    D: CaptureDevice + Send + 'static,
{
    let mut camera = match camera.try_lock_owned() {
        Ok(guard) => guard,
        Err(_) => {
            warn!("Rejecting viewer: stream already active");
            return (StatusCode::SERVICE_UNAVAILABLE, "Stream already in use").into_response();
        }
    };

    let (mut connection, mut rx) = ChannelConnection::channel(CHUNK_QUEUE_DEPTH);

    tokio::task::spawn_blocking(move || {
        let end = serve_stream(&mut *camera, &mut connection);
        if end.is_disconnect() {
            info!("Viewer disconnected after {} frames", end.frames_sent());
        } else {
            warn!("Stream ended: {}", end);
        }
    });

    match rx.recv().await {
        Some(StreamMessage::Begin(content_type)) => (
            [(header::CONTENT_TYPE, content_type)],
            Body::from_stream(body_stream(rx)),
        )
            .into_response(),
        Some(StreamMessage::ServerError) | None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some(StreamMessage::Chunk(_)) => {
            error!("Stream sent a chunk before committing the response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Drain body chunks from the responder until it stops sending.
fn body_stream(
    rx: mpsc::Receiver<StreamMessage>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    futures::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Some(StreamMessage::Chunk(bytes)) => Some((Ok(bytes), rx)),
            _ => None,
        }
    })
}
