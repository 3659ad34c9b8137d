//! # camstream-server
//!
//! MJPEG stream server for Linux/desktop.
//!
//! Serves `GET /stream` from any [`CaptureDevice`](camstream_core::CaptureDevice)
//! using the same responder loop as the firmware. The blocking loop runs on a
//! `spawn_blocking` thread and feeds the HTTP body through a bounded channel.

pub mod connection;
pub mod server;
pub mod source;

pub use connection::{ChannelConnection, ConnectionClosed, StreamMessage};
pub use server::{router, HostConfig, ServerError, SharedCamera, StreamServer, STREAM_ROUTE};
pub use source::{DirectoryCamera, SourceError};
