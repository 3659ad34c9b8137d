//! Channel-backed stream connection.
//!
//! The responder loop is blocking, while axum bodies are async streams. A
//! [`ChannelConnection`] sits on the blocking side and forwards every write
//! into a bounded tokio channel; the HTTP handler drains the receiver into
//! the response body. When the client disconnects, the body (and with it the
//! receiver) is dropped and the next write fails.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use camstream_core::StreamConnection;

/// Messages from the responder loop to the HTTP handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// Commit a 200 response with this content type.
    Begin(String),
    /// One body chunk.
    Chunk(Bytes),
    /// Answer with 500 instead.
    ServerError,
}

/// The receiving side is gone.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Client connection closed")]
pub struct ConnectionClosed;

/// Blocking [`StreamConnection`] that forwards into an mpsc channel.
///
/// Must be used from a blocking context (e.g. `spawn_blocking`), never from
/// inside an async task.
#[derive(Debug)]
pub struct ChannelConnection {
    tx: mpsc::Sender<StreamMessage>,
}

impl ChannelConnection {
    pub fn new(tx: mpsc::Sender<StreamMessage>) -> Self {
        Self { tx }
    }

    /// Create a connection and the receiver feeding the response.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<StreamMessage>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self::new(tx), rx)
    }

    fn send(&self, message: StreamMessage) -> Result<(), ConnectionClosed> {
        self.tx.blocking_send(message).map_err(|_| ConnectionClosed)
    }
}

impl StreamConnection for ChannelConnection {
    type Error = ConnectionClosed;

    fn begin_stream(&mut self, content_type: &str) -> Result<(), ConnectionClosed> {
        self.send(StreamMessage::Begin(content_type.to_string()))
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), ConnectionClosed> {
        // An empty body frame carries nothing; only report whether the client is still there.
        if chunk.is_empty() {
            return if self.tx.is_closed() {
                Err(ConnectionClosed)
            } else {
                Ok(())
            };
        }
        self.send(StreamMessage::Chunk(Bytes::copy_from_slice(chunk)))
    }

    fn send_server_error(&mut self) -> Result<(), ConnectionClosed> {
        self.send(StreamMessage::ServerError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwards_messages_in_order() {
        let (mut connection, mut rx) = ChannelConnection::channel(4);

        connection.begin_stream("multipart/x-mixed-replace; boundary=frame").unwrap();
        connection.send_chunk(b"abc").unwrap();
        connection.send_chunk(b"").unwrap();
        connection.send_server_error().unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            StreamMessage::Begin("multipart/x-mixed-replace; boundary=frame".to_string())
        );
        assert_eq!(rx.try_recv().unwrap(), StreamMessage::Chunk(Bytes::from_static(b"abc")));
        assert_eq!(rx.try_recv().unwrap(), StreamMessage::ServerError);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_write_fails_after_receiver_dropped() {
        let (mut connection, rx) = ChannelConnection::channel(1);
        drop(rx);

        assert_eq!(connection.send_chunk(b"frame"), Err(ConnectionClosed));
        assert_eq!(connection.send_chunk(b""), Err(ConnectionClosed));
        assert_eq!(connection.begin_stream("image/jpeg"), Err(ConnectionClosed));
    }
}
