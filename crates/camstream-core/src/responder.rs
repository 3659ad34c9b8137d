//! Streaming responder.
//!
//! Takes over one HTTP connection and feeds it camera frames for as long as
//! both the client and the camera keep up. The loop has no natural exit: it
//! ends only when a write to the connection fails or the camera fails to
//! produce a frame.

use std::fmt;

use log::{debug, error, info, trace, warn};
use thiserror::Error;

use crate::capture::{CaptureDevice, CaptureError};
use crate::multipart::{FramingError, PartHeader, PART_DELIMITER, STREAM_CONTENT_TYPE};

/// The response side of one accepted HTTP request.
///
/// Implementations:
/// - `EspStreamConnection` on ESP32 (esp-idf HTTP server)
/// - `ChannelConnection` on Linux (axum streaming body)
///
/// All methods block until the transport has accepted the data.
pub trait StreamConnection {
    type Error: fmt::Debug;

    /// Commit a `200 OK` response with the given content type.
    ///
    /// Called once, right before the first chunk.
    fn begin_stream(&mut self, content_type: &str) -> Result<(), Self::Error>;

    /// Send one chunk of the response body.
    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), Self::Error>;

    /// Answer with `500 Internal Server Error`.
    ///
    /// Only called while nothing has been committed yet.
    fn send_server_error(&mut self) -> Result<(), Self::Error>;
}

/// Why a stream ended.
#[derive(Debug, Error)]
pub enum StreamEnd<E: fmt::Debug> {
    /// The camera failed to produce a frame.
    #[error("Camera capture failed after {frames_sent} frames: {source}")]
    Capture {
        frames_sent: u64,
        #[source]
        source: CaptureError,
    },

    /// Writing to the connection failed, usually because the client left.
    #[error("Connection write failed after {frames_sent} frames: {error:?}")]
    Transport { frames_sent: u64, error: E },

    /// A part header could not be formatted.
    #[error("Framing failed after {frames_sent} frames: {source}")]
    Framing {
        frames_sent: u64,
        #[source]
        source: FramingError,
    },
}

impl<E: fmt::Debug> StreamEnd<E> {
    /// Number of complete frames delivered before the stream ended.
    pub fn frames_sent(&self) -> u64 {
        match self {
            StreamEnd::Capture { frames_sent, .. }
            | StreamEnd::Transport { frames_sent, .. }
            | StreamEnd::Framing { frames_sent, .. } => *frames_sent,
        }
    }

    /// True if the stream ended because the client went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, StreamEnd::Transport { .. })
    }
}

/// Stream frames from `device` to `connection` until one of them fails.
///
/// Every acquired frame is released before the next acquisition, including
/// when a write fails halfway through a part. A capture failure before the
/// first frame is answered with a server error; after that the response is
/// already committed and the connection is simply dropped.
pub fn serve_stream<D, C>(device: &mut D, connection: &mut C) -> StreamEnd<C::Error>
where
    D: CaptureDevice + ?Sized,
    C: StreamConnection + ?Sized,
{
    let mut committed = false;
    let mut frames_sent: u64 = 0;

    loop {
        let frame = match device.lease() {
            Ok(frame) => frame,
            Err(source) => {
                error!("Camera capture failed: {}", source);
                if !committed {
                    if let Err(e) = connection.send_server_error() {
                        debug!("Failed to send server error: {:?}", e);
                    }
                }
                return StreamEnd::Capture {
                    frames_sent,
                    source,
                };
            }
        };

        if !committed {
            if let Err(error) = connection.begin_stream(STREAM_CONTENT_TYPE) {
                return StreamEnd::Transport { frames_sent, error };
            }
            committed = true;
            info!("Stream started");
        }

        let header = match PartHeader::new(frame.len()) {
            Ok(header) => header,
            Err(source) => {
                warn!("Dropping stream: {}", source);
                return StreamEnd::Framing {
                    frames_sent,
                    source,
                };
            }
        };

        for chunk in [header.as_bytes(), frame.bytes(), PART_DELIMITER] {
            if let Err(error) = connection.send_chunk(chunk) {
                debug!("Client write failed after {} frames", frames_sent);
                return StreamEnd::Transport { frames_sent, error };
            }
        }

        trace!("Sent frame {} ({} bytes)", frames_sent, frame.len());
        drop(frame);
        frames_sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::PART_DELIMITER_LEN;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Acquire,
        Release,
        Begin(String),
        Chunk(Vec<u8>),
        ServerError,
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    /// Camera that plays back a script of frame sizes, `None` meaning failure.
    struct ScriptedCamera {
        script: VecDeque<Option<usize>>,
        log: Log,
        outstanding: bool,
    }

    impl ScriptedCamera {
        fn new(script: &[Option<usize>], log: &Log) -> Self {
            Self {
                script: script.iter().copied().collect(),
                log: log.clone(),
                outstanding: false,
            }
        }
    }

    impl CaptureDevice for ScriptedCamera {
        type Frame = Vec<u8>;

        fn acquire_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
            assert!(!self.outstanding, "acquired while a frame is outstanding");
            self.log.borrow_mut().push(Event::Acquire);
            match self.script.pop_front().flatten() {
                Some(len) => {
                    self.outstanding = true;
                    Ok((0..len).map(|i| (i % 251) as u8).collect())
                }
                None => Err(CaptureError::CaptureFailed),
            }
        }

        fn release_frame(&mut self, _frame: Vec<u8>) {
            assert!(self.outstanding, "released a frame that was never acquired");
            self.outstanding = false;
            self.log.borrow_mut().push(Event::Release);
        }
    }

    #[derive(Debug)]
    struct Disconnected;

    /// Connection that records everything and fails on the n-th chunk.
    struct RecordingConnection {
        log: Log,
        fail_on_chunk: Option<usize>,
        chunks: usize,
    }

    impl RecordingConnection {
        fn new(log: &Log) -> Self {
            Self {
                log: log.clone(),
                fail_on_chunk: None,
                chunks: 0,
            }
        }

        fn failing_on_chunk(log: &Log, index: usize) -> Self {
            Self {
                fail_on_chunk: Some(index),
                ..Self::new(log)
            }
        }
    }

    impl StreamConnection for RecordingConnection {
        type Error = Disconnected;

        fn begin_stream(&mut self, content_type: &str) -> Result<(), Disconnected> {
            self.log
                .borrow_mut()
                .push(Event::Begin(content_type.to_string()));
            Ok(())
        }

        fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), Disconnected> {
            let index = self.chunks;
            self.chunks += 1;
            if self.fail_on_chunk == Some(index) {
                return Err(Disconnected);
            }
            self.log.borrow_mut().push(Event::Chunk(chunk.to_vec()));
            Ok(())
        }

        fn send_server_error(&mut self) -> Result<(), Disconnected> {
            self.log.borrow_mut().push(Event::ServerError);
            Ok(())
        }
    }

    fn count(log: &Log, event: &Event) -> usize {
        log.borrow().iter().filter(|e| *e == event).count()
    }

    fn body(log: &Log) -> Vec<u8> {
        log.borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Chunk(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_three_frames_then_capture_failure() {
        let log = Log::default();
        let mut camera = ScriptedCamera::new(&[Some(1000), Some(1000), Some(1000), None], &log);
        let mut connection = RecordingConnection::new(&log);

        let end = serve_stream(&mut camera, &mut connection);

        assert!(matches!(end, StreamEnd::Capture { frames_sent: 3, .. }));
        assert_eq!(count(&log, &Event::ServerError), 0);
        assert_eq!(count(&log, &Event::Release), 3);
        assert_eq!(count(&log, &Event::Acquire), 4);

        let header = b"Content-Type: image/jpeg\r\nContent-Length: 1000\r\n\r\n";
        let mut expected = Vec::new();
        for _ in 0..3 {
            expected.extend_from_slice(header);
            expected.extend((0..1000).map(|i| (i % 251) as u8));
            expected.extend_from_slice(b"\r\n--frame\r\n");
        }
        assert_eq!(body(&log), expected);
        assert_eq!(PART_DELIMITER_LEN, 11);
        assert_eq!(expected.len(), 3 * (header.len() + 1000 + 11));
    }

    #[test]
    fn test_capture_failure_before_first_frame_sends_500() {
        let log = Log::default();
        let mut camera = ScriptedCamera::new(&[None], &log);
        let mut connection = RecordingConnection::new(&log);

        let end = serve_stream(&mut camera, &mut connection);

        assert!(matches!(end, StreamEnd::Capture { frames_sent: 0, .. }));
        assert_eq!(*log.borrow(), vec![Event::Acquire, Event::ServerError]);
    }

    #[test]
    fn test_disconnect_before_delimiter_releases_once() {
        let log = Log::default();
        let mut camera = ScriptedCamera::new(&[Some(500), Some(500), Some(500)], &log);
        // Chunks: header, bytes, delimiter per frame. Index 5 is frame two's delimiter.
        let mut connection = RecordingConnection::failing_on_chunk(&log, 5);

        let end = serve_stream(&mut camera, &mut connection);

        assert!(end.is_disconnect());
        assert_eq!(end.frames_sent(), 1);
        assert_eq!(count(&log, &Event::Acquire), 2);
        assert_eq!(count(&log, &Event::Release), 2);
        assert!(!camera.outstanding);
        assert_eq!(log.borrow().last(), Some(&Event::Release));
    }

    #[test]
    fn test_release_precedes_next_acquire() {
        let log = Log::default();
        let mut camera = ScriptedCamera::new(&[Some(10), Some(20), Some(30), None], &log);
        let mut connection = RecordingConnection::new(&log);

        serve_stream(&mut camera, &mut connection);

        let lifecycle: Vec<Event> = log
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Acquire | Event::Release))
            .cloned()
            .collect();
        assert_eq!(
            lifecycle,
            vec![
                Event::Acquire,
                Event::Release,
                Event::Acquire,
                Event::Release,
                Event::Acquire,
                Event::Release,
                Event::Acquire,
            ]
        );
    }

    #[test]
    fn test_content_length_matches_frame() {
        let sizes = [0usize, 1, 13, 4096, 65_537];
        let log = Log::default();
        let script: Vec<Option<usize>> =
            sizes.iter().map(|&n| Some(n)).chain([None]).collect();
        let mut camera = ScriptedCamera::new(&script, &log);
        let mut connection = RecordingConnection::new(&log);

        serve_stream(&mut camera, &mut connection);

        let chunks: Vec<Vec<u8>> = log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Chunk(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks.len(), sizes.len() * 3);

        for (part, &size) in chunks.chunks(3).zip(sizes.iter()) {
            let header = std::str::from_utf8(&part[0]).unwrap();
            let declared: usize = header
                .trim_end()
                .rsplit("Content-Length: ")
                .next()
                .unwrap()
                .parse()
                .unwrap();
            assert_eq!(declared, size);
            assert_eq!(part[1].len(), size);
            assert_eq!(part[2], PART_DELIMITER);
        }
    }

    #[test]
    fn test_begin_stream_once_with_multipart_type() {
        let log = Log::default();
        let mut camera = ScriptedCamera::new(&[Some(8), Some(8), None], &log);
        let mut connection = RecordingConnection::new(&log);

        serve_stream(&mut camera, &mut connection);

        let begins: Vec<Event> = log
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Begin(_)))
            .cloned()
            .collect();
        assert_eq!(
            begins,
            vec![Event::Begin(
                "multipart/x-mixed-replace; boundary=frame".to_string()
            )]
        );
        // Begin comes after the first acquisition and before the first chunk.
        assert_eq!(log.borrow()[0], Event::Acquire);
        assert!(matches!(log.borrow()[1], Event::Begin(_)));
    }

    #[test]
    fn test_disconnect_on_first_header_releases_frame() {
        let log = Log::default();
        let mut camera = ScriptedCamera::new(&[Some(64)], &log);
        let mut connection = RecordingConnection::failing_on_chunk(&log, 0);

        let end = serve_stream(&mut camera, &mut connection);

        assert!(matches!(end, StreamEnd::Transport { frames_sent: 0, .. }));
        assert_eq!(count(&log, &Event::Release), 1);
        assert_eq!(count(&log, &Event::ServerError), 0);
    }
}
