//! `/stream` route on the esp-idf HTTP server.
//!
//! The handler owns the connection for as long as the stream lasts. esp-idf
//! runs handlers on a single worker task, so a second viewer waits until the
//! first one disconnects.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use camstream_core::{serve_stream, StreamConnection};
use embedded_svc::http::server::{Connection, Request, Response};
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::Write as _;
use log::{info, warn};
use thiserror::Error;

use crate::camera::EspCamera;

/// Route serving the MJPEG stream.
pub const STREAM_ROUTE: &str = "/stream";

/// Stack for the HTTP worker task; the stream loop runs on it.
const HTTPD_STACK_SIZE: usize = 10 * 1024;

/// Errors writing to an esp-idf HTTP connection.
#[derive(Debug, Error)]
pub enum HttpStreamError<E: std::fmt::Debug> {
    /// The underlying connection failed.
    #[error("HTTP connection error: {0:?}")]
    Io(E),
    /// A response was already committed, or never was.
    #[error("Response written out of order")]
    OutOfOrder,
}

enum Phase<C: Connection> {
    Pending(Request<C>),
    Streaming(Response<C>),
    Done,
}

/// [`StreamConnection`] over an esp-idf HTTP request.
pub struct EspStreamConnection<C: Connection> {
    phase: Phase<C>,
}

impl<C: Connection> EspStreamConnection<C> {
    pub fn new(request: Request<C>) -> Self {
        Self {
            phase: Phase::Pending(request),
        }
    }
}

impl<C: Connection> StreamConnection for EspStreamConnection<C> {
    type Error = HttpStreamError<C::Error>;

    fn begin_stream(&mut self, content_type: &str) -> Result<(), Self::Error> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Pending(request) => {
                let response = request
                    .into_response(200, Some("OK"), &[("Content-Type", content_type)])
                    .map_err(HttpStreamError::Io)?;
                self.phase = Phase::Streaming(response);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(HttpStreamError::OutOfOrder)
            }
        }
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), Self::Error> {
        match &mut self.phase {
            Phase::Streaming(response) => response.write_all(chunk).map_err(HttpStreamError::Io),
            _ => Err(HttpStreamError::OutOfOrder),
        }
    }

    fn send_server_error(&mut self) -> Result<(), Self::Error> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Pending(request) => {
                request
                    .into_status_response(500)
                    .map_err(HttpStreamError::Io)?;
                Ok(())
            }
            other => {
                self.phase = other;
                Err(HttpStreamError::OutOfOrder)
            }
        }
    }
}

/// Start the HTTP server and register the `/stream` route.
///
/// The returned server must be kept alive for the route to stay registered.
pub fn start_stream_server(camera: EspCamera) -> Result<EspHttpServer<'static>> {
    let camera = Arc::new(Mutex::new(camera));

    let mut server = EspHttpServer::new(&Configuration {
        stack_size: HTTPD_STACK_SIZE,
        ..Default::default()
    })?;

    server.fn_handler(STREAM_ROUTE, Method::Get, move |request| {
        let mut camera = camera
            .lock()
            .map_err(|_| anyhow!("Camera lock poisoned"))?;

        info!("Viewer connected to {}", STREAM_ROUTE);
        let mut connection = EspStreamConnection::new(request);
        let end = serve_stream(&mut *camera, &mut connection);

        if end.is_disconnect() {
            info!("Viewer disconnected after {} frames", end.frames_sent());
        } else {
            warn!("Stream ended: {}", end);
        }
        Ok::<(), anyhow::Error>(())
    })?;

    info!("HTTP server started, stream at {}", STREAM_ROUTE);
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_stream_error_display() {
        let io: HttpStreamError<i32> = HttpStreamError::Io(-1);
        assert_eq!(io.to_string(), "HTTP connection error: -1");
        assert_eq!(
            HttpStreamError::<i32>::OutOfOrder.to_string(),
            "Response written out of order"
        );

        let boxed: anyhow::Error = HttpStreamError::<i32>::OutOfOrder.into();
        assert!(boxed.is::<HttpStreamError<i32>>());
    }
}
