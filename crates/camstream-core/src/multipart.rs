//! Multipart MJPEG framing.
//!
//! The stream is a single `multipart/x-mixed-replace` response. Every part is
//! one JPEG frame laid out as:
//!
//! ```text
//! Content-Type: image/jpeg\r\n
//! Content-Length: <n>\r\n
//! \r\n
//! <n raw JPEG bytes>
//! \r\n--frame\r\n
//! ```
//!
//! Browsers and `ffplay` depend on this exact byte layout.

use core::fmt::Write as _;

use thiserror::Error;

/// Multipart boundary token.
pub const BOUNDARY: &str = "frame";

/// Content type of the whole stream response.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Content type of every part.
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

/// Delimiter sent after every frame.
pub const PART_DELIMITER: &[u8] = b"\r\n--frame\r\n";

/// Length of [`PART_DELIMITER`] in bytes.
pub const PART_DELIMITER_LEN: usize = 11;

const _: () = assert!(PART_DELIMITER.len() == PART_DELIMITER_LEN);

const HEADER_PREFIX: &str = "Content-Type: image/jpeg\r\nContent-Length: ";
const HEADER_SUFFIX: &str = "\r\n\r\n";

/// Number of decimal digits needed to print `n`.
const fn decimal_digits(mut n: u64) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Capacity of the part header buffer: the fixed text plus the widest
/// `Content-Length` a `usize` can produce on the target.
pub const PART_HEADER_CAPACITY: usize =
    HEADER_PREFIX.len() + decimal_digits(usize::MAX as u64) + HEADER_SUFFIX.len();

/// Errors that can occur while framing a part.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The formatted header did not fit the header buffer.
    #[error("Part header for a {0} byte frame exceeds {} bytes", PART_HEADER_CAPACITY)]
    HeaderOverflow(usize),
}

/// A formatted part header for one frame.
#[derive(Debug, Clone)]
pub struct PartHeader {
    buf: heapless::String<PART_HEADER_CAPACITY>,
}

impl PartHeader {
    /// Format the header announcing a frame of `frame_len` bytes.
    pub fn new(frame_len: usize) -> Result<Self, FramingError> {
        let mut buf = heapless::String::new();
        write!(buf, "{HEADER_PREFIX}{frame_len}{HEADER_SUFFIX}")
            .map_err(|_| FramingError::HeaderOverflow(frame_len))?;
        Ok(Self { buf })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        self.buf.as_str()
    }
}
