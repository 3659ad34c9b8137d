//! Directory-backed frame source.
//!
//! Stands in for the camera when running on a development machine: cycles
//! through the JPEG files of a directory at a fixed frame interval.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use camstream_core::{CaptureDevice, CaptureError};

/// Errors opening a frame source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read frame directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No JPEG files found in {0}")]
    Empty(PathBuf),
}

/// Plays back `*.jpg` / `*.jpeg` files in file-name order, looping forever.
#[derive(Debug)]
pub struct DirectoryCamera {
    frames: Vec<PathBuf>,
    next: usize,
    interval: Duration,
    last_capture: Option<Instant>,
}

impl DirectoryCamera {
    /// Scan `dir` for JPEG files.
    pub fn open(dir: impl AsRef<Path>, interval: Duration) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_jpeg(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(SourceError::Empty(dir.to_path_buf()));
        }

        debug!("Loaded {} frames from {}", frames.len(), dir.display());
        Ok(Self {
            frames,
            next: 0,
            interval,
            last_capture: None,
        })
    }

    /// Number of distinct frames in the loop.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Sleep until the next frame is due, like a sensor running at a fixed rate.
    fn wait_for_frame(&self) {
        if let Some(last) = self.last_capture {
            let remaining = self.interval.saturating_sub(last.elapsed());
            if !remaining.is_zero() {
                thread::sleep(remaining);
            }
        }
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

impl CaptureDevice for DirectoryCamera {
    type Frame = Bytes;

    fn acquire_frame(&mut self) -> Result<Bytes, CaptureError> {
        self.wait_for_frame();

        let path = &self.frames[self.next];
        self.next = (self.next + 1) % self.frames.len();
        self.last_capture = Some(Instant::now());

        std::fs::read(path)
            .map(Bytes::from)
            .map_err(|e| CaptureError::Unavailable(format!("{}: {}", path.display(), e)))
    }

    fn release_frame(&mut self, _frame: Bytes) {}
}
