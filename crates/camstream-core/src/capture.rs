//! Capture device abstraction.
//!
//! A capture device hands out one JPEG frame at a time. The hardware binding
//! is configured with a single frame buffer, so a frame must be released
//! before the next one can be acquired. [`FrameLease`] enforces this: it
//! mutably borrows the device for as long as the frame is alive and gives the
//! buffer back when dropped.

use std::ops::Deref;

use thiserror::Error;

/// Errors reported by a capture device.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The sensor did not produce a frame.
    #[error("Camera capture failed")]
    CaptureFailed,

    /// The frame source could not be read.
    #[error("Frame source unavailable: {0}")]
    Unavailable(String),
}

/// A pull-based source of JPEG frames.
///
/// Implementations:
/// - `EspCamera` on ESP32 (esp32-camera driver)
/// - `DirectoryCamera` on Linux (JPEG files on disk)
pub trait CaptureDevice {
    /// One captured image. Owned by the device between acquire and release.
    type Frame: AsRef<[u8]>;

    /// Block until the next frame is available.
    fn acquire_frame(&mut self) -> Result<Self::Frame, CaptureError>;

    /// Return a frame buffer to the device.
    ///
    /// Must be called exactly once per successful [`acquire_frame`](Self::acquire_frame).
    fn release_frame(&mut self, frame: Self::Frame);

    /// Acquire a frame wrapped in a lease that releases it on drop.
    fn lease(&mut self) -> Result<FrameLease<'_, Self>, CaptureError> {
        let frame = self.acquire_frame()?;
        Ok(FrameLease {
            device: self,
            frame: Some(frame),
        })
    }
}

/// An acquired frame, released back to its device when dropped.
pub struct FrameLease<'d, D: CaptureDevice + ?Sized> {
    device: &'d mut D,
    frame: Option<D::Frame>,
}

impl<D: CaptureDevice + ?Sized> FrameLease<'_, D> {
    /// Frame size in bytes.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw JPEG bytes.
    pub fn bytes(&self) -> &[u8] {
        match &self.frame {
            Some(frame) => frame.as_ref(),
            None => &[],
        }
    }
}

impl<D: CaptureDevice + ?Sized> Deref for FrameLease<'_, D> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes()
    }
}

impl<D: CaptureDevice + ?Sized> Drop for FrameLease<'_, D> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.device.release_frame(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Device that counts acquisitions and releases.
    struct CountingCamera {
        acquired: usize,
        released: usize,
        fail: bool,
    }

    impl CaptureDevice for CountingCamera {
        type Frame = Vec<u8>;

        fn acquire_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
            if self.fail {
                return Err(CaptureError::CaptureFailed);
            }
            self.acquired += 1;
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        }

        fn release_frame(&mut self, _frame: Vec<u8>) {
            self.released += 1;
        }
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let mut camera = CountingCamera {
            acquired: 0,
            released: 0,
            fail: false,
        };

        {
            let lease = camera.lease().unwrap();
            assert_eq!(lease.len(), 4);
            assert_eq!(&lease[..2], &[0xFF, 0xD8]);
        }

        assert_eq!(camera.acquired, 1);
        assert_eq!(camera.released, 1);
    }

    #[test]
    fn test_failed_acquire_releases_nothing() {
        let mut camera = CountingCamera {
            acquired: 0,
            released: 0,
            fail: true,
        };

        assert!(matches!(camera.lease(), Err(CaptureError::CaptureFailed)));
        assert_eq!(camera.released, 0);
    }

    #[test]
    fn test_sequential_leases() {
        let mut camera = CountingCamera {
            acquired: 0,
            released: 0,
            fail: false,
        };

        for _ in 0..3 {
            let lease = camera.lease().unwrap();
            assert!(!lease.is_empty());
        }

        assert_eq!(camera.acquired, 3);
        assert_eq!(camera.released, 3);
    }
}
