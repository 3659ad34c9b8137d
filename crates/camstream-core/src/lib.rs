//! # camstream-core
//!
//! Core camera streaming logic shared by the device firmware and the host
//! simulator.
//!
//! This crate provides:
//! - The capture device abstraction (acquire/release with an RAII frame lease)
//! - Multipart MJPEG framing (`multipart/x-mixed-replace; boundary=frame`)
//! - The streaming responder loop
//! - Camera/WiFi configuration values
//! - Persistent storage recovery policy
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and ESP32 (esp-idf) targets.

pub mod capture;
pub mod config;
pub mod multipart;
pub mod responder;
pub mod storage;

pub use capture::{CaptureDevice, CaptureError, FrameLease};
pub use config::{CameraConfig, CameraPins, ConfigError, FrameSize, PixelFormat, WifiConfig};
pub use multipart::{FramingError, PartHeader};
pub use responder::{serve_stream, StreamConnection, StreamEnd};
pub use storage::{init_with_recovery, FlashStorage, StorageError, StorageFault, StorageInit};
