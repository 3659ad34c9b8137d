//! ESP32-specific components for camstream.
//!
//! This crate provides the platform glue for the firmware binary:
//! - NVS flash bring-up with erase-and-retry recovery
//! - WiFi station bootstrap
//! - esp32-camera driver binding implementing `CaptureDevice`
//! - `/stream` route on the esp-idf HTTP server
//!
//! # Fatal errors
//!
//! Every function here that brings up hardware returns `anyhow::Result`.
//! The firmware treats any such error as fatal and aborts; nothing in this
//! crate retries or degrades.
//!
//! # Example
//!
//! ```ignore
//! use camstream_core::{CameraConfig, WifiConfig};
//! use camstream_esp32::{camera::EspCamera, http::start_stream_server, nvs, wifi};
//!
//! let nvs = nvs::take_default_partition()?;
//! let wifi = wifi::start_station(&WifiConfig::new("ssid", "pass"), modem, sysloop, nvs)?;
//! let camera = EspCamera::init(&CameraConfig::AI_THINKER)?;
//! let server = start_stream_server(camera)?;
//! ```

pub mod camera;
pub mod http;
pub mod nvs;
pub mod wifi;
