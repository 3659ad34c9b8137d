//! Camera and network configuration.
//!
//! All values are fixed at build time on the device. They are modelled as
//! plain immutable values handed to the component that needs them, so the
//! camera binding never reads ambient global state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long to wait after issuing the WiFi connect request before assuming
/// the station is online. The connection itself is not confirmed.
pub const CONNECT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Highest JPEG quality value the sensor accepts (lower is better quality).
pub const MAX_JPEG_QUALITY: u8 = 63;

/// Errors found while validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JPEG quality {0} out of range (0-63)")]
    JpegQuality(u8),

    #[error("Frame buffer count must be 1, got {0}")]
    FrameBufferCount(u8),

    #[error("XCLK frequency must be non-zero")]
    ClockFrequency,

    #[error("WiFi SSID cannot be empty")]
    EmptySsid,

    #[error("WiFi SSID too long ({0} bytes, max 32)")]
    SsidTooLong(usize),

    #[error("WiFi password too long ({0} bytes, max 64)")]
    PasswordTooLong(usize),
}

/// Sensor output encoding. Streaming requires JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Jpeg,
}

/// Sensor resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSize {
    /// 320x240
    Qvga,
    /// 640x480
    Vga,
    /// 800x600
    Svga,
    /// 1024x768
    Xga,
    /// 1280x1024
    Sxga,
    /// 1600x1200
    Uxga,
}

impl FrameSize {
    /// Width and height in pixels.
    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            FrameSize::Qvga => (320, 240),
            FrameSize::Vga => (640, 480),
            FrameSize::Svga => (800, 600),
            FrameSize::Xga => (1024, 768),
            FrameSize::Sxga => (1280, 1024),
            FrameSize::Uxga => (1600, 1200),
        }
    }
}

/// GPIO assignment of the camera connector. `-1` means not connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraPins {
    pub pwdn: i32,
    pub reset: i32,
    pub xclk: i32,
    pub sccb_sda: i32,
    pub sccb_scl: i32,
    pub d7: i32,
    pub d6: i32,
    pub d5: i32,
    pub d4: i32,
    pub d3: i32,
    pub d2: i32,
    pub d1: i32,
    pub d0: i32,
    pub vsync: i32,
    pub href: i32,
    pub pclk: i32,
}

/// Complete camera driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub pins: CameraPins,

    /// Sensor master clock in Hz.
    pub xclk_freq_hz: u32,

    /// LEDC timer generating XCLK.
    pub ledc_timer: u8,

    /// LEDC channel generating XCLK.
    pub ledc_channel: u8,

    pub pixel_format: PixelFormat,

    pub frame_size: FrameSize,

    /// 0-63, lower means higher quality and larger frames.
    pub jpeg_quality: u8,

    /// Number of driver frame buffers.
    pub fb_count: u8,

    /// Vertical flip. `None` keeps the sensor default, which may be upside
    /// down depending on how the board is mounted.
    #[serde(default)]
    pub vertical_flip: Option<bool>,
}

impl CameraConfig {
    /// AI-Thinker ESP32-CAM with an OV2640 sensor.
    pub const AI_THINKER: CameraConfig = CameraConfig {
        pins: CameraPins {
            pwdn: 32,
            reset: -1,
            xclk: 0,
            sccb_sda: 26,
            sccb_scl: 27,
            d7: 35,
            d6: 34,
            d5: 39,
            d4: 36,
            d3: 21,
            d2: 19,
            d1: 18,
            d0: 5,
            vsync: 25,
            href: 23,
            pclk: 22,
        },
        xclk_freq_hz: 20_000_000,
        ledc_timer: 0,
        ledc_channel: 0,
        pixel_format: PixelFormat::Jpeg,
        frame_size: FrameSize::Uxga,
        jpeg_quality: 12,
        fb_count: 1,
        vertical_flip: None,
    };

    /// Check the configuration before handing it to the driver.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jpeg_quality > MAX_JPEG_QUALITY {
            return Err(ConfigError::JpegQuality(self.jpeg_quality));
        }
        if self.fb_count != 1 {
            return Err(ConfigError::FrameBufferCount(self.fb_count));
        }
        if self.xclk_freq_hz == 0 {
            return Err(ConfigError::ClockFrequency);
        }
        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::AI_THINKER
    }
}

/// WiFi station credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiConfig {
    /// WiFi network SSID.
    pub ssid: String,

    /// WiFi network password (empty for open networks).
    pub password: String,
}

impl WifiConfig {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// Whether the network is open (no password).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Check the credentials fit the radio driver's limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        if self.ssid.len() > 32 {
            return Err(ConfigError::SsidTooLong(self.ssid.len()));
        }
        if self.password.len() > 64 {
            return Err(ConfigError::PasswordTooLong(self.password.len()));
        }
        Ok(())
    }
}
