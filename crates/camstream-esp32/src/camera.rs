//! esp32-camera driver binding.
//!
//! The driver is a process-wide singleton, so only one [`EspCamera`] can
//! exist. It is configured with a single frame buffer: every frame returned
//! by `esp_camera_fb_get` must be handed back with `esp_camera_fb_return`
//! before the next capture can complete.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use camstream_core::{CameraConfig, CaptureDevice, CaptureError, FrameSize, PixelFormat};
use esp_idf_svc::sys::camera;
use esp_idf_svc::sys::esp;
use log::{info, warn};

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Owner of the initialized camera driver.
pub struct EspCamera {
    _private: (),
}

/// One frame buffer borrowed from the driver.
pub struct FrameBuffer {
    fb: NonNull<camera::camera_fb_t>,
}

impl AsRef<[u8]> for FrameBuffer {
    fn as_ref(&self) -> &[u8] {
        // The driver struct is not guaranteed to be aligned for these fields.
        unsafe {
            let fb = self.fb.as_ptr();
            let buf = ptr::addr_of!((*fb).buf).read_unaligned();
            let len = ptr::addr_of!((*fb).len).read_unaligned();
            std::slice::from_raw_parts(buf, len as usize)
        }
    }
}

impl EspCamera {
    /// Initialize the camera driver.
    pub fn init(config: &CameraConfig) -> Result<Self> {
        config.validate()?;

        if TAKEN.swap(true, Ordering::SeqCst) {
            bail!("Camera driver already initialized");
        }

        let driver_config = driver_config(config);
        if let Err(e) = esp!(unsafe { camera::esp_camera_init(&driver_config) }) {
            TAKEN.store(false, Ordering::SeqCst);
            return Err(e).context("Camera init failed");
        }

        let camera = Self { _private: () };

        if let Some(flip) = config.vertical_flip {
            camera.set_vertical_flip(flip)?;
        }

        let (width, height) = config.frame_size.dimensions();
        info!(
            "Camera ready: {}x{} JPEG, quality {}",
            width, height, config.jpeg_quality
        );
        Ok(camera)
    }

    /// Flip the sensor image vertically.
    pub fn set_vertical_flip(&self, flip: bool) -> Result<()> {
        unsafe {
            let sensor = camera::esp_camera_sensor_get();
            if sensor.is_null() {
                bail!("Camera sensor not available");
            }
            let Some(set_vflip) = (*sensor).set_vflip else {
                bail!("Sensor does not support vertical flip");
            };
            if set_vflip(sensor, flip as _) != 0 {
                bail!("Failed to set vertical flip");
            }
        }
        Ok(())
    }
}

impl CaptureDevice for EspCamera {
    type Frame = FrameBuffer;

    fn acquire_frame(&mut self) -> Result<FrameBuffer, CaptureError> {
        let fb = unsafe { camera::esp_camera_fb_get() };
        NonNull::new(fb)
            .map(|fb| FrameBuffer { fb })
            .ok_or(CaptureError::CaptureFailed)
    }

    fn release_frame(&mut self, frame: FrameBuffer) {
        unsafe { camera::esp_camera_fb_return(frame.fb.as_ptr()) };
    }
}

impl Drop for EspCamera {
    fn drop(&mut self) {
        if let Err(e) = esp!(unsafe { camera::esp_camera_deinit() }) {
            warn!("Camera deinit failed: {}", e);
        }
        TAKEN.store(false, Ordering::SeqCst);
    }
}

/// Translate the configuration into the driver's C struct.
fn driver_config(config: &CameraConfig) -> camera::camera_config_t {
    let pins = &config.pins;
    let mut c = camera::camera_config_t::default();

    c.pin_pwdn = pins.pwdn;
    c.pin_reset = pins.reset;
    c.pin_xclk = pins.xclk;
    c.__bindgen_anon_1.pin_sccb_sda = pins.sccb_sda;
    c.__bindgen_anon_2.pin_sccb_scl = pins.sccb_scl;
    c.pin_d7 = pins.d7;
    c.pin_d6 = pins.d6;
    c.pin_d5 = pins.d5;
    c.pin_d4 = pins.d4;
    c.pin_d3 = pins.d3;
    c.pin_d2 = pins.d2;
    c.pin_d1 = pins.d1;
    c.pin_d0 = pins.d0;
    c.pin_vsync = pins.vsync;
    c.pin_href = pins.href;
    c.pin_pclk = pins.pclk;

    c.xclk_freq_hz = config.xclk_freq_hz as _;
    c.ledc_timer = config.ledc_timer as _;
    c.ledc_channel = config.ledc_channel as _;

    c.pixel_format = match config.pixel_format {
        PixelFormat::Jpeg => camera::pixformat_t_PIXFORMAT_JPEG,
    };
    c.frame_size = match config.frame_size {
        FrameSize::Qvga => camera::framesize_t_FRAMESIZE_QVGA,
        FrameSize::Vga => camera::framesize_t_FRAMESIZE_VGA,
        FrameSize::Svga => camera::framesize_t_FRAMESIZE_SVGA,
        FrameSize::Xga => camera::framesize_t_FRAMESIZE_XGA,
        FrameSize::Sxga => camera::framesize_t_FRAMESIZE_SXGA,
        FrameSize::Uxga => camera::framesize_t_FRAMESIZE_UXGA,
    };
    c.jpeg_quality = config.jpeg_quality as _;
    c.fb_count = config.fb_count as _;

    c
}
