//! camstream firmware for the AI-Thinker ESP32-CAM
//!
//! Boot sequence:
//! 1. Bring up NVS (erasing it once if the partition is unusable)
//! 2. Start WiFi in station mode and wait out the connect grace period
//! 3. Initialize the camera
//! 4. Serve the MJPEG stream at `GET /stream`
//!
//! Any failure during boot is fatal: it is logged and the device aborts.
//!
//! Build with the ESP toolchain:
//! ```text
//! CAMSTREAM_WIFI_SSID=MyNetwork CAMSTREAM_WIFI_PASS=secret cargo run --release
//! ```

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use camstream_core::config::CONNECT_GRACE_PERIOD;
use camstream_core::{CameraConfig, WifiConfig};
use camstream_esp32::{
    camera::EspCamera,
    http::start_stream_server,
    nvs::take_default_partition,
    wifi::{log_station_info, start_station},
};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{error, info};

const WIFI_SSID: &str = match option_env!("CAMSTREAM_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "iptimeSmart",
};

const WIFI_PASS: &str = match option_env!("CAMSTREAM_WIFI_PASS") {
    Some(pass) => pass,
    None => "12345678",
};

const CAMERA: CameraConfig = CameraConfig::AI_THINKER;

fn main() {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("camstream v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        error!("Fatal: {:#}", e);
        std::process::abort();
    }
}

fn run() -> Result<()> {
    let nvs = take_default_partition().context("NVS init failed")?;
    let peripherals = Peripherals::take().context("Peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take().context("System event loop unavailable")?;

    let wifi_config = WifiConfig::new(WIFI_SSID, WIFI_PASS);
    let wifi = start_station(&wifi_config, peripherals.modem, sysloop, nvs)
        .context("WiFi start failed")?;

    thread::sleep(CONNECT_GRACE_PERIOD);
    log_station_info(&wifi);

    let camera = EspCamera::init(&CAMERA)?;
    let _server = start_stream_server(camera)?;

    // Handlers run on the HTTP server task; keep the WiFi driver and the
    // server alive.
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
