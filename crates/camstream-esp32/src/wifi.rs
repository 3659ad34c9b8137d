//! WiFi station bootstrap for ESP32.
//!
//! Starts the radio in station mode and issues a single connect request. The
//! connection is not awaited: the caller sleeps for
//! [`CONNECT_GRACE_PERIOD`](camstream_core::config::CONNECT_GRACE_PERIOD)
//! and carries on. There is no retry and no reconnect handling.

use anyhow::{anyhow, Result};
use camstream_core::WifiConfig;
use esp_idf_hal::{modem::Modem, peripheral::Peripheral};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};
use log::{info, warn};

/// Bring up the station interface and request a connection.
///
/// # Arguments
///
/// * `config` - Network credentials (empty password for open networks)
/// * `modem` - ESP32 modem peripheral
/// * `sysloop` - ESP system event loop
/// * `nvs` - Default NVS partition, used by the driver for its own state
///
/// # Returns
///
/// Returns a boxed `EspWifi` instance that must be kept alive for the
/// connection to remain active.
pub fn start_station(
    config: &WifiConfig,
    modem: impl Peripheral<P = Modem> + 'static,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> Result<Box<EspWifi<'static>>> {
    config.validate()?;

    let auth_method = if config.is_open() {
        info!("WiFi password is empty, using open network");
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    let mut wifi = Box::new(EspWifi::new(modem, sysloop, Some(nvs))?);

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: config
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("SSID too long (max 32 chars)"))?,
        password: config
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("Password too long (max 64 chars)"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;

    info!("Connecting to '{}'...", config.ssid);
    wifi.connect()?;

    Ok(wifi)
}

/// Log the station address after the grace period. Best effort only.
pub fn log_station_info(wifi: &EspWifi<'_>) {
    match wifi.is_connected() {
        Ok(true) => info!("WiFi connected!"),
        Ok(false) => warn!("WiFi not connected yet, continuing anyway"),
        Err(e) => warn!("Could not query WiFi state: {}", e),
    }

    match wifi.sta_netif().get_ip_info() {
        Ok(ip_info) => {
            info!("  IP address: {}", ip_info.ip);
            info!("  Gateway:    {}", ip_info.subnet.gateway);
            info!("  Netmask:    {}", ip_info.subnet.mask);
        }
        Err(e) => warn!("Could not read IP info: {}", e),
    }
}
