//! NVS (Non-Volatile Storage) bring-up.
//!
//! The WiFi driver stores calibration and connection data in the default NVS
//! partition, so it has to be usable before the radio starts.

use anyhow::Result;
use camstream_core::storage::{init_with_recovery, FlashStorage, StorageFault, StorageInit};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::{self, esp, EspError};
use log::{info, warn};

/// Raw access to the default NVS flash partition.
pub struct NvsFlash;

impl FlashStorage for NvsFlash {
    type Error = EspError;

    fn init(&mut self) -> Result<(), StorageFault<EspError>> {
        let Some(err) = EspError::from(unsafe { sys::nvs_flash_init() }) else {
            return Ok(());
        };
        Err(match err.code() {
            code if code == sys::ESP_ERR_NVS_NO_FREE_PAGES as sys::esp_err_t => {
                StorageFault::NoFreePages
            }
            code if code == sys::ESP_ERR_NVS_NEW_VERSION_FOUND as sys::esp_err_t => {
                StorageFault::NewVersionFound
            }
            _ => StorageFault::Other(err),
        })
    }

    fn erase(&mut self) -> Result<(), EspError> {
        esp!(unsafe { sys::nvs_flash_erase() })
    }
}

/// Initialize NVS flash (erasing it if needed) and take the default partition.
pub fn take_default_partition() -> Result<EspDefaultNvsPartition> {
    match init_with_recovery(&mut NvsFlash)? {
        StorageInit::Ready => info!("NVS ready"),
        StorageInit::Erased => warn!("NVS was erased and re-initialized"),
    }
    Ok(EspDefaultNvsPartition::take()?)
}
