//! Persistent storage initialization policy.
//!
//! The WiFi driver keeps its state in a flash key-value partition. A
//! partition that is full, or that was written by a newer format version, is
//! erased and initialized again. Anything else is a fatal startup error.

use std::fmt;

use log::warn;
use thiserror::Error;

/// Result of a raw flash initialization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageFault<E> {
    /// The partition has no free pages left.
    NoFreePages,
    /// The partition was written by an incompatible format version.
    NewVersionFound,
    /// Any other driver error.
    Other(E),
}

impl<E> StorageFault<E> {
    /// Whether erasing the partition can fix this fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StorageFault::NoFreePages | StorageFault::NewVersionFound)
    }
}

/// Raw access to the flash partition.
pub trait FlashStorage {
    type Error: fmt::Debug;

    fn init(&mut self) -> Result<(), StorageFault<Self::Error>>;

    fn erase(&mut self) -> Result<(), Self::Error>;
}

/// How the partition became usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageInit {
    /// Initialized on the first attempt.
    Ready,
    /// Erased and initialized again; previous contents are gone.
    Erased,
}

/// Storage could not be brought up.
#[derive(Debug, Error)]
pub enum StorageError<E: fmt::Debug> {
    #[error("Storage init failed: {0:?}")]
    Init(StorageFault<E>),

    #[error("Storage erase failed: {0:?}")]
    Erase(E),

    #[error("Storage init failed after erase: {0:?}")]
    Reinit(StorageFault<E>),
}

/// Initialize storage, erasing it once if the partition is full or from an
/// incompatible version.
pub fn init_with_recovery<S>(storage: &mut S) -> Result<StorageInit, StorageError<S::Error>>
where
    S: FlashStorage + ?Sized,
{
    match storage.init() {
        Ok(()) => Ok(StorageInit::Ready),
        Err(fault) if fault.is_recoverable() => {
            warn!("Storage unusable ({:?}), erasing partition", fault);
            storage.erase().map_err(StorageError::Erase)?;
            storage.init().map_err(StorageError::Reinit)?;
            Ok(StorageInit::Erased)
        }
        Err(fault) => Err(StorageError::Init(fault)),
    }
}
