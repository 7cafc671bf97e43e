//! Error type shared by the transport seam and the tracker.

use thiserror::Error;

/// Failure of a single transport call.
///
/// Never fatal: the tracker logs it and leaves state unchanged, except where
/// a failed enumeration means the peripheral is treated as gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Bluetooth adapter error: {0}")]
    Adapter(String),

    #[error("Bluetooth adapter unavailable: {0}")]
    Unavailable(&'static str),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(String),

    /// Notifications were already enabled. Callers treat this as success.
    #[error("Already notifying")]
    AlreadyNotifying,

    #[error("Invalid instance identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{0} timed out after {1} ms")]
    Timeout(&'static str, u64),
}
