//! Error types for the Push 2 surface.

use thiserror::Error;

use crate::midi::{ButtonId, ColorOutOfRange, Namespace};
use crate::transport::Port;

/// Errors in the static control layout. Always fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{namespace} wire id {id} registered twice")]
    DuplicateWireId { namespace: Namespace, id: u8 },

    #[error("button {0:?} registered twice")]
    DuplicateButton(ButtonId),

    #[error("wire id {0} does not fit in 7 bits")]
    WireIdOutOfRange(u8),

    #[error("handler bound to {0:?}, which is not in the layout")]
    UnboundHandler(ButtonId),
}

/// Errors talking to the device.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Push 2 device not found")]
    DeviceNotFound,

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("failed to claim interface {0}")]
    InterfaceClaim(u8),

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("{0:?} MIDI port not found")]
    PortNotFound(Port),

    #[error("device is not open")]
    NotOpen,

    #[error("transfer timed out")]
    Timeout,

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

impl TransportError {
    /// Map a libusb error, keeping timeouts distinguishable.
    pub(crate) fn from_usb(error: rusb::Error) -> Self {
        match error {
            rusb::Error::Timeout => TransportError::Timeout,
            rusb::Error::NoDevice | rusb::Error::NotFound => TransportError::DeviceNotFound,
            other => TransportError::Usb(other),
        }
    }
}

/// Errors surfaced to the host through [`crate::Surface`].
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Color(#[from] ColorOutOfRange),

    #[error("pad ({x}, {y}) is outside the 8x8 grid")]
    NoSuchPad { x: u8, y: u8 },

    #[error("invalid preferences: {}", .0.join(", "))]
    InvalidPreferences(Vec<String>),

    #[error("preferences document error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("unsupported preferences version {0}")]
    UnsupportedVersion(u32),

    #[error("surface worker has stopped")]
    WorkerGone,

    #[error("timed out waiting for the surface worker")]
    ReplyTimeout,
}
