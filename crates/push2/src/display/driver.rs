//! USB display driver for Ableton Push 2.
//!
//! The Push 2 display uses a USB bulk transfer protocol:
//! - Vendor ID: 0x2982
//! - Product ID: 0x1967
//! - Frame format: BGR565, 960x160 pixels, 1024-pixel line stride
//! - XOR mask: 0xFFE7F3E7 applied to frame data
//! - Transfer: 16-byte header, then 20 chunks of 16 KiB

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use super::renderer::FrameSink;
use crate::error::TransportError;

/// Push 2 USB identifiers
pub const PUSH2_VENDOR_ID: u16 = 0x2982;
pub const PUSH2_PRODUCT_ID: u16 = 0x1967;

/// USB interface carrying the display endpoint
const DISPLAY_INTERFACE: u8 = 0;

/// USB endpoint for display data
const DISPLAY_ENDPOINT: u8 = 0x01;

/// Bytes per bulk transfer
const TRANSFER_CHUNK: usize = 16 * 1024;

/// Push 2 USB display driver.
pub struct Push2Display {
    handle: DeviceHandle<Context>,
    timeout: Duration,
}

impl Push2Display {
    /// Find the Push 2 and claim its display interface.
    pub fn open(timeout: Duration) -> Result<Self, TransportError> {
        let context = Context::new().map_err(TransportError::from_usb)?;

        let device = context
            .devices()
            .map_err(TransportError::from_usb)?
            .iter()
            .find(|d| {
                d.device_descriptor().is_ok_and(|desc| {
                    desc.vendor_id() == PUSH2_VENDOR_ID && desc.product_id() == PUSH2_PRODUCT_ID
                })
            })
            .ok_or(TransportError::DeviceNotFound)?;

        let mut handle = device.open().map_err(TransportError::from_usb)?;

        handle.claim_interface(DISPLAY_INTERFACE).map_err(|e| {
            tracing::warn!("Could not claim USB interface: {}", e);
            TransportError::InterfaceClaim(DISPLAY_INTERFACE)
        })?;

        tracing::info!(
            bus = device.bus_number(),
            address = device.address(),
            "Push 2 display opened"
        );

        Ok(Self { handle, timeout })
    }

    fn write_all(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let written = self
            .handle
            .write_bulk(DISPLAY_ENDPOINT, bytes, self.timeout)
            .map_err(TransportError::from_usb)?;
        if written != bytes.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        Ok(())
    }
}

impl FrameSink for Push2Display {
    fn write_frame(&self, header: &[u8], payload: &[u8]) -> Result<(), TransportError> {
        self.write_all(header)?;
        for chunk in payload.chunks(TRANSFER_CHUNK) {
            self.write_all(chunk)?;
        }
        Ok(())
    }
}

impl Drop for Push2Display {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(DISPLAY_INTERFACE);
        tracing::debug!("Push 2 display interface released");
    }
}
