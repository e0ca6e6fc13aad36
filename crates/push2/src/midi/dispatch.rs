//! Input dispatch.
//!
//! Turns raw inbound bytes into host events, running button handlers on the
//! way. Unknown or unmapped messages are dropped at debug level; firmware
//! revisions send things we do not care about.

use crate::transport::Port;

use super::registry::{Namespace, Registry};
use super::wire::{self, DeviceIdentity, WireEvent};
use super::ButtonId;

/// Notifications from the surface to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    PadTouch {
        down: bool,
        x: u8,
        y: u8,
        velocity: u8,
    },
    ButtonPress(ButtonId),
    ButtonRelease(ButtonId),
    /// Touch strip position, 0..=16383
    TouchStrip(u16),
    /// Raw SysEx message, framing bytes included
    SysEx(Vec<u8>),
    DeviceInfo(DeviceIdentity),
    Started,
    Stopped,
    /// The display stopped accepting frames; the surface is stopped until
    /// the host activates it again.
    DeviceLost,
}

/// Decode and route one inbound message.
pub fn dispatch(
    registry: &mut Registry,
    port: Port,
    bytes: &[u8],
    mut emit: impl FnMut(SurfaceEvent),
) {
    match wire::decode_event(bytes) {
        WireEvent::NoteOn { note, velocity, .. } if velocity > 0 => {
            pad_touch(registry, note, true, velocity, &mut emit);
        }
        WireEvent::NoteOn { note, velocity, .. } | WireEvent::NoteOff { note, velocity, .. } => {
            pad_touch(registry, note, false, velocity, &mut emit);
        }
        WireEvent::Controller {
            controller, value, ..
        } => {
            let pressed = value >= 1;
            let fired = if pressed {
                registry.press(controller)
            } else {
                registry.release(controller)
            };
            match fired {
                Some(id) if pressed => emit(SurfaceEvent::ButtonPress(id)),
                Some(id) => emit(SurfaceEvent::ButtonRelease(id)),
                None => {
                    tracing::debug!(?port, controller, value, "Dropping unmapped controller");
                }
            }
        }
        WireEvent::PitchBend { value, .. } => emit(SurfaceEvent::TouchStrip(value)),
        WireEvent::SysEx(message) => {
            let identity = DeviceIdentity::parse(&message);
            emit(SurfaceEvent::SysEx(message));
            if let Some(identity) = identity {
                tracing::info!(
                    "Push 2 firmware {}.{} build {}",
                    identity.firmware_major,
                    identity.firmware_minor,
                    identity.build
                );
                emit(SurfaceEvent::DeviceInfo(identity));
            }
        }
        WireEvent::Unrecognized(bytes) => {
            tracing::debug!(?port, ?bytes, "Dropping unrecognized MIDI message");
        }
    }
}

fn pad_touch(
    registry: &Registry,
    note: u8,
    down: bool,
    velocity: u8,
    emit: &mut impl FnMut(SurfaceEvent),
) {
    match registry
        .resolve_by_wire(Namespace::Note, note)
        .and_then(|pad| pad.coordinates())
    {
        Some((x, y)) => emit(SurfaceEvent::PadTouch {
            down,
            x,
            y,
            velocity,
        }),
        None => tracing::debug!(note, down, "Dropping unmapped note"),
    }
}
