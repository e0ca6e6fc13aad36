//! Push 2 MIDI handling.
//!
//! Handles the control layout, LED state and input dispatch.

mod dispatch;
mod led;
mod mapping;
mod registry;
pub mod wire;

pub use dispatch::{dispatch, SurfaceEvent};
pub use led::{colors, ColorOutOfRange, Control, ControlKind, Division, Led, LedState, TimingClass};
pub use mapping::{
    device_name, pad_note, ButtonId, ButtonSpec, Layout, Palette, GRID_SIZE, PAD_BASE_NOTE,
    PUSH2_BUTTONS,
};
pub use registry::{ButtonAction, Handlers, Namespace, Registry};
pub use wire::{DeviceIdentity, WireEvent};

pub(crate) use led::check_color;
