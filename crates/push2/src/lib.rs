//! Ableton Push 2 control-surface engine.
//!
//! This crate drives a Push 2 as a generic control surface:
//! - Wire codec for the pad/button LED messages and inbound MIDI
//! - Control registry for the 64 pads and the named buttons
//! - Input dispatch from raw device bytes to host events
//! - Double-buffered frame transport to the 960x160 LCD
//!
//! # Architecture
//!
//! The Push 2 is controlled via two interfaces:
//! - **USB**: For the LCD display (vendor ID 0x2982, product ID 0x1967)
//! - **MIDI**: Two port pairs (live and user) for pads, buttons and LEDs
//!
//! A [`Surface`] handle owns a single worker task. Every request from the
//! host (start, stop, LED changes, host state) is queued to that worker, so
//! device access is never concurrent. Frame transfers run on a dedicated
//! transfer thread and race only against the worker's renderer.
//!
//! # Pad Layout
//!
//! Pads send notes 36-99 in row-major order, starting at the bottom-left
//! pad (x = 0, y = 0) and ending at the top-right pad (x = 7, y = 7).

pub mod config;
pub mod display;
pub mod error;
pub mod feedback;
pub mod midi;
mod module;
pub mod surface;
pub mod transport;

pub use config::Preferences;
pub use display::{Canvas, DisplaySource, Rgb};
pub use error::{ConfigurationError, SurfaceError, TransportError};
pub use feedback::{FeedbackMap, HostState, RecordState};
pub use midi::{ButtonId, DeviceIdentity, Handlers, LedState, Registry, SurfaceEvent};
pub use surface::Surface;
pub use transport::{Device, Port, Push2Device};
