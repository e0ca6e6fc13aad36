//! Push 2 display subsystem.
//!
//! Handles USB communication with the Push 2 LCD display and rendering.

mod driver;
mod frame_buffer;
mod renderer;

pub use driver::{Push2Display, PUSH2_PRODUCT_ID, PUSH2_VENDOR_ID};
pub use frame_buffer::{
    apply_xor_mask, Canvas, DeviceFrame, Rgb, DISPLAY_HEIGHT, DISPLAY_WIDTH, FRAME_BYTES,
    FRAME_HEADER,
};
pub use renderer::{DisplayPipeline, DisplaySource, FrameSink, TransferOutcome};
