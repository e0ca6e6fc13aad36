//! Status screen for the Push 2 display.

use std::sync::Arc;

use parking_lot::Mutex;
use push2_surface::{Canvas, DisplaySource, RecordState, Rgb};

/// Session state shown on the display, shared with the event loop.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub rolling: bool,
    pub record: RecordState,
    pub looping: bool,
    pub shift: bool,
    /// Held pads, indexed `[y][x]`
    pub held: [[bool; 8]; 8],
    /// Touch strip position, 0..=16383
    pub strip: u16,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            rolling: false,
            record: RecordState::Disabled,
            looping: false,
            shift: false,
            held: [[false; 8]; 8],
            strip: 0,
        }
    }
}

const BACKGROUND: Rgb = Rgb::new(16, 16, 24);
const PAD_CELL: usize = 16;
const GRID_X: usize = 16;
const GRID_Y: usize = 12;

pub struct StatusScreen {
    view: Arc<Mutex<SessionView>>,
}

impl StatusScreen {
    pub fn new(view: Arc<Mutex<SessionView>>) -> Self {
        Self { view }
    }
}

impl DisplaySource for StatusScreen {
    fn draw(&mut self, canvas: &mut Canvas) {
        let view = self.view.lock().clone();
        canvas.fill(BACKGROUND);

        // Pad grid mirror, bottom row at the bottom
        for (y, row) in view.held.iter().enumerate() {
            for (x, &held) in row.iter().enumerate() {
                let px = GRID_X + x * PAD_CELL;
                let py = GRID_Y + (7 - y) * PAD_CELL;
                let color = if held { Rgb::WHITE } else { Rgb::DARK_GRAY };
                canvas.fill_rect(px + 1, py + 1, PAD_CELL - 2, PAD_CELL - 2, color);
            }
        }

        // Transport and record indicators
        let play = if view.rolling { Rgb::GREEN } else { Rgb::GRAY };
        canvas.fill_rect(180, 12, 60, 40, play);

        let record = match view.record {
            RecordState::Disabled => Rgb::GRAY,
            RecordState::Enabled => Rgb::new(128, 0, 0),
            RecordState::Recording => Rgb::RED,
        };
        canvas.fill_rect(250, 12, 60, 40, record);

        if view.looping {
            canvas.draw_rect(176, 8, 138, 48, Rgb::BLUE);
        }
        if view.shift {
            canvas.draw_rect(0, 0, canvas.width(), canvas.height(), Rgb::WHITE);
        }

        // Touch strip position along the bottom
        let width = canvas.width() - 200;
        let filled = usize::from(view.strip) * width / 16383;
        canvas.draw_rect(180, 140, width, 8, Rgb::GRAY);
        canvas.fill_rect(180, 140, filled, 8, Rgb::WHITE);
    }
}
