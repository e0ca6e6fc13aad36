//! Push 2 MIDI mapping.
//!
//! Static wire ids for every physical control, taken from the device's
//! published MIDI map.
//!
//! # Pad Layout (8x8 grid, notes 36-99)
//!
//! ```text
//! y=7  92 93 94 95 96 97 98 99
//! ...
//! y=1  44 45 46 47 48 49 50 51
//! y=0  36 37 38 39 40 41 42 43
//!      x=0                  x=7
//! ```
//!
//! Buttons send control changes: 127 on press, 0 on release. Their
//! controller numbers are not sequential, so they live in a literal table.

use serde::{Deserialize, Serialize};

/// Logical identifier for every named button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ButtonId {
    TapTempo,
    Metronome,
    Upper1,
    Upper2,
    Upper3,
    Upper4,
    Upper5,
    Upper6,
    Upper7,
    Upper8,
    Setup,
    User,
    Delete,
    AddDevice,
    Device,
    Mix,
    Undo,
    AddTrack,
    Browse,
    Clip,
    Mute,
    Solo,
    Stop,
    Lower1,
    Lower2,
    Lower3,
    Lower4,
    Lower5,
    Lower6,
    Lower7,
    Lower8,
    Master,
    Convert,
    DoubleLoop,
    Quantize,
    Duplicate,
    New,
    FixedLength,
    Automate,
    RecordEnable,
    Play,
    Fwd32ndT,
    Fwd32nd,
    Fwd16thT,
    Fwd16th,
    Fwd8thT,
    Fwd8th,
    Fwd4trT,
    Fwd4tr,
    Up,
    Right,
    Down,
    Left,
    Repeat,
    Accent,
    Scale,
    Layout,
    Note,
    Session,
    OctaveUp,
    PageRight,
    OctaveDown,
    PageLeft,
    Shift,
    Select,
}

/// Which palette a button's LED understands.
///
/// Informational only: both accept any 7-bit index, white buttons read it
/// as brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Palette {
    Color,
    White,
}

/// One row of the button table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonSpec {
    pub id: ButtonId,
    pub controller: u8,
    pub palette: Palette,
}

const fn color(id: ButtonId, controller: u8) -> ButtonSpec {
    ButtonSpec {
        id,
        controller,
        palette: Palette::Color,
    }
}

const fn white(id: ButtonId, controller: u8) -> ButtonSpec {
    ButtonSpec {
        id,
        controller,
        palette: Palette::White,
    }
}

/// Note number of the bottom-left pad.
pub const PAD_BASE_NOTE: u8 = 36;

/// Pads per row and per column.
pub const GRID_SIZE: u8 = 8;

/// Every Push 2 button with its controller number.
pub const PUSH2_BUTTONS: &[ButtonSpec] = &[
    // RGB buttons
    color(ButtonId::Upper1, 102),
    color(ButtonId::Upper2, 103),
    color(ButtonId::Upper3, 104),
    color(ButtonId::Upper4, 105),
    color(ButtonId::Upper5, 106),
    color(ButtonId::Upper6, 107),
    color(ButtonId::Upper7, 108),
    color(ButtonId::Upper8, 109),
    color(ButtonId::Lower1, 20),
    color(ButtonId::Lower2, 21),
    color(ButtonId::Lower3, 22),
    color(ButtonId::Lower4, 23),
    color(ButtonId::Lower5, 24),
    color(ButtonId::Lower6, 25),
    color(ButtonId::Lower7, 26),
    color(ButtonId::Lower8, 27),
    color(ButtonId::Mute, 60),
    color(ButtonId::Solo, 61),
    color(ButtonId::Stop, 29),
    color(ButtonId::Fwd32ndT, 43),
    color(ButtonId::Fwd32nd, 42),
    color(ButtonId::Fwd16thT, 41),
    color(ButtonId::Fwd16th, 40),
    color(ButtonId::Fwd8thT, 39),
    color(ButtonId::Fwd8th, 38),
    color(ButtonId::Fwd4trT, 37),
    color(ButtonId::Fwd4tr, 36),
    color(ButtonId::Automate, 89),
    color(ButtonId::RecordEnable, 86),
    color(ButtonId::Play, 85),
    // White buttons
    white(ButtonId::TapTempo, 3),
    white(ButtonId::Metronome, 9),
    white(ButtonId::Setup, 30),
    white(ButtonId::User, 59),
    white(ButtonId::Delete, 118),
    white(ButtonId::AddDevice, 52),
    white(ButtonId::Device, 110),
    white(ButtonId::Mix, 112),
    white(ButtonId::Undo, 119),
    white(ButtonId::AddTrack, 53),
    white(ButtonId::Browse, 111),
    white(ButtonId::Clip, 113),
    white(ButtonId::Master, 28),
    white(ButtonId::Convert, 35),
    white(ButtonId::DoubleLoop, 117),
    white(ButtonId::Quantize, 116),
    white(ButtonId::Duplicate, 88),
    white(ButtonId::New, 87),
    white(ButtonId::FixedLength, 90),
    white(ButtonId::Up, 46),
    white(ButtonId::Right, 45),
    white(ButtonId::Down, 47),
    white(ButtonId::Left, 44),
    white(ButtonId::Repeat, 56),
    white(ButtonId::Accent, 57),
    white(ButtonId::Scale, 58),
    white(ButtonId::Layout, 31),
    white(ButtonId::Note, 50),
    white(ButtonId::Session, 51),
    white(ButtonId::OctaveUp, 55),
    white(ButtonId::PageRight, 63),
    white(ButtonId::OctaveDown, 54),
    white(ButtonId::PageLeft, 62),
    white(ButtonId::Shift, 49),
    white(ButtonId::Select, 48),
];

/// Physical layout the registry is built from.
#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    pub pad_base_note: u8,
    pub buttons: &'a [ButtonSpec],
}

impl Layout<'static> {
    pub fn push2() -> Self {
        Self {
            pad_base_note: PAD_BASE_NOTE,
            buttons: PUSH2_BUTTONS,
        }
    }
}

/// Note number for a pad coordinate, `None` past the 7-bit note range.
pub fn pad_note(base: u8, x: u8, y: u8) -> Option<u8> {
    let note = u16::from(base) + u16::from(y) * u16::from(GRID_SIZE) + u16::from(x);
    u8::try_from(note).ok().filter(|note| *note < 0x80)
}

/// Get the Push 2 device name for MIDI port matching.
pub fn device_name() -> &'static str {
    "Ableton Push 2"
}
