//! LED state for Push 2 pads and buttons.
//!
//! Every pad and button has a palette index and one of sixteen animation
//! states. Mutations return the wire message that has to go out right away;
//! nothing is batched or deferred.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::mapping::{ButtonId, Palette};
use super::wire;

/// Push 2 default palette indices.
///
/// White-only buttons read the index as a brightness instead.
pub mod colors {
    pub const BLACK: u8 = 0;
    pub const ORANGE: u8 = 3;
    pub const YELLOW: u8 = 8;
    pub const GREEN_DIM: u8 = 19;
    pub const CYAN: u8 = 33;
    pub const BLUE_DIM: u8 = 45;
    pub const PURPLE: u8 = 49;
    pub const WHITE: u8 = 122;
    pub const LIGHT_GRAY: u8 = 123;
    pub const DARK_GRAY: u8 = 124;
    pub const BLUE: u8 = 125;
    pub const GREEN: u8 = 126;
    pub const RED: u8 = 127;

    pub const WHITE_DIM: u8 = 16;
    pub const WHITE_HALF: u8 = 48;
    pub const WHITE_FULL: u8 = 127;
}

/// Animation class of a lit LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingClass {
    OneShot,
    Pulsing,
    Blinking,
}

/// Note division the animation is synced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Division {
    TwentyFourth,
    Sixteenth,
    Eighth,
    Quarter,
    Half,
}

/// LED animation state. The ordinal is the 4-bit value the firmware
/// expects in the low nibble of the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LedState {
    #[default]
    Off,
    OneShot24th,
    OneShot16th,
    OneShot8th,
    OneShot4th,
    OneShotHalf,
    Pulsing24th,
    Pulsing16th,
    Pulsing8th,
    Pulsing4th,
    PulsingHalf,
    Blinking24th,
    Blinking16th,
    Blinking8th,
    Blinking4th,
    BlinkingHalf,
}

impl LedState {
    pub const ALL: [LedState; 16] = [
        LedState::Off,
        LedState::OneShot24th,
        LedState::OneShot16th,
        LedState::OneShot8th,
        LedState::OneShot4th,
        LedState::OneShotHalf,
        LedState::Pulsing24th,
        LedState::Pulsing16th,
        LedState::Pulsing8th,
        LedState::Pulsing4th,
        LedState::PulsingHalf,
        LedState::Blinking24th,
        LedState::Blinking16th,
        LedState::Blinking8th,
        LedState::Blinking4th,
        LedState::BlinkingHalf,
    ];

    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    /// Build a lit state from its class and division.
    pub fn new(class: TimingClass, division: Division) -> Self {
        let class = match class {
            TimingClass::OneShot => 0,
            TimingClass::Pulsing => 1,
            TimingClass::Blinking => 2,
        };
        let division = match division {
            Division::TwentyFourth => 0,
            Division::Sixteenth => 1,
            Division::Eighth => 2,
            Division::Quarter => 3,
            Division::Half => 4,
        };
        Self::ALL[1 + class * 5 + division]
    }

    /// Class and division, `None` for [`LedState::Off`].
    pub fn timing(self) -> Option<(TimingClass, Division)> {
        let ordinal = self.ordinal();
        if ordinal == 0 {
            return None;
        }
        let class = match (ordinal - 1) / 5 {
            0 => TimingClass::OneShot,
            1 => TimingClass::Pulsing,
            _ => TimingClass::Blinking,
        };
        let division = match (ordinal - 1) % 5 {
            0 => Division::TwentyFourth,
            1 => Division::Sixteenth,
            2 => Division::Eighth,
            3 => Division::Quarter,
            _ => Division::Half,
        };
        Some((class, division))
    }

    pub fn is_off(self) -> bool {
        self == LedState::Off
    }
}

/// Palette index outside the 7-bit range the firmware accepts.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("color index {0} is outside the 7-bit palette")]
pub struct ColorOutOfRange(pub u8);

pub(crate) fn check_color(color_index: u8) -> Result<u8, ColorOutOfRange> {
    if color_index > 0x7F {
        Err(ColorOutOfRange(color_index))
    } else {
        Ok(color_index)
    }
}

/// Illumination record shared by every control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Led {
    wire_id: u8,
    color_index: u8,
    state: LedState,
}

impl Led {
    pub(crate) fn new(wire_id: u8) -> Self {
        Self {
            wire_id,
            color_index: 0,
            state: LedState::Off,
        }
    }

    pub fn wire_id(&self) -> u8 {
        self.wire_id
    }

    pub fn color_index(&self) -> u8 {
        self.color_index
    }

    pub fn state(&self) -> LedState {
        self.state
    }
}

/// Variant payload of a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    Pad { x: u8, y: u8 },
    Button { id: ButtonId, palette: Palette },
}

/// A pad or button with its LED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    led: Led,
    kind: ControlKind,
}

impl Control {
    pub(crate) fn pad(x: u8, y: u8, note: u8) -> Self {
        Self {
            led: Led::new(note),
            kind: ControlKind::Pad { x, y },
        }
    }

    pub(crate) fn button(id: ButtonId, palette: Palette, controller: u8) -> Self {
        Self {
            led: Led::new(controller),
            kind: ControlKind::Button { id, palette },
        }
    }

    pub fn led(&self) -> &Led {
        &self.led
    }

    pub fn kind(&self) -> &ControlKind {
        &self.kind
    }

    pub fn wire_id(&self) -> u8 {
        self.led.wire_id
    }

    pub fn button_id(&self) -> Option<ButtonId> {
        match self.kind {
            ControlKind::Button { id, .. } => Some(id),
            ControlKind::Pad { .. } => None,
        }
    }

    pub fn coordinates(&self) -> Option<(u8, u8)> {
        match self.kind {
            ControlKind::Pad { x, y } => Some((x, y)),
            ControlKind::Button { .. } => None,
        }
    }

    /// Current LED message for this control.
    pub fn state_msg(&self) -> [u8; 3] {
        let Led {
            wire_id,
            color_index,
            state,
        } = self.led;
        match self.kind {
            ControlKind::Pad { .. } => wire::encode_pad(state, color_index, wire_id),
            ControlKind::Button { .. } => wire::encode_button(state, color_index, wire_id),
        }
    }

    /// Switch the animation state. Always emits.
    pub fn set_state(&mut self, state: LedState) -> [u8; 3] {
        self.led.state = state;
        self.state_msg()
    }

    /// Change the palette index. Emits only while the LED is lit; the new
    /// index is picked up by the next non-off state.
    pub fn set_color(&mut self, color_index: u8) -> Result<Option<[u8; 3]>, ColorOutOfRange> {
        self.led.color_index = check_color(color_index)?;
        if self.led.state.is_off() {
            Ok(None)
        } else {
            Ok(Some(self.state_msg()))
        }
    }

    /// Change both fields with a single message.
    pub fn set(&mut self, state: LedState, color_index: u8) -> Result<[u8; 3], ColorOutOfRange> {
        self.led.color_index = check_color(color_index)?;
        Ok(self.set_state(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixteen_states_fit_a_nibble() {
        for (i, state) in LedState::ALL.iter().enumerate() {
            assert_eq!(state.ordinal() as usize, i);
            assert!(state.ordinal() <= 0x0F);
            assert_eq!(LedState::from_ordinal(i as u8), Some(*state));
        }
        assert_eq!(LedState::from_ordinal(16), None);
    }

    #[test]
    fn test_timing_round_trip() {
        assert_eq!(LedState::Off.timing(), None);
        for state in &LedState::ALL[1..] {
            let (class, division) = state.timing().unwrap();
            assert_eq!(LedState::new(class, division), *state);
        }
        assert_eq!(
            LedState::new(TimingClass::OneShot, Division::Eighth),
            LedState::OneShot8th
        );
        assert_eq!(
            LedState::new(TimingClass::Blinking, Division::Half),
            LedState::BlinkingHalf
        );
    }

    #[test]
    fn test_color_while_off_is_silent() {
        let mut pad = Control::pad(0, 0, 36);

        assert_eq!(pad.set_state(LedState::Off), [0x90, 36, 0]);
        assert_eq!(pad.set_color(5), Ok(None));

        let message = pad.set_state(LedState::OneShot8th);
        assert_eq!(message, [0x90 | LedState::OneShot8th.ordinal(), 36, 5]);
    }

    #[test]
    fn test_color_while_lit_emits() {
        let mut button = Control::button(ButtonId::Play, Palette::Color, 85);
        button.set_state(LedState::Pulsing4th);

        let message = button.set_color(colors::GREEN).unwrap();
        assert_eq!(
            message,
            Some([0xB0 | LedState::Pulsing4th.ordinal(), 85, colors::GREEN])
        );
    }

    #[test]
    fn test_color_zero_is_not_off() {
        let mut pad = Control::pad(1, 0, 37);
        pad.set_color(colors::BLACK).unwrap();
        pad.set_state(LedState::OneShot24th);

        assert_eq!(pad.led().state(), LedState::OneShot24th);
        assert_eq!(pad.led().color_index(), 0);
        assert_eq!(pad.state_msg(), [0x91, 37, 0]);
    }

    #[test]
    fn test_color_out_of_range() {
        let mut pad = Control::pad(0, 0, 36);
        assert_eq!(pad.set_color(128), Err(ColorOutOfRange(128)));
        assert_eq!(pad.led().color_index(), 0);
        assert!(pad.set(LedState::OneShot4th, 200).is_err());
        assert_eq!(pad.led().state(), LedState::Off);
    }
}
