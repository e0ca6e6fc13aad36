//! Host state feedback.
//!
//! The host pushes coarse state changes (record armed, transport rolling,
//! ...). The [`FeedbackMap`] decides which button shows each one and how it
//! is lit. The map is part of the surface preferences, so a host can move or
//! recolor feedback without code changes.

use serde::{Deserialize, Serialize};

use crate::midi::{colors, ButtonId, LedState};

/// Record arm state of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    Disabled,
    Enabled,
    Recording,
}

/// State changes the host reports to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Record(RecordState),
    Transport { rolling: bool },
    Loop(bool),
    SoloActive(bool),
}

/// How a button is lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedSpec {
    pub state: LedState,
    pub color: u8,
}

impl LedSpec {
    pub const fn new(state: LedState, color: u8) -> Self {
        Self { state, color }
    }

    /// Same color, LED off.
    pub const fn off(self) -> Self {
        Self {
            state: LedState::Off,
            color: self.color,
        }
    }
}

/// Button and lighting for each kind of host state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackMap {
    pub record_button: ButtonId,
    pub record_enabled: LedSpec,
    pub recording: LedSpec,

    pub play_button: ButtonId,
    pub rolling: LedSpec,

    pub loop_button: ButtonId,
    pub loop_on: LedSpec,

    pub solo_button: ButtonId,
    pub solo_active: LedSpec,
}

impl Default for FeedbackMap {
    fn default() -> Self {
        Self {
            record_button: ButtonId::RecordEnable,
            record_enabled: LedSpec::new(LedState::Blinking4th, colors::RED),
            recording: LedSpec::new(LedState::OneShot24th, colors::RED),
            play_button: ButtonId::Play,
            rolling: LedSpec::new(LedState::OneShot24th, colors::GREEN),
            loop_button: ButtonId::Repeat,
            loop_on: LedSpec::new(LedState::OneShot24th, colors::WHITE_FULL),
            solo_button: ButtonId::Solo,
            solo_active: LedSpec::new(LedState::Blinking4th, colors::BLUE),
        }
    }
}

impl FeedbackMap {
    /// Target button and lighting for a host state change.
    pub fn resolve(&self, state: HostState) -> (ButtonId, LedSpec) {
        match state {
            HostState::Record(RecordState::Disabled) => {
                (self.record_button, self.record_enabled.off())
            }
            HostState::Record(RecordState::Enabled) => (self.record_button, self.record_enabled),
            HostState::Record(RecordState::Recording) => (self.record_button, self.recording),
            HostState::Transport { rolling } => (self.play_button, lit_if(self.rolling, rolling)),
            HostState::Loop(on) => (self.loop_button, lit_if(self.loop_on, on)),
            HostState::SoloActive(active) => {
                (self.solo_button, lit_if(self.solo_active, active))
            }
        }
    }

    /// Colors that do not fit the 7-bit palette.
    pub(crate) fn invalid_colors(&self) -> Vec<String> {
        [
            ("record_enabled", self.record_enabled),
            ("recording", self.recording),
            ("rolling", self.rolling),
            ("loop_on", self.loop_on),
            ("solo_active", self.solo_active),
        ]
        .into_iter()
        .filter(|(_, spec)| spec.color > 0x7F)
        .map(|(name, spec)| format!("feedback.{} color {} exceeds 127", name, spec.color))
        .collect()
    }
}

fn lit_if(spec: LedSpec, on: bool) -> LedSpec {
    if on {
        spec
    } else {
        spec.off()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_feedback() {
        let map = FeedbackMap::default();

        let (button, spec) = map.resolve(HostState::Record(RecordState::Enabled));
        assert_eq!(button, ButtonId::RecordEnable);
        assert_eq!(spec, LedSpec::new(LedState::Blinking4th, colors::RED));

        let (_, spec) = map.resolve(HostState::Record(RecordState::Recording));
        assert_eq!(spec.state, LedState::OneShot24th);

        let (_, spec) = map.resolve(HostState::Record(RecordState::Disabled));
        assert_eq!(spec.state, LedState::Off);
        assert_eq!(spec.color, colors::RED);
    }

    #[test]
    fn test_default_transport_feedback() {
        let map = FeedbackMap::default();

        assert_eq!(
            map.resolve(HostState::Transport { rolling: true }),
            (
                ButtonId::Play,
                LedSpec::new(LedState::OneShot24th, colors::GREEN)
            )
        );
        assert_eq!(
            map.resolve(HostState::Transport { rolling: false }).1.state,
            LedState::Off
        );
        assert_eq!(map.resolve(HostState::Loop(true)).0, ButtonId::Repeat);
        assert_eq!(
            map.resolve(HostState::SoloActive(true)),
            (
                ButtonId::Solo,
                LedSpec::new(LedState::Blinking4th, colors::BLUE)
            )
        );
    }

    #[test]
    fn test_partial_map_fills_defaults() {
        let map: FeedbackMap = serde_json::from_str(r#"{ "play_button": "Shift" }"#).unwrap();
        assert_eq!(map.play_button, ButtonId::Shift);
        assert_eq!(map.record_button, ButtonId::RecordEnable);
    }

    #[test]
    fn test_invalid_colors() {
        let mut map = FeedbackMap::default();
        assert!(map.invalid_colors().is_empty());

        map.rolling.color = 200;
        let errors = map.invalid_colors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("rolling"));
    }
}
