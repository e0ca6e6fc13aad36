//! Push 2 wire codec.
//!
//! LED messages are three bytes: a status byte whose low nibble carries the
//! LED animation state, the wire id (note or controller number) and the
//! palette index. Inbound bytes are parsed into [`WireEvent`]s without any
//! knowledge of the control layout.

use super::led::LedState;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PITCH_BEND: u8 = 0xE0;
pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Universal identity request, answered with a [`DeviceIdentity`] reply.
pub const IDENTITY_REQUEST: [u8; 6] = [SYSEX_START, 0x7E, 0x01, 0x06, 0x01, SYSEX_END];

/// Ableton's SysEx manufacturer id.
pub const ABLETON_MANUFACTURER: [u8; 3] = [0x00, 0x21, 0x1D];

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
    /// 14-bit value, 0..=16383
    PitchBend { channel: u8, value: u16 },
    /// Complete message including the `F0`/`F7` framing bytes
    SysEx(Vec<u8>),
    Unrecognized(Vec<u8>),
}

/// Encode the LED message for a pad.
pub fn encode_pad(state: LedState, color_index: u8, wire_id: u8) -> [u8; 3] {
    [
        NOTE_ON | state.ordinal(),
        wire_id & 0x7F,
        visible_color(state, color_index),
    ]
}

/// Encode the LED message for a button.
pub fn encode_button(state: LedState, color_index: u8, wire_id: u8) -> [u8; 3] {
    [
        CONTROL_CHANGE | state.ordinal(),
        wire_id & 0x7F,
        visible_color(state, color_index),
    ]
}

fn visible_color(state: LedState, color_index: u8) -> u8 {
    if state == LedState::Off {
        0
    } else {
        color_index & 0x7F
    }
}

/// Parse one inbound MIDI message.
///
/// Never fails: anything that is not one of the handled families, or is
/// truncated, comes back as [`WireEvent::Unrecognized`].
pub fn decode_event(bytes: &[u8]) -> WireEvent {
    let Some(&status) = bytes.first() else {
        return WireEvent::Unrecognized(Vec::new());
    };

    if status == SYSEX_START {
        return decode_sysex(bytes);
    }

    let channel = status & 0x0F;
    let data = match &bytes[1..] {
        [a, b] if a & 0x80 == 0 && b & 0x80 == 0 => Some((*a, *b)),
        _ => None,
    };

    let event = data.and_then(|(a, b)| match status & 0xF0 {
        NOTE_ON => Some(WireEvent::NoteOn {
            channel,
            note: a,
            velocity: b,
        }),
        NOTE_OFF => Some(WireEvent::NoteOff {
            channel,
            note: a,
            velocity: b,
        }),
        CONTROL_CHANGE => Some(WireEvent::Controller {
            channel,
            controller: a,
            value: b,
        }),
        PITCH_BEND => Some(WireEvent::PitchBend {
            channel,
            value: u16::from(a) | (u16::from(b) << 7),
        }),
        _ => None,
    });

    event.unwrap_or_else(|| WireEvent::Unrecognized(bytes.to_vec()))
}

fn decode_sysex(bytes: &[u8]) -> WireEvent {
    let clean = match bytes {
        [SYSEX_START, payload @ .., SYSEX_END] => payload.iter().all(|b| b & 0x80 == 0),
        _ => false,
    };

    if clean {
        WireEvent::SysEx(bytes.to_vec())
    } else {
        WireEvent::Unrecognized(bytes.to_vec())
    }
}

/// Device identity reported in reply to [`IDENTITY_REQUEST`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub manufacturer: [u8; 3],
    pub family: u16,
    pub member: u16,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub build: u16,
    pub serial: u32,
    pub board_revision: Option<u8>,
}

impl DeviceIdentity {
    /// Parse an identity reply:
    /// `F0 7E <dev> 06 02 <mfr x3> <family x2> <member x2> <major> <minor>
    /// <build x2> <serial x5> [<board rev>] F7`.
    ///
    /// Multi-byte fields are 7-bit groups, least significant first.
    pub fn parse(message: &[u8]) -> Option<Self> {
        let body = message.strip_prefix(&[SYSEX_START])?.strip_suffix(&[SYSEX_END])?;
        if body.len() < 20 || body[0] != 0x7E || body[2] != 0x06 || body[3] != 0x02 {
            return None;
        }

        let seven = |bytes: &[u8]| {
            bytes
                .iter()
                .rev()
                .fold(0u32, |acc, b| (acc << 7) | u32::from(b & 0x7F))
        };

        Some(Self {
            manufacturer: [body[4], body[5], body[6]],
            family: seven(&body[7..9]) as u16,
            member: seven(&body[9..11]) as u16,
            firmware_major: body[11],
            firmware_minor: body[12],
            build: seven(&body[13..15]) as u16,
            serial: seven(&body[15..20]),
            board_revision: body.get(20).copied(),
        })
    }

    pub fn is_ableton(&self) -> bool {
        self.manufacturer == ABLETON_MANUFACTURER
    }
}
