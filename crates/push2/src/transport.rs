//! Device transport.
//!
//! The surface talks to the hardware through the [`Device`] trait. The real
//! implementation, [`Push2Device`], pairs the USB display with the two MIDI
//! port pairs the Push 2 exposes.

use std::sync::Arc;
use std::time::Duration;

use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::display::{FrameSink, Push2Display};
use crate::error::TransportError;
use crate::midi::device_name;

/// One of the two MIDI port pairs of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    /// Control I/O: pads, buttons, LEDs
    Live,
    /// Alternate channel used in user mode
    User,
}

impl Port {
    pub const ALL: [Port; 2] = [Port::Live, Port::User];

    fn index(self) -> usize {
        match self {
            Port::Live => 0,
            Port::User => 1,
        }
    }
}

/// Raw inbound bytes tagged with the port they arrived on.
pub type InboundSender = mpsc::UnboundedSender<(Port, Vec<u8>)>;

/// Hardware seam of the surface.
pub trait Device: Send {
    /// Open the device; inbound MIDI is forwarded to `inbound`.
    fn open(&mut self, inbound: InboundSender) -> Result<(), TransportError>;

    /// Release everything. Closing a closed device does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Send one MIDI message.
    fn write(&mut self, port: Port, bytes: &[u8]) -> Result<(), TransportError>;

    /// Display handle for the frame transfer thread, present while open.
    fn frame_sink(&self) -> Option<Arc<dyn FrameSink>>;
}

/// Classify a MIDI port name.
///
/// Port names differ per platform: "Ableton Push 2 Live Port" / "User Port"
/// on macOS, "... MIDI 1" / "... MIDI 2" with ALSA, and "MIDIIN2 (Ableton
/// Push 2)" for the second pair on Windows.
pub fn port_role(name: &str) -> Option<Port> {
    if !name.contains("Push 2") {
        return None;
    }
    let user = name.contains("User Port")
        || name.contains("MIDI 2")
        || name.starts_with("MIDIIN2")
        || name.starts_with("MIDIOUT2");
    Some(if user { Port::User } else { Port::Live })
}

fn find_port<T: midir::MidiIO>(io: &T, port: Port) -> Option<T::Port> {
    io.ports().into_iter().find(|p| {
        io.port_name(p)
            .map(|name| port_role(&name) == Some(port))
            .unwrap_or(false)
    })
}

/// Ableton Push 2 over USB and MIDI.
pub struct Push2Device {
    timeout: Duration,
    display: Option<Arc<Push2Display>>,
    inputs: [Option<MidiInputConnection<()>>; 2],
    outputs: [Option<MidiOutputConnection>; 2],
}

impl Push2Device {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            display: None,
            inputs: [None, None],
            outputs: [None, None],
        }
    }

    fn connect_input(
        port: Port,
        inbound: InboundSender,
    ) -> Result<MidiInputConnection<()>, TransportError> {
        let midi_in = MidiInput::new("push2_surface_in")
            .map_err(|e| TransportError::Midi(e.to_string()))?;
        let in_port = find_port(&midi_in, port).ok_or(TransportError::PortNotFound(port))?;

        midi_in
            .connect(
                &in_port,
                "push2-input",
                move |_timestamp, message, _| {
                    // Forward raw MIDI bytes to the worker
                    let _ = inbound.send((port, message.to_vec()));
                },
                (),
            )
            .map_err(|e| TransportError::Midi(e.to_string()))
    }

    fn connect_output(port: Port) -> Result<MidiOutputConnection, TransportError> {
        let midi_out = MidiOutput::new("push2_surface_out")
            .map_err(|e| TransportError::Midi(e.to_string()))?;
        let out_port = find_port(&midi_out, port).ok_or(TransportError::PortNotFound(port))?;

        midi_out
            .connect(&out_port, "push2-output")
            .map_err(|e| TransportError::Midi(e.to_string()))
    }
}

impl Device for Push2Device {
    fn open(&mut self, inbound: InboundSender) -> Result<(), TransportError> {
        if self.is_open() {
            return Ok(());
        }

        let display = Push2Display::open(self.timeout)?;

        let mut inputs = [None, None];
        let mut outputs = [None, None];
        for port in Port::ALL {
            match (
                Self::connect_input(port, inbound.clone()),
                Self::connect_output(port),
            ) {
                (Ok(input), Ok(output)) => {
                    inputs[port.index()] = Some(input);
                    outputs[port.index()] = Some(output);
                }
                // The live pair is required, the user pair is optional
                (Err(e), _) | (_, Err(e)) if port == Port::Live => return Err(e),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!("{} {:?} port unavailable: {}", device_name(), port, e);
                }
            }
        }

        self.display = Some(Arc::new(display));
        self.inputs = inputs;
        self.outputs = outputs;
        tracing::info!("{} opened", device_name());
        Ok(())
    }

    fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        self.inputs = [None, None];
        self.outputs = [None, None];
        self.display = None;
        tracing::info!("{} closed", device_name());
    }

    fn is_open(&self) -> bool {
        self.display.is_some()
    }

    fn write(&mut self, port: Port, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        let output = self.outputs[port.index()]
            .as_mut()
            .ok_or(TransportError::PortNotFound(port))?;
        output
            .send(bytes)
            .map_err(|e| TransportError::Midi(e.to_string()))
    }

    fn frame_sink(&self) -> Option<Arc<dyn FrameSink>> {
        self.display
            .as_ref()
            .map(|display| display.clone() as Arc<dyn FrameSink>)
    }
}

impl Drop for Push2Device {
    fn drop(&mut self) {
        self.close();
    }
}
