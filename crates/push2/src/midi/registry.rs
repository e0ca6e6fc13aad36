//! Control registry.
//!
//! Owns every pad and button for the lifetime of the surface. Lookups by
//! wire id, logical id and grid coordinate are array or hash lookups built
//! once by [`Registry::build`]; after that only LED fields change.

use std::collections::HashMap;
use std::fmt;

use crate::error::ConfigurationError;

use super::led::{ColorOutOfRange, Control, LedState};
use super::mapping::{pad_note, ButtonId, Layout, GRID_SIZE};

/// Callback bound to a button edge.
pub type ButtonAction = Box<dyn FnMut(ButtonId) + Send>;

/// Wire id namespaces. Notes and controllers are numbered independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Note,
    Controller,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Note => write!(f, "note"),
            Namespace::Controller => write!(f, "controller"),
        }
    }
}

/// Press/release handlers keyed by logical button id.
///
/// ```no_run
/// use push2_surface::{ButtonId, Handlers};
///
/// let handlers = Handlers::new()
///     .on_press(ButtonId::Play, |_| println!("play"))
///     .on_release(ButtonId::Shift, |_| println!("shift up"));
/// ```
#[derive(Default)]
pub struct Handlers {
    press: HashMap<ButtonId, ButtonAction>,
    release: HashMap<ButtonId, ButtonAction>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_press(mut self, id: ButtonId, action: impl FnMut(ButtonId) + Send + 'static) -> Self {
        self.press.insert(id, Box::new(action));
        self
    }

    pub fn on_release(
        mut self,
        id: ButtonId,
        action: impl FnMut(ButtonId) + Send + 'static,
    ) -> Self {
        self.release.insert(id, Box::new(action));
        self
    }
}

#[derive(Default)]
struct Binding {
    press: Option<ButtonAction>,
    release: Option<ButtonAction>,
}

const WIRE_IDS: usize = 128;
const PADS: usize = (GRID_SIZE as usize) * (GRID_SIZE as usize);

/// All controls of the surface and their lookup tables.
pub struct Registry {
    controls: Vec<Control>,
    bindings: Vec<Binding>,
    by_note: [Option<usize>; WIRE_IDS],
    by_controller: [Option<usize>; WIRE_IDS],
    by_coord: [usize; PADS],
    by_id: HashMap<ButtonId, usize>,
}

impl Registry {
    /// Build every pad and button. A duplicate wire id in either namespace
    /// is a table error and aborts.
    pub fn build(layout: &Layout<'_>, handlers: Handlers) -> Result<Self, ConfigurationError> {
        let mut controls = Vec::with_capacity(PADS + layout.buttons.len());
        let mut by_note = [None; WIRE_IDS];
        let mut by_controller = [None; WIRE_IDS];
        let mut by_coord = [0; PADS];
        let mut by_id = HashMap::with_capacity(layout.buttons.len());

        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                let note = pad_note(layout.pad_base_note, x, y)
                    .ok_or(ConfigurationError::WireIdOutOfRange(layout.pad_base_note))?;
                let index = controls.len();
                insert_unique(&mut by_note, Namespace::Note, note, index)?;
                by_coord[coord(x, y)] = index;
                controls.push(Control::pad(x, y, note));
            }
        }

        for spec in layout.buttons {
            if spec.controller as usize >= WIRE_IDS {
                return Err(ConfigurationError::WireIdOutOfRange(spec.controller));
            }
            let index = controls.len();
            insert_unique(
                &mut by_controller,
                Namespace::Controller,
                spec.controller,
                index,
            )?;
            if by_id.insert(spec.id, index).is_some() {
                return Err(ConfigurationError::DuplicateButton(spec.id));
            }
            controls.push(Control::button(spec.id, spec.palette, spec.controller));
        }

        let mut bindings: Vec<Binding> = controls.iter().map(|_| Binding::default()).collect();
        let Handlers { press, release } = handlers;
        for (id, action) in press {
            let index = *by_id.get(&id).ok_or(ConfigurationError::UnboundHandler(id))?;
            bindings[index].press = Some(action);
        }
        for (id, action) in release {
            let index = *by_id.get(&id).ok_or(ConfigurationError::UnboundHandler(id))?;
            bindings[index].release = Some(action);
        }

        tracing::debug!(
            pads = PADS,
            buttons = layout.buttons.len(),
            "Control registry built"
        );

        Ok(Self {
            controls,
            bindings,
            by_note,
            by_controller,
            by_coord,
            by_id,
        })
    }

    pub fn resolve_by_wire(&self, namespace: Namespace, id: u8) -> Option<&Control> {
        self.index_by_wire(namespace, id).map(|i| &self.controls[i])
    }

    pub fn resolve_by_logical(&self, id: ButtonId) -> Option<&Control> {
        self.by_id.get(&id).map(|&i| &self.controls[i])
    }

    pub fn resolve_by_coord(&self, x: u8, y: u8) -> Option<&Control> {
        if x < GRID_SIZE && y < GRID_SIZE {
            Some(&self.controls[self.by_coord[coord(x, y)]])
        } else {
            None
        }
    }

    fn index_by_wire(&self, namespace: Namespace, id: u8) -> Option<usize> {
        let table = match namespace {
            Namespace::Note => &self.by_note,
            Namespace::Controller => &self.by_controller,
        };
        table.get(usize::from(id)).copied().flatten()
    }

    /// Set a button's animation state; returns the message to send.
    pub fn set_led_state(&mut self, id: ButtonId, state: LedState) -> Option<[u8; 3]> {
        let index = *self.by_id.get(&id)?;
        Some(self.controls[index].set_state(state))
    }

    /// Set a button's palette index; returns a message only if the LED is lit.
    pub fn set_led_color(
        &mut self,
        id: ButtonId,
        color_index: u8,
    ) -> Result<Option<[u8; 3]>, ColorOutOfRange> {
        match self.by_id.get(&id) {
            Some(&index) => self.controls[index].set_color(color_index),
            None => Ok(None),
        }
    }

    /// Set state and color of a button at once.
    pub fn set_led(
        &mut self,
        id: ButtonId,
        state: LedState,
        color_index: u8,
    ) -> Result<Option<[u8; 3]>, ColorOutOfRange> {
        match self.by_id.get(&id) {
            Some(&index) => self.controls[index].set(state, color_index).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_pad_state(&mut self, x: u8, y: u8, state: LedState) -> Option<[u8; 3]> {
        if x >= GRID_SIZE || y >= GRID_SIZE {
            return None;
        }
        let index = self.by_coord[coord(x, y)];
        Some(self.controls[index].set_state(state))
    }

    /// Set a pad's palette index; returns a message only if the pad is lit.
    pub fn set_pad_color(
        &mut self,
        x: u8,
        y: u8,
        color_index: u8,
    ) -> Result<Option<[u8; 3]>, ColorOutOfRange> {
        if x >= GRID_SIZE || y >= GRID_SIZE {
            return Ok(None);
        }
        let index = self.by_coord[coord(x, y)];
        self.controls[index].set_color(color_index)
    }

    /// Set state and color of a pad at once.
    pub fn set_pad(
        &mut self,
        x: u8,
        y: u8,
        state: LedState,
        color_index: u8,
    ) -> Result<Option<[u8; 3]>, ColorOutOfRange> {
        if x >= GRID_SIZE || y >= GRID_SIZE {
            return Ok(None);
        }
        let index = self.by_coord[coord(x, y)];
        self.controls[index].set(state, color_index).map(Some)
    }

    /// Run the press handler bound to the button with this controller number.
    pub fn press(&mut self, controller: u8) -> Option<ButtonId> {
        self.fire(controller, true)
    }

    /// Run the release handler bound to the button with this controller number.
    pub fn release(&mut self, controller: u8) -> Option<ButtonId> {
        self.fire(controller, false)
    }

    fn fire(&mut self, controller: u8, pressed: bool) -> Option<ButtonId> {
        let index = self.index_by_wire(Namespace::Controller, controller)?;
        let id = self.controls[index].button_id()?;
        let binding = &mut self.bindings[index];
        let action = if pressed {
            binding.press.as_mut()
        } else {
            binding.release.as_mut()
        };
        if let Some(action) = action {
            action(id);
        }
        Some(id)
    }

    /// Messages reproducing the current state of every LED.
    pub fn all_led_messages(&self) -> Vec<[u8; 3]> {
        self.controls.iter().map(Control::state_msg).collect()
    }

    /// Messages turning every LED off. Stored state is kept so the next
    /// full refresh restores it.
    pub fn blackout(&self) -> Vec<[u8; 3]> {
        self.controls
            .iter()
            .map(|control| control.clone().set_state(LedState::Off))
            .collect()
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    pub fn pad_count(&self) -> usize {
        PADS
    }

    pub fn button_count(&self) -> usize {
        self.by_id.len()
    }
}

fn coord(x: u8, y: u8) -> usize {
    usize::from(y) * usize::from(GRID_SIZE) + usize::from(x)
}

fn insert_unique(
    table: &mut [Option<usize>; WIRE_IDS],
    namespace: Namespace,
    id: u8,
    index: usize,
) -> Result<(), ConfigurationError> {
    let slot = &mut table[usize::from(id)];
    if slot.is_some() {
        return Err(ConfigurationError::DuplicateWireId { namespace, id });
    }
    *slot = Some(index);
    Ok(())
}
