//! The configuration model: a per-slot object graph parsed from the binary
//! wire format, plus persistence of the raw frame to non-volatile memory.

mod frame;
mod store;

pub use frame::{
    ConfigFrame, ConfigObject, FrameError, ObjectKind, FRAME_MAGIC, HEADER_LEN, OBJECT_LEN,
};
pub use store::{ConfigStore, NvMemory, StoreError};

use heapless::Vec;
use smart_leds::RGB8;

use crate::chain::MAX_MODULES;

/// Key actions accumulated per slot before further ones are dropped.
pub const MAX_ACTIONS_PER_SLOT: usize = 8;
/// Upper bound on objects in one configuration frame: a full chain with a
/// full action list, press color and animation on every slot.
pub const MAX_CONFIG_OBJECTS: usize = MAX_MODULES * (MAX_ACTIONS_PER_SLOT + 2);
/// Largest frame the head accepts over the serial link.
pub const MAX_CONFIG_LEN: usize = HEADER_LEN + OBJECT_LEN * MAX_CONFIG_OBJECTS;

/// How a configured key fires while its button is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressMode {
    /// Exactly one HID press per physical press, released with the button.
    OneShot,
    /// Auto-repeat with an initial delay, like a held keyboard key.
    Continuous,
}

/// A single keystroke bound to a slot. The cooldown and tick fields are
/// runtime state owned by the key engine; parsing always resets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAction {
    pub keycode: u8,
    pub mode: PressMode,
    pub(crate) cooldown_ms: u32,
    pub(crate) last_tick_ms: u32,
}

impl KeyAction {
    pub fn new(keycode: u8, mode: PressMode) -> Self {
        KeyAction {
            keycode,
            mode,
            cooldown_ms: 0,
            last_tick_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnimationKind {
    Gradient,
    Pulse,
    Still,
}

impl AnimationKind {
    fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(AnimationKind::Gradient),
            1 => Some(AnimationKind::Pulse),
            2 => Some(AnimationKind::Still),
            _ => None,
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            AnimationKind::Gradient => 0,
            AnimationKind::Pulse => 1,
            AnimationKind::Still => 2,
        }
    }
}

/// Idle look of an unpressed slot. `Gradient` ignores the stored color; the
/// rainbow is computed chain-wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleAnimation {
    pub kind: AnimationKind,
    pub color: RGB8,
}

/// Everything configured for one slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotConfig {
    /// Applied in the order they appeared in the frame.
    pub actions: Vec<KeyAction, MAX_ACTIONS_PER_SLOT>,
    pub press_color: Option<RGB8>,
    pub idle_animation: Option<IdleAnimation>,
}

/// The parsed aggregate for the whole chain, one entry per enumerated slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    slots: Vec<SlotConfig, MAX_MODULES>,
}

impl Config {
    /// An unconfigured chain of `slot_count` slots.
    pub fn empty(slot_count: usize) -> Self {
        let mut slots = Vec::new();
        slots
            .resize(slot_count.min(MAX_MODULES), SlotConfig::default())
            .ok();
        Config { slots }
    }

    /// Rebuild the object graph from a validated frame.
    ///
    /// Objects aimed at slots beyond `slot_count`, objects of unknown type
    /// and animations of unknown kind are skipped. Key actions accumulate in
    /// frame order; press colors and idle animations last-win.
    pub fn from_frame(frame: &ConfigFrame<'_>, slot_count: usize) -> Self {
        let mut config = Config::empty(slot_count);
        for object in frame.objects() {
            let slot = object.slot() as usize;
            let Some(slot_config) = config.slots.get_mut(slot) else {
                debug!("config: no slot {}, object dropped", slot);
                continue;
            };
            let data = object.data();
            match object.kind() {
                Some(ObjectKind::Key) => {
                    let mode = if data[1] == 0 {
                        PressMode::OneShot
                    } else {
                        PressMode::Continuous
                    };
                    if slot_config.actions.push(KeyAction::new(data[0], mode)).is_err() {
                        warn!("config: slot {} action list full, key dropped", slot);
                    }
                }
                Some(ObjectKind::PressColor) => {
                    slot_config.press_color = Some(RGB8::new(data[0], data[1], data[2]));
                }
                Some(ObjectKind::IdleAnimation) => match AnimationKind::from_wire(data[3]) {
                    Some(kind) => {
                        slot_config.idle_animation = Some(IdleAnimation {
                            kind,
                            color: RGB8::new(data[0], data[1], data[2]),
                        });
                    }
                    None => debug!("config: unknown animation kind {}", data[3]),
                },
                None => debug!("config: unknown object type {}", object.raw_kind()),
            }
        }
        config
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, slot: usize) -> Option<&SlotConfig> {
        self.slots.get(slot)
    }

    pub(crate) fn slot_mut(&mut self, slot: usize) -> Option<&mut SlotConfig> {
        self.slots.get_mut(slot)
    }

    /// Re-serialize the graph in canonical order: per slot, key actions in
    /// insertion order, then the press color, then the idle animation.
    /// Round-trips with [`Config::from_frame`] for frames already in that
    /// order.
    pub fn encode(&self) -> Vec<u8, MAX_CONFIG_LEN> {
        let mut out: Vec<u8, MAX_CONFIG_LEN> = Vec::new();
        out.extend_from_slice(&FRAME_MAGIC.to_le_bytes()).ok();
        out.extend_from_slice(&[0, 0]).ok();

        let mut count: u16 = 0;
        let mut push = |out: &mut Vec<u8, MAX_CONFIG_LEN>, object: [u8; OBJECT_LEN]| {
            if out.extend_from_slice(&object).is_ok() {
                count += 1;
            }
        };

        for (index, slot) in self.slots.iter().enumerate() {
            for action in &slot.actions {
                let mut object = [0u8; OBJECT_LEN];
                object[0] = ObjectKind::Key.to_wire();
                object[1] = index as u8;
                object[2] = action.keycode;
                object[3] = matches!(action.mode, PressMode::Continuous) as u8;
                push(&mut out, object);
            }
            if let Some(color) = slot.press_color {
                let mut object = [0u8; OBJECT_LEN];
                object[0] = ObjectKind::PressColor.to_wire();
                object[1] = index as u8;
                object[2] = color.r;
                object[3] = color.g;
                object[4] = color.b;
                push(&mut out, object);
            }
            if let Some(animation) = slot.idle_animation {
                let mut object = [0u8; OBJECT_LEN];
                object[0] = ObjectKind::IdleAnimation.to_wire();
                object[1] = index as u8;
                object[2] = animation.color.r;
                object[3] = animation.color.g;
                object[4] = animation.color.b;
                object[5] = animation.kind.to_wire();
                push(&mut out, object);
            }
        }

        out[2..4].copy_from_slice(&count.to_le_bytes());
        out
    }
}
