//! Per-tick LED frame computation.

mod animation;

pub use animation::{gradient, pulse};

use smart_leds::{SmartLedsWrite, RGB8};

use crate::chain::{ButtonState, StateTable, MAX_MODULES};
use crate::config::{AnimationKind, Config};

/// Painted while a slot is held with no configured press color.
pub const PRESSED_FALLBACK: RGB8 = RGB8 { r: 0, g: 255, b: 0 };
/// Painted for an idle slot with no configured animation.
pub const IDLE_FALLBACK: RGB8 = RGB8 { r: 255, g: 0, b: 0 };
/// Capture-mode override for held slots.
pub const CAPTURE_PRESSED: RGB8 = RGB8 { r: 0, g: 0, b: 255 };
/// Capture-mode override for idle slots.
pub const CAPTURE_IDLE: RGB8 = RGB8 {
    r: 255,
    g: 255,
    b: 255,
};

/// Computes one color per slot each tick and commits the frame to the strip
/// in a single write.
pub struct Renderer {
    animation_cycle: u16,
    frame: [RGB8; MAX_MODULES],
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            animation_cycle: 0,
            frame: [RGB8 { r: 0, g: 0, b: 0 }; MAX_MODULES],
        }
    }

    /// The wrapping tick counter animations derive their time base from.
    pub fn cycle(&self) -> u16 {
        self.animation_cycle
    }

    /// Paint every slot and commit the frame. Advances the animation cycle
    /// by one.
    pub fn render<S>(
        &mut self,
        config: &Config,
        states: &StateTable,
        capture: bool,
        strip: &mut S,
    ) -> Result<(), S::Error>
    where
        S: SmartLedsWrite<Color = RGB8>,
    {
        let count = states.module_count().min(MAX_MODULES);
        for slot in 0..count {
            let pressed = states.slot_state(slot) == ButtonState::Pressed;
            self.frame[slot] = self.slot_color(config, slot, count, pressed, capture);
        }
        self.animation_cycle = self.animation_cycle.wrapping_add(1);
        strip.write(self.frame[..count].iter().copied())
    }

    fn slot_color(
        &self,
        config: &Config,
        slot: usize,
        count: usize,
        pressed: bool,
        capture: bool,
    ) -> RGB8 {
        if capture {
            return if pressed { CAPTURE_PRESSED } else { CAPTURE_IDLE };
        }
        let slot_config = config.slot(slot);
        if pressed {
            return slot_config
                .and_then(|config| config.press_color)
                .unwrap_or(PRESSED_FALLBACK);
        }
        match slot_config.and_then(|config| config.idle_animation) {
            Some(idle) => match idle.kind {
                AnimationKind::Gradient => animation::gradient(slot, count, self.animation_cycle),
                AnimationKind::Pulse => animation::pulse(idle.color, self.animation_cycle),
                AnimationKind::Still => idle.color,
            },
            None => IDLE_FALLBACK,
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new()
    }
}
