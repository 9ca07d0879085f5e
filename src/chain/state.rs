use heapless::Vec;

use super::{BASE_ASSIGN_ADDR, MAX_MODULES};

const TABLE_CAP: usize = BASE_ASSIGN_ADDR as usize + MAX_MODULES;

/// Latest reported state of one module's button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
}

/// Address-indexed button states for the enumerated chain.
///
/// Written only by [`StateTable::apply`] from the I2C receive callback, read
/// by the main loop. Entries survive reconfiguration.
pub struct StateTable {
    states: Vec<ButtonState, TABLE_CAP>,
}

impl StateTable {
    /// A table for `module_count` modules, everything released. The table
    /// covers addresses `0..2 + module_count` so that raw frames index it
    /// directly.
    pub fn new(module_count: usize) -> Self {
        let count = module_count.min(MAX_MODULES);
        let mut states = Vec::new();
        states
            .resize_default(BASE_ASSIGN_ADDR as usize + count)
            .ok();
        StateTable { states }
    }

    /// Number of enumerated modules.
    pub fn module_count(&self) -> usize {
        self.states.len() - BASE_ASSIGN_ADDR as usize
    }

    /// Decode one chain frame (`bit7` = state, `bits6..0` = sender address)
    /// and apply it. Repeats of the current state and frames for addresses
    /// beyond the table are dropped. Returns whether the table changed.
    ///
    /// Runs in interrupt context: no blocking, no allocation.
    pub fn apply(&mut self, frame: u8) -> bool {
        let addr = (frame & 0x7f) as usize;
        let state = if frame & 0x80 == 0 {
            ButtonState::Released
        } else {
            ButtonState::Pressed
        };
        match self.states.get_mut(addr) {
            Some(current) if *current != state => {
                *current = state;
                true
            }
            _ => false,
        }
    }

    /// State of logical slot `slot`, i.e. address `2 + slot`.
    pub fn slot_state(&self, slot: usize) -> ButtonState {
        self.states
            .get(BASE_ASSIGN_ADDR as usize + slot)
            .copied()
            .unwrap_or_default()
    }
}
