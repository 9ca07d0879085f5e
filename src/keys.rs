//! Translating button transitions into USB HID key events.

mod engine;

pub use engine::drive_slot;

use core::fmt::Debug;

/// Delay before a held `Continuous` key starts repeating.
pub const INITIAL_REPEAT_DELAY_MS: u32 = 300;
/// Interval between repeats once auto-repeat has started.
pub const REPEAT_INTERVAL_MS: u32 = 30;

/// Sink for HID keyboard events. Keycodes are passed through exactly as they
/// appeared in the configuration frame.
pub trait KeyboardOutput {
    type Error: Debug;

    /// Whether the host is ready to receive reports.
    fn is_ready(&self) -> bool;

    fn press(&mut self, keycode: u8) -> Result<(), Self::Error>;

    fn release(&mut self, keycode: u8) -> Result<(), Self::Error>;
}
