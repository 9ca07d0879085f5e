use crate::chain::ButtonState;
use crate::config::{KeyAction, PressMode};

use super::{KeyboardOutput, INITIAL_REPEAT_DELAY_MS, REPEAT_INTERVAL_MS};

/// Cooldown sentinel: "held" for one-shot actions, "fire on the next tick"
/// for continuous ones. Zero means the action has not fired since release.
const COOLDOWN_HELD: u32 = 1;

/// Apply one tick's press/release transitions for a single slot's actions,
/// in their configured order.
///
/// A HID send failure is logged and contained to the action it hit: the
/// action keeps its cooldown (so it retries on the next tick) and the rest
/// of the slot's actions still run.
pub fn drive_slot<O: KeyboardOutput>(
    actions: &mut [KeyAction],
    state: ButtonState,
    now_ms: u32,
    out: &mut O,
) {
    match state {
        ButtonState::Pressed => {
            for action in actions {
                if held(action, now_ms, out).is_err() {
                    warn!("keys: hid send failed for key {}", action.keycode);
                }
            }
        }
        ButtonState::Released => {
            for action in actions {
                // On failure the key stays held at the host, but the sweep
                // runs every released tick, so the release is retried.
                if out.release(action.keycode).is_err() {
                    warn!("keys: hid release failed for key {}", action.keycode);
                }
                action.cooldown_ms = 0;
                action.last_tick_ms = 0;
            }
        }
    }
}

fn held<O: KeyboardOutput>(
    action: &mut KeyAction,
    now_ms: u32,
    out: &mut O,
) -> Result<(), O::Error> {
    let mut result = Ok(());
    match action.mode {
        PressMode::OneShot => {
            if action.cooldown_ms == 0 {
                result = out.press(action.keycode);
                if result.is_ok() {
                    action.cooldown_ms = COOLDOWN_HELD;
                }
            }
        }
        PressMode::Continuous => {
            if action.cooldown_ms <= COOLDOWN_HELD {
                result = out
                    .press(action.keycode)
                    .and_then(|()| out.release(action.keycode));
                if result.is_ok() {
                    action.cooldown_ms = if action.cooldown_ms == 0 {
                        INITIAL_REPEAT_DELAY_MS
                    } else {
                        REPEAT_INTERVAL_MS
                    };
                }
            } else {
                let diff = now_ms.wrapping_sub(action.last_tick_ms);
                if diff >= action.cooldown_ms {
                    action.cooldown_ms = COOLDOWN_HELD;
                } else {
                    action.cooldown_ms -= diff;
                }
            }
        }
    }
    // Stamped even on failure, so the next tick's repeat arithmetic never
    // runs against a stale timestamp.
    action.last_tick_ms = now_ms;
    result
}
