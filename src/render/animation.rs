//! Idle animation math. Every animation ticks on `cycle >> 2`, i.e. one
//! step per four rendered frames.

use smart_leds::RGB8;

/// Brightness floor for the pulse; letting it reach zero visibly flickers.
const PULSE_FLOOR: u8 = 20;

/// Chain-wide rainbow: each slot takes an even share of the color wheel and
/// the whole pattern rotates with the cycle counter.
pub fn gradient(slot: usize, module_count: usize, cycle: u16) -> RGB8 {
    let share = if module_count == 0 {
        0
    } else {
        slot * 256 / module_count
    };
    let pos = 255 - ((share + (cycle >> 2) as usize) & 0xff) as u8;
    wheel(pos)
}

/// Classic color wheel in three 85-wide bands.
fn wheel(pos: u8) -> RGB8 {
    if pos < 85 {
        RGB8::new(255 - pos * 3, 0, pos * 3)
    } else if pos < 170 {
        let pos = pos - 85;
        RGB8::new(0, pos * 3, 255 - pos * 3)
    } else {
        let pos = pos - 170;
        RGB8::new(pos * 3, 255 - pos * 3, 0)
    }
}

/// Triangle-wave brightness applied to the stored color.
pub fn pulse(color: RGB8, cycle: u16) -> RGB8 {
    let phase = (cycle >> 2) % 512;
    let mut level = if phase < 256 {
        (phase & 0xff) as u8
    } else {
        255 - (phase & 0xff) as u8
    };
    if level < PULSE_FLOOR {
        level = PULSE_FLOOR;
    }
    scale(color, level)
}

fn scale(color: RGB8, level: u8) -> RGB8 {
    let channel = |value: u8| (value as u32 * level as u32 / 255) as u8;
    RGB8::new(channel(color.r), channel(color.g), channel(color.b))
}
