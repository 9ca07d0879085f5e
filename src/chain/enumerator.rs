use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use smart_leds::{SmartLedsWrite, RGB8};

use super::{BASE_ASSIGN_ADDR, BROADCAST_ADDR, MAX_MODULES};

/// Pause between probes, giving the addressed module time to answer.
const PROBE_DELAY_MS: u16 = 100;
/// Unanswered probes tolerated once at least one module has been assigned.
const MAX_ASSIGN_RETRIES: u32 = 50;

const PROBING: RGB8 = RGB8 { r: 0, g: 0, b: 255 };
const ASSIGNED: RGB8 = RGB8 { r: 0, g: 255, b: 0 };

/// Outcome of a completed enumeration pass.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChainInfo {
    pub module_count: usize,
}

/// Boot-time chain walker.
///
/// The head drives `TOKEN_SEND` into the first module and the last module's
/// token line loops back into `TOKEN_RECV`. Raising the token releases the
/// chain one module at a time; each module takes the next address from the
/// broadcast and acknowledges it when probed, then passes the token on.
pub struct Enumerator<SEND, RECV, D> {
    token_send: SEND,
    token_recv: RECV,
    delay: D,
}

impl<SEND, RECV, D> Enumerator<SEND, RECV, D>
where
    SEND: OutputPin,
    RECV: InputPin,
    D: DelayMs<u16>,
{
    pub fn new(token_send: SEND, token_recv: RECV, delay: D) -> Self {
        Enumerator {
            token_send,
            token_recv,
            delay,
        }
    }

    /// Hand out addresses `2..` and count the acknowledgements.
    ///
    /// Best-effort: a module that never answers is skipped once the retry
    /// budget runs out, shortening the chain. With no modules attached this
    /// never returns; the head keeps probing for the first address.
    ///
    /// Paints per-slot progress on the strip: blue while probing, green on
    /// acknowledge. The whole strip is blanked first.
    pub fn run<I2C, S, E>(&mut self, i2c: &mut I2C, strip: &mut S) -> ChainInfo
    where
        I2C: i2c::Write<Error = E> + i2c::Read<Error = E>,
        S: SmartLedsWrite<Color = RGB8>,
    {
        let mut frame = [RGB8::default(); MAX_MODULES];
        strip.write(frame.iter().copied()).ok();

        // Hold the token low until every module downstream has booted.
        self.token_send.set_low().ok();
        while self.token_recv.is_high().unwrap_or(false) {}

        info!("chain: releasing token");
        self.token_send.set_high().ok();

        let mut next_addr = BASE_ASSIGN_ADDR;
        let mut retries: u32 = 0;

        loop {
            let slot = (next_addr - BASE_ASSIGN_ADDR) as usize;
            frame[slot] = PROBING;
            strip.write(frame.iter().copied()).ok();

            i2c.write(BROADCAST_ADDR, &[next_addr]).ok();
            let mut ack = [0u8; 1];
            let response = i2c.read(next_addr, &mut ack);
            self.delay.delay_ms(PROBE_DELAY_MS);

            match response {
                Ok(()) if ack[0] == next_addr => {
                    info!("chain: module {} acknowledged", next_addr);
                    frame[slot] = ASSIGNED;
                    strip.write(frame.iter().copied()).ok();
                    retries = 0;
                    next_addr += 1;
                    // Token back at the head: the whole chain is addressed.
                    if self.token_recv.is_high().unwrap_or(false) {
                        break;
                    }
                    if (next_addr - BASE_ASSIGN_ADDR) as usize >= MAX_MODULES {
                        break;
                    }
                }
                Ok(()) => {
                    debug!("chain: stray response {}", ack[0]);
                }
                Err(_) => {
                    retries += 1;
                    if retries > MAX_ASSIGN_RETRIES && next_addr != BASE_ASSIGN_ADDR {
                        break;
                    }
                    debug!("chain: no answer from {}, retry {}", next_addr, retries);
                }
            }
        }

        self.token_send.set_low().ok();

        let module_count = (next_addr - BASE_ASSIGN_ADDR) as usize;
        info!("chain: enumeration done, {} modules", module_count);
        ChainInfo { module_count }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use core::convert::Infallible;

    use heapless::Vec;

    use super::*;

    /// I2C bus scripted from the modules' side: one entry per probe, `None`
    /// meaning nobody answered the read.
    struct ScriptedBus {
        responses: Vec<Option<u8>, 64>,
        cursor: usize,
        broadcasts: Vec<u8, 64>,
    }

    impl ScriptedBus {
        fn new(responses: &[Option<u8>]) -> Self {
            ScriptedBus {
                responses: Vec::from_slice(responses).unwrap(),
                cursor: 0,
                broadcasts: Vec::new(),
            }
        }
    }

    impl i2c::Write for ScriptedBus {
        type Error = ();

        fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), ()> {
            assert_eq!(addr, BROADCAST_ADDR);
            self.broadcasts.push(bytes[0]).unwrap();
            Ok(())
        }
    }

    impl i2c::Read for ScriptedBus {
        type Error = ();

        fn read(&mut self, _addr: u8, buffer: &mut [u8]) -> Result<(), ()> {
            let response = self.responses.get(self.cursor).copied().flatten();
            self.cursor += 1;
            match response {
                Some(byte) => {
                    buffer[0] = byte;
                    Ok(())
                }
                None => Err(()),
            }
        }
    }

    /// Serves a scripted sequence of levels, repeating the last one.
    struct LevelPin {
        levels: Vec<bool, 16>,
        reads: Cell<usize>,
    }

    impl LevelPin {
        fn new(levels: &[bool]) -> Self {
            LevelPin {
                levels: Vec::from_slice(levels).unwrap(),
                reads: Cell::new(0),
            }
        }
    }

    impl InputPin for LevelPin {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Infallible> {
            let index = self.reads.get();
            self.reads.set(index + 1);
            let last = self.levels.len() - 1;
            Ok(self.levels[index.min(last)])
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    #[derive(Default)]
    struct SinkPin;

    impl OutputPin for SinkPin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoDelay;

    impl DelayMs<u16> for NoDelay {
        fn delay_ms(&mut self, _ms: u16) {}
    }

    #[derive(Default)]
    struct FrameStrip {
        last: Vec<RGB8, MAX_MODULES>,
    }

    impl SmartLedsWrite for FrameStrip {
        type Error = Infallible;
        type Color = RGB8;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Infallible>
        where
            T: IntoIterator<Item = I>,
            I: Into<RGB8>,
        {
            self.last.clear();
            for color in iterator {
                self.last.push(color.into()).ok();
            }
            Ok(())
        }
    }

    #[test]
    fn assigns_sequential_addresses_until_token_returns() {
        let mut bus = ScriptedBus::new(&[Some(2), Some(3), Some(4)]);
        let mut strip = FrameStrip::default();
        // Low for the boot wait, low after the first two acks, high after
        // the third: the token is back.
        let recv = LevelPin::new(&[false, false, false, true]);
        let mut enumerator = Enumerator::new(SinkPin, recv, NoDelay);

        let chain = enumerator.run(&mut bus, &mut strip);

        assert_eq!(chain.module_count, 3);
        assert_eq!(bus.broadcasts.as_slice(), &[2, 3, 4]);
        assert_eq!(strip.last[0], ASSIGNED);
        assert_eq!(strip.last[2], ASSIGNED);
        assert_eq!(strip.last[3], RGB8::default());
    }

    #[test]
    fn unanswered_probes_are_retried() {
        let mut responses: Vec<Option<u8>, 64> = Vec::new();
        for _ in 0..5 {
            responses.push(None).unwrap();
        }
        responses.push(Some(2)).unwrap();
        let mut bus = ScriptedBus::new(&responses);
        let mut strip = FrameStrip::default();
        let recv = LevelPin::new(&[false, true]);
        let mut enumerator = Enumerator::new(SinkPin, recv, NoDelay);

        let chain = enumerator.run(&mut bus, &mut strip);

        assert_eq!(chain.module_count, 1);
    }

    #[test]
    fn gives_up_after_retry_budget_once_something_answered() {
        let mut responses: Vec<Option<u8>, 64> = Vec::new();
        responses.push(Some(2)).unwrap();
        for _ in 0..51 {
            responses.push(None).unwrap();
        }
        let mut bus = ScriptedBus::new(&responses);
        let mut strip = FrameStrip::default();
        let recv = LevelPin::new(&[false]);
        let mut enumerator = Enumerator::new(SinkPin, recv, NoDelay);

        let chain = enumerator.run(&mut bus, &mut strip);

        assert_eq!(chain.module_count, 1);
    }

    #[test]
    fn mismatched_acknowledgements_are_ignored() {
        let mut responses: Vec<Option<u8>, 64> = Vec::new();
        responses.push(Some(7)).unwrap();
        responses.push(Some(2)).unwrap();
        let mut bus = ScriptedBus::new(&responses);
        let mut strip = FrameStrip::default();
        let recv = LevelPin::new(&[false, true]);
        let mut enumerator = Enumerator::new(SinkPin, recv, NoDelay);

        let chain = enumerator.run(&mut bus, &mut strip);

        assert_eq!(chain.module_count, 1);
        assert_eq!(bus.broadcasts.as_slice(), &[2, 2]);
    }
}
