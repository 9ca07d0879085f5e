//! The device context: everything the main loop owns, and the loop body
//! itself.
//!
//! Boot order on a real board: run the [`Enumerator`](crate::Enumerator),
//! construct the [`Controller`] from the resulting chain info, call
//! [`Controller::warm_load`], re-initialize I2C as slave at the broadcast
//! address, then call [`Controller::tick`] forever. The I2C receive
//! interrupt feeds [`Controller::on_chain_frame`]; it touches nothing but
//! the button state table.

use embedded_hal::timer::CountDown;
use smart_leds::{SmartLedsWrite, RGB8};

use crate::chain::{ButtonState, ChainInfo, StateTable};
use crate::config::{Config, ConfigFrame, ConfigStore, NvMemory, StoreError, MAX_CONFIG_LEN};
use crate::control::{Connection, ControlChannel, Request};
use crate::keys::{self, KeyboardOutput};
use crate::render::Renderer;

/// How often the control channel is polled.
const SERIAL_POLL_INTERVAL_MS: u32 = 200;

pub struct Controller<C, T, S, M, O>
where
    C: Connection,
    T: CountDown,
    T::Time: Copy,
    S: SmartLedsWrite<Color = RGB8>,
    M: NvMemory,
    O: KeyboardOutput,
{
    channel: ControlChannel<C, T>,
    store: ConfigStore<M>,
    strip: S,
    hid: O,
    states: StateTable,
    config: Config,
    renderer: Renderer,
    capture: bool,
    last_poll_ms: u32,
    frame_buf: [u8; MAX_CONFIG_LEN],
}

impl<C, T, S, M, O> Controller<C, T, S, M, O>
where
    C: Connection,
    T: CountDown,
    T::Time: Copy,
    S: SmartLedsWrite<Color = RGB8>,
    M: NvMemory,
    O: KeyboardOutput,
{
    /// Post-enumeration construction; the module count is fixed for the
    /// controller's lifetime.
    pub fn new(
        chain: ChainInfo,
        channel: ControlChannel<C, T>,
        store: ConfigStore<M>,
        strip: S,
        hid: O,
    ) -> Self {
        Controller {
            channel,
            store,
            strip,
            hid,
            states: StateTable::new(chain.module_count),
            config: Config::empty(chain.module_count),
            renderer: Renderer::new(),
            capture: false,
            last_poll_ms: 0,
            frame_buf: [0; MAX_CONFIG_LEN],
        }
    }

    /// Reload the persisted configuration. Runs after enumeration because
    /// parsing needs the module count; on any failure the device keeps its
    /// empty configuration.
    pub fn warm_load(&mut self) {
        let slot_count = self.states.module_count();
        match self.store.load(&mut self.frame_buf) {
            Ok(raw) => match ConfigFrame::parse(raw) {
                Ok(frame) => {
                    self.config = Config::from_frame(&frame, slot_count);
                    info!("config: reloaded {} objects", frame.object_count());
                }
                Err(e) => warn!("config: persisted frame rejected: {}", e),
            },
            Err(StoreError::NotConfigured) => info!("config: no persisted configuration"),
            Err(e) => warn!("config: load failed: {}", e),
        }
    }

    /// Interrupt-side entry for chain frames.
    pub fn on_chain_frame(&mut self, frame: u8) {
        self.states.apply(frame);
    }

    pub fn module_count(&self) -> usize {
        self.states.module_count()
    }

    pub fn capture_mode(&self) -> bool {
        self.capture
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Concrete HID output, for the board's USB interrupt handler.
    pub fn hid_mut(&mut self) -> &mut O {
        &mut self.hid
    }

    /// One run-to-completion pass of the main loop: paint, poll the serial
    /// link on its cadence, then emit key events.
    pub fn tick(&mut self, now_ms: u32) {
        self.renderer
            .render(&self.config, &self.states, self.capture, &mut self.strip)
            .ok();

        if now_ms.wrapping_sub(self.last_poll_ms) >= SERIAL_POLL_INTERVAL_MS {
            self.poll_serial();
            self.last_poll_ms = now_ms;
        }

        self.drive_keys(now_ms);
    }

    fn poll_serial(&mut self) {
        match self.channel.poll() {
            Ok(None) => {}
            Ok(Some(Request::Configure)) => self.receive_config(),
            Ok(Some(Request::ModuleCount)) => {
                self.channel.send_module_count(self.states.module_count());
                self.channel.acknowledge();
            }
            Ok(Some(Request::CaptureOn)) => {
                self.capture = true;
                self.channel.acknowledge();
            }
            Ok(Some(Request::CaptureOff)) => {
                self.capture = false;
                self.channel.acknowledge();
            }
            Err(e) => warn!("control: transaction abandoned: {}", e),
        }
    }

    /// A frame that fails to arrive or validate leaves the previous
    /// configuration and its persisted copy untouched, and is never
    /// acknowledged.
    fn receive_config(&mut self) {
        let slot_count = self.states.module_count();
        let raw = match self.channel.read_frame(&mut self.frame_buf) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("config: receive failed: {}", e);
                return;
            }
        };
        let frame = match ConfigFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("config: frame rejected: {}", e);
                return;
            }
        };

        self.config = Config::from_frame(&frame, slot_count);
        if let Err(e) = self.store.save(frame.as_bytes()) {
            warn!("config: persist failed: {}", e);
        }
        self.channel.acknowledge();
        info!("config: accepted {} objects", frame.object_count());
    }

    fn drive_keys(&mut self, now_ms: u32) {
        for slot in 0..self.states.module_count() {
            let state = self.states.slot_state(slot);

            if self.capture && state == ButtonState::Pressed {
                // One-shot capture report: this press goes to the desktop
                // instead of the host, then capture ends on its own.
                self.channel.send_captured_slot(slot as u8);
                self.capture = false;
                continue;
            }

            if !self.hid.is_ready() {
                continue;
            }
            if let Some(slot_config) = self.config.slot_mut(slot) {
                keys::drive_slot(&mut slot_config.actions, state, now_ms, &mut self.hid);
            }
        }
    }
}
