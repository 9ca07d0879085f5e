//! Hand-rolled fakes for the hardware seams, shared by the integration
//! suites. Each fake hands out cloneable handles over shared interior
//! state, so a test keeps one handle while the controller owns the other.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use chainpad::config::NvMemory;
use chainpad::control::Connection;
use chainpad::keys::KeyboardOutput;
use embedded_hal::timer::CountDown;
use smart_leds::{SmartLedsWrite, RGB8};

#[derive(Default)]
struct LinkState {
    incoming: VecDeque<u8>,
    outgoing: Vec<u8>,
}

/// Serial link scripted from the desktop's side.
#[derive(Clone, Default)]
pub struct SharedLink(Rc<RefCell<LinkState>>);

impl SharedLink {
    pub fn new(bytes: &[u8]) -> Self {
        let link = SharedLink::default();
        link.feed(bytes);
        link
    }

    pub fn feed(&self, bytes: &[u8]) {
        self.0.borrow_mut().incoming.extend(bytes.iter().copied());
    }

    pub fn outgoing(&self) -> Vec<u8> {
        self.0.borrow().outgoing.clone()
    }

    pub fn take_outgoing(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.borrow_mut().outgoing)
    }

    pub fn pending_incoming(&self) -> usize {
        self.0.borrow().incoming.len()
    }
}

impl Connection for SharedLink {
    type Error = Infallible;

    fn read_raw(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Infallible> {
        let mut state = self.0.borrow_mut();
        if state.incoming.is_empty() {
            return Err(nb::Error::WouldBlock);
        }
        let mut count = 0;
        while count < buffer.len() {
            match state.incoming.pop_front() {
                Some(byte) => {
                    buffer[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn write(&mut self, data: &[u8]) {
        self.0.borrow_mut().outgoing.extend_from_slice(data);
    }
}

/// Countdown that expires after a fixed number of `wait` calls. The default
/// budget is generous enough that complete scripts never time out; a small
/// budget simulates a stalled desktop.
pub struct TestTimer {
    budget: u32,
    remaining: u32,
}

impl TestTimer {
    pub fn generous() -> Self {
        TestTimer::with_budget(10_000)
    }

    pub fn with_budget(budget: u32) -> Self {
        TestTimer {
            budget,
            remaining: budget,
        }
    }
}

impl CountDown for TestTimer {
    type Time = u32;

    fn start<T: Into<u32>>(&mut self, _count: T) {
        self.remaining = self.budget;
    }

    fn wait(&mut self) -> nb::Result<(), void::Void> {
        if self.remaining == 0 {
            Ok(())
        } else {
            self.remaining -= 1;
            Err(nb::Error::WouldBlock)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Press(u8),
    Release(u8),
}

#[derive(Default)]
struct HidState {
    events: Vec<KeyEvent>,
    held: Vec<u8>,
    not_ready: bool,
}

/// HID sink with the same idempotence as the real USB communicator: a press
/// of a held keycode and a release of an unheld one are no-ops, so the
/// engine's per-tick release sweep leaves no trace.
#[derive(Clone, Default)]
pub struct SharedHid(Rc<RefCell<HidState>>);

impl SharedHid {
    pub fn events(&self) -> Vec<KeyEvent> {
        self.0.borrow().events.clone()
    }

    pub fn take_events(&self) -> Vec<KeyEvent> {
        std::mem::take(&mut self.0.borrow_mut().events)
    }

    pub fn presses(&self) -> Vec<u8> {
        self.0
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                KeyEvent::Press(keycode) => Some(*keycode),
                KeyEvent::Release(_) => None,
            })
            .collect()
    }

    pub fn set_ready(&self, ready: bool) {
        self.0.borrow_mut().not_ready = !ready;
    }
}

impl KeyboardOutput for SharedHid {
    type Error = Infallible;

    fn is_ready(&self) -> bool {
        !self.0.borrow().not_ready
    }

    fn press(&mut self, keycode: u8) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        if !state.held.contains(&keycode) {
            state.held.push(keycode);
            state.events.push(KeyEvent::Press(keycode));
        }
        Ok(())
    }

    fn release(&mut self, keycode: u8) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        if let Some(index) = state.held.iter().position(|held| *held == keycode) {
            state.held.swap_remove(index);
            state.events.push(KeyEvent::Release(keycode));
        }
        Ok(())
    }
}

/// In-memory stand-in for the EEPROM.
#[derive(Clone)]
pub struct SharedNv(Rc<RefCell<Vec<u8>>>);

impl Default for SharedNv {
    fn default() -> Self {
        SharedNv(Rc::new(RefCell::new(vec![0xff; 16 * 1024])))
    }
}

impl SharedNv {
    pub fn bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.0.borrow()[offset..offset + len].to_vec()
    }

    /// The persisted payload, per the on-device layout.
    pub fn persisted_frame(&self) -> Option<Vec<u8>> {
        let bytes = self.0.borrow();
        if bytes[0] != 1 {
            return None;
        }
        let len = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
        Some(bytes[3..3 + len].to_vec())
    }
}

impl NvMemory for SharedNv {
    type Error = Infallible;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Infallible> {
        let bytes = self.0.borrow();
        buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Infallible> {
        self.0.borrow_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[derive(Default)]
struct StripState {
    last: Vec<RGB8>,
    writes: usize,
}

/// LED strip capturing the most recent committed frame.
#[derive(Clone, Default)]
pub struct SharedStrip(Rc<RefCell<StripState>>);

impl SharedStrip {
    pub fn last_frame(&self) -> Vec<RGB8> {
        self.0.borrow().last.clone()
    }

    pub fn writes(&self) -> usize {
        self.0.borrow().writes
    }
}

impl SmartLedsWrite for SharedStrip {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Infallible>
    where
        T: IntoIterator<Item = I>,
        I: Into<RGB8>,
    {
        let mut state = self.0.borrow_mut();
        state.last = iterator.into_iter().map(Into::into).collect();
        state.writes += 1;
        Ok(())
    }
}

/// A complete desktop transaction: attention byte, command magic, payload.
pub fn transaction(magic: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x42];
    bytes.extend_from_slice(&magic.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// A configure transaction carrying `frame` behind its length prefix.
pub fn configure_transaction(frame: &[u8]) -> Vec<u8> {
    let mut payload = (frame.len() as u16).to_le_bytes().to_vec();
    payload.extend_from_slice(frame);
    transaction(0x4141, &payload)
}

/// Build a configuration frame from 8-byte objects.
pub fn config_frame(objects: &[[u8; 8]]) -> Vec<u8> {
    let mut bytes = vec![0x42, 0x42];
    bytes.extend_from_slice(&(objects.len() as u16).to_le_bytes());
    for object in objects {
        bytes.extend_from_slice(object);
    }
    bytes
}
