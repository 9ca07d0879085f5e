//! Controller-head firmware core for a modular, daisy-chained macropad.
//!
//! The head sits at the start of a chain of identical key modules. At boot it
//! walks a token around the chain to hand out I2C addresses and learn the
//! chain length, then flips to I2C slave and aggregates the one-byte button
//! frames the modules push. Each main-loop tick it turns configured slots
//! into USB HID keystrokes, paints one WS2812 pixel per module, and every
//! 200 ms polls the serial link for commands from the desktop configurator.
//! Accepted configurations are persisted to non-volatile memory and reloaded
//! on warm boot.
//!
//! Hardware access goes through traits so board crates stay thin: the serial
//! link behind [`control::Connection`], the LED strip behind
//! `smart_leds::SmartLedsWrite`, HID output behind [`keys::KeyboardOutput`]
//! (with a ready-made USB implementation in [`usb`]), non-volatile bytes
//! behind [`config::NvMemory`], and I2C, token pins and delays behind the
//! `embedded-hal` traits. A board wraps the [`head::Controller`] in
//! `cortex_m::interrupt::Mutex<RefCell<...>>` and feeds
//! [`head::Controller::on_chain_frame`] from the I2C receive interrupt.

#![no_std]

#[macro_use]
mod fmt;

pub mod chain;
pub mod config;
pub mod control;
pub mod head;
pub mod keys;
pub mod render;
pub mod usb;

pub use chain::{ButtonState, ChainInfo, Enumerator, StateTable};
pub use config::{Config, ConfigStore};
pub use control::Connection;
pub use head::Controller;
pub use keys::KeyboardOutput;
pub use render::Renderer;
pub use usb::{DeviceInfo, UsbCommunicator};
