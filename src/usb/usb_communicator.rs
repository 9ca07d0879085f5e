use heapless::Vec;
use usb_device::{
    class_prelude::{UsbBus, UsbBusAllocator},
    device::{StringDescriptors, UsbDevice, UsbDeviceBuilder, UsbDeviceState, UsbVidPid},
    LangID, UsbError,
};
use usbd_hid::{
    descriptor::{KeyboardReport, SerializedDescriptor},
    hid_class::HIDClass,
};

use crate::keys::KeyboardOutput;

use super::DeviceInfo;

/// Boot-keyboard rollover.
const NUM_ROLLOVER: usize = 6;

/// HID keyboard endpoint plus the set of currently held keycodes.
///
/// A report goes out only when the held set actually changes, so the
/// per-tick release sweep over unpressed slots costs no bus traffic.
pub struct UsbCommunicator<'a, B: UsbBus> {
    usb_device: UsbDevice<'a, B>,
    keyboard_hid: HIDClass<'a, B>,
    pressed: Vec<u8, NUM_ROLLOVER>,
}

impl<'a, B: UsbBus> UsbCommunicator<'a, B> {
    pub fn new(
        device_info: DeviceInfo,
        usb_bus_alloc: &'a UsbBusAllocator<B>,
    ) -> UsbCommunicator<'a, B> {
        let keyboard_hid = HIDClass::new(usb_bus_alloc, KeyboardReport::desc(), 10);
        let descriptors = StringDescriptors::new(LangID::EN_US)
            .manufacturer(device_info.manufacturer)
            .serial_number(device_info.serial_number)
            .product(device_info.product_name);
        let usb_device = UsbDeviceBuilder::new(
            usb_bus_alloc,
            UsbVidPid(device_info.vendor_id, device_info.product_id),
        )
        .strings(&[descriptors])
        .expect("Failed to create string descriptors")
        .device_class(0)
        .build();

        UsbCommunicator {
            usb_device,
            keyboard_hid,
            pressed: Vec::new(),
        }
    }

    /// Drive the USB stack; call from the USB interrupt.
    pub fn poll(&mut self) {
        self.usb_device.poll(&mut [&mut self.keyboard_hid]);
    }

    pub fn state(&self) -> UsbDeviceState {
        self.usb_device.state()
    }

    fn push_report(&mut self) -> Result<(), UsbError> {
        let mut report = KeyboardReport {
            modifier: 0,
            reserved: 0,
            leds: 0,
            keycodes: [0; 6],
        };
        for (index, keycode) in self.pressed.iter().enumerate() {
            report.keycodes[index] = *keycode;
        }
        self.keyboard_hid.push_input(&report)?;
        Ok(())
    }
}

impl<'a, B: UsbBus> KeyboardOutput for UsbCommunicator<'a, B> {
    type Error = UsbError;

    fn is_ready(&self) -> bool {
        self.usb_device.state() == UsbDeviceState::Configured
    }

    fn press(&mut self, keycode: u8) -> Result<(), UsbError> {
        if self.pressed.contains(&keycode) {
            return Ok(());
        }
        if self.pressed.push(keycode).is_err() {
            // Rollover exhausted; the extra key is dropped like on any
            // boot keyboard.
            return Ok(());
        }
        self.push_report()
    }

    fn release(&mut self, keycode: u8) -> Result<(), UsbError> {
        match self.pressed.iter().position(|held| *held == keycode) {
            Some(index) => {
                self.pressed.swap_remove(index);
                self.push_report()
            }
            None => Ok(()),
        }
    }
}
