use embedded_hal::timer::CountDown;

use super::{Connection, ConnectionExt, Error};

/// Byte that opens every transaction from the desktop.
pub const ATTENTION: u8 = 0x42;
/// Identification reply, so the desktop can tell this port apart from every
/// other serial device on the host.
pub const IDENT_REPLY: [u8; 2] = [0x42, 0x69];
/// Terminates every successfully handled command.
pub const ACK: u8 = 0xff;

const MAGIC_CONFIGURE: u16 = 0x4141;
const MAGIC_MODULE_COUNT: u16 = 0x4242;
const MAGIC_CAPTURE_ON: u16 = 0x4343;
const MAGIC_CAPTURE_OFF: u16 = 0x4444;

/// A decoded command head. `Configure` announces a length-prefixed frame
/// which the caller pulls with [`ControlChannel::read_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    Configure,
    ModuleCount,
    CaptureOn,
    CaptureOff,
}

/// Envelope layer of the control protocol. The channel owns the transport
/// and the timeout timer; command semantics stay with the caller.
pub struct ControlChannel<C: Connection, T: CountDown>
where
    T::Time: Copy,
{
    connection: C,
    timer: T,
    timeout: T::Time,
}

impl<C: Connection, T: CountDown> ControlChannel<C, T>
where
    T::Time: Copy,
{
    pub fn new(connection: C, timer: T, timeout: T::Time) -> Self {
        ControlChannel {
            connection,
            timer,
            timeout,
        }
    }

    /// Non-blocking transaction opener. Anything that is not an attention
    /// byte is discarded; on attention the identification reply goes out and
    /// the command magic is read with the inter-byte timeout.
    pub fn poll(&mut self) -> Result<Option<Request>, Error<C::Error>> {
        let mut byte = [0u8; 1];
        match self.connection.read_raw(&mut byte) {
            Ok(0) | Err(nb::Error::WouldBlock) => return Ok(None),
            Ok(_) if byte[0] != ATTENTION => {
                trace!("control: discarding stray byte {}", byte[0]);
                return Ok(None);
            }
            Ok(_) => {}
            Err(nb::Error::Other(source)) => return Err(Error::ReadError { source }),
        }

        self.connection.write(&IDENT_REPLY);

        let mut magic = [0u8; 2];
        self.connection
            .read_with_timeout(&mut magic, &mut self.timer, self.timeout)?;
        match u16::from_le_bytes(magic) {
            MAGIC_CONFIGURE => Ok(Some(Request::Configure)),
            MAGIC_MODULE_COUNT => Ok(Some(Request::ModuleCount)),
            MAGIC_CAPTURE_ON => Ok(Some(Request::CaptureOn)),
            MAGIC_CAPTURE_OFF => Ok(Some(Request::CaptureOff)),
            magic => Err(Error::UnknownMagic { magic }),
        }
    }

    /// Read a length-prefixed configuration frame into `buf` and return the
    /// received bytes. A frame larger than `buf` is drained off the link and
    /// rejected, keeping the stream in sync.
    pub fn read_frame<'a>(&mut self, buf: &'a mut [u8]) -> Result<&'a [u8], Error<C::Error>> {
        let mut size = [0u8; 2];
        self.connection
            .read_with_timeout(&mut size, &mut self.timer, self.timeout)?;
        let len = u16::from_le_bytes(size);
        if len as usize > buf.len() {
            self.drain(len);
            return Err(Error::FrameTooLong { len });
        }
        let frame = &mut buf[..len as usize];
        self.connection
            .read_with_timeout(frame, &mut self.timer, self.timeout)?;
        Ok(frame)
    }

    fn drain(&mut self, mut remaining: u16) {
        let mut scratch = [0u8; 16];
        while remaining > 0 {
            let chunk = (remaining as usize).min(scratch.len());
            if self
                .connection
                .read_with_timeout(&mut scratch[..chunk], &mut self.timer, self.timeout)
                .is_err()
            {
                return;
            }
            remaining -= chunk as u16;
        }
    }

    /// Reply to a module-count request; the one-byte answer caps at 255.
    pub fn send_module_count(&mut self, count: usize) {
        self.connection.write(&[count.min(255) as u8]);
    }

    /// Capture-mode report: the raw slot index instead of a HID event.
    pub fn send_captured_slot(&mut self, slot: u8) {
        self.connection.write(&[slot]);
    }

    pub fn acknowledge(&mut self) {
        self.connection.write(&[ACK]);
    }
}
