use core::fmt::Debug;

use embedded_hal::timer::CountDown;

use super::Error;

/// Byte transport to the desktop tool (UART or USB-CDC, 115200 8N1).
pub trait Connection {
    type Error: 'static + Debug;

    /// Non-blocking read. Returns the number of bytes placed into `buffer`,
    /// or `WouldBlock` when nothing is pending.
    fn read_raw(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error>;

    fn write(&mut self, data: &[u8]);
}

pub trait ConnectionExt: Connection {
    /// Blocking read of exactly `buffer.len()` bytes with an inter-byte
    /// timeout: the timer restarts whenever at least one byte arrives, so a
    /// slow sender survives as long as it never stalls for a whole timeout.
    fn read_with_timeout<C: CountDown>(
        &mut self,
        buffer: &mut [u8],
        timer: &mut C,
        timeout: C::Time,
    ) -> Result<(), Error<Self::Error>>
    where
        C::Time: Copy,
    {
        timer.start(timeout);
        let mut offset = 0;
        while offset != buffer.len() {
            if timer.wait().is_ok() {
                return Err(Error::ReadTimedOut);
            }
            match self.read_raw(&mut buffer[offset..]) {
                Ok(0) | Err(nb::Error::WouldBlock) => continue,
                Ok(bytes_read) => {
                    offset += bytes_read;
                    timer.start(timeout);
                }
                Err(nb::Error::Other(source)) => return Err(Error::ReadError { source }),
            }
        }
        Ok(())
    }
}

impl<T: Connection> ConnectionExt for T {}
