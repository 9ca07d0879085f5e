//! Persistence of the raw configuration frame to byte-addressable
//! non-volatile memory.
//!
//! Layout: configured flag at offset 0, payload size (u16 LE) at offset 1,
//! payload bytes from offset 3. The persisted payload is always the frame
//! exactly as it came over the serial link.

use core::fmt::Debug;

use super::MAX_CONFIG_LEN;

const OFFSET_FLAG: usize = 0x00;
const OFFSET_SIZE: usize = 0x01;
const OFFSET_PAYLOAD: usize = 0x03;
const CONFIGURED: u8 = 1;

/// Byte-addressable non-volatile memory: an EEPROM, or a flash-backed
/// emulation of one.
pub trait NvMemory {
    type Error: 'static + Debug;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error>;

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError<E: 'static + Debug> {
    Memory {
        #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
        source: E,
    },
    NotConfigured,
    TooLarge {
        len: usize,
    },
}

impl<E: 'static + Debug> From<E> for StoreError<E> {
    fn from(source: E) -> Self {
        StoreError::Memory { source }
    }
}

pub struct ConfigStore<M: NvMemory> {
    memory: M,
    configured: bool,
}

impl<M: NvMemory> ConfigStore<M> {
    pub fn new(memory: M) -> Self {
        ConfigStore {
            memory,
            configured: false,
        }
    }

    /// Lazily read and latch the configured flag. Once true it stays true
    /// for the lifetime of the store (a save also sets it), so a fresh
    /// configuration takes effect without a power cycle.
    pub fn is_configured(&mut self) -> bool {
        if !self.configured {
            let mut flag = [0u8; 1];
            self.configured =
                self.memory.read(OFFSET_FLAG, &mut flag).is_ok() && flag[0] == CONFIGURED;
        }
        self.configured
    }

    /// Persist a raw frame: payload first, then the size, then the flag, so
    /// an interrupted write never yields a configured-but-empty device.
    pub fn save(&mut self, frame: &[u8]) -> Result<(), StoreError<M::Error>> {
        if frame.len() > MAX_CONFIG_LEN {
            return Err(StoreError::TooLarge { len: frame.len() });
        }
        self.memory.write(OFFSET_PAYLOAD, frame)?;
        self.memory
            .write(OFFSET_SIZE, &(frame.len() as u16).to_le_bytes())?;
        self.memory.write(OFFSET_FLAG, &[CONFIGURED])?;
        self.configured = true;
        Ok(())
    }

    /// Re-materialize the persisted frame into `buf`.
    pub fn load<'a>(&mut self, buf: &'a mut [u8]) -> Result<&'a [u8], StoreError<M::Error>> {
        if !self.is_configured() {
            return Err(StoreError::NotConfigured);
        }
        let mut size = [0u8; 2];
        self.memory.read(OFFSET_SIZE, &mut size)?;
        let len = u16::from_le_bytes(size) as usize;
        if len > buf.len() {
            return Err(StoreError::TooLarge { len });
        }
        let payload = &mut buf[..len];
        self.memory.read(OFFSET_PAYLOAD, payload)?;
        Ok(payload)
    }
}
