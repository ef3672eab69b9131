//! Byte-addressable persistent storage and the calibration slot layout.
//!
//! Each device index owns an 8-byte slot at `device * 8`: the 4-byte image of
//! `A` followed by the 4-byte image of `alpha`, in the host's native byte
//! order. Never-written bytes read as `0xFF`.

use crate::Parameters;
use core::fmt;

/// Number of bytes used by one device's calibration.
pub const SLOT_SIZE: usize = 8;

/// A 4-byte parameter image in the erased state of the medium.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Byte-granular persistent storage, such as an EEPROM.
///
/// Implementations must preserve written bytes across power cycles and
/// return `0xFF` for addresses that were never written.
pub trait Eeprom {
    type Error: fmt::Debug;

    /// Reads the byte at `address`.
    fn read(&mut self, address: usize) -> Result<u8, Self::Error>;

    /// Writes `byte` at `address`.
    fn write(&mut self, address: usize, byte: u8) -> Result<(), Self::Error>;

    /// Writes `byte` at `address` only if the stored byte differs.
    fn update(&mut self, address: usize, byte: u8) -> Result<(), Self::Error> {
        if self.read(address)? != byte {
            self.write(address, byte)?;
        }

        Ok(())
    }
}

/// Error returned by the RAM-backed [`Eeprom`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamError {
    /// The address lies past the end of the array.
    OutOfRange { address: usize },
}

impl fmt::Display for RamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RamError::OutOfRange { address } => write!(f, "address {} is out of range", address),
        }
    }
}

/// A byte array used as volatile storage.
///
/// Start from `[0xFF; N]` to mimic a blank medium.
///
/// # Examples
///
/// ```
/// use gravity_turbidity::Eeprom;
///
/// let mut memory = [0xFF; 16];
///
/// memory.write(3, 0x42).unwrap();
/// assert_eq!(memory.read(3), Ok(0x42));
/// assert!(memory.read(16).is_err());
/// ```
impl<const N: usize> Eeprom for [u8; N] {
    type Error = RamError;

    fn read(&mut self, address: usize) -> Result<u8, Self::Error> {
        self.get(address)
            .copied()
            .ok_or(RamError::OutOfRange { address })
    }

    fn write(&mut self, address: usize, byte: u8) -> Result<(), Self::Error> {
        let slot = self
            .get_mut(address)
            .ok_or(RamError::OutOfRange { address })?;
        *slot = byte;

        Ok(())
    }
}

/// Returns the address of the first byte of `device`'s slot.
pub const fn slot_offset(device: usize) -> usize {
    device * SLOT_SIZE
}

/// Reads the raw slot of `device`.
pub fn read_slot<E: Eeprom + ?Sized>(
    eeprom: &mut E,
    device: usize,
) -> Result<[u8; SLOT_SIZE], E::Error> {
    let offset = slot_offset(device);
    let mut bytes = [0; SLOT_SIZE];

    for (index, byte) in bytes.iter_mut().enumerate() {
        *byte = eeprom.read(offset + index)?;
    }

    Ok(bytes)
}

/// Writes `bytes` to the slot of `device`, one byte at a time.
pub fn write_slot<E: Eeprom + ?Sized>(
    eeprom: &mut E,
    device: usize,
    bytes: &[u8; SLOT_SIZE],
) -> Result<(), E::Error> {
    let offset = slot_offset(device);

    for (index, byte) in bytes.iter().enumerate() {
        eeprom.update(offset + index, *byte)?;
    }

    Ok(())
}

/// Returns `true` if either parameter image of `bytes` is erased.
pub fn is_blank(bytes: &[u8; SLOT_SIZE]) -> bool {
    let (a, alpha) = Parameters::split_bytes(bytes);
    u32::from_ne_bytes(a) == ERASED_WORD || u32::from_ne_bytes(alpha) == ERASED_WORD
}
