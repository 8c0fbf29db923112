//! # Bus seams
//!
//! [`Bus`] is what the CPU core (and the external executor driving it) uses to
//! reach memory and I/O. [`MemoryRead`] is the narrower capability handed to
//! peripherals that only need to peek at emulated RAM, such as the
//! touchscreen reading its calibration block.

use std::sync::{Arc, Mutex, PoisonError};

/// Byte-addressed, little-endian system bus.
pub trait Bus {
    fn read8(&mut self, address: u32) -> u8;

    fn write8(&mut self, address: u32, value: u8);

    fn read16(&mut self, address: u32) -> u16 {
        u16::from_le_bytes([self.read8(address), self.read8(address.wrapping_add(1))])
    }

    fn read32(&mut self, address: u32) -> u32 {
        let lo = self.read16(address);
        let hi = self.read16(address.wrapping_add(2));
        u32::from(lo) | (u32::from(hi) << 16)
    }

    fn write16(&mut self, address: u32, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write8(address, lo);
        self.write8(address.wrapping_add(1), hi);
    }

    fn write32(&mut self, address: u32, value: u32) {
        self.write16(address, value as u16);
        self.write16(address.wrapping_add(2), (value >> 16) as u16);
    }

    /// Extra cycles added to every access on top of the base cycle.
    fn wait_states(&self) -> u32 {
        0
    }
}

/// Side-effect free read access to emulated memory.
pub trait MemoryRead {
    fn read8(&self, address: u32) -> u8;

    fn read16(&self, address: u32) -> u16 {
        u16::from_le_bytes([self.read8(address), self.read8(address.wrapping_add(1))])
    }
}

impl<T: MemoryRead + ?Sized> MemoryRead for Mutex<T> {
    fn read8(&self, address: u32) -> u8 {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read8(address)
    }

    fn read16(&self, address: u32) -> u16 {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read16(address)
    }
}

/// Lets a CPU and a peripheral share the same memory image.
impl<T: Bus + ?Sized> Bus for Arc<Mutex<T>> {
    fn read8(&mut self, address: u32) -> u8 {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read8(address)
    }

    fn write8(&mut self, address: u32, value: u8) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write8(address, value);
    }

    fn wait_states(&self) -> u32 {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .wait_states()
    }
}
