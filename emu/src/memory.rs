use serde::{Deserialize, Serialize};

use crate::bus::{Bus, MemoryRead};

/// Size of the main RAM image (4 `MBytes`).
pub const MAIN_RAM_SIZE: usize = 0x0040_0000;

/// Offset of the firmware user-settings copy inside main RAM.
/// The touchscreen calibration points live in this block.
pub const USER_SETTINGS_OFFSET: u32 = 0x003F_FC80;

/// A flat RAM image. Addresses are mirrored over the image size,
/// which must be a power of two.
#[derive(Clone, Serialize, Deserialize)]
pub struct Ram {
    data: Vec<u8>,
    wait_states: u32,
}

impl Default for Ram {
    fn default() -> Self {
        Self::new(MAIN_RAM_SIZE)
    }
}

impl Ram {
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(
            size.is_power_of_two(),
            "RAM size must be a power of two, got {size:#x}"
        );
        Self {
            data: vec![0; size],
            wait_states: 0,
        }
    }

    #[must_use]
    pub fn with_wait_states(mut self, wait_states: u32) -> Self {
        self.wait_states = wait_states;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn index(&self, address: u32) -> usize {
        address as usize & (self.data.len() - 1)
    }

    /// Copies `bytes` into the image starting at `address`.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            let idx = self.index(address.wrapping_add(i as u32));
            self.data[idx] = *b;
        }
    }
}

impl Bus for Ram {
    fn read8(&mut self, address: u32) -> u8 {
        self.data[self.index(address)]
    }

    fn write8(&mut self, address: u32, value: u8) {
        let idx = self.index(address);
        self.data[idx] = value;
    }

    fn wait_states(&self) -> u32 {
        self.wait_states
    }
}

impl MemoryRead for Ram {
    fn read8(&self, address: u32) -> u8 {
        self.data[self.index(address)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_little_endian_access() {
        let mut ram = Ram::new(0x100);
        ram.write32(0x10, 0xDEAD_BEEF);

        assert_eq!(Bus::read8(&mut ram, 0x10), 0xEF);
        assert_eq!(Bus::read16(&mut ram, 0x12), 0xDEAD);
        assert_eq!(MemoryRead::read16(&ram, 0x10), 0xBEEF);
    }

    #[test]
    fn check_mirroring() {
        let mut ram = Ram::new(0x100);
        ram.write8(0x1FF, 7);

        assert_eq!(Bus::read8(&mut ram, 0xFF), 7);
    }

    #[test]
    fn check_load() {
        let mut ram = Ram::new(0x100);
        ram.load(0xFE, &[1, 2, 3]);

        assert_eq!(Bus::read8(&mut ram, 0xFE), 1);
        assert_eq!(Bus::read8(&mut ram, 0xFF), 2);
        assert_eq!(Bus::read8(&mut ram, 0x00), 3);
    }

    #[test]
    #[should_panic]
    fn check_size_must_be_power_of_two() {
        let _ = Ram::new(0x300);
    }
}
