//! # Banked register file
//!
//! All 31 physical general-purpose registers of the core live in one array.
//! A 16-entry map translates an architectural register number (R0-R15) into
//! a physical slot; changing mode only rewrites the map, so the values of the
//! previous mode stay where they are.
//!
//! | Mode           | Banked registers |
//! |----------------|------------------|
//! | User / System  | none             |
//! | FIQ            | R8-R14           |
//! | Supervisor     | R13-R14          |
//! | Abort          | R13-R14          |
//! | IRQ            | R13-R14          |
//! | Undefined      | R13-R14          |
//!
//! R0-R7 and R15 are always shared.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;

/// Stack Pointer register index.
pub const REG_SP: usize = 0xD;

/// Link Register index (return address for subroutines and exceptions).
pub const REG_LR: usize = 0xE;

/// Program Counter register index.
pub const REG_PROGRAM_COUNTER: usize = 0xF;

const NUM_PHYSICAL: usize = 31;

// Physical slots after the 16 User/System registers.
const FIQ_R8: u8 = 16;
const SVC_R13: u8 = 23;
const ABT_R13: u8 = 25;
const IRQ_R13: u8 = 27;
const UND_R13: u8 = 29;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterFile {
    physical: [u32; NUM_PHYSICAL],
    map: [u8; 16],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(Mode::User)
    }
}

impl RegisterFile {
    #[must_use]
    pub const fn new(mode: Mode) -> Self {
        Self {
            physical: [0; NUM_PHYSICAL],
            map: Self::layout(mode),
        }
    }

    const fn layout(mode: Mode) -> [u8; 16] {
        let mut map = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
        match mode {
            Mode::User | Mode::System => {}
            Mode::Fiq => {
                let mut r = 8;
                while r <= 14 {
                    map[r] = FIQ_R8 + (r as u8 - 8);
                    r += 1;
                }
            }
            Mode::Supervisor => {
                map[13] = SVC_R13;
                map[14] = SVC_R13 + 1;
            }
            Mode::Abort => {
                map[13] = ABT_R13;
                map[14] = ABT_R13 + 1;
            }
            Mode::Irq => {
                map[13] = IRQ_R13;
                map[14] = IRQ_R13 + 1;
            }
            Mode::Undefined => {
                map[13] = UND_R13;
                map[14] = UND_R13 + 1;
            }
        }
        map
    }

    /// Points the visible registers at the bank of `mode`.
    pub const fn retarget(&mut self, mode: Mode) {
        self.map = Self::layout(mode);
    }

    #[must_use]
    pub fn register_at(&self, reg: usize) -> u32 {
        assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        self.physical[self.map[reg] as usize]
    }

    pub fn set_register_at(&mut self, reg: usize, new_value: u32) {
        assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        self.physical[self.map[reg] as usize] = new_value;
    }

    /// Reads the copy of `reg` that belongs to `mode`, whatever the current mode is.
    #[must_use]
    pub fn banked_register_at(&self, mode: Mode, reg: usize) -> u32 {
        assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        self.physical[Self::layout(mode)[reg] as usize]
    }

    pub fn set_banked_register_at(&mut self, mode: Mode, reg: usize, new_value: u32) {
        assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        self.physical[Self::layout(mode)[reg] as usize] = new_value;
    }

    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.physical[REG_PROGRAM_COUNTER]
    }

    pub const fn set_program_counter(&mut self, new_value: u32) {
        self.physical[REG_PROGRAM_COUNTER] = new_value;
    }
}
