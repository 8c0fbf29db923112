//! # Coprocessors
//!
//! The core keeps a table of 16 coprocessor slots reached through MRC/MCR.
//! Only CP15 (System Control) is implemented here, for the ARMv5 core:
//!
//! - ID code and cache type (c0, c0, 0/1)
//! - Control register (c1, c0, 0): high exception vectors, TCM enables
//! - TCM region configuration (c9, c1, 0/1)
//!
//! # References
//! - [ARM946E-S Technical Reference Manual](https://developer.arm.com/documentation/ddi0201/latest/)
//! - [GBATEK ARM CP15 Documentation](https://problemkaputt.de/gbatek.htm#armcp15systemcontrolcoprocessor)

use tracing::{debug, warn};

use crate::bitwise::Bits;

/// A coprocessor reachable through MRC/MCR.
pub trait Coprocessor {
    /// MRC: read coprocessor register `(cn, cm, cp)` with opcode `op`.
    fn read(&mut self, op: u32, cn: u32, cm: u32, cp: u32) -> u32;

    /// MCR: write coprocessor register `(cn, cm, cp)` with opcode `op`.
    fn write(&mut self, op: u32, cn: u32, cm: u32, cp: u32, value: u32);
}

/// ARM946E-S main ID register.
const CP15_ID_CODE: u32 = 0x4105_9461;

/// 4 KB instruction cache, 8 KB data cache.
const CP15_CACHE_TYPE: u32 = 0x0F0D_2112;

/// Bits of the control register that read as one.
const CONTROL_FIXED_ONES: u32 = 0x0000_0078;

/// Control register bits software can change.
const CONTROL_WRITABLE: u32 = 0x000F_F085;

const HIGH_VECTORS_BASE: u32 = 0xFFFF_0000;

/// A tightly coupled memory region as configured through c9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcmRegion {
    pub base: u32,
    pub size: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct Cp15 {
    control: u32,
    dtcm_config: u32,
    itcm_config: u32,
}

impl Default for Cp15 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cp15 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            control: CONTROL_FIXED_ONES,
            dtcm_config: 0,
            itcm_config: 0,
        }
    }

    #[must_use]
    pub const fn control(&self) -> u32 {
        self.control
    }

    /// Base address of the exception vector table: 0 or `0xFFFF0000` when
    /// high vectors are selected (control bit 13).
    #[must_use]
    pub fn exception_vector(&self) -> u32 {
        if self.control.get_bit(13) {
            HIGH_VECTORS_BASE
        } else {
            0
        }
    }

    #[must_use]
    pub fn dtcm(&self) -> TcmRegion {
        Self::decode_tcm(self.dtcm_config, self.control.get_bit(16))
    }

    #[must_use]
    pub fn itcm(&self) -> TcmRegion {
        Self::decode_tcm(self.itcm_config, self.control.get_bit(18))
    }

    /// Bits 31-12 hold the base, bits 5-1 the size as `512 << n`.
    fn decode_tcm(config: u32, enabled: bool) -> TcmRegion {
        TcmRegion {
            base: config & 0xFFFF_F000,
            size: 512_u32.checked_shl(config.get_bits(1..=5)).unwrap_or(0),
            enabled,
        }
    }
}

impl Coprocessor for Cp15 {
    fn read(&mut self, op: u32, cn: u32, cm: u32, cp: u32) -> u32 {
        match (cn, cm, cp) {
            (0, 0, 0) => CP15_ID_CODE,
            (0, 0, 1) => CP15_CACHE_TYPE,
            (1, 0, 0) => self.control,
            (9, 1, 0) => self.dtcm_config,
            (9, 1, 1) => self.itcm_config,
            _ => {
                warn!("CP15: unsupported read op={op} c{cn}, c{cm}, {cp}");
                0
            }
        }
    }

    fn write(&mut self, op: u32, cn: u32, cm: u32, cp: u32, value: u32) {
        match (cn, cm, cp) {
            (1, 0, 0) => {
                self.control = (value & CONTROL_WRITABLE) | CONTROL_FIXED_ONES;
                debug!(
                    "CP15: control={:#010X} high_vectors={} dtcm={} itcm={}",
                    self.control,
                    self.control.get_bit(13),
                    self.control.get_bit(16),
                    self.control.get_bit(18)
                );
            }
            (9, 1, 0) => {
                self.dtcm_config = value;
                debug!("CP15: DTCM region {:?}", self.dtcm());
            }
            (9, 1, 1) => {
                self.itcm_config = value;
                debug!("CP15: ITCM region {:?}", self.itcm());
            }
            // Cache and write-buffer maintenance: nothing to emulate.
            (7, _, _) => {}
            _ => warn!("CP15: unsupported write op={op} c{cn}, c{cm}, {cp} value={value:#X}"),
        }
    }
}
