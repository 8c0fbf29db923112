//! # Hardware division unit
//!
//! | Offset | Register | Width | Notes                          |
//! |--------|----------|-------|--------------------------------|
//! | 0x00   | DIVCNT   | 16    | bits 0-1 mode, bit 14 DBZ flag |
//! | 0x10   | NUMER    | 64    |                                |
//! | 0x18   | DENOM    | 64    |                                |
//! | 0x20   | RES      | 64    | read-only from software's view |
//! | 0x28   | MOD      | 64    |                                |
//!
//! Modes: 0 = 32/32, 1 = 64/32, 2 = 64/64, 3 behaves like 1.
//! Results are recomputed on every write to DIVCNT, NUMER or DENOM.

use tracing::debug;

use crate::hwio::{Callback, IoDevice, Method, Reg16, Reg64, RegAccess, RegField, must_init_regs};

/// DIVCNT bit 14: the full 64-bit denominator is zero.
const DIV_BY_ZERO: u16 = 1 << 14;

#[derive(Debug, Default)]
pub struct HwDivisor {
    pub div_cnt: Reg16<Self>,
    pub numer: Reg64<Self>,
    pub denom: Reg64<Self>,
    pub res: Reg64<Self>,
    pub modulus: Reg64<Self>,
}

impl IoDevice for HwDivisor {
    fn fields() -> Vec<RegField<Self>> {
        vec![
            RegField {
                name: "DivCnt",
                tag: "offset=0x00,rwmask=0x3,wcb,rcb",
                access: RegAccess::R16(|d| &mut d.div_cnt),
            },
            RegField {
                name: "Numer",
                tag: "offset=0x10,wcb=WriteIN",
                access: RegAccess::R64(|d| &mut d.numer),
            },
            RegField {
                name: "Denom",
                tag: "offset=0x18,wcb=WriteIN",
                access: RegAccess::R64(|d| &mut d.denom),
            },
            RegField {
                name: "Res",
                tag: "offset=0x20",
                access: RegAccess::R64(|d| &mut d.res),
            },
            RegField {
                name: "Mod",
                tag: "offset=0x28",
                access: RegAccess::R64(|d| &mut d.modulus),
            },
        ]
    }

    fn methods() -> Vec<Method<Self>> {
        vec![
            Method {
                name: "WriteIN",
                func: Callback::Write64(Self::write_in),
            },
            Method {
                name: "WriteDIVCNT",
                func: Callback::Write16(Self::write_divcnt),
            },
            Method {
                name: "ReadDIVCNT",
                func: Callback::Read16(Self::read_divcnt),
            },
        ]
    }
}

impl HwDivisor {
    #[must_use]
    pub fn new() -> Self {
        let mut div = Self::default();
        must_init_regs(&mut div);
        div
    }

    fn write_in(&mut self, _old: u64, _new: u64) {
        self.calc();
    }

    fn write_divcnt(&mut self, _old: u16, _new: u16) {
        self.calc();
    }

    fn read_divcnt(&mut self, val: u16) -> u16 {
        // Always the full denominator, even in 32-bit mode.
        if self.denom.value == 0 {
            val | DIV_BY_ZERO
        } else {
            val
        }
    }

    /// Recomputes RES and MOD from the current inputs.
    pub fn calc(&mut self) {
        let mode = self.div_cnt.value & 3;
        let (res, modulus) = if mode == 0 {
            div32(self.numer.value as u32 as i32, self.denom.value as u32 as i32, self.numer.value)
        } else {
            let denom = if mode == 2 {
                self.denom.value as i64
            } else {
                // 64/32: sign-extended low half.
                i64::from(self.denom.value as u32 as i32)
            };
            div64(self.numer.value as i64, denom)
        };
        self.res.value = res;
        self.modulus.value = modulus;

        debug!(
            "divisor: mode {} {}/{} = {},{}",
            mode,
            self.numer.value as i64,
            self.denom.value as i64,
            res as i64,
            modulus as i64
        );
    }
}

/// 32/32 division. `raw_numer` is the whole NUMER register, which is what MOD
/// reports on a division by zero.
fn div32(numer: i32, denom: i32, raw_numer: u64) -> (u64, u64) {
    if denom == 0 {
        let res = if numer >= 0 {
            0xF_FFFF_FFFF
        } else {
            !0xF_FFFF_FFFF
        };
        (res, raw_numer)
    } else if denom == -1 && numer == i32::MIN {
        // Not sign-extended.
        (u64::from(numer as u32), 0)
    } else {
        (
            i64::from(numer / denom) as u64,
            i64::from(numer % denom) as u64,
        )
    }
}

fn div64(numer: i64, denom: i64) -> (u64, u64) {
    if denom == 0 {
        let res: i64 = if numer > 0 { -1 } else { 1 };
        (res as u64, numer as u64)
    } else if denom == -1 && numer == i64::MIN {
        (numer as u64, 0)
    } else {
        ((numer / denom) as u64, (numer % denom) as u64)
    }
}
