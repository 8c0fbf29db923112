use tracing::{trace, warn};

use crate::hwio::{BankReg, HwioError, IoDevice, bank_get_regs};

/// Address decoder for one register bank of device `P`.
///
/// Accesses may be 1, 2, 4 or 8 bytes wide and may straddle registers: each
/// register touched is read (or written) once, with only the bytes the access
/// covers. Bytes that hit no register read as zero and ignore writes.
pub struct BankTable<P> {
    bank: u32,
    regs: Vec<BankReg<P>>,
}

impl<P: IoDevice> BankTable<P> {
    /// # Errors
    ///
    /// See [`bank_get_regs`].
    pub fn new(bank: u32) -> Result<Self, HwioError> {
        let mut regs = bank_get_regs::<P>(bank)?;
        regs.sort_by_key(|r| r.offset);
        Ok(Self { bank, regs })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Registers overlapping `[offset, offset + size)`, with the position of
    /// their first covered byte relative to the access and to the register.
    fn overlapping(&self, offset: u32, size: u32) -> impl Iterator<Item = Span<'_, P>> {
        let start = u64::from(offset);
        let end = start + u64::from(size);
        self.regs.iter().filter_map(move |reg| {
            let reg_start = u64::from(reg.offset);
            let reg_end = reg_start + u64::from(reg.access.bytes()?);
            let lo = start.max(reg_start);
            let hi = end.min(reg_end);
            (lo < hi).then(|| Span {
                reg,
                access_shift: 8 * (lo - start),
                reg_shift: 8 * (lo - reg_start),
                mask: byte_mask(hi - lo),
            })
        })
    }

    /// Reads `size` bytes at `offset`.
    pub fn read(&self, dev: &mut P, offset: u32, size: u32) -> u64 {
        debug_assert!(matches!(size, 1 | 2 | 4 | 8), "bad access size {size}");
        let mut value = 0;
        let mut covered = 0;
        for span in self.overlapping(offset, size) {
            let reg = span.reg.access.bus_read(dev);
            value |= ((reg >> span.reg_shift) & span.mask) << span.access_shift;
            covered += span.mask.count_ones();
        }

        if covered < 8 * size {
            warn!(
                "hwio: unmapped read{} at bank {} offset {:#06X}",
                8 * size,
                self.bank,
                offset
            );
        }
        trace!(
            "hwio: read{} bank {} offset {:#06X} -> {:#X}",
            8 * size,
            self.bank,
            offset,
            value
        );
        value
    }

    /// Writes the low `size` bytes of `value` at `offset`.
    pub fn write(&self, dev: &mut P, offset: u32, size: u32, value: u64) {
        debug_assert!(matches!(size, 1 | 2 | 4 | 8), "bad access size {size}");
        trace!(
            "hwio: write{} bank {} offset {:#06X} <- {:#X}",
            8 * size,
            self.bank,
            offset,
            value
        );

        let mut covered = 0;
        for span in self.overlapping(offset, size) {
            let bits = ((value >> span.access_shift) & span.mask) << span.reg_shift;
            span.reg
                .access
                .bus_write(dev, bits, span.mask << span.reg_shift);
            covered += span.mask.count_ones();
        }

        if covered < 8 * size {
            warn!(
                "hwio: unmapped write{} at bank {} offset {:#06X} value {:#X}",
                8 * size,
                self.bank,
                offset,
                value
            );
        }
    }

    pub fn read8(&self, dev: &mut P, offset: u32) -> u8 {
        self.read(dev, offset, 1) as u8
    }

    pub fn read16(&self, dev: &mut P, offset: u32) -> u16 {
        self.read(dev, offset, 2) as u16
    }

    pub fn read32(&self, dev: &mut P, offset: u32) -> u32 {
        self.read(dev, offset, 4) as u32
    }

    pub fn read64(&self, dev: &mut P, offset: u32) -> u64 {
        self.read(dev, offset, 8)
    }

    pub fn write8(&self, dev: &mut P, offset: u32, value: u8) {
        self.write(dev, offset, 1, value.into());
    }

    pub fn write16(&self, dev: &mut P, offset: u32, value: u16) {
        self.write(dev, offset, 2, value.into());
    }

    pub fn write32(&self, dev: &mut P, offset: u32, value: u32) {
        self.write(dev, offset, 4, value.into());
    }

    pub fn write64(&self, dev: &mut P, offset: u32, value: u64) {
        self.write(dev, offset, 8, value);
    }
}

struct Span<'a, P> {
    reg: &'a BankReg<P>,
    access_shift: u64,
    reg_shift: u64,
    mask: u64,
}

const fn byte_mask(bytes: u64) -> u64 {
    if bytes >= 8 {
        u64::MAX
    } else {
        (1 << (8 * bytes)) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwio::{Callback, Method, Reg16, Reg32, RegAccess, RegField, must_init_regs};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Timer {
        count: Reg16<Self>,
        ctrl: Reg16<Self>,
        reload: Reg32<Self>,
        ctrl_writes: Vec<u16>,
    }

    impl Timer {
        fn write_ctrl(&mut self, _: u16, new: u16) {
            self.ctrl_writes.push(new);
        }
    }

    impl IoDevice for Timer {
        fn fields() -> Vec<RegField<Self>> {
            vec![
                RegField {
                    name: "Reload",
                    tag: "offset=0x8",
                    access: RegAccess::R32(|t| &mut t.reload),
                },
                RegField {
                    name: "Count",
                    tag: "offset=0x0,rwmask=0",
                    access: RegAccess::R16(|t| &mut t.count),
                },
                RegField {
                    name: "Ctrl",
                    tag: "offset=0x2,rwmask=0x00C7,wcb",
                    access: RegAccess::R16(|t| &mut t.ctrl),
                },
            ]
        }

        fn methods() -> Vec<Method<Self>> {
            vec![Method {
                name: "WriteCTRL",
                func: Callback::Write16(Self::write_ctrl),
            }]
        }
    }

    fn timer() -> (Timer, BankTable<Timer>) {
        let mut timer = Timer::default();
        must_init_regs(&mut timer);
        timer.count.value = 0xBEEF;
        (timer, BankTable::new(0).unwrap())
    }

    #[test]
    fn check_sorted() {
        let (_, table) = timer();
        let offsets: Vec<_> = table.regs.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0x0, 0x2, 0x8]);
    }

    #[test]
    fn check_split_read() {
        let (mut timer, table) = timer();
        timer.ctrl.value = 0x00C3;

        assert_eq!(table.read32(&mut timer, 0x0), 0x00C3_BEEF);
        assert_eq!(table.read8(&mut timer, 0x1), 0xBE);
        assert_eq!(table.read16(&mut timer, 0x1), 0xC3BE);
    }

    #[test]
    fn check_split_write() {
        let (mut timer, table) = timer();

        table.write32(&mut timer, 0x0, 0xFFFF_1234);

        // Count is read-only, Ctrl keeps only its writable bits.
        assert_eq!(timer.count.value, 0xBEEF);
        assert_eq!(timer.ctrl.value, 0x00C7);
        assert_eq!(timer.ctrl_writes, vec![0x00C7]);
    }

    #[test]
    fn check_partial_write() {
        let (mut timer, table) = timer();
        timer.reload.value = 0x1122_3344;

        table.write8(&mut timer, 0xA, 0xAB);

        assert_eq!(timer.reload.value, 0x11AB_3344);
    }

    #[test]
    fn check_unmapped() {
        let (mut timer, table) = timer();
        timer.reload.value = 0xDDCC_BBAA;

        assert_eq!(table.read32(&mut timer, 0x4), 0);
        assert_eq!(table.read64(&mut timer, 0x4), 0xDDCC_BBAA_0000_0000);

        table.write16(&mut timer, 0x6, 0xFFFF);
        assert_eq!(timer.reload.value, 0xDDCC_BBAA);
    }
}
