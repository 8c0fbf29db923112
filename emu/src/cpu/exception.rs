use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::CpuState;

/// The eight exception vectors, in vector-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Reset = 0,
    Undefined = 1,
    SoftwareInterrupt = 2,
    PrefetchAbort = 3,
    DataAbort = 4,
    AddressOverflow = 5,
    Irq = 6,
    Fiq = 7,
}

/// CPU mode to enter when the exception is raised.
const TARGET_MODE: [Mode; 8] = [
    Mode::Supervisor,
    Mode::Undefined,
    Mode::Supervisor,
    Mode::Abort,
    Mode::Abort,
    Mode::Supervisor,
    Mode::Irq,
    Mode::Fiq,
];

/// Added to the PC to get the value saved in the exception mode's LR.
const RETURN_OFFSET_ARM: [u32; 8] = [0, 4, 0, 4, 8, 4, 4, 4];
const RETURN_OFFSET_THUMB: [u32; 8] = [0, 2, 0, 4, 6, 2, 4, 4];

impl Exception {
    #[must_use]
    pub const fn target_mode(self) -> Mode {
        TARGET_MODE[self as usize]
    }

    #[must_use]
    pub const fn return_offset(self, state: CpuState) -> u32 {
        match state {
            CpuState::Arm => RETURN_OFFSET_ARM[self as usize],
            CpuState::Thumb => RETURN_OFFSET_THUMB[self as usize],
        }
    }

    /// Offset of the exception's entry in the vector table.
    #[must_use]
    pub const fn vector_offset(self) -> u32 {
        self as u32 * 4
    }

    /// Reset and FIQ also mask fast interrupts on entry.
    #[must_use]
    pub const fn disables_fiq(self) -> bool {
        matches!(self, Self::Reset | Self::Fiq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_vectors() {
        assert_eq!(Exception::Reset.vector_offset(), 0x00);
        assert_eq!(Exception::SoftwareInterrupt.vector_offset(), 0x08);
        assert_eq!(Exception::Irq.vector_offset(), 0x18);
        assert_eq!(Exception::Fiq.vector_offset(), 0x1C);
    }

    #[test]
    fn check_return_offsets() {
        assert_eq!(Exception::Irq.return_offset(CpuState::Arm), 4);
        assert_eq!(Exception::Irq.return_offset(CpuState::Thumb), 4);
        assert_eq!(Exception::DataAbort.return_offset(CpuState::Arm), 8);
        assert_eq!(Exception::DataAbort.return_offset(CpuState::Thumb), 6);
        assert_eq!(Exception::Undefined.return_offset(CpuState::Thumb), 2);
    }

    #[test]
    fn check_target_modes() {
        assert_eq!(Exception::SoftwareInterrupt.target_mode(), Mode::Supervisor);
        assert_eq!(Exception::PrefetchAbort.target_mode(), Mode::Abort);
        assert_eq!(Exception::Fiq.target_mode(), Mode::Fiq);
        assert!(Exception::Reset.disables_fiq());
        assert!(!Exception::Irq.disables_fiq());
    }
}
