//! # ARM core state machine
//!
//! [`Cpu`] owns the architectural state of one ARM core: the banked register
//! file, CPSR and SPSRs, the clock, the external lines and the tables the
//! rest of the emulator plugs into (SWI high-level emulation, coprocessors,
//! debugger).
//!
//! Instruction decoding and execution live outside this crate. An executor
//! drives the core through [`Stepper`] and the register/bus accessors, and
//! calls [`Cpu::exception`] when an instruction traps.

use std::fmt;

use tracing::{debug, error, info, trace};

use crate::bus::Bus;
use crate::cpu::coprocessor::{Coprocessor, Cp15};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::exception::Exception;
use crate::cpu::lines::Lines;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, RegisterFile};

/// Cycles taken to enter an exception handler.
const EXCEPTION_CYCLES: i64 = 3;

/// Architecture revision of the core.
///
/// The order matters: `arch <= Arch::ArmV4` means "`ARMv4` and earlier".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Arch {
    ArmV4 = 4,
    ArmV5 = 5,
}

/// Reason of a change of program flow, for the executor's benefit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchType {
    Jump,
    Call,
    Return,
    Interrupt,
}

/// High-level emulation of a SWI call. Returns the cycles the call would
/// have taken on real hardware.
pub type SwiHle = Box<dyn FnMut(&mut Cpu) -> i64>;

/// Executes instructions on behalf of [`Cpu::run`].
pub trait Stepper {
    /// Executes one instruction (or block) and returns the cycles it took.
    fn step(&mut self, cpu: &mut Cpu) -> i64;
}

/// Receives breakpoint traps raised by the core.
pub trait CpuDebugger {
    fn trigger_breakpoint(&mut self, msg: &str);
}

pub struct Cpu {
    registers: RegisterFile,
    cpsr: Psr,
    spsr: [Psr; 5],
    pub clock: i64,

    arch: Arch,
    bus: Box<dyn Bus>,

    /// Address of the next instruction to execute. Exceptions derive their
    /// return address from it, so after a SWI it already points past the SWI.
    pc: u32,
    prev_pc: u32,

    cp15: Option<Cp15>,
    coprocessors: [Option<Box<dyn Coprocessor>>; 16],
    lines: Lines,
    swi_hle: Vec<Option<SwiHle>>,

    /// Cycles consumed by one access to the external bus.
    mem_cycles: i64,
    target_cycles: i64,
    tight_exit: bool,

    debugger: Option<Box<dyn CpuDebugger>>,
}

impl Cpu {
    /// Creates a core in Supervisor mode attached to `bus`.
    #[must_use]
    pub fn new(arch: Arch, bus: Box<dyn Bus>) -> Self {
        let mem_cycles = i64::from(bus.wait_states()) + 1;
        Self {
            registers: RegisterFile::new(Mode::Supervisor),
            cpsr: Psr::from(Mode::Supervisor),
            spsr: [Psr::default(); 5],
            clock: 0,
            arch,
            bus,
            pc: 0,
            prev_pc: 0,
            cp15: None,
            coprocessors: Default::default(),
            lines: Lines::NONE,
            swi_hle: (0..256).map(|_| None).collect(),
            mem_cycles,
            target_cycles: 0,
            tight_exit: false,
            debugger: None,
        }
    }

    #[must_use]
    pub const fn arch(&self) -> Arch {
        self.arch
    }

    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    #[must_use]
    pub const fn prev_pc(&self) -> u32 {
        self.prev_pc
    }

    pub const fn set_pc(&mut self, address: u32) {
        self.registers.set_program_counter(address);
        self.pc = address;
    }

    /// Moves execution to `target`, remembering where it came from.
    pub fn branch(&mut self, target: u32, kind: BranchType) {
        trace!("branch {:?}: {:#010X} -> {:#010X}", kind, self.pc, target);
        self.prev_pc = self.pc;
        self.set_pc(target);
    }

    #[must_use]
    pub fn reg(&self, reg: usize) -> u32 {
        self.registers.register_at(reg)
    }

    pub fn set_reg(&mut self, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            self.set_pc(value);
        } else {
            self.registers.set_register_at(reg, value);
        }
    }

    /// Reads the copy of `reg` banked for `mode`.
    #[must_use]
    pub fn banked_reg(&self, mode: Mode, reg: usize) -> u32 {
        self.registers.banked_register_at(mode, reg)
    }

    #[must_use]
    pub const fn cpsr(&self) -> Psr {
        self.cpsr
    }

    /// Full CPSR write (as done by MSR or an exception return).
    /// Switches register bank if the mode bits change.
    pub fn set_cpsr(&mut self, value: Psr) {
        let old_mode = self.cpsr.mode();
        self.cpsr = value;
        let new_mode = self.cpsr.mode();
        if old_mode != new_mode {
            debug!("mode switch {:?} -> {:?}", old_mode, new_mode);
        }
        self.registers.retarget(new_mode);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        let mut cpsr = self.cpsr;
        cpsr.set_mode(mode);
        self.set_cpsr(cpsr);
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.cpsr.set_cpu_state(state);
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.cpsr.set_irq_disable(value);
    }

    pub fn set_fiq_disable(&mut self, value: bool) {
        self.cpsr.set_fiq_disable(value);
    }

    /// The saved status register of the current mode.
    ///
    /// User and System mode have no SPSR: asking for it is an emulation bug
    /// and traps into the debugger.
    pub fn reg_spsr(&mut self) -> &mut Psr {
        let mode = self.cpsr.mode();
        let idx = match mode.spsr_index() {
            Some(idx) => idx,
            None => {
                self.breakpoint(format_args!(
                    "access to spsr forbidden in non-privileged mode: {mode:?}"
                ));
                // Only reached when a debugger resumed execution.
                0
            }
        };
        &mut self.spsr[idx]
    }

    /// Reads the SPSR banked for `mode`, if it has one.
    #[must_use]
    pub fn banked_spsr(&self, mode: Mode) -> Option<Psr> {
        mode.spsr_index().map(|idx| self.spsr[idx])
    }

    pub fn set_debugger(&mut self, debugger: Box<dyn CpuDebugger>) {
        self.debugger = Some(debugger);
    }

    fn breakpoint(&mut self, msg: fmt::Arguments<'_>) {
        let msg = msg.to_string();
        error!(pc = format_args!("{:#010X}", self.pc), "{msg}");
        match self.debugger.as_mut() {
            Some(dbg) => dbg.trigger_breakpoint(&msg),
            None => panic!("{msg}"),
        }
    }

    pub fn map_coprocessor(&mut self, copnum: usize, cop: Box<dyn Coprocessor>) {
        assert!(copnum < 16, "Invalid coprocessor number: {copnum}");
        if copnum == 15 {
            self.cp15 = None;
        }
        self.coprocessors[copnum] = Some(cop);
    }

    /// Installs the System Control coprocessor in slot 15.
    pub fn enable_cp15(&mut self) -> &mut Cp15 {
        self.coprocessors[15] = None;
        self.cp15.insert(Cp15::new())
    }

    #[must_use]
    pub const fn cp15(&self) -> Option<&Cp15> {
        self.cp15.as_ref()
    }

    pub fn coprocessor(&mut self, copnum: usize) -> Option<&mut (dyn Coprocessor + 'static)> {
        assert!(copnum < 16, "Invalid coprocessor number: {copnum}");
        if copnum == 15 {
            if let Some(cp15) = self.cp15.as_mut() {
                return Some(cp15);
            }
        }
        self.coprocessors[copnum].as_deref_mut()
    }

    /// Installs a high-level emulation function for a specific SWI call.
    ///
    /// This lets the emulator run without the original BIOS image, or speeds
    /// up frequently used BIOS calls. Parameters are passed in registers, so
    /// the hook usually works on [`Cpu::reg`] / [`Cpu::set_reg`]. The return
    /// value is the number of cycles the real routine would have taken.
    pub fn set_swi_hle(&mut self, swi: u8, hle: SwiHle) {
        self.swi_hle[usize::from(swi)] = Some(hle);
    }

    pub fn clear_swi_hle(&mut self, swi: u8) {
        self.swi_hle[usize::from(swi)] = None;
    }

    /// Raises `exc`, as if the instruction at the current PC trapped.
    pub fn exception(&mut self, exc: Exception) {
        let state = self.cpsr.cpu_state();
        let return_address = self.pc.wrapping_add(exc.return_offset(state));

        // A SWI with an HLE implementation runs it and exits without
        // touching the ARM core state.
        if exc == Exception::SoftwareInterrupt {
            let num = usize::from(self.bus.read16(return_address.wrapping_sub(2)) & 0xFF);
            if let Some(mut hle) = self.swi_hle[num].take() {
                info!(num, "SWI - HLE emulation");
                let delay = hle(self);
                if self.swi_hle[num].is_none() {
                    self.swi_hle[num] = Some(hle);
                }
                self.clock += delay + EXCEPTION_CYCLES;
                return;
            }
            info!(num = format_args!("{num:#04X}"), "SWI");
        } else {
            info!(
                exc = ?exc,
                lr = format_args!("{return_address:#010X}"),
                arch = ?self.arch,
                "exception"
            );
        }

        let old_cpsr = self.cpsr;

        self.set_cpu_state(CpuState::Arm);
        self.set_mode(exc.target_mode());
        self.set_irq_disable(true);
        if exc.disables_fiq() {
            self.set_fiq_disable(true);
        }

        // After the mode change, so these land in the new bank.
        *self.reg_spsr() = old_cpsr;
        self.registers.set_register_at(REG_LR, return_address);

        let base = self.cp15.as_ref().map_or(0, Cp15::exception_vector);
        self.branch(base.wrapping_add(exc.vector_offset()), BranchType::Interrupt);
        self.clock += EXCEPTION_CYCLES;
    }

    /// Sets the status of an external line.
    ///
    /// Newly asserted lines force the executor out of its tight loop so they
    /// are noticed right away. Asserting IRQ or FIQ releases HALT even if the
    /// interrupt is masked in the CPSR.
    pub fn set_line(&mut self, line: Lines, asserted: bool) {
        if asserted {
            if !self.lines.contains(line) {
                self.tight_exit = true;
            }
            self.lines.insert(line);
            if line.intersects(Lines::FIQ | Lines::IRQ) {
                self.lines.remove(Lines::HALT);
            }
        } else {
            self.lines.remove(line);
        }
    }

    #[must_use]
    pub const fn lines(&self) -> Lines {
        self.lines
    }

    /// Returns and clears the request to leave the tight execution loop.
    pub const fn take_tight_exit(&mut self) -> bool {
        let exit = self.tight_exit;
        self.tight_exit = false;
        exit
    }

    pub fn reset(&mut self) {
        self.pc = 0;
        self.prev_pc = 0;
        self.clock = 0;
        self.exception(Exception::Reset);
    }

    #[must_use]
    pub const fn target_cycles(&self) -> i64 {
        self.target_cycles
    }

    /// Raises a pending, unmasked interrupt. FIQ wins over IRQ.
    fn check_interrupts(&mut self) {
        if self.lines.contains(Lines::FIQ) && !self.cpsr.fiq_disable() {
            self.exception(Exception::Fiq);
        } else if self.lines.contains(Lines::IRQ) && !self.cpsr.irq_disable() {
            self.exception(Exception::Irq);
        }
    }

    /// Runs `stepper` until the clock reaches `until`.
    ///
    /// Lines are sampled before every step; a halted core fast-forwards its
    /// clock to the target.
    pub fn run(&mut self, until: i64, stepper: &mut dyn Stepper) {
        self.target_cycles = until;
        while self.clock < self.target_cycles {
            self.tight_exit = false;
            if self.lines.contains(Lines::HALT) {
                self.clock = self.target_cycles;
                break;
            }
            self.check_interrupts();
            let cycles = stepper.step(self);
            self.clock += cycles;
        }
    }

    #[must_use]
    pub const fn mem_cycles(&self) -> i64 {
        self.mem_cycles
    }

    pub fn read16(&mut self, address: u32) -> u16 {
        self.clock += self.mem_cycles;
        self.bus.read16(address)
    }

    pub fn read32(&mut self, address: u32) -> u32 {
        self.clock += self.mem_cycles;
        self.bus.read32(address)
    }

    pub fn write16(&mut self, address: u32, value: u16) {
        self.clock += self.mem_cycles;
        self.bus.write16(address, value);
    }

    pub fn write32(&mut self, address: u32, value: u32) {
        self.clock += self.mem_cycles;
        self.bus.write32(address, value);
    }
}
