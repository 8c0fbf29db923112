//! # Memory-mapped I/O register binding
//!
//! Peripherals describe their bus-visible registers with a small declarative
//! table: one [`RegField`] per register, carrying a metadata tag such as
//!
//! ```text
//! offset=0x00,rwmask=0x3,wcb,rcb
//! ```
//!
//! and a method table ([`Method`]) listing the callbacks the tags may refer
//! to. [`init_regs`] applies reset values, read-only masks and callbacks;
//! [`bank_get_regs`] and [`BankTable`] turn the offsets into an address
//! decoder for the bus.
//!
//! | Key      | Meaning                                                       |
//! |----------|---------------------------------------------------------------|
//! | `offset` | address offset inside the bank (required for bus decoding)    |
//! | `bank`   | bank number, default 0                                        |
//! | `reset`  | initial value, not filtered by the mask                       |
//! | `rwmask` | bits writable from the bus; all others are read-only         |
//! | `rcb`    | read callback, default name `Read<FIELD>`                     |
//! | `wcb`    | write callback, default name `Write<FIELD>`                   |

mod error;
mod init;
mod reg;
mod table;
mod tag;

pub use error::HwioError;
pub use init::{BankReg, bank_get_regs, init_regs, must_init_regs};
pub use reg::{Reg, Reg16, Reg32, Reg64, RegValue};
pub use table::BankTable;
pub use tag::{Tag, parse_uint};

/// Typed access to one register of a device.
pub enum RegAccess<P> {
    R16(fn(&mut P) -> &mut Reg16<P>),
    R32(fn(&mut P) -> &mut Reg32<P>),
    R64(fn(&mut P) -> &mut Reg64<P>),
    /// A tagged field that is not a 16/32/64-bit register; names its type.
    Unsupported(&'static str),
}

impl<P> Clone for RegAccess<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for RegAccess<P> {}

impl<P> RegAccess<P> {
    /// Width of the register in bytes.
    #[must_use]
    pub const fn bytes(&self) -> Option<u32> {
        match self {
            Self::R16(_) => Some(2),
            Self::R32(_) => Some(4),
            Self::R64(_) => Some(8),
            Self::Unsupported(_) => None,
        }
    }

    /// Reads the register as the bus does, running its read callback.
    pub fn bus_read(&self, dev: &mut P) -> u64 {
        match *self {
            Self::R16(get) => u64::from(Reg::bus_read(dev, get)),
            Self::R32(get) => u64::from(Reg::bus_read(dev, get)),
            Self::R64(get) => Reg::bus_read(dev, get),
            Self::Unsupported(_) => 0,
        }
    }

    /// Writes the bits selected by `mask`, honoring the read-only mask and
    /// running the write callback.
    pub fn bus_write(&self, dev: &mut P, value: u64, mask: u64) {
        match *self {
            Self::R16(get) => Reg::bus_write(dev, get, value as u16, mask as u16),
            Self::R32(get) => Reg::bus_write(dev, get, value as u32, mask as u32),
            Self::R64(get) => Reg::bus_write(dev, get, value, mask),
            Self::Unsupported(_) => {}
        }
    }
}

/// A device field as declared to the binding framework.
pub struct RegField<P> {
    /// Field name. Default callback names are derived from it.
    pub name: &'static str,
    /// Metadata tag; an empty tag leaves the field alone.
    pub tag: &'static str,
    pub access: RegAccess<P>,
}

/// A callback a device exposes to its register tags.
pub enum Callback<P> {
    Read16(fn(&mut P, u16) -> u16),
    Write16(fn(&mut P, u16, u16)),
    Read32(fn(&mut P, u32) -> u32),
    Write32(fn(&mut P, u32, u32)),
    Read64(fn(&mut P, u64) -> u64),
    Write64(fn(&mut P, u64, u64)),
}

impl<P> Clone for Callback<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for Callback<P> {}

impl<P> Callback<P> {
    /// Short description used in error messages, e.g. `write64`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Read16(_) => "read16",
            Self::Write16(_) => "write16",
            Self::Read32(_) => "read32",
            Self::Write32(_) => "write32",
            Self::Read64(_) => "read64",
            Self::Write64(_) => "write64",
        }
    }
}

pub struct Method<P> {
    pub name: &'static str,
    pub func: Callback<P>,
}

/// A peripheral whose registers are wired through this module.
pub trait IoDevice: Sized {
    fn fields() -> Vec<RegField<Self>>;

    fn methods() -> Vec<Method<Self>> {
        Vec::new()
    }
}
