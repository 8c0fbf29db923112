use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use crate::hwio::Callback;

/// Integer types a register can hold.
pub trait RegValue:
    Copy
    + Default
    + PartialEq
    + fmt::Debug
    + fmt::UpperHex
    + Not<Output = Self>
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + Into<u64>
{
    const BITS: u32;

    /// Truncates `value` to the register width.
    fn truncate(value: u64) -> Self;

    fn read_callback<P>(cb: Callback<P>) -> Option<fn(&mut P, Self) -> Self>;

    fn write_callback<P>(cb: Callback<P>) -> Option<fn(&mut P, Self, Self)>;
}

macro_rules! impl_reg_value {
    ($ty:ty, $read:ident, $write:ident) => {
        impl RegValue for $ty {
            const BITS: u32 = <$ty>::BITS;

            #[allow(clippy::cast_possible_truncation)]
            fn truncate(value: u64) -> Self {
                value as $ty
            }

            fn read_callback<P>(cb: Callback<P>) -> Option<fn(&mut P, Self) -> Self> {
                match cb {
                    Callback::$read(f) => Some(f),
                    _ => None,
                }
            }

            fn write_callback<P>(cb: Callback<P>) -> Option<fn(&mut P, Self, Self)> {
                match cb {
                    Callback::$write(f) => Some(f),
                    _ => None,
                }
            }
        }
    };
}

impl_reg_value!(u16, Read16, Write16);
impl_reg_value!(u32, Read32, Write32);
impl_reg_value!(u64, Read64, Write64);

/// A hardware register owned by device `P`.
///
/// `value` can always be changed directly by the device; only bus accesses
/// go through `ro_mask` and the callbacks.
pub struct Reg<T, P> {
    pub value: T,
    /// Bits that bus writes cannot change.
    pub ro_mask: T,
    /// Called on bus reads with the stored value; returns what the bus sees.
    pub read_cb: Option<fn(&mut P, T) -> T>,
    /// Called after a bus write with the old and the new value.
    pub write_cb: Option<fn(&mut P, T, T)>,
}

pub type Reg16<P> = Reg<u16, P>;
pub type Reg32<P> = Reg<u32, P>;
pub type Reg64<P> = Reg<u64, P>;

impl<T: RegValue, P> Default for Reg<T, P> {
    fn default() -> Self {
        Self {
            value: T::default(),
            ro_mask: T::default(),
            read_cb: None,
            write_cb: None,
        }
    }
}

impl<T: RegValue, P> fmt::Debug for Reg<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reg")
            .field("value", &format_args!("{:#X}", self.value))
            .field("ro_mask", &format_args!("{:#X}", self.ro_mask))
            .field("read_cb", &self.read_cb.is_some())
            .field("write_cb", &self.write_cb.is_some())
            .finish()
    }
}

impl<T: RegValue, P> Reg<T, P> {
    /// Merges `value` into the register: only bits that are in `mask` and not
    /// read-only change.
    pub fn store(&mut self, value: T, mask: T) {
        self.value = (self.value & (self.ro_mask | !mask)) | (value & mask & !self.ro_mask);
    }

    /// Bus read of the register returned by `get`.
    pub fn bus_read(dev: &mut P, get: fn(&mut P) -> &mut Self) -> T {
        let reg = get(dev);
        let (value, cb) = (reg.value, reg.read_cb);
        match cb {
            Some(cb) => cb(dev, value),
            None => value,
        }
    }

    /// Bus write of the bits in `mask` to the register returned by `get`.
    pub fn bus_write(dev: &mut P, get: fn(&mut P) -> &mut Self, value: T, mask: T) {
        let reg = get(dev);
        let old = reg.value;
        reg.store(value, mask);
        let (new, cb) = (reg.value, reg.write_cb);
        if let Some(cb) = cb {
            cb(dev, old, new);
        }
    }
}
