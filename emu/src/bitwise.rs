use std::ops::RangeInclusive;

/// Contains some helper methods to manipulate bits,
/// the index (`bit_idx`) is supposed to be from lsb to msb (right to left)
pub trait Bits: Copy {
    fn get_bit(self, bit_idx: u8) -> bool;

    fn set_bit(&mut self, bit_idx: u8, value: bool);

    /// Returns the bits in `bits_range`, shifted down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    fn get_byte(self, byte_nth: u8) -> u8;

    fn set_byte(&mut self, byte_nth: u8, value: u8);
}

macro_rules! impl_bits {
    ($($t:ty),*) => {
        $(
            impl Bits for $t {
                fn get_bit(self, bit_idx: u8) -> bool {
                    debug_assert!(u32::from(bit_idx) < <$t>::BITS);
                    (self >> bit_idx) & 1 != 0
                }

                fn set_bit(&mut self, bit_idx: u8, value: bool) {
                    debug_assert!(u32::from(bit_idx) < <$t>::BITS);
                    if value {
                        *self |= 1 << bit_idx;
                    } else {
                        *self &= !(1 << bit_idx);
                    }
                }

                fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                    let start = *bits_range.start();
                    let length = u32::from(*bits_range.end() - start) + 1;
                    let mask = if length >= <$t>::BITS {
                        <$t>::MAX
                    } else {
                        (1 << length) - 1
                    };
                    (self >> start) & mask
                }

                fn get_byte(self, byte_nth: u8) -> u8 {
                    debug_assert!(u32::from(byte_nth) * 8 < <$t>::BITS);
                    (self >> (byte_nth * 8)) as u8
                }

                fn set_byte(&mut self, byte_nth: u8, value: u8) {
                    debug_assert!(u32::from(byte_nth) * 8 < <$t>::BITS);
                    let shift = byte_nth * 8;
                    *self = (*self & !(0xFF << shift)) | (<$t>::from(value) << shift);
                }
            }
        )*
    };
}

impl_bits!(u8, u16, u32, u64);
