// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

/// Trait for common number operations.
pub trait NumExt: Copy + PartialEq + Default {
    /// Width of the type, in bits.
    const WIDTH: u32;

    /// Get the state of the given bit. Returns 0/1.
    fn bit(self, bit: u16) -> Self;
    /// Is the given bit set?
    fn is_bit(&self, bit: u16) -> bool;
    /// Set the given bit.
    fn set_bit(self, bit: u16, state: bool) -> Self;
    /// Get bits in a certain range
    fn bits(self, start: Self, len: Self) -> Self;

    /// Convert to u8
    fn u8(self) -> u8;
    /// Convert to u16
    fn u16(self) -> u16;
    /// Convert to u32
    fn u32(self) -> u32;
    /// Convert to u64
    fn u64(self) -> u64;
    /// Convert to usize
    fn us(self) -> usize;
}

macro_rules! num_ext_impl {
    ($ty:ident, $w:expr) => {
        impl NumExt for $ty {
            const WIDTH: u32 = $w;

            #[inline(always)]
            fn bit(self, bit: u16) -> $ty {
                (self >> bit) & 1
            }

            #[inline(always)]
            fn is_bit(&self, bit: u16) -> bool {
                (self & (1 << bit)) != 0
            }

            #[inline(always)]
            fn set_bit(self, bit: u16, state: bool) -> $ty {
                (self & ((1 << bit) ^ Self::MAX)) | ((state as $ty) << bit)
            }

            #[inline(always)]
            fn bits(self, start: $ty, len: $ty) -> $ty {
                (self >> start) & ((1 << len) - 1)
            }

            #[inline(always)]
            fn u8(self) -> u8 {
                self as u8
            }

            #[inline(always)]
            fn u16(self) -> u16 {
                self as u16
            }

            #[inline(always)]
            fn u32(self) -> u32 {
                self as u32
            }

            #[inline(always)]
            fn u64(self) -> u64 {
                self as u64
            }

            #[inline(always)]
            fn us(self) -> usize {
                self as usize
            }
        }
    };
}

num_ext_impl!(u8, 8);
num_ext_impl!(u16, 16);
num_ext_impl!(u32, 32);
num_ext_impl!(u64, 64);
num_ext_impl!(usize, usize::BITS);
