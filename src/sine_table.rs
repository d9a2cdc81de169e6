//! Half-cycle sine lookup.

use fixed::types::{I16F16, U2F14};

/// Number of entries in the built-in half-cycle table.
pub const DEFAULT_TABLE_LEN: usize = 98;

/// Peak entry of the built-in table, as raw `U2F14` bits.
pub const DEFAULT_PEAK: u16 = 776;

/// One electrical half-cycle of instantaneous amplitude fractions.
///
/// Entry `i` is the fraction of the amplitude command to apply at phase step
/// `i`. Both ends of the table are zero so the two legs hand over at a zero
/// crossing. Tables are limited to 256 entries so the phase counter fits in a
/// byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SineTable<const N: usize> {
    entries: [U2F14; N],
}

impl<const N: usize> SineTable<N> {
    const VALID_LEN: () = assert!(N >= 2 && N <= 256, "sine table length must be 2..=256");

    pub const fn from_bits(bits: [u16; N]) -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::VALID_LEN;
        let mut entries = [U2F14::ZERO; N];
        let mut i = 0;
        while i < N {
            entries[i] = U2F14::from_bits(bits[i]);
            i += 1;
        }
        Self { entries }
    }

    /// Builds `peak * sin(pi * i / (N - 1))` for every entry using CORDIC.
    ///
    /// Only the first quadrant is evaluated; the falling half mirrors it.
    pub fn generate(peak: U2F14) -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::VALID_LEN;
        let last = (N - 1) as i32;
        let peak = I16F16::from_num(peak);
        let entries = core::array::from_fn(|i| {
            let i = (i as i32).min(last - i as i32);
            let angle = I16F16::PI * i / last;
            let value = cordic::sin(angle) * peak;
            U2F14::saturating_from_num(value.max(I16F16::ZERO))
        });
        Self { entries }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Fraction at `index`, wrapping indices past the end of the table.
    pub fn fraction(&self, index: u8) -> U2F14 {
        self.entries[usize::from(index) % N]
    }

    pub fn iter(&self) -> impl Iterator<Item = U2F14> + '_ {
        self.entries.iter().copied()
    }
}

/// The half sine table used by the inverter firmware.
pub static DEFAULT_TABLE: SineTable<DEFAULT_TABLE_LEN> = SineTable::from_bits([
    0, 25, 50, 75, 100, 125, 150, 175, 199, 223, 247, 271, 294, 317, 340, 362, 384, 405, 426, 447,
    467, 487, 506, 525, 543, 560, 577, 593, 609, 624, 638, 652, 665, 677, 689, 700, 710, 720, 729,
    737, 744, 751, 757, 762, 766, 770, 773, 775, 776, 776, 775, 773, 770, 766, 762, 757, 751, 744,
    737, 729, 720, 710, 700, 689, 677, 665, 652, 638, 624, 609, 593, 577, 560, 543, 525, 506, 487,
    467, 447, 426, 405, 384, 362, 340, 317, 294, 271, 247, 223, 199, 175, 150, 125, 100, 75, 50, 25,
    0,
]);
