//! Unsigned and sign-magnitude integer arithmetic on 16- and 24-bit words.
//!
//! The control loop keeps every intermediate value as a 24-bit magnitude plus
//! a separate sign, so all operations here work on unsigned magnitudes and the
//! sign is resolved explicitly by [`resolve_sign`].

/// Largest value representable in a 24-bit magnitude.
pub const MAX_24: u32 = 0x00FF_FFFF;

/// Sign of a sign-magnitude value. Zero is always [`Sign::Positive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sign {
    #[default]
    Positive,
    Negative,
}

impl Sign {
    pub fn is_negative(self) -> bool {
        self == Sign::Negative
    }

    pub fn flip(self) -> Self {
        match self {
            Sign::Positive => Sign::Negative,
            Sign::Negative => Sign::Positive,
        }
    }
}

/// A 24-bit magnitude with an explicit sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignedMagnitude {
    magnitude: u32,
    sign: Sign,
}

impl SignedMagnitude {
    pub const ZERO: Self = Self {
        magnitude: 0,
        sign: Sign::Positive,
    };

    /// Magnitudes are truncated to 24 bits and a zero magnitude is always
    /// stored as positive.
    pub const fn new(magnitude: u32, sign: Sign) -> Self {
        let magnitude = magnitude & MAX_24;
        let sign = if magnitude == 0 { Sign::Positive } else { sign };
        Self { magnitude, sign }
    }

    pub const fn positive(magnitude: u32) -> Self {
        Self::new(magnitude, Sign::Positive)
    }

    pub const fn negative(magnitude: u32) -> Self {
        Self::new(magnitude, Sign::Negative)
    }

    pub fn magnitude(self) -> u32 {
        self.magnitude
    }

    pub fn sign(self) -> Sign {
        self.sign
    }

    pub fn is_zero(self) -> bool {
        self.magnitude == 0
    }

    pub fn negate(self) -> Self {
        Self::new(self.magnitude, self.sign.flip())
    }

    /// Same-sign accumulation clamped at [`MAX_24`] instead of wrapping.
    pub fn saturating_accumulate(self, other: Self) -> Self {
        if self.sign == other.sign && self.magnitude + other.magnitude > MAX_24 {
            Self::new(MAX_24, self.sign)
        } else {
            resolve_sign(self, other)
        }
    }

    #[cfg(test)]
    fn to_i64(self) -> i64 {
        match self.sign {
            Sign::Positive => i64::from(self.magnitude),
            Sign::Negative => -i64::from(self.magnitude),
        }
    }
}

/// Which operand of [`mag_sub_or_swap`] had the larger magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Larger {
    /// First operand, including the equal case.
    First,
    Second,
}

/// 16x16 unsigned multiply with a full 32-bit product.
pub fn mul16x16(a: u16, b: u16) -> u32 {
    u32::from(a) * u32::from(b)
}

/// 24x16 unsigned multiply.
///
/// The full product is 40 bits wide but only the low 24 bits are kept, which is
/// the window the rest of the pipeline works in. Losing the upper bits is
/// intentional precision loss, not an overflow condition.
pub fn mul24x16(a: u32, b: u16) -> u32 {
    let product = u64::from(a & MAX_24) * u64::from(b);
    (product as u32) & MAX_24
}

/// 24/16 unsigned division. A zero divisor is replaced by one.
pub fn div24x16(a: u32, b: u16) -> u32 {
    let b = if b == 0 { 1 } else { b };
    (a & MAX_24) / u32::from(b)
}

/// 24-bit unsigned add without overflow detection; the result wraps.
pub fn add24(a: u32, b: u32) -> u32 {
    (a & MAX_24).wrapping_add(b & MAX_24) & MAX_24
}

/// Subtracts the smaller magnitude from the larger one.
pub fn mag_sub_or_swap(a: u32, b: u32) -> (u32, Larger) {
    let (a, b) = (a & MAX_24, b & MAX_24);
    if a >= b {
        (a - b, Larger::First)
    } else {
        (b - a, Larger::Second)
    }
}

/// Sign-aware addition of two sign-magnitude values.
///
/// Equal signs add the magnitudes and keep the sign. Differing signs subtract
/// the smaller magnitude from the larger and take the sign of the larger.
pub fn resolve_sign(a: SignedMagnitude, b: SignedMagnitude) -> SignedMagnitude {
    if a.sign == b.sign {
        return SignedMagnitude::new(add24(a.magnitude, b.magnitude), a.sign);
    }

    let (magnitude, larger) = mag_sub_or_swap(a.magnitude, b.magnitude);
    let sign = match larger {
        Larger::First => a.sign,
        Larger::Second => b.sign,
    };
    SignedMagnitude::new(magnitude, sign)
}
