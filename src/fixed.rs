//! Q1.15 fixed-point arithmetic.
//!
//! All datapath values are raw 16-bit words. A Q1.15 word is two's complement
//! with one sign bit and 15 fractional bits, covering `[-1.0, 1.0 - 2^-15]`.
//!
//! Every Q1.15 result in the machine saturates instead of wrapping:
//!
//! | Intermediate          | Result   |
//! |-----------------------|----------|
//! | `> 0x7FFF` (as i32)   | `0x7FFF` |
//! | `< -0x8000` (as i32)  | `0x8000` |
//!
//! The multiplier is sign-magnitude: the product magnitude is truncated
//! toward zero before the sign is reapplied. This differs from an arithmetic
//! `>> 15` by one LSB for inexact negative products.

/// Largest representable value (`0.999969...`).
pub const Q115_MAX: u16 = 0x7FFF;

/// Smallest representable value (`-1.0`).
pub const Q115_MIN: u16 = 0x8000;

/// Number of fractional bits.
pub const FRAC_BITS: u32 = 15;

/// Clamp a wide signed intermediate into a Q1.15 word.
#[inline]
pub fn saturate(value: i32) -> u16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16 as u16
}

/// Interpret a raw word as a signed Q1.15 integer.
#[inline]
pub fn as_signed(word: u16) -> i32 {
    word as i16 as i32
}

/// Saturating Q1.15 addition.
#[inline]
pub fn saturating_add(a: u16, b: u16) -> u16 {
    saturate(as_signed(a) + as_signed(b))
}

/// Split a word into (negative, magnitude).
///
/// The magnitude of `0x8000` is 32768, so `-1.0 * -1.0` saturates to the
/// largest positive value rather than collapsing to zero.
#[inline]
pub fn sign_magnitude(word: u16) -> (bool, u32) {
    let value = as_signed(word);
    (value < 0, value.unsigned_abs())
}

/// Sign-magnitude Q1.15 multiply with saturation.
pub fn saturating_mul(a: u16, b: u16) -> u16 {
    let (neg_a, mag_a) = sign_magnitude(a);
    let (neg_b, mag_b) = sign_magnitude(b);
    let magnitude = ((mag_a * mag_b) >> FRAC_BITS) as i32;
    if neg_a ^ neg_b {
        saturate(-magnitude)
    } else {
        saturate(magnitude)
    }
}

/// Multiply-accumulate: `saturate(acc + saturate(a * b))`.
#[inline]
pub fn mac(acc: u16, a: u16, b: u16) -> u16 {
    saturating_add(acc, saturating_mul(a, b))
}

/// Convert a real number to Q1.15, clamping to the representable range.
pub fn from_f64(value: f64) -> u16 {
    let clamped = value.clamp(-1.0, Q115_MAX as f64 / 32768.0);
    saturate((clamped * 32768.0).round() as i32)
}

/// Convert a Q1.15 word to a real number.
pub fn to_f64(word: u16) -> f64 {
    as_signed(word) as f64 / 32768.0
}
