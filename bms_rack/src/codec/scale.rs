//! Decimal scale factors.
//!
//! `semantic = raw × 10^exponent`. Positive exponents are exact in the
//! decode direction; negative exponents and the encode direction of
//! positive exponents round half away from zero, so the quantization
//! error is at most half a unit of the coarser scale.

/// Largest supported exponent magnitude.
pub const MAX_EXPONENT: i8 = 6;

/// `10^exp` for `exp <= MAX_EXPONENT`.
#[inline]
pub const fn pow10(exp: u32) -> i64 {
    let mut result = 1i64;
    let mut i = 0;
    while i < exp {
        result *= 10;
        i += 1;
    }
    result
}

/// Integer division rounding half away from zero.
#[inline]
const fn div_round(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if 2 * remainder.abs() >= denominator {
        quotient + numerator.signum()
    } else {
        quotient
    }
}

/// Raw register value → semantic value.
#[inline]
pub const fn apply(raw: i64, exponent: i8) -> i64 {
    if exponent >= 0 {
        raw.saturating_mul(pow10(exponent as u32))
    } else {
        div_round(raw, pow10(exponent.unsigned_abs() as u32))
    }
}

/// Semantic value → raw register value. `None` on overflow.
#[inline]
pub const fn invert(value: i64, exponent: i8) -> Option<i64> {
    if exponent >= 0 {
        Some(div_round(value, pow10(exponent as u32)))
    } else {
        value.checked_mul(pow10(exponent.unsigned_abs() as u32))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
