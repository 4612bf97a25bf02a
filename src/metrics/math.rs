//! Fixed-point helpers shared by the metric calculators
//!
//! Every division goes through [`safe_div`]; callers decide which sentinel a
//! `None` turns into. Nothing here ever produces NaN or infinity.

use alloy_primitives::U256;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Seconds in a 366-day year, as used for reward annualization
pub const SECONDS_PER_YEAR: u64 = 31_622_400;

/// Largest mantissa a `Decimal` can hold (2^96 - 1)
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Largest scale a `Decimal` can hold
const MAX_SCALE: u32 = 28;

/// Divide a raw on-chain integer by `10^decimals`.
///
/// Exact up to 28 significant digits; beyond that the least significant
/// digits are truncated. Returns `None` only when the whole part itself
/// overflows a `Decimal`.
pub fn normalize(raw: U256, decimals: u8) -> Option<Decimal> {
    let ten = U256::from(10u8);
    let mut mantissa = raw;
    let mut scale = decimals as u32;

    while scale > MAX_SCALE {
        mantissa /= ten;
        scale -= 1;
    }
    while mantissa > U256::from(MAX_MANTISSA) {
        if scale == 0 {
            return None;
        }
        mantissa /= ten;
        scale -= 1;
    }

    Decimal::try_from_i128_with_scale(mantissa.to::<u128>() as i128, scale)
        .ok()
        .map(|d| d.normalize())
}

/// Parse a raw decimal integer string (as stored on [`crate::types::PoolRecord`])
pub fn parse_raw(raw: &str) -> Option<U256> {
    U256::from_str_radix(raw.trim(), 10).ok()
}

/// [`parse_raw`] followed by [`normalize`]; unparsable input is `None`
pub fn normalize_str(raw: &str, decimals: u8) -> Option<Decimal> {
    parse_raw(raw).and_then(|v| normalize(v, decimals))
}

/// Price from the feed as a decimal. Non-finite or negative prices count as unknown.
pub fn price_decimal(usd: f64) -> Decimal {
    if !usd.is_finite() || usd <= 0.0 {
        return Decimal::ZERO;
    }
    Decimal::from_f64(usd).unwrap_or(Decimal::ZERO)
}

/// `numerator / denominator`, `None` on a zero denominator or overflow
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator.checked_div(denominator)
}

/// `a * b / c`, multiplying first and dividing first only if the product overflows
pub fn mul_div(a: Decimal, b: Decimal, c: Decimal) -> Option<Decimal> {
    match a.checked_mul(b) {
        Some(product) => safe_div(product, c),
        None => safe_div(a, c).and_then(|q| q.checked_mul(b)),
    }
}

/// Plain fixed-point rendering without trailing zeros ("1000", "0.125")
pub fn fixed(value: Decimal) -> String {
    let value = value.normalize();
    if value.is_zero() {
        return "0".to_string();
    }
    value.to_string()
}

/// Fixed-point rendering with exactly `dp` decimals, half away from zero
pub fn fixed_dp(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

/// Parse a fixed-point string written by [`fixed`]; anything else is `None`
pub fn parse_fixed(value: &str) -> Option<Decimal> {
    Decimal::from_str(value.trim()).ok()
}
