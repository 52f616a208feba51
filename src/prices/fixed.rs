//! Integer fixed-point arithmetic for the price and volume path.
//!
//! Prices and USDT volumes are non-negative rationals carried as u128 with
//! 12 fractional digits. Intermediate products run through 512 bit integers
//! so `reserve * 10^decimals * 10^12` never wraps. No floating point.

use std::fmt;

use primitive_types::U512;
use rust_decimal::Decimal;

use crate::constants::PRICE_SCALE;

/// A USDT amount or price at 12 decimal scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UsdtValue(pub u128);

impl UsdtValue {
    pub const ZERO: UsdtValue = UsdtValue(0);
    pub const ONE: UsdtValue = UsdtValue(PRICE_SCALE);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Decimal representation for numeric store columns.
    pub fn to_decimal(&self) -> Decimal {
        let int = i128::try_from(self.0).expect("usdt value exceeds numeric range");
        Decimal::from_i128_with_scale(int, 12)
    }

    /// Back from a numeric store column, rescaling to 12 digits.
    pub fn from_decimal(value: Decimal) -> Self {
        let mantissa = u128::try_from(value.mantissa()).expect("negative usdt value in store");
        let scale = value.scale();
        if scale <= 12 {
            UsdtValue(mantissa * pow10(12 - scale))
        } else {
            UsdtValue(mantissa / pow10(scale - 12))
        }
    }
}

/// Renders with exactly 12 fractional digits, e.g. "1.000000000000".
impl fmt::Display for UsdtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:012}", self.0 / PRICE_SCALE, self.0 % PRICE_SCALE)
    }
}

pub fn pow10(exp: u32) -> u128 {
    10u128.pow(exp)
}

/// `a * b / d` over 512 bits. None when `d` is zero.
///
/// A quotient past u128 is an arithmetic bug upstream, not a data
/// condition, and panics.
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    let q = U512::from(a) * U512::from(b) / U512::from(d);
    Some(narrow(q))
}

/// `a * b * c / (d1 * d2)` over 512 bits. None when a divisor is zero.
pub fn mul3_div2(a: u128, b: u128, c: u128, d1: u128, d2: u128) -> Option<u128> {
    if d1 == 0 || d2 == 0 {
        return None;
    }
    let n = U512::from(a) * U512::from(b) * U512::from(c);
    let q = n / (U512::from(d1) * U512::from(d2));
    Some(narrow(q))
}

fn narrow(value: U512) -> u128 {
    assert!(
        value.bits() <= 128,
        "128-bit overflow in fixed point arithmetic"
    );
    value.as_u128()
}
