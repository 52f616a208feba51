//! Stableswap curve math: invariant D, balance Y and spot prices.
//!
//! Straight Newton iterations on 512 bit integers. Reserves are raw native
//! amounts; decimal correction happens only in the final spot price ratio.

use primitive_types::U512;

use crate::constants::PRICE_SCALE;

use super::fixed::pow10;

const D_ITERATIONS: usize = 64;
const Y_ITERATIONS: usize = 128;

/// Share of the input reserve used to probe the curve: 0.01 %.
const SPOT_PROBE_DIVISOR: u128 = 10_000;

/// Solve the invariant D for the given reserves and amplification.
///
/// Returns zero when any reserve is zero.
pub fn calculate_d(reserves: &[u128], amplification: u128) -> U512 {
    if reserves.iter().any(|r| *r == 0) {
        return U512::zero();
    }
    let n = U512::from(reserves.len() as u64);
    let ann = U512::from(amplification) * n.pow(n);
    let sum: U512 = reserves.iter().fold(U512::zero(), |acc, r| acc + U512::from(*r));

    let mut d = sum;
    for _ in 0..D_ITERATIONS {
        let mut d_prod = d;
        for r in reserves {
            d_prod = d_prod * d / (U512::from(*r) * n);
        }
        let prev = d;
        d = (ann * sum + d_prod * n) * d / ((ann - U512::one()) * d + (n + U512::one()) * d_prod);
        if abs_diff(d, prev) <= U512::one() {
            break;
        }
    }
    d
}

/// Solve for the reserve of `target` that preserves `d` given all other
/// reserves. The value at `reserves[target]` itself is ignored.
pub fn calculate_y(reserves: &[u128], amplification: u128, target: usize, d: U512) -> Option<U512> {
    if d.is_zero() {
        return None;
    }
    let n = U512::from(reserves.len() as u64);
    let ann = U512::from(amplification) * n.pow(n);

    let mut c = d;
    let mut sum_other = U512::zero();
    for (i, r) in reserves.iter().enumerate() {
        if i == target {
            continue;
        }
        if *r == 0 {
            return None;
        }
        sum_other = sum_other + U512::from(*r);
        c = c * d / (U512::from(*r) * n);
    }
    c = c * d / (ann * n);
    let b = sum_other + d / ann;

    let mut y = d;
    for _ in 0..Y_ITERATIONS {
        let prev = y;
        let denom = (y + y + b).checked_sub(d)?;
        if denom.is_zero() {
            return None;
        }
        y = (y * y + c) / denom;
        if abs_diff(y, prev) <= U512::one() {
            break;
        }
    }
    Some(y)
}

/// Marginal price of `asset_in` expressed in `asset_out`, at 12 decimal
/// scale, approximated by swapping 0.01 % of the input reserve.
///
/// None when the pool cannot be priced (zero reserve, probe amount rounding
/// to zero, or a degenerate curve).
pub fn spot_price(
    reserves: &[u128],
    amplification: u128,
    idx_in: usize,
    idx_out: usize,
    decimals_in: u32,
    decimals_out: u32,
) -> Option<u128> {
    let reserve_in = reserves[idx_in];
    let reserve_out = reserves[idx_out];
    if reserve_in == 0 || reserve_out == 0 {
        return None;
    }
    let swap_amount = reserve_in / SPOT_PROBE_DIVISOR;
    if swap_amount == 0 {
        return None;
    }

    let d = calculate_d(reserves, amplification);
    if d.is_zero() {
        return None;
    }

    let mut probed = reserves.to_vec();
    probed[idx_in] = reserve_in.checked_add(swap_amount)?;
    let new_y = calculate_y(&probed, amplification, idx_out, d)?;
    let received = U512::from(reserve_out).checked_sub(new_y)?;
    if received.is_zero() {
        return None;
    }

    super::fixed::mul3_div2(
        received.as_u128(),
        pow10(decimals_in),
        PRICE_SCALE,
        swap_amount,
        pow10(decimals_out),
    )
}

fn abs_diff(a: U512, b: U512) -> U512 {
    if a > b {
        a - b
    } else {
        b - a
    }
}
