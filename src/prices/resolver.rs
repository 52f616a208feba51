//! USDT price resolution across the three pool types.
//!
//! Anchored at USDT = 1, the omnipool prices every asset it trades through
//! the LRNA price, then XYK and stableswap pools propagate prices to the
//! remaining assets in a bounded fixpoint. Omnipool prices take precedence
//! and are never overwritten.

use tracing::trace;
use tracing::warn;

use crate::constants::PRICE_SCALE;
use crate::constants::USDT_ASSET_ID;
use crate::constants::USDT_DECIMALS;
use crate::pools::types::OmnipoolAsset;
use crate::pools::types::PoolStates;
use crate::pools::types::StableswapPoolState;
use crate::pools::types::XykPoolState;
use crate::registry::RegistryTracker;

use super::fixed::mul3_div2;
use super::fixed::mul_div;
use super::fixed::pow10;
use super::fixed::UsdtValue;
use super::stableswap;
use super::PriceMap;

/// Bound on price propagation rounds. Assets more hops away from a priced
/// asset than this stay unpriced.
const MAX_ITERATIONS: usize = 10;

/// Compute the block's price snapshot.
pub fn resolve(states: &PoolStates, registry: &RegistryTracker) -> PriceMap {
    let mut prices = PriceMap::new();
    prices.insert(USDT_ASSET_ID, UsdtValue::ONE);

    if let Some(lrna) = lrna_price(states, registry) {
        trace!(lrna = %lrna, "lrna priced");
        for asset in &states.omnipool {
            price_omnipool_asset(asset, lrna, registry, &mut prices);
        }
    }

    for iteration in 0..MAX_ITERATIONS {
        let mut added = false;
        for pool in &states.xyk {
            added |= propagate_xyk(pool, registry, &mut prices);
        }
        for pool in &states.stableswap {
            added |= propagate_stableswap(pool, registry, &mut prices);
        }
        if !added {
            trace!(iteration, assets = prices.len(), "price propagation settled");
            break;
        }
    }
    prices
}

/// Price of LRNA in USDT.
///
/// Prefer USDT's own omnipool state. When USDT is not an omnipool asset,
/// fall back to the most liquid stablecoin LP token: a stableswap pool
/// holding USDT whose share token sits in the omnipool, valued at 1 USDT.
fn lrna_price(states: &PoolStates, registry: &RegistryTracker) -> Option<UsdtValue> {
    if let Some(usdt) = states
        .omnipool
        .iter()
        .find(|a| a.asset_id == USDT_ASSET_ID && a.entry.hub_reserve > 0 && a.reserve > 0)
    {
        let decimals = registry.decimals(USDT_ASSET_ID).unwrap_or(USDT_DECIMALS);
        return hub_price_of_unit(usdt, decimals);
    }

    let candidate = states
        .stableswap
        .iter()
        .filter(|p| p.info.assets.contains(&USDT_ASSET_ID))
        .filter_map(|p| {
            states
                .omnipool
                .iter()
                .find(|a| a.asset_id == p.info.pool_id && a.entry.hub_reserve > 0 && a.reserve > 0)
        })
        .max_by_key(|a| a.entry.hub_reserve)?;
    let decimals = registry.decimals(candidate.asset_id)?;
    hub_price_of_unit(candidate, decimals)
}

/// LRNA price implied by an omnipool asset worth exactly 1 USDT:
/// `reserve * 10^12 * 10^12 / (hub_reserve * 10^decimals)`.
fn hub_price_of_unit(asset: &OmnipoolAsset, decimals: u8) -> Option<UsdtValue> {
    mul3_div2(
        asset.reserve,
        PRICE_SCALE,
        PRICE_SCALE,
        asset.entry.hub_reserve,
        pow10(u32::from(decimals)),
    )
    .map(UsdtValue)
}

fn price_omnipool_asset(
    asset: &OmnipoolAsset,
    lrna: UsdtValue,
    registry: &RegistryTracker,
    prices: &mut PriceMap,
) {
    if prices.contains_key(&asset.asset_id) {
        return;
    }
    if asset.entry.hub_reserve == 0 || asset.reserve == 0 {
        return;
    }
    let decimals = match registry.decimals(asset.asset_id) {
        Some(decimals) => decimals,
        None => {
            warn!(asset_id = asset.asset_id, "no decimals for omnipool asset");
            return;
        }
    };
    // price = hub_reserve * 10^decimals * lrna / (reserve * 10^12)
    let price = mul3_div2(
        asset.entry.hub_reserve,
        pow10(u32::from(decimals)),
        lrna.0,
        asset.reserve,
        PRICE_SCALE,
    );
    if let Some(price) = price {
        prices.insert(asset.asset_id, UsdtValue(price));
    }
}

/// Derive the unpriced side of an XYK pool from the constant product
/// ratio. Returns true if a price was added.
fn propagate_xyk(pool: &XykPoolState, registry: &RegistryTracker, prices: &mut PriceMap) -> bool {
    if pool.reserve_a == 0 || pool.reserve_b == 0 {
        return false;
    }
    let a_priced = prices.contains_key(&pool.info.asset_a);
    let b_priced = prices.contains_key(&pool.info.asset_b);
    if a_priced == b_priced {
        return false;
    }

    let (known, unknown, reserve_known, reserve_unknown) = if a_priced {
        (pool.info.asset_a, pool.info.asset_b, pool.reserve_a, pool.reserve_b)
    } else {
        (pool.info.asset_b, pool.info.asset_a, pool.reserve_b, pool.reserve_a)
    };
    let (Some(dec_known), Some(dec_unknown)) = (registry.decimals(known), registry.decimals(unknown))
    else {
        return false;
    };
    let known_price = prices[&known];
    // price = reserve_known * 10^dec_unknown * known_price
    //         / (reserve_unknown * 10^dec_known)
    let price = mul3_div2(
        reserve_known,
        pow10(u32::from(dec_unknown)),
        known_price.0,
        reserve_unknown,
        pow10(u32::from(dec_known)),
    );
    match price {
        Some(price) => {
            prices.insert(unknown, UsdtValue(price));
            true
        }
        None => false,
    }
}

/// Price unpriced stableswap assets off the first priced pool member via
/// curve spot prices. Returns true if any price was added.
fn propagate_stableswap(
    pool: &StableswapPoolState,
    registry: &RegistryTracker,
    prices: &mut PriceMap,
) -> bool {
    if pool.info.assets.len() != pool.reserves.len() {
        warn!(pool_id = pool.info.pool_id, "stableswap assets/reserves mismatch");
        return false;
    }
    let reference = pool
        .info
        .assets
        .iter()
        .position(|a| prices.contains_key(a));
    let Some(idx_ref) = reference else {
        return false;
    };
    let asset_ref = pool.info.assets[idx_ref];
    let Some(dec_ref) = registry.decimals(asset_ref) else {
        return false;
    };
    let price_ref = prices[&asset_ref];

    let mut added = false;
    for (idx, asset) in pool.info.assets.iter().enumerate() {
        if prices.contains_key(asset) {
            continue;
        }
        let Some(dec) = registry.decimals(*asset) else {
            continue;
        };
        let spot = stableswap::spot_price(
            &pool.reserves,
            pool.amplification,
            idx,
            idx_ref,
            u32::from(dec),
            u32::from(dec_ref),
        );
        let Some(spot) = spot else {
            continue;
        };
        if let Some(price) = mul_div(spot, price_ref.0, PRICE_SCALE) {
            prices.insert(*asset, UsdtValue(price));
            added = true;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OmnipoolAssetEntry;
    use crate::core::types::StableswapPoolInfo;
    use crate::core::types::XykPoolInfo;
    use crate::core::types::AccountId;

    const HDX: u32 = 0;
    const DOT: u32 = 5;
    const VDOT: u32 = 15;
    const WBTC: u32 = 19;
    const LP: u32 = 100;

    fn omnipool_asset(asset_id: u32, hub_reserve: u128, reserve: u128) -> OmnipoolAsset {
        OmnipoolAsset {
            asset_id,
            entry: OmnipoolAssetEntry {
                hub_reserve,
                shares: reserve,
                protocol_shares: 0,
                cap: 0,
                tradable: 0b1111,
            },
            reserve,
        }
    }

    fn xyk(asset_a: u32, asset_b: u32, reserve_a: u128, reserve_b: u128) -> XykPoolState {
        XykPoolState {
            info: XykPoolInfo {
                account: AccountId([1; 32]),
                asset_a,
                asset_b,
            },
            reserve_a,
            reserve_b,
        }
    }

    fn stable(pool_id: u32, assets: Vec<u32>, reserves: Vec<u128>, amp: u128) -> StableswapPoolState {
        StableswapPoolState {
            info: StableswapPoolInfo {
                pool_id,
                assets,
                initial_amplification: amp,
                final_amplification: amp,
                initial_block: 0,
                final_block: 0,
                fee_ppm: 0,
            },
            reserves,
            amplification: amp,
        }
    }

    fn registry() -> RegistryTracker {
        let mut registry = RegistryTracker::new();
        registry.set_decimals_for_tests(USDT_ASSET_ID, 6);
        registry.set_decimals_for_tests(HDX, 12);
        registry.set_decimals_for_tests(DOT, 10);
        registry.set_decimals_for_tests(VDOT, 10);
        registry.set_decimals_for_tests(WBTC, 8);
        registry.set_decimals_for_tests(LP, 12);
        registry
    }

    #[test]
    fn test_usdt_always_anchored_at_one() {
        let prices = resolve(&PoolStates::default(), &registry());
        assert_eq!(prices[&USDT_ASSET_ID].to_string(), "1.000000000000");
        assert_eq!(prices.len(), 1);
    }

    #[test]
    fn test_lrna_price_balanced_usdt_pool() {
        let states = PoolStates {
            omnipool: vec![omnipool_asset(USDT_ASSET_ID, pow10(12), pow10(6))],
            ..Default::default()
        };
        let lrna = lrna_price(&states, &registry()).unwrap();
        assert_eq!(lrna.to_string(), "1.000000000000");
    }

    #[test]
    fn test_omnipool_hdx_price() {
        let states = PoolStates {
            omnipool: vec![
                omnipool_asset(USDT_ASSET_ID, pow10(12), pow10(6)),
                omnipool_asset(HDX, 50 * pow10(12), 100_000 * pow10(12)),
            ],
            ..Default::default()
        };
        let prices = resolve(&states, &registry());
        assert_eq!(prices[&HDX].to_string(), "0.000500000000");
        assert_eq!(prices[&USDT_ASSET_ID], UsdtValue::ONE);
    }

    #[test]
    fn test_xyk_cross_decimal_propagation() {
        let states = PoolStates {
            omnipool: vec![
                omnipool_asset(USDT_ASSET_ID, pow10(12), pow10(6)),
                // DOT at 50 USDT
                omnipool_asset(DOT, 50 * pow10(12), pow10(10)),
            ],
            xyk: vec![xyk(DOT, WBTC, 100 * pow10(10), pow10(8))],
            ..Default::default()
        };
        let prices = resolve(&states, &registry());
        assert_eq!(prices[&DOT].to_string(), "50.000000000000");
        assert_eq!(prices[&WBTC].to_string(), "5000.000000000000");
    }

    #[test]
    fn test_stableswap_propagation_prices_scarcer_asset_higher() {
        let states = PoolStates {
            omnipool: vec![
                omnipool_asset(USDT_ASSET_ID, pow10(12), pow10(6)),
                // DOT at 5 USDT
                omnipool_asset(DOT, 5 * pow10(12), pow10(10)),
            ],
            stableswap: vec![stable(
                LP,
                vec![DOT, VDOT],
                vec![100 * pow10(10), 90 * pow10(10)],
                10,
            )],
            ..Default::default()
        };
        let prices = resolve(&states, &registry());
        assert_eq!(prices[&DOT].to_string(), "5.000000000000");
        let vdot = prices[&VDOT];
        assert!(vdot > UsdtValue(5 * PRICE_SCALE), "vdot = {vdot}");
        assert_ne!(vdot, UsdtValue(5 * PRICE_SCALE));
    }

    #[test]
    fn test_lrna_fallback_via_stable_pool_lp() {
        // USDT absent from the omnipool; its stable pool's share token is
        // in there instead, worth 1 USDT by definition.
        let states = PoolStates {
            omnipool: vec![
                omnipool_asset(LP, pow10(12), pow10(12)),
                omnipool_asset(HDX, 50 * pow10(12), 100_000 * pow10(12)),
            ],
            stableswap: vec![stable(
                LP,
                vec![USDT_ASSET_ID, 22],
                vec![pow10(6), pow10(6)],
                100,
            )],
            ..Default::default()
        };
        let prices = resolve(&states, &registry());
        assert_eq!(prices[&LP].to_string(), "1.000000000000");
        assert_eq!(prices[&HDX].to_string(), "0.000500000000");
    }

    #[test]
    fn test_lrna_fallback_picks_most_liquid_lp() {
        let lp2 = 101;
        let mut reg = registry();
        reg.set_decimals_for_tests(lp2, 12);
        let states = PoolStates {
            omnipool: vec![
                // lp2 has the deeper hub reserve and must win.
                omnipool_asset(LP, pow10(12), pow10(12)),
                omnipool_asset(lp2, 10 * pow10(12), 5 * pow10(12)),
            ],
            stableswap: vec![
                stable(LP, vec![USDT_ASSET_ID, 22], vec![pow10(6), pow10(6)], 100),
                stable(lp2, vec![USDT_ASSET_ID, 23], vec![pow10(6), pow10(6)], 100),
            ],
            ..Default::default()
        };
        let lrna = lrna_price(&states, &reg).unwrap();
        // 5 / 10 = 0.5 from lp2, not 1.0 from the smaller pool.
        assert_eq!(lrna.to_string(), "0.500000000000");
    }

    #[test]
    fn test_multi_hop_fixpoint() {
        // USDT -> DOT via omnipool, DOT -> WBTC -> HDX via two XYK hops.
        let states = PoolStates {
            omnipool: vec![
                omnipool_asset(USDT_ASSET_ID, pow10(12), pow10(6)),
                omnipool_asset(DOT, 50 * pow10(12), pow10(10)),
            ],
            xyk: vec![
                // Ordered so the second hop is seen before its input is
                // priced, forcing a second iteration.
                xyk(WBTC, HDX, pow10(8), 1_000 * pow10(12)),
                xyk(DOT, WBTC, 100 * pow10(10), pow10(8)),
            ],
            ..Default::default()
        };
        let prices = resolve(&states, &registry());
        assert_eq!(prices[&WBTC].to_string(), "5000.000000000000");
        assert_eq!(prices[&HDX].to_string(), "5.000000000000");
    }

    #[test]
    fn test_omnipool_precedence_over_propagation() {
        // DOT is priced by the omnipool; a skewed XYK pool must not
        // overwrite it.
        let states = PoolStates {
            omnipool: vec![
                omnipool_asset(USDT_ASSET_ID, pow10(12), pow10(6)),
                omnipool_asset(DOT, 5 * pow10(12), pow10(10)),
                omnipool_asset(HDX, pow10(12), 2_000 * pow10(12)),
            ],
            xyk: vec![xyk(HDX, DOT, 1_000 * pow10(12), pow10(10))],
            ..Default::default()
        };
        let prices = resolve(&states, &registry());
        assert_eq!(prices[&DOT].to_string(), "5.000000000000");
    }

    #[test]
    fn test_zero_reserves_not_priceable() {
        let states = PoolStates {
            omnipool: vec![
                omnipool_asset(USDT_ASSET_ID, pow10(12), pow10(6)),
                omnipool_asset(HDX, 0, pow10(12)),
                omnipool_asset(DOT, pow10(12), 0),
            ],
            xyk: vec![xyk(DOT, WBTC, 0, pow10(8))],
            ..Default::default()
        };
        let prices = resolve(&states, &registry());
        assert_eq!(prices.len(), 1);
        assert!(prices.contains_key(&USDT_ASSET_ID));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let states = PoolStates {
            omnipool: vec![
                omnipool_asset(USDT_ASSET_ID, pow10(12), pow10(6)),
                omnipool_asset(DOT, 5 * pow10(12), pow10(10)),
            ],
            xyk: vec![xyk(DOT, WBTC, 100 * pow10(10), pow10(8))],
            stableswap: vec![stable(
                LP,
                vec![DOT, VDOT],
                vec![100 * pow10(10), 90 * pow10(10)],
                10,
            )],
            ..Default::default()
        };
        let first = resolve(&states, &registry());
        let second = resolve(&states, &registry());
        assert_eq!(first, second);
    }
}
