//! Swap event decoding and volume extraction.
//!
//! Six swap events across three pallets, each with several argument schemas
//! keyed by runtime spec version. Decoders are tried newest to oldest and
//! the first matching shape wins. Every swap contributes twice: a sell on
//! the input asset and a buy on the output asset.

use std::collections::BTreeMap;

use primitive_types::U512;
use tracing::warn;

use crate::constants::PRICE_SCALE;
use crate::core::args;
use crate::core::types::AssetId;
use crate::core::types::EventRecord;
use crate::prices::fixed::pow10;
use crate::prices::fixed::UsdtValue;
use crate::prices::PriceMap;
use crate::registry::RegistryTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swap {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: u128,
    pub amount_out: u128,
}

/// Per-asset volume aggregate within one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeAgg {
    pub native_buy: u128,
    pub native_sell: u128,
    pub usdt_buy: UsdtValue,
    pub usdt_sell: UsdtValue,
}

type Decoder = fn(&serde_json::Value) -> Option<Swap>;

/// Decode all swap events in a block. Undecodable swaps are logged and
/// skipped.
pub fn extract_swaps(events: &[EventRecord]) -> Vec<Swap> {
    events
        .iter()
        .filter_map(|event| {
            let decoders: &[Decoder] = match (event.pallet.as_str(), event.name.as_str()) {
                ("Omnipool", "SellExecuted") | ("Omnipool", "BuyExecuted") => {
                    &[decode_omnipool_v201, decode_omnipool_v170, decode_omnipool_v115]
                }
                ("XYK", "SellExecuted") => &[decode_xyk_sell_v183],
                ("XYK", "BuyExecuted") => &[decode_xyk_buy_v183],
                ("Stableswap", "SellExecuted") | ("Stableswap", "BuyExecuted") => {
                    &[decode_stableswap_v183]
                }
                _ => return None,
            };
            let swap = decoders.iter().find_map(|decode| decode(&event.args));
            if swap.is_none() {
                warn!(
                    "undecodable {}.{} event, skipping swap",
                    event.pallet, event.name
                );
            }
            swap
        })
        .collect()
}

/// Spec 201 added fee fields next to the plain amounts.
fn decode_omnipool_v201(value: &serde_json::Value) -> Option<Swap> {
    args::field(value, &["assetFeeAmount", "asset_fee_amount"])?;
    decode_in_out_fields(value)
}

/// Spec 170 switched to named arguments.
fn decode_omnipool_v170(value: &serde_json::Value) -> Option<Swap> {
    decode_in_out_fields(value)
}

/// Spec 115 emitted positional arguments: [who, in, out, amountIn, amountOut].
fn decode_omnipool_v115(value: &serde_json::Value) -> Option<Swap> {
    let fields = value.as_array()?;
    if fields.len() < 5 {
        return None;
    }
    Some(Swap {
        asset_in: args::as_u32(&fields[1])?,
        asset_out: args::as_u32(&fields[2])?,
        amount_in: args::as_u128(&fields[3])?,
        amount_out: args::as_u128(&fields[4])?,
    })
}

/// XYK sells carry the sold amount and the obtained sale price.
fn decode_xyk_sell_v183(value: &serde_json::Value) -> Option<Swap> {
    Some(Swap {
        asset_in: args::u32_field(value, &["assetIn", "asset_in"])?,
        asset_out: args::u32_field(value, &["assetOut", "asset_out"])?,
        amount_in: args::u128_field(value, &["amount"])?,
        amount_out: args::u128_field(value, &["salePrice", "sale_price"])?,
    })
}

/// XYK buys carry the paid buy price and the obtained amount.
fn decode_xyk_buy_v183(value: &serde_json::Value) -> Option<Swap> {
    Some(Swap {
        asset_in: args::u32_field(value, &["assetIn", "asset_in"])?,
        asset_out: args::u32_field(value, &["assetOut", "asset_out"])?,
        amount_in: args::u128_field(value, &["buyPrice", "buy_price"])?,
        amount_out: args::u128_field(value, &["amount"])?,
    })
}

fn decode_stableswap_v183(value: &serde_json::Value) -> Option<Swap> {
    decode_in_out_fields(value)
}

fn decode_in_out_fields(value: &serde_json::Value) -> Option<Swap> {
    Some(Swap {
        asset_in: args::u32_field(value, &["assetIn", "asset_in"])?,
        asset_out: args::u32_field(value, &["assetOut", "asset_out"])?,
        amount_in: args::u128_field(value, &["amountIn", "amount_in"])?,
        amount_out: args::u128_field(value, &["amountOut", "amount_out"])?,
    })
}

/// USDT-denominated value of a native amount: `amount * price / 10^decimals`
/// at 12 decimal scale. Zero when the asset has no price.
pub fn usdt_volume(amount: u128, price: UsdtValue, decimals: u32) -> UsdtValue {
    if price.is_zero() || amount == 0 {
        return UsdtValue::ZERO;
    }
    let q = U512::from(amount) * U512::from(price.0) / U512::from(pow10(decimals));
    assert!(q.bits() <= 128, "128-bit overflow in volume conversion");
    UsdtValue(q.as_u128())
}

/// Sum swap contributions per asset. Buys accrue to the bought asset,
/// sells to the sold one. Assets without a known price still aggregate
/// native amounts, with zero USDT value.
pub fn aggregate_volumes(
    swaps: &[Swap],
    prices: &PriceMap,
    registry: &RegistryTracker,
) -> BTreeMap<AssetId, VolumeAgg> {
    let mut totals: BTreeMap<AssetId, VolumeAgg> = BTreeMap::new();
    for swap in swaps {
        let sell = totals.entry(swap.asset_in).or_default();
        sell.native_sell = sell
            .native_sell
            .checked_add(swap.amount_in)
            .expect("native sell volume overflow");
        sell.usdt_sell = UsdtValue(
            sell.usdt_sell
                .0
                .checked_add(asset_usdt_volume(swap.asset_in, swap.amount_in, prices, registry).0)
                .expect("usdt sell volume overflow"),
        );

        let buy = totals.entry(swap.asset_out).or_default();
        buy.native_buy = buy
            .native_buy
            .checked_add(swap.amount_out)
            .expect("native buy volume overflow");
        buy.usdt_buy = UsdtValue(
            buy.usdt_buy
                .0
                .checked_add(asset_usdt_volume(swap.asset_out, swap.amount_out, prices, registry).0)
                .expect("usdt buy volume overflow"),
        );
    }
    totals
}

fn asset_usdt_volume(
    asset: AssetId,
    amount: u128,
    prices: &PriceMap,
    registry: &RegistryTracker,
) -> UsdtValue {
    let price = match prices.get(&asset) {
        Some(price) => *price,
        None => return UsdtValue::ZERO,
    };
    let decimals = match registry.decimals(asset) {
        Some(decimals) => decimals,
        None => {
            warn!(asset_id = asset, "no decimals for traded asset, zero usdt volume");
            return UsdtValue::ZERO;
        }
    };
    usdt_volume(amount, price, u32::from(decimals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(pallet: &str, name: &str, args: serde_json::Value) -> EventRecord {
        EventRecord {
            pallet: pallet.to_owned(),
            name: name.to_owned(),
            args,
        }
    }

    #[test]
    fn test_omnipool_decode_named_versions() {
        // v201 shape, fee fields present.
        let swaps = extract_swaps(&[event(
            "Omnipool",
            "SellExecuted",
            json!({
                "who": "0x00", "assetIn": 0, "assetOut": 10,
                "amountIn": "1000000000000000", "amountOut": "15000000",
                "hubAmountIn": "1", "hubAmountOut": "1",
                "assetFeeAmount": "300", "protocolFeeAmount": "100"
            }),
        )]);
        assert_eq!(
            swaps,
            vec![Swap {
                asset_in: 0,
                asset_out: 10,
                amount_in: 1_000_000_000_000_000,
                amount_out: 15_000_000,
            }]
        );

        // v170 shape, no fee fields.
        let swaps = extract_swaps(&[event(
            "Omnipool",
            "BuyExecuted",
            json!({"who": "0x00", "assetIn": 5, "assetOut": 0, "amountIn": "7", "amountOut": "9"}),
        )]);
        assert_eq!(swaps[0].asset_in, 5);
        assert_eq!(swaps[0].amount_out, 9);
    }

    #[test]
    fn test_omnipool_decode_positional_v115() {
        let swaps = extract_swaps(&[event(
            "Omnipool",
            "SellExecuted",
            json!(["0xwho", 0, 2, "500", "400"]),
        )]);
        assert_eq!(
            swaps,
            vec![Swap {
                asset_in: 0,
                asset_out: 2,
                amount_in: 500,
                amount_out: 400,
            }]
        );
    }

    #[test]
    fn test_xyk_field_remapping() {
        let swaps = extract_swaps(&[
            event(
                "XYK",
                "SellExecuted",
                json!({"who": "0x00", "assetIn": 0, "assetOut": 5, "amount": "100", "salePrice": "95"}),
            ),
            event(
                "XYK",
                "BuyExecuted",
                json!({"who": "0x00", "assetIn": 0, "assetOut": 5, "amount": "100", "buyPrice": "105"}),
            ),
        ]);
        // Sell: amount is the input, sale price the output.
        assert_eq!(swaps[0].amount_in, 100);
        assert_eq!(swaps[0].amount_out, 95);
        // Buy: buy price is the input, amount the output.
        assert_eq!(swaps[1].amount_in, 105);
        assert_eq!(swaps[1].amount_out, 100);
    }

    #[test]
    fn test_undecodable_swap_is_skipped() {
        let swaps = extract_swaps(&[
            event("Omnipool", "SellExecuted", json!({"garbage": true})),
            event("Stableswap", "SellExecuted", json!({"assetIn": 10, "assetOut": 21, "amountIn": "5", "amountOut": "4"})),
        ]);
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].asset_in, 10);
    }

    #[test]
    fn test_usdt_volume_conversion() {
        // 1000 HDX (12 dec) at 0.015 -> 15 USDT
        let price = UsdtValue(15_000_000_000);
        let amount = 1_000 * pow10(12);
        assert_eq!(
            usdt_volume(amount, price, 12).to_string(),
            "15.000000000000"
        );
        assert_eq!(usdt_volume(amount, UsdtValue::ZERO, 12), UsdtValue::ZERO);
    }

    #[test]
    fn test_aggregate_bidirectional() {
        let mut registry = RegistryTracker::new();
        registry.set_decimals_for_tests(0, 12);
        registry.set_decimals_for_tests(10, 6);
        let mut prices = PriceMap::new();
        prices.insert(0, UsdtValue(15_000_000_000));
        prices.insert(10, UsdtValue::ONE);

        let swaps = vec![Swap {
            asset_in: 0,
            asset_out: 10,
            amount_in: 1_000 * pow10(12),
            amount_out: 15 * pow10(6),
        }];
        let totals = aggregate_volumes(&swaps, &prices, &registry);

        let hdx = totals.get(&0).unwrap();
        assert_eq!(hdx.native_sell, 1_000_000_000_000_000);
        assert_eq!(hdx.usdt_sell.to_string(), "15.000000000000");
        assert_eq!(hdx.native_buy, 0);
        assert_eq!(hdx.usdt_buy, UsdtValue::ZERO);

        let usdt = totals.get(&10).unwrap();
        assert_eq!(usdt.native_buy, 15_000_000);
        assert_eq!(usdt.usdt_buy.to_string(), "15.000000000000");
        assert_eq!(usdt.native_sell, 0);
    }

    #[test]
    fn test_aggregate_sums_multiple_swaps() {
        let mut registry = RegistryTracker::new();
        registry.set_decimals_for_tests(0, 12);
        let mut prices = PriceMap::new();
        prices.insert(0, UsdtValue::ONE);

        let swap = Swap {
            asset_in: 0,
            asset_out: 7,
            amount_in: pow10(12),
            amount_out: 1,
        };
        let totals = aggregate_volumes(&[swap.clone(), swap], &prices, &registry);
        let a0 = totals.get(&0).unwrap();
        assert_eq!(a0.native_sell, 2 * pow10(12));
        assert_eq!(a0.usdt_sell.to_string(), "2.000000000000");
        // Asset 7 has neither price nor decimals: native volume only.
        let a7 = totals.get(&7).unwrap();
        assert_eq!(a7.native_buy, 2);
        assert_eq!(a7.usdt_buy, UsdtValue::ZERO);
    }
}
