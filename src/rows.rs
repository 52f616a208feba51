//! Output records and the per-block price/volume merge.

use std::collections::BTreeMap;

use crate::core::types::AssetId;
use crate::core::types::Height;
use crate::core::types::SpecVersion;
use crate::prices::fixed::UsdtValue;
use crate::prices::PriceMap;
use crate::volumes::VolumeAgg;

/// One row in the prices table, keyed by (asset_id, block_height).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRow {
    pub asset_id: AssetId,
    pub block_height: Height,
    pub usdt_price: UsdtValue,
    pub native_volume_buy: u128,
    pub native_volume_sell: u128,
    pub usdt_volume_buy: UsdtValue,
    pub usdt_volume_sell: UsdtValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub block_height: Height,
    /// Unix seconds.
    pub block_timestamp: i64,
    pub spec_version: SpecVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeUpgradeRow {
    pub block_height: Height,
    pub spec_version: SpecVersion,
    pub prev_spec_version: SpecVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRow {
    pub asset_id: AssetId,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// Merge the block's price snapshot with its aggregated volumes into one
/// row per asset, ordered by asset id.
///
/// Assets with volume but no price get the zero price sentinel.
pub fn merge_price_and_volume_rows(
    block_height: Height,
    prices: &PriceMap,
    volumes: &BTreeMap<AssetId, VolumeAgg>,
) -> Vec<PriceRow> {
    let mut rows = Vec::with_capacity(prices.len());
    for (asset_id, price) in prices {
        let volume = volumes.get(asset_id).copied().unwrap_or_default();
        rows.push(make_row(*asset_id, block_height, *price, volume));
    }
    for (asset_id, volume) in volumes {
        if !prices.contains_key(asset_id) {
            rows.push(make_row(*asset_id, block_height, UsdtValue::ZERO, *volume));
        }
    }
    rows.sort_by_key(|row| row.asset_id);
    rows
}

/// Rows for volume-carrying assets only, priced from an existing snapshot.
/// Used by the volume replay pass, which must not touch price-only rows.
pub fn volume_rows(
    block_height: Height,
    prices: &PriceMap,
    volumes: &BTreeMap<AssetId, VolumeAgg>,
) -> Vec<PriceRow> {
    volumes
        .iter()
        .map(|(asset_id, volume)| {
            let price = prices.get(asset_id).copied().unwrap_or(UsdtValue::ZERO);
            make_row(*asset_id, block_height, price, *volume)
        })
        .collect()
}

fn make_row(asset_id: AssetId, block_height: Height, price: UsdtValue, v: VolumeAgg) -> PriceRow {
    PriceRow {
        asset_id,
        block_height,
        usdt_price: price,
        native_volume_buy: v.native_buy,
        native_volume_sell: v.native_sell,
        usdt_volume_buy: v.usdt_buy,
        usdt_volume_sell: v.usdt_sell,
    }
}
