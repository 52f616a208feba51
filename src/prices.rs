pub mod fixed;
pub mod resolver;
pub mod stableswap;

use std::collections::BTreeMap;

use crate::core::types::AssetId;

use self::fixed::UsdtValue;

/// Per-block snapshot of USDT prices. Ordered for deterministic output.
pub type PriceMap = BTreeMap<AssetId, UsdtValue>;
