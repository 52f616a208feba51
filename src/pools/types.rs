use crate::core::types::AssetId;
use crate::core::types::OmnipoolAssetEntry;
use crate::core::types::StableswapPoolInfo;
use crate::core::types::XykPoolInfo;

/// Omnipool asset with its sovereign-account reserve attached.
#[derive(Debug, Clone)]
pub struct OmnipoolAsset {
    pub asset_id: AssetId,
    pub entry: OmnipoolAssetEntry,
    pub reserve: u128,
}

#[derive(Debug, Clone)]
pub struct XykPoolState {
    pub info: XykPoolInfo,
    pub reserve_a: u128,
    pub reserve_b: u128,
}

#[derive(Debug, Clone)]
pub struct StableswapPoolState {
    pub info: StableswapPoolInfo,
    /// Position-aligned with `info.assets`.
    pub reserves: Vec<u128>,
    /// Amplification at the block being processed.
    pub amplification: u128,
}

/// Everything the price resolver needs for one block.
#[derive(Debug, Clone, Default)]
pub struct PoolStates {
    pub omnipool: Vec<OmnipoolAsset>,
    pub xyk: Vec<XykPoolState>,
    pub stableswap: Vec<StableswapPoolState>,
}
