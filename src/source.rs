//! Contracts towards the block source and chain storage, plus the archive
//! gateway client implementing them.
//!
//! Storage values arrive decoded: the gateway applies version guarded
//! decoders generated from the runtime metadata, so the core only ever sees
//! typed entries (or raw JSON for the asset registry, whose schema the
//! registry tracker resolves itself).

pub mod gateway;
mod models;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::AccountId;
use crate::core::types::AssetId;
use crate::core::types::Head;
use crate::core::types::OmnipoolAssetEntry;
use crate::core::types::SourceBatch;
use crate::core::types::StableswapPoolInfo;
use crate::core::types::XykPoolInfo;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected gateway response: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Delivers batches of prepared blocks in ascending height order.
#[async_trait]
pub trait BlockSource {
    /// Next batch of blocks, waiting for new ones when at the chain tip.
    async fn next_batch(&mut self) -> Result<SourceBatch>;
}

/// Batched, block-scoped reads of chain storage.
#[async_trait]
pub trait ChainStorage {
    /// All omnipool asset ids, or None while the pallet is not present.
    async fn omnipool_asset_ids(&self, at: &Head) -> Result<Option<Vec<AssetId>>>;

    /// Omnipool entries for the given assets, position-aligned with `ids`.
    async fn omnipool_assets(
        &self,
        at: &Head,
        ids: &[AssetId],
    ) -> Result<Vec<Option<OmnipoolAssetEntry>>>;

    /// Free balances for the given (account, asset) pairs, position-aligned.
    /// A missing storage entry is a zero balance.
    async fn token_balances(&self, at: &Head, keys: &[(AccountId, AssetId)]) -> Result<Vec<u128>>;

    /// All XYK pools, or None while the pallet is not present.
    async fn xyk_pools(&self, at: &Head) -> Result<Option<Vec<XykPoolInfo>>>;

    /// All stableswap pools, or None while the pallet is not present.
    async fn stableswap_pools(&self, at: &Head) -> Result<Option<Vec<StableswapPoolInfo>>>;

    /// Paged scan of the asset registry. Values are raw JSON entries whose
    /// schema version is resolved by the registry tracker.
    async fn registry_assets(&self, at: &Head) -> Result<Vec<(AssetId, serde_json::Value)>>;
}
