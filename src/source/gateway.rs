//! Archive gateway client.
//!
//! The gateway serves prepared blocks (header, decoded events and calls)
//! and block-scoped storage queries backed by runtime-metadata decoders.
//! Block streaming retries outages forever; storage reads fail fast so a
//! broken pool read only drops that pool from the block at hand.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::warn;

use crate::core::types::AccountId;
use crate::core::types::AssetId;
use crate::core::types::Block;
use crate::core::types::Head;
use crate::core::types::Height;
use crate::core::types::OmnipoolAssetEntry;
use crate::core::types::SourceBatch;
use crate::core::types::StableswapPoolInfo;
use crate::core::types::XykPoolInfo;

use super::models;
use super::BlockSource;
use super::ChainStorage;
use super::Result;
use super::SourceError;

const DEFAULT_BATCH_SIZE: u32 = 100;
const POLL_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_secs(6);

#[derive(Debug, Clone)]
pub struct Gateway {
    http: reqwest::Client,
    url: String,
}

impl Gateway {
    pub fn new(url: &str) -> Self {
        tracing::info!(url, "configuring gateway client");
        Self {
            http: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_owned(),
        }
    }

    /// A block stream starting at `from`.
    pub fn stream(&self, from: Height) -> BlockStream {
        BlockStream {
            gateway: self.clone(),
            next_height: from,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    async fn head(&self) -> Result<models::HeadModel> {
        let url = format!("{}/head", self.url);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn blocks(&self, from: Height, to: Height) -> Result<Vec<Block>> {
        let url = format!("{}/blocks?from={}&to={}", self.url, from, to);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let blocks: Vec<models::BlockModel> = response.json().await?;
        Ok(blocks.into_iter().map(Block::from).collect())
    }

    async fn storage<T: DeserializeOwned>(
        &self,
        query: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/storage/{}", self.url, query);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

fn parse_u128(value: &str) -> Result<u128> {
    value
        .parse()
        .map_err(|_| SourceError::Format(format!("bad u128: {value}")))
}

fn parse_account(value: &str) -> Result<AccountId> {
    AccountId::from_hex(value)
        .ok_or_else(|| SourceError::Format(format!("bad account id: {value}")))
}

fn parse_omnipool_entry(model: &models::OmnipoolAssetModel) -> Result<OmnipoolAssetEntry> {
    Ok(OmnipoolAssetEntry {
        hub_reserve: parse_u128(&model.hub_reserve)?,
        shares: parse_u128(&model.shares)?,
        protocol_shares: parse_u128(&model.protocol_shares)?,
        cap: parse_u128(&model.cap)?,
        tradable: model.tradable,
    })
}

#[async_trait]
impl ChainStorage for Gateway {
    async fn omnipool_asset_ids(&self, at: &Head) -> Result<Option<Vec<AssetId>>> {
        let body = serde_json::json!({ "at": at.hash });
        let model: models::OmnipoolAssetsModel = self.storage("omnipool-assets", &body).await?;
        if !model.present {
            return Ok(None);
        }
        Ok(Some(model.assets.iter().map(|a| a.asset_id).collect()))
    }

    async fn omnipool_assets(
        &self,
        at: &Head,
        ids: &[AssetId],
    ) -> Result<Vec<Option<OmnipoolAssetEntry>>> {
        let body = serde_json::json!({ "at": at.hash, "assetIds": ids });
        let model: models::OmnipoolAssetsModel = self.storage("omnipool-assets", &body).await?;
        let mut by_id = HashMap::new();
        for asset in &model.assets {
            by_id.insert(asset.asset_id, parse_omnipool_entry(asset)?);
        }
        Ok(ids.iter().map(|id| by_id.remove(id)).collect())
    }

    async fn token_balances(&self, at: &Head, keys: &[(AccountId, AssetId)]) -> Result<Vec<u128>> {
        let wire_keys: Vec<_> = keys
            .iter()
            .map(|(account, asset)| {
                serde_json::json!({ "account": account.to_hex(), "assetId": asset })
            })
            .collect();
        let body = serde_json::json!({ "at": at.hash, "keys": wire_keys });
        let model: models::TokenBalancesModel = self.storage("token-balances", &body).await?;
        if model.balances.len() != keys.len() {
            return Err(SourceError::Format(format!(
                "expected {} balances, got {}",
                keys.len(),
                model.balances.len()
            )));
        }
        model.balances.iter().map(|b| parse_u128(b)).collect()
    }

    async fn xyk_pools(&self, at: &Head) -> Result<Option<Vec<XykPoolInfo>>> {
        let body = serde_json::json!({ "at": at.hash });
        let model: models::XykPoolsModel = self.storage("xyk-pools", &body).await?;
        if !model.present {
            return Ok(None);
        }
        model
            .pools
            .iter()
            .map(|p| {
                Ok(XykPoolInfo {
                    account: parse_account(&p.account)?,
                    asset_a: p.asset_a,
                    asset_b: p.asset_b,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    async fn stableswap_pools(&self, at: &Head) -> Result<Option<Vec<StableswapPoolInfo>>> {
        let body = serde_json::json!({ "at": at.hash });
        let model: models::StableswapPoolsModel = self.storage("stableswap-pools", &body).await?;
        if !model.present {
            return Ok(None);
        }
        model
            .pools
            .iter()
            .map(|p| {
                Ok(StableswapPoolInfo {
                    pool_id: p.pool_id,
                    assets: p.assets.clone(),
                    initial_amplification: parse_u128(&p.initial_amplification)?,
                    final_amplification: parse_u128(&p.final_amplification)?,
                    initial_block: p.initial_block,
                    final_block: p.final_block,
                    fee_ppm: p.fee,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    async fn registry_assets(&self, at: &Head) -> Result<Vec<(AssetId, serde_json::Value)>> {
        let mut assets = vec![];
        let mut cursor: Option<String> = None;
        loop {
            let body = serde_json::json!({ "at": at.hash, "cursor": cursor });
            let page: models::RegistryPageModel = self.storage("registry-assets", &body).await?;
            assets.extend(page.assets.into_iter().map(|a| (a.asset_id, a.entry)));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(assets),
            }
        }
    }
}

pub struct BlockStream {
    gateway: Gateway,
    next_height: Height,
    batch_size: u32,
}

#[async_trait]
impl BlockSource for BlockStream {
    async fn next_batch(&mut self) -> Result<SourceBatch> {
        loop {
            let head = match self.gateway.head().await {
                Ok(head) => head,
                Err(e) => {
                    warn!("gateway unreachable: {e}");
                    tokio::time::sleep(POLL_INTERVAL).await;
                    continue;
                }
            };
            if head.height < self.next_height {
                debug!(
                    head = head.height,
                    next = self.next_height,
                    "waiting for next block"
                );
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }

            let to = head.height.min(self.next_height + self.batch_size - 1);
            let blocks = match self.gateway.blocks(self.next_height, to).await {
                Ok(blocks) => blocks,
                Err(e @ SourceError::Format(_)) => return Err(e),
                Err(e) => {
                    warn!("block fetch failed: {e}");
                    tokio::time::sleep(POLL_INTERVAL).await;
                    continue;
                }
            };
            self.next_height = to + 1;
            return Ok(SourceBatch {
                blocks,
                finalized_head: head.finalized.into(),
            });
        }
    }
}
