//! Wire models of the archive gateway, converted into core types.

use serde::Deserialize;

use crate::core::types::Block;
use crate::core::types::CallRecord;
use crate::core::types::EventRecord;
use crate::core::types::Head;

#[derive(Debug, Deserialize)]
pub struct HeadModel {
    pub height: u32,
    pub finalized: FinalizedModel,
}

#[derive(Debug, Deserialize)]
pub struct FinalizedModel {
    pub height: u32,
    pub hash: String,
}

impl From<FinalizedModel> for Head {
    fn from(model: FinalizedModel) -> Self {
        Head {
            height: model.height,
            hash: model.hash,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockModel {
    pub height: u32,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: i64,
    pub spec_version: u32,
    #[serde(default)]
    pub events: Vec<EventModel>,
    #[serde(default)]
    pub calls: Vec<CallModel>,
}

/// Events come with a qualified "Pallet.name" and decoded args.
#[derive(Debug, Deserialize)]
pub struct EventModel {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct CallModel {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default = "default_true")]
    pub success: bool,
}

fn default_true() -> bool {
    true
}

fn split_name(name: &str) -> (String, String) {
    match name.split_once('.') {
        Some((pallet, event)) => (pallet.to_owned(), event.to_owned()),
        None => (String::new(), name.to_owned()),
    }
}

impl From<BlockModel> for Block {
    fn from(model: BlockModel) -> Self {
        Block {
            height: model.height,
            hash: model.hash,
            parent_hash: model.parent_hash,
            timestamp: model.timestamp,
            spec_version: model.spec_version,
            events: model
                .events
                .into_iter()
                .map(|e| {
                    let (pallet, name) = split_name(&e.name);
                    EventRecord {
                        pallet,
                        name,
                        args: e.args,
                    }
                })
                .collect(),
            calls: model
                .calls
                .into_iter()
                .map(|c| {
                    let (pallet, name) = split_name(&c.name);
                    CallRecord {
                        pallet,
                        name,
                        args: c.args,
                        success: c.success,
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmnipoolAssetsModel {
    pub present: bool,
    #[serde(default)]
    pub assets: Vec<OmnipoolAssetModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmnipoolAssetModel {
    pub asset_id: u32,
    pub hub_reserve: String,
    pub shares: String,
    pub protocol_shares: String,
    pub cap: String,
    pub tradable: u8,
}

#[derive(Debug, Deserialize)]
pub struct TokenBalancesModel {
    pub balances: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XykPoolsModel {
    pub present: bool,
    #[serde(default)]
    pub pools: Vec<XykPoolModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XykPoolModel {
    pub account: String,
    pub asset_a: u32,
    pub asset_b: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StableswapPoolsModel {
    pub present: bool,
    #[serde(default)]
    pub pools: Vec<StableswapPoolModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StableswapPoolModel {
    pub pool_id: u32,
    pub assets: Vec<u32>,
    pub initial_amplification: String,
    pub final_amplification: String,
    pub initial_block: u32,
    pub final_block: u32,
    #[serde(default)]
    pub fee: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPageModel {
    pub assets: Vec<RegistryAssetModel>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryAssetModel {
    pub asset_id: u32,
    pub entry: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_model_conversion() {
        let json = serde_json::json!({
            "height": 5,
            "hash": "0x05",
            "parentHash": "0x04",
            "timestamp": 1_700_000_000_000i64,
            "specVersion": 201,
            "events": [{"name": "Omnipool.SellExecuted", "args": {"assetIn": 0}}],
            "calls": [{"name": "System.set_storage", "args": {"items": []}, "success": true}]
        });
        let model: BlockModel = serde_json::from_value(json).unwrap();
        let block = Block::from(model);
        assert_eq!(block.height, 5);
        assert_eq!(block.events[0].pallet, "Omnipool");
        assert_eq!(block.events[0].name, "SellExecuted");
        assert_eq!(block.calls[0].pallet, "System");
        assert_eq!(block.calls[0].name, "set_storage");
        assert!(block.calls[0].success);
    }
}
