//! Pool composition cache.
//!
//! Answers which assets and pools exist at the block being processed.
//! Each store bootstraps from a full storage scan on first access and is
//! then maintained incrementally from pool lifecycle events. A runtime
//! upgrade or a pool-affecting sudo write resets everything.

use tracing::info;
use tracing::warn;

use crate::core::args;
use crate::core::types::AssetId;
use crate::core::types::EventRecord;
use crate::core::types::Head;
use crate::core::types::StableswapPoolInfo;
use crate::core::types::XykPoolInfo;
use crate::source::ChainStorage;

#[derive(Debug, Default)]
pub struct PoolCache {
    omnipool: Option<Vec<AssetId>>,
    xyk: Option<Vec<XykPoolInfo>>,
    stableswap: Option<Vec<StableswapPoolInfo>>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply pool lifecycle events. Must run once per block, before any
    /// state read. Returns true if pool composition changed in this block.
    pub fn process_events(&mut self, events: &[EventRecord]) -> bool {
        let mut changed = false;
        for event in events {
            match (event.pallet.as_str(), event.name.as_str()) {
                ("Omnipool", "TokenAdded") => {
                    changed = true;
                    match args::u32_field(&event.args, &["assetId", "asset_id"]) {
                        Some(id) => {
                            if let Some(ids) = self.omnipool.as_mut() {
                                if !ids.contains(&id) {
                                    ids.push(id);
                                }
                            }
                        }
                        None => self.drop_omnipool(event),
                    }
                }
                ("Omnipool", "TokenRemoved") => {
                    changed = true;
                    match args::u32_field(&event.args, &["assetId", "asset_id"]) {
                        Some(id) => {
                            if let Some(ids) = self.omnipool.as_mut() {
                                ids.retain(|i| *i != id);
                            }
                        }
                        None => self.drop_omnipool(event),
                    }
                }
                ("XYK", "PoolCreated") => {
                    changed = true;
                    match decode_xyk_pool(event) {
                        Some(pool) => {
                            if let Some(pools) = self.xyk.as_mut() {
                                if !pools.iter().any(|p| p.account == pool.account) {
                                    pools.push(pool);
                                }
                            }
                        }
                        None => self.drop_xyk(event),
                    }
                }
                ("XYK", "PoolDestroyed") => {
                    changed = true;
                    match args::account_field(&event.args, &["pool"]) {
                        Some(account) => {
                            if let Some(pools) = self.xyk.as_mut() {
                                pools.retain(|p| p.account != account);
                            }
                        }
                        None => self.drop_xyk(event),
                    }
                }
                ("Stableswap", "PoolCreated") => {
                    changed = true;
                    match decode_stableswap_pool(event) {
                        Some(pool) => {
                            if let Some(pools) = self.stableswap.as_mut() {
                                if !pools.iter().any(|p| p.pool_id == pool.pool_id) {
                                    pools.push(pool);
                                }
                            }
                        }
                        None => {
                            warn!("undecodable Stableswap.PoolCreated args, dropping cache");
                            self.stableswap = None;
                        }
                    }
                }
                _ => (),
            }
        }
        changed
    }

    /// Reset all three stores. The next lookup re-bootstraps from storage.
    pub fn invalidate_all(&mut self) {
        info!("invalidating pool composition caches");
        self.omnipool = None;
        self.xyk = None;
        self.stableswap = None;
    }

    /// Asset ids currently in the omnipool, bootstrapping if needed.
    /// None while the pallet is absent or storage is unreadable.
    pub async fn omnipool_assets<S: ChainStorage>(
        &mut self,
        storage: &S,
        at: &Head,
    ) -> Option<Vec<AssetId>> {
        if self.omnipool.is_none() {
            match storage.omnipool_asset_ids(at).await {
                Ok(Some(ids)) => {
                    info!(height = at.height, assets = ids.len(), "bootstrapped omnipool assets");
                    self.omnipool = Some(ids);
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!("omnipool bootstrap failed: {e}");
                    return None;
                }
            }
        }
        self.omnipool.clone()
    }

    pub async fn xyk_pools<S: ChainStorage>(
        &mut self,
        storage: &S,
        at: &Head,
    ) -> Option<Vec<XykPoolInfo>> {
        if self.xyk.is_none() {
            match storage.xyk_pools(at).await {
                Ok(Some(pools)) => {
                    info!(height = at.height, pools = pools.len(), "bootstrapped xyk pools");
                    self.xyk = Some(pools);
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!("xyk bootstrap failed: {e}");
                    return None;
                }
            }
        }
        self.xyk.clone()
    }

    pub async fn stableswap_pools<S: ChainStorage>(
        &mut self,
        storage: &S,
        at: &Head,
    ) -> Option<Vec<StableswapPoolInfo>> {
        if self.stableswap.is_none() {
            match storage.stableswap_pools(at).await {
                Ok(Some(pools)) => {
                    info!(
                        height = at.height,
                        pools = pools.len(),
                        "bootstrapped stableswap pools"
                    );
                    self.stableswap = Some(pools);
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!("stableswap bootstrap failed: {e}");
                    return None;
                }
            }
        }
        self.stableswap.clone()
    }

    /// Already cached XYK pools, without triggering a bootstrap.
    pub fn cached_xyk(&self) -> Option<&[XykPoolInfo]> {
        self.xyk.as_deref()
    }

    /// Already cached stableswap pools, without triggering a bootstrap.
    pub fn cached_stableswap(&self) -> Option<&[StableswapPoolInfo]> {
        self.stableswap.as_deref()
    }

    fn drop_omnipool(&mut self, event: &EventRecord) {
        warn!("undecodable Omnipool.{} args, dropping cache", event.name);
        self.omnipool = None;
    }

    fn drop_xyk(&mut self, event: &EventRecord) {
        warn!("undecodable XYK.{} args, dropping cache", event.name);
        self.xyk = None;
    }
}

fn decode_xyk_pool(event: &EventRecord) -> Option<XykPoolInfo> {
    Some(XykPoolInfo {
        account: args::account_field(&event.args, &["pool"])?,
        asset_a: args::u32_field(&event.args, &["assetA", "asset_a"])?,
        asset_b: args::u32_field(&event.args, &["assetB", "asset_b"])?,
    })
}

fn decode_stableswap_pool(event: &EventRecord) -> Option<StableswapPoolInfo> {
    let pool_id = args::u32_field(&event.args, &["poolId", "pool_id"])?;
    let assets = args::field(&event.args, &["assets"])?
        .as_array()?
        .iter()
        .map(args::as_u32)
        .collect::<Option<Vec<AssetId>>>()?;
    let amplification = args::u128_field(&event.args, &["amplification"])?;
    let fee_ppm = args::u32_field(&event.args, &["fee"]).unwrap_or(0);
    Some(StableswapPoolInfo {
        pool_id,
        assets,
        initial_amplification: amplification,
        final_amplification: amplification,
        initial_block: 0,
        final_block: 0,
        fee_ppm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::MockStorage;
    use serde_json::json;

    fn event(pallet: &str, name: &str, args: serde_json::Value) -> EventRecord {
        EventRecord {
            pallet: pallet.to_owned(),
            name: name.to_owned(),
            args,
        }
    }

    #[tokio::test]
    async fn test_bootstrap_and_incremental_updates() {
        let storage = MockStorage::new().with_omnipool_ids(vec![0, 5, 10]);
        let at = Head::new(100, "0x64");
        let mut cache = PoolCache::new();

        let ids = cache.omnipool_assets(&storage, &at).await.unwrap();
        assert_eq!(ids, vec![0, 5, 10]);

        // TokenAdded extends the set, TokenRemoved shrinks it.
        let changed = cache.process_events(&[
            event("Omnipool", "TokenAdded", json!({"assetId": 16})),
            event("Omnipool", "TokenRemoved", json!({"assetId": 5})),
        ]);
        assert!(changed);
        let ids = cache.omnipool_assets(&storage, &at).await.unwrap();
        assert_eq!(ids, vec![0, 10, 16]);
    }

    #[tokio::test]
    async fn test_pallet_absent_returns_none_and_retries() {
        let storage = MockStorage::new();
        let at = Head::new(1, "0x01");
        let mut cache = PoolCache::new();
        assert!(cache.omnipool_assets(&storage, &at).await.is_none());

        // Pallet shows up later: lookup bootstraps then.
        let storage = storage.with_omnipool_ids(vec![0]);
        assert_eq!(cache.omnipool_assets(&storage, &at).await.unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_xyk_lifecycle() {
        let account = crate::core::types::AccountId([1; 32]);
        let storage = MockStorage::new().with_xyk(vec![XykPoolInfo {
            account,
            asset_a: 0,
            asset_b: 5,
        }]);
        let at = Head::new(10, "0x0a");
        let mut cache = PoolCache::new();
        assert_eq!(cache.xyk_pools(&storage, &at).await.unwrap().len(), 1);

        let new_account = crate::core::types::AccountId([2; 32]);
        let changed = cache.process_events(&[event(
            "XYK",
            "PoolCreated",
            json!({"pool": new_account.to_hex(), "assetA": 5, "assetB": 7}),
        )]);
        assert!(changed);
        assert_eq!(cache.cached_xyk().unwrap().len(), 2);

        cache.process_events(&[event(
            "XYK",
            "PoolDestroyed",
            json!({"pool": account.to_hex(), "assetA": 0, "assetB": 5}),
        )]);
        let pools = cache.cached_xyk().unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].account, new_account);
    }

    #[tokio::test]
    async fn test_stableswap_created_from_event() {
        let storage = MockStorage::new().with_stableswap(vec![]);
        let at = Head::new(10, "0x0a");
        let mut cache = PoolCache::new();
        assert!(cache.stableswap_pools(&storage, &at).await.unwrap().is_empty());

        let changed = cache.process_events(&[event(
            "Stableswap",
            "PoolCreated",
            json!({"poolId": 100, "assets": [10, 21, 23], "amplification": "20", "fee": 400}),
        )]);
        assert!(changed);
        let pools = cache.cached_stableswap().unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].pool_id, 100);
        assert_eq!(pools[0].assets, vec![10, 21, 23]);
        assert_eq!(pools[0].initial_amplification, 20);
        assert_eq!(pools[0].final_amplification, 20);
        assert_eq!(pools[0].fee_ppm, 400);
    }

    #[test]
    fn test_liquidity_events_do_not_change_composition() {
        let mut cache = PoolCache::new();
        let changed = cache.process_events(&[
            event("Omnipool", "LiquidityAdded", json!({"assetId": 5})),
            event("Stableswap", "LiquidityAdded", json!({"poolId": 100})),
            event("Tokens", "Transfer", json!({})),
        ]);
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_rebootstrap() {
        let storage = MockStorage::new().with_omnipool_ids(vec![0]);
        let at = Head::new(10, "0x0a");
        let mut cache = PoolCache::new();
        cache.omnipool_assets(&storage, &at).await.unwrap();

        cache.invalidate_all();
        let storage = storage.with_omnipool_ids(vec![0, 1, 2]);
        assert_eq!(
            cache.omnipool_assets(&storage, &at).await.unwrap(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_not_sticky() {
        let mut storage = MockStorage::new().with_omnipool_ids(vec![0]);
        storage.fail_omnipool = true;
        let at = Head::new(10, "0x0a");
        let mut cache = PoolCache::new();
        assert!(cache.omnipool_assets(&storage, &at).await.is_none());

        storage.fail_omnipool = false;
        assert_eq!(cache.omnipool_assets(&storage, &at).await.unwrap(), vec![0]);
    }
}
