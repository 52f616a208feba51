//! Per-block pool state reads.
//!
//! Batches storage lookups to one round trip per pool type. A failed read
//! drops the affected pools from the block and never poisons the others.

use tracing::warn;

use crate::core::types::Head;
use crate::core::types::Height;
use crate::core::types::StableswapPoolInfo;
use crate::source::ChainStorage;

use super::accounts;
use super::accounts::StableswapAccounts;
use super::cache::PoolCache;
use super::types::OmnipoolAsset;
use super::types::PoolStates;
use super::types::StableswapPoolState;
use super::types::XykPoolState;

/// Read reserves and parameters for every known pool at the given block.
pub async fn read_pool_states<S: ChainStorage>(
    storage: &S,
    at: &Head,
    cache: &mut PoolCache,
    stableswap_accounts: &mut StableswapAccounts,
) -> PoolStates {
    PoolStates {
        omnipool: read_omnipool(storage, at, cache).await,
        xyk: read_xyk(storage, at, cache).await,
        stableswap: read_stableswap(storage, at, cache, stableswap_accounts).await,
    }
}

async fn read_omnipool<S: ChainStorage>(
    storage: &S,
    at: &Head,
    cache: &mut PoolCache,
) -> Vec<OmnipoolAsset> {
    let ids = match cache.omnipool_assets(storage, at).await {
        Some(ids) => ids,
        None => return vec![],
    };
    let entries = match storage.omnipool_assets(at, &ids).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(height = at.height, "omnipool state read failed: {e}");
            return vec![];
        }
    };

    // True reserves sit in the sovereign account. Shares are a usable
    // approximation when the balance batch cannot be read.
    let account = accounts::omnipool_account();
    let keys: Vec<_> = ids.iter().map(|id| (account, *id)).collect();
    let reserves = match storage.token_balances(at, &keys).await {
        Ok(balances) => Some(balances),
        Err(e) => {
            warn!(height = at.height, "omnipool reserve read failed, using shares: {e}");
            None
        }
    };

    ids.iter()
        .zip(entries)
        .enumerate()
        .filter_map(|(i, (id, entry))| {
            let entry = match entry {
                Some(entry) => entry,
                None => {
                    warn!(asset_id = id, "missing omnipool entry for cached asset");
                    return None;
                }
            };
            let reserve = match &reserves {
                Some(balances) => balances[i],
                None => entry.shares,
            };
            Some(OmnipoolAsset {
                asset_id: *id,
                entry,
                reserve,
            })
        })
        .collect()
}

async fn read_xyk<S: ChainStorage>(
    storage: &S,
    at: &Head,
    cache: &mut PoolCache,
) -> Vec<XykPoolState> {
    let pools = match cache.xyk_pools(storage, at).await {
        Some(pools) => pools,
        None => return vec![],
    };
    let mut keys = Vec::with_capacity(pools.len() * 2);
    for pool in &pools {
        keys.push((pool.account, pool.asset_a));
        keys.push((pool.account, pool.asset_b));
    }
    let balances = match storage.token_balances(at, &keys).await {
        Ok(balances) => balances,
        Err(e) => {
            warn!(height = at.height, "xyk reserve read failed: {e}");
            return vec![];
        }
    };
    pools
        .into_iter()
        .enumerate()
        .map(|(i, info)| XykPoolState {
            info,
            reserve_a: balances[i * 2],
            reserve_b: balances[i * 2 + 1],
        })
        .collect()
}

async fn read_stableswap<S: ChainStorage>(
    storage: &S,
    at: &Head,
    cache: &mut PoolCache,
    accounts: &mut StableswapAccounts,
) -> Vec<StableswapPoolState> {
    let pools = match cache.stableswap_pools(storage, at).await {
        Some(pools) => pools,
        None => return vec![],
    };
    let mut keys = vec![];
    for pool in &pools {
        let account = accounts.get(pool.pool_id);
        for asset in &pool.assets {
            keys.push((account, *asset));
        }
    }
    let balances = match storage.token_balances(at, &keys).await {
        Ok(balances) => balances,
        Err(e) => {
            warn!(height = at.height, "stableswap reserve read failed: {e}");
            return vec![];
        }
    };
    let mut states = Vec::with_capacity(pools.len());
    let mut offset = 0;
    for info in pools {
        let n = info.assets.len();
        let reserves = balances[offset..offset + n].to_vec();
        offset += n;
        let amplification = current_amplification(&info, at.height);
        states.push(StableswapPoolState {
            info,
            reserves,
            amplification,
        });
    }
    states
}

/// Amplification at `height`: linear ramp between the pool's initial and
/// final blocks, clamped at both endpoints.
pub fn current_amplification(pool: &StableswapPoolInfo, height: Height) -> u128 {
    let (a0, a1) = (pool.initial_amplification, pool.final_amplification);
    let (h0, h1) = (pool.initial_block, pool.final_block);
    if height >= h1 || h1 <= h0 {
        return a1;
    }
    if height <= h0 {
        return a0;
    }
    let span = u128::from(h1 - h0);
    let elapsed = u128::from(height - h0);
    if a1 >= a0 {
        a0 + (a1 - a0) * elapsed / span
    } else {
        a0 - (a0 - a1) * elapsed / span
    }
}
