//! Change detector: decides whether a block can carry the previous price
//! snapshot forward or needs a full state read.
//!
//! Reserves only move through transfers in or out of pool accounts, with
//! one exception: governance writing storage directly. Both paths are
//! watched; everything else cannot move prices.

use std::collections::HashSet;

use tracing::warn;

use crate::constants::pallet_prefixes::POOL_PALLETS;
use crate::core::types::AccountId;
use crate::core::types::Block;
use crate::core::types::CallRecord;
use crate::core::types::EventRecord;
use crate::pools::accounts;
use crate::pools::accounts::StableswapAccounts;
use crate::pools::cache::PoolCache;

/// All pool sovereign accounts known at this point: the omnipool account,
/// every cached XYK pool account and every derived stableswap sub-account.
pub fn known_pool_accounts(
    cache: &PoolCache,
    stableswap_accounts: &mut StableswapAccounts,
) -> HashSet<AccountId> {
    let mut accounts: HashSet<AccountId> = HashSet::new();
    accounts.insert(accounts::omnipool_account());
    if let Some(pools) = cache.cached_xyk() {
        accounts.extend(pools.iter().map(|p| p.account));
    }
    if let Some(pools) = cache.cached_stableswap() {
        for pool in pools {
            accounts.insert(stableswap_accounts.get(pool.pool_id));
        }
    }
    accounts
}

/// True when the block must go through the full pipeline.
pub fn requires_full_processing(
    block: &Block,
    composition_changed: bool,
    sudo_write: bool,
    have_snapshot: bool,
    pool_accounts: &HashSet<AccountId>,
) -> bool {
    if !have_snapshot || composition_changed || sudo_write {
        return true;
    }
    touches_pool_account(&block.events, pool_accounts)
}

/// Detect a `System.set_storage` call writing under a pool-affecting
/// pallet prefix. Such writes bypass transfer events entirely and also
/// invalidate the composition caches.
pub fn has_pool_storage_write(calls: &[CallRecord]) -> bool {
    calls
        .iter()
        .filter(|call| call.success && call.pallet == "System" && call.name == "set_storage")
        .any(|call| {
            storage_keys(call).iter().any(|key| {
                POOL_PALLETS
                    .iter()
                    .any(|prefix| key.len() >= 16 && key[..16] == *prefix)
            })
        })
}

fn storage_keys(call: &CallRecord) -> Vec<Vec<u8>> {
    let items = match call.args.get("items").and_then(|v| v.as_array()) {
        Some(items) => items,
        None => {
            warn!("unexpected System.set_storage args shape");
            return vec![];
        }
    };
    items
        .iter()
        .filter_map(|item| {
            // Items are (key, value) pairs or {key, value} objects.
            let key = match item {
                serde_json::Value::Array(pair) => pair.first()?,
                serde_json::Value::Object(map) => map.get("key")?,
                _ => return None,
            };
            let hex = key.as_str()?.strip_prefix("0x")?;
            base16::decode(hex).ok()
        })
        .collect()
}

fn touches_pool_account(events: &[EventRecord], pool_accounts: &HashSet<AccountId>) -> bool {
    events
        .iter()
        .filter(|event| event.pallet == "Tokens" && event.name == "Transfer")
        .any(|event| {
            let from = crate::core::args::account_field(&event.args, &["from"]);
            let to = crate::core::args::account_field(&event.args, &["to"]);
            from.map_or(false, |a| pool_accounts.contains(&a))
                || to.map_or(false, |a| pool_accounts.contains(&a))
        })
}
