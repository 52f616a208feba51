//! Derived pool sovereign accounts.
//!
//! These are plain pallet-id constructions, no hashing involved:
//! `"modl" ++ pallet name ++ padding`, with stableswap sub-accounts carrying
//! the pool id as little-endian u32.

use std::collections::HashMap;

use crate::core::types::AccountId;
use crate::core::types::AssetId;

const MODULE_PREFIX: &[u8; 4] = b"modl";
const OMNIPOOL_PALLET_ID: &[u8; 8] = b"omnipool";
const STABLESWAP_PALLET_ID: &[u8; 8] = b"stblpool";

const OMNIPOOL_ACCOUNT: [u8; 32] = pallet_account(OMNIPOOL_PALLET_ID);

const fn pallet_account(pallet_id: &[u8; 8]) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    let mut i = 0;
    while i < 4 {
        bytes[i] = MODULE_PREFIX[i];
        i += 1;
    }
    let mut i = 0;
    while i < 8 {
        bytes[4 + i] = pallet_id[i];
        i += 1;
    }
    bytes
}

/// The omnipool sovereign account holding all omnipool token reserves.
pub fn omnipool_account() -> AccountId {
    AccountId(OMNIPOOL_ACCOUNT)
}

/// The sub-account holding the reserves of one stableswap pool.
pub fn stableswap_pool_account(pool_id: AssetId) -> AccountId {
    let mut bytes = pallet_account(STABLESWAP_PALLET_ID);
    bytes[12..16].copy_from_slice(&pool_id.to_le_bytes());
    AccountId(bytes)
}

/// Memoized stableswap sub-account derivation.
#[derive(Debug, Default)]
pub struct StableswapAccounts {
    memo: HashMap<AssetId, AccountId>,
}

impl StableswapAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, pool_id: AssetId) -> AccountId {
        *self
            .memo
            .entry(pool_id)
            .or_insert_with(|| stableswap_pool_account(pool_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_omnipool_account_layout() {
        let account = omnipool_account();
        assert_eq!(&account.0[..12], b"modlomnipool");
        assert!(account.0[12..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_stableswap_account_layout() {
        let account = stableswap_pool_account(0x0102_0304);
        assert_eq!(&account.0[..12], b"modlstblpool");
        assert_eq!(&account.0[12..16], &[0x04, 0x03, 0x02, 0x01]);
        assert!(account.0[16..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_accounts_deterministic_and_distinct() {
        assert_eq!(stableswap_pool_account(7), stableswap_pool_account(7));
        assert_ne!(stableswap_pool_account(7), stableswap_pool_account(8));
        assert_ne!(stableswap_pool_account(7), omnipool_account());
    }

    #[test]
    fn test_memoization() {
        let mut accounts = StableswapAccounts::new();
        let first = accounts.get(100);
        assert_eq!(accounts.get(100), first);
        assert_eq!(first, stableswap_pool_account(100));
        assert_eq!(accounts.memo.len(), 1);
    }
}
