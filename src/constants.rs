use crate::core::types::AssetId;
use crate::core::types::Height;

/// USDT in the Hydration asset registry. All prices are quoted against it.
pub const USDT_ASSET_ID: AssetId = 10;

/// USDT decimals, used when the registry has not been scanned yet.
pub const USDT_DECIMALS: u8 = 6;

/// LRNA, the omnipool hub asset. Hub reserves are always 12 decimals.
pub const HUB_ASSET_DECIMALS: u32 = 12;

/// Scale of price and USDT volume values: 12 fractional digits.
pub const PRICE_SCALE: u128 = 1_000_000_000_000;

/// twox128 hashes of pool-affecting pallet names.
///
/// A `System.set_storage` item whose key starts with one of these prefixes
/// can move reserves without emitting transfer events.
pub mod pallet_prefixes {
    /// twox128("Omnipool")
    pub const OMNIPOOL: [u8; 16] = [
        0x97, 0xbd, 0x8c, 0x21, 0xbb, 0xa8, 0x25, 0x27, 0x0f, 0xe6, 0xb1, 0xb8, 0xb3, 0x96,
        0x1a, 0xc3,
    ];
    /// twox128("Tokens")
    pub const TOKENS: [u8; 16] = [
        0x99, 0x97, 0x1b, 0x57, 0x49, 0xac, 0x43, 0xe0, 0x23, 0x5e, 0x41, 0xb0, 0xd3, 0x78,
        0x69, 0x18,
    ];
    /// twox128("XYK")
    pub const XYK: [u8; 16] = [
        0xbd, 0xaa, 0x17, 0xfb, 0x0d, 0xa9, 0xd1, 0xec, 0xfa, 0x97, 0x33, 0xa7, 0xca, 0x67,
        0xd2, 0x24,
    ];
    /// twox128("Stableswap")
    pub const STABLESWAP: [u8; 16] = [
        0x58, 0x97, 0x22, 0x20, 0xa0, 0x5b, 0xbe, 0x4c, 0x15, 0x79, 0x21, 0xde, 0x50, 0x9b,
        0x53, 0x16,
    ];

    pub const POOL_PALLETS: [[u8; 16]; 4] = [OMNIPOOL, TOKENS, XYK, STABLESWAP];
}

pub mod settings {
    use super::Height;

    /// Registry snapshot interval while catching up with the chain.
    pub const REGISTRY_SNAPSHOT_BACKFILL: Height = 10_000;

    /// Registry snapshot interval once following the head.
    pub const REGISTRY_SNAPSHOT_LIVE: Height = 300;

    /// Rows buffered across all tables before a flush is forced.
    pub const FLUSH_THRESHOLD: usize = 5_000;

    /// Minimum spacing between candle view refreshes. Keeps the rebuild
    /// cost bounded while backfilling without letting candles go stale at
    /// the tip.
    pub const CANDLE_REFRESH_SECS: u64 = 60;

    /// Bound on the final flush during shutdown.
    pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
}

/// Checkpoint identities in the indexer_state table.
pub mod checkpoints {
    pub const MAIN: &str = "main";
    pub const REPLAY: &str = "replay";
}
