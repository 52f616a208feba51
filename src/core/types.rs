use std::fmt;

pub type AssetId = u32;
pub type Height = u32;
pub type SpecVersion = u32;
/// Milliseconds since unix epoch, as reported by the chain.
pub type Timestamp = i64;
pub type BlockHash = String;

/// 32 byte substrate account, hex encoded at external interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn from_hex(s: &str) -> Option<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = base16::decode(stripped).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", base16::encode_lower(&self.0))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Head {
    pub height: Height,
    pub hash: BlockHash,
}

impl Head {
    pub fn new(height: Height, hash: &str) -> Self {
        Self {
            height,
            hash: hash.to_owned(),
        }
    }
}

/// A chain event with decoded arguments.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub pallet: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// A chain call (extrinsic or nested call) with decoded arguments.
///
/// Nested sudo/batch calls are delivered flattened by the source.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub pallet: String,
    pub name: String,
    pub args: serde_json::Value,
    pub success: bool,
}

/// A fully prepared block as delivered by the block source.
#[derive(Debug, Clone)]
pub struct Block {
    pub height: Height,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub timestamp: Timestamp,
    pub spec_version: SpecVersion,
    pub events: Vec<EventRecord>,
    pub calls: Vec<CallRecord>,
}

impl Block {
    pub fn head(&self) -> Head {
        Head::new(self.height, &self.hash)
    }
}

/// One delivery from the block source.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub blocks: Vec<Block>,
    pub finalized_head: Head,
}

/// Omnipool per-asset storage entry.
///
/// The token reserve itself lives in the sovereign account and is read
/// separately from Tokens.Accounts.
#[derive(Debug, Clone, Default)]
pub struct OmnipoolAssetEntry {
    pub hub_reserve: u128,
    pub shares: u128,
    pub protocol_shares: u128,
    pub cap: u128,
    pub tradable: u8,
}

/// Static XYK pool data: sovereign account and asset pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XykPoolInfo {
    pub account: AccountId,
    pub asset_a: AssetId,
    pub asset_b: AssetId,
}

/// Static stableswap pool data. Amplification ramps linearly between the
/// two block bounds and is clamped at the endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableswapPoolInfo {
    pub pool_id: AssetId,
    pub assets: Vec<AssetId>,
    pub initial_amplification: u128,
    pub final_amplification: u128,
    pub initial_block: Height,
    pub final_block: Height,
    pub fee_ppm: u32,
}
