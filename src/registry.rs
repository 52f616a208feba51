//! Asset registry tracker.
//!
//! Keeps an in-memory view of asset metadata and periodically rescans the
//! registry storage, surfacing new or changed assets as rows. The scan
//! interval is wide while backfilling and tight once following the head.

use std::collections::HashMap;

use tracing::info;
use tracing::warn;

use crate::constants::settings::REGISTRY_SNAPSHOT_BACKFILL;
use crate::constants::settings::REGISTRY_SNAPSHOT_LIVE;
use crate::core::args;
use crate::core::types::AssetId;
use crate::core::types::Head;
use crate::core::types::Height;
use crate::rows::AssetRow;
use crate::source::ChainStorage;

/// Decimals assumed for registry entries that predate the decimals field.
const DEFAULT_DECIMALS: u8 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
struct AssetInfo {
    symbol: String,
    name: String,
    decimals: u8,
}

#[derive(Debug, Default)]
pub struct RegistryTracker {
    assets: HashMap<AssetId, AssetInfo>,
    last_scan: Option<Height>,
}

impl RegistryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decimals for an asset, if it has been seen by any scan.
    pub fn decimals(&self, asset_id: AssetId) -> Option<u8> {
        self.assets.get(&asset_id).map(|info| info.decimals)
    }

    pub fn has_scanned(&self) -> bool {
        self.last_scan.is_some()
    }

    /// Whether a snapshot is due at this height.
    pub fn due(&self, height: Height, live: bool) -> bool {
        let interval = if live {
            REGISTRY_SNAPSHOT_LIVE
        } else {
            REGISTRY_SNAPSHOT_BACKFILL
        };
        match self.last_scan {
            None => true,
            Some(last) => height.saturating_sub(last) >= interval,
        }
    }

    /// Scan the registry at the given block, returning rows for assets that
    /// are new or whose metadata changed.
    pub async fn scan<S: ChainStorage>(&mut self, storage: &S, at: &Head) -> Vec<AssetRow> {
        let entries = match storage.registry_assets(at).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(height = at.height, "registry scan failed: {e}");
                return vec![];
            }
        };
        self.last_scan = Some(at.height);

        let mut rows = vec![];
        for (asset_id, value) in entries {
            let info = decode_asset(asset_id, &value);
            let known = self.assets.get(&asset_id);
            if known != Some(&info) {
                rows.push(AssetRow {
                    asset_id,
                    symbol: info.symbol.clone(),
                    name: info.name.clone(),
                    decimals: info.decimals,
                });
            }
            self.assets.insert(asset_id, info);
        }
        if !rows.is_empty() {
            info!(height = at.height, changed = rows.len(), "registry snapshot");
        }
        rows
    }

    #[cfg(test)]
    pub fn set_decimals_for_tests(&mut self, asset_id: AssetId, decimals: u8) {
        self.assets.insert(
            asset_id,
            AssetInfo {
                symbol: format!("Asset{asset_id}"),
                name: format!("Asset{asset_id}"),
                decimals,
            },
        );
    }
}

/// Decode one registry entry, trying schema versions newest to oldest.
fn decode_asset(asset_id: AssetId, value: &serde_json::Value) -> AssetInfo {
    let fallback = format!("Asset{asset_id}");
    // Newest schema carries symbol and decimals; earlier ones only a name.
    let symbol = args::field(value, &["symbol"])
        .and_then(decode_text)
        .unwrap_or_else(|| fallback.clone());
    let name = args::field(value, &["name"])
        .and_then(decode_text)
        .unwrap_or_else(|| fallback.clone());
    let decimals = args::field(value, &["decimals"])
        .and_then(args::as_u32)
        .and_then(|d| u8::try_from(d).ok())
        .filter(|d| *d <= 30)
        .unwrap_or(DEFAULT_DECIMALS);
    AssetInfo {
        symbol,
        name,
        decimals,
    }
}

/// Registry byte strings arrive as hex or plain text; both decode to UTF-8.
/// Empty or invalid values yield None.
fn decode_text(value: &serde_json::Value) -> Option<String> {
    let s = value.as_str()?;
    let text = match s.strip_prefix("0x") {
        Some(hex) => String::from_utf8(base16::decode(hex).ok()?).ok()?,
        None => s.to_owned(),
    };
    if text.is_empty() || text.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::MockStorage;
    use serde_json::json;

    fn hex(s: &str) -> String {
        format!("0x{}", base16::encode_lower(s.as_bytes()))
    }

    #[tokio::test]
    async fn test_first_scan_emits_all_assets() {
        let storage = MockStorage::new()
            .with_registry_asset(0, json!({"symbol": hex("HDX"), "name": hex("HydraDX"), "decimals": 12}))
            .with_registry_asset(10, json!({"symbol": "USDT", "name": "Tether", "decimals": 6}));
        let at = Head::new(100, "0x64");
        let mut tracker = RegistryTracker::new();
        assert!(tracker.due(100, false));

        let rows = tracker.scan(&storage, &at).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "HDX");
        assert_eq!(rows[0].decimals, 12);
        assert_eq!(rows[1].name, "Tether");
        assert_eq!(tracker.decimals(10), Some(6));
        assert_eq!(tracker.decimals(99), None);
    }

    #[tokio::test]
    async fn test_rescan_emits_only_changes() {
        let storage = MockStorage::new()
            .with_registry_asset(0, json!({"symbol": "HDX", "name": "HydraDX", "decimals": 12}));
        let at = Head::new(100, "0x64");
        let mut tracker = RegistryTracker::new();
        tracker.scan(&storage, &at).await;

        // Unchanged metadata: no rows.
        assert!(tracker.scan(&storage, &at).await.is_empty());

        // Renamed asset: one row.
        let storage = MockStorage::new()
            .with_registry_asset(0, json!({"symbol": "HDX", "name": "Hydration", "decimals": 12}));
        let rows = tracker.scan(&storage, &at).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Hydration");
    }

    #[tokio::test]
    async fn test_legacy_schema_fallbacks() {
        // Old entries carry a name only; symbol falls back, decimals default.
        let storage = MockStorage::new()
            .with_registry_asset(3, json!({"name": hex("Old Token"), "assetType": "Token"}))
            .with_registry_asset(4, json!({"name": "0x", "assetType": "Token"}));
        let at = Head::new(100, "0x64");
        let mut tracker = RegistryTracker::new();
        let rows = tracker.scan(&storage, &at).await;

        assert_eq!(rows[0].symbol, "Asset3");
        assert_eq!(rows[0].name, "Old Token");
        assert_eq!(rows[0].decimals, DEFAULT_DECIMALS);
        // Empty name falls back too.
        assert_eq!(rows[1].name, "Asset4");
    }

    #[test]
    fn test_snapshot_intervals() {
        let mut tracker = RegistryTracker::new();
        tracker.last_scan = Some(10_000);
        assert!(!tracker.due(10_000 + REGISTRY_SNAPSHOT_LIVE - 1, true));
        assert!(tracker.due(10_000 + REGISTRY_SNAPSHOT_LIVE, true));
        assert!(!tracker.due(10_000 + REGISTRY_SNAPSHOT_BACKFILL - 1, false));
        assert!(tracker.due(10_000 + REGISTRY_SNAPSHOT_BACKFILL, false));
    }

    #[tokio::test]
    async fn test_failed_scan_stays_due() {
        let mut storage = MockStorage::new();
        storage.fail_registry = true;
        let at = Head::new(100, "0x64");
        let mut tracker = RegistryTracker::new();
        assert!(tracker.scan(&storage, &at).await.is_empty());
        assert!(!tracker.has_scanned());
        assert!(tracker.due(100, true));

        storage.fail_registry = false;
        tracker.scan(&storage, &at).await;
        assert!(tracker.has_scanned());
    }
}
