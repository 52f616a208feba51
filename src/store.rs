//! Batched writes, checkpoints and admin operations against the store.
//!
//! Rows accumulate in per-table buffers and go out in single batched
//! inserts. Every batch claims a deterministic dedup token first, making
//! retries after partial failures no-ops. Blocks always flush before
//! prices: the store-side candle views join prices against blocks on
//! refresh and must never see an orphan price row.
//!
//! Store errors are fatal by design. The checkpoint only advances after a
//! successful flush of finalized blocks, so a crash simply replays.

mod admin;
mod assets;
mod blocks;
mod dedup;
mod prices;
mod state;
mod upgrades;

use std::time::Duration;
use std::time::Instant;

use tokio_postgres::Client;
use tokio_postgres::NoTls;

use crate::constants::settings::CANDLE_REFRESH_SECS;
use crate::core::types::Height;
use crate::prices::PriceMap;
use crate::rows::AssetRow;
use crate::rows::BlockRow;
use crate::rows::PriceRow;
use crate::rows::RuntimeUpgradeRow;

pub struct Store {
    client: Client,
    prices: Vec<PriceRow>,
    blocks: Vec<BlockRow>,
    assets: Vec<AssetRow>,
    upgrades: Vec<RuntimeUpgradeRow>,
    last_candle_refresh: Option<Instant>,
}

impl Store {
    pub async fn new(connection_uri: &str) -> Self {
        tracing::debug!("initializing store");
        let (mut client, connection) = tokio_postgres::connect(connection_uri, NoTls)
            .await
            .unwrap();

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!("connection error: {}", e);
            }
        });

        let schema = Schema::new("hyw", include_str!("store/schema.sql"));
        schema.init(&mut client).await;

        Self {
            client,
            prices: vec![],
            blocks: vec![],
            assets: vec![],
            upgrades: vec![],
            last_candle_refresh: None,
        }
    }

    pub fn stage_block(&mut self, row: BlockRow) {
        self.blocks.push(row);
    }

    pub fn stage_prices(&mut self, rows: Vec<PriceRow>) {
        self.prices.extend(rows);
    }

    pub fn stage_assets(&mut self, rows: Vec<AssetRow>) {
        self.assets.extend(rows);
    }

    pub fn stage_upgrade(&mut self, row: RuntimeUpgradeRow) {
        self.upgrades.push(row);
    }

    pub fn buffered(&self) -> usize {
        self.prices.len() + self.blocks.len() + self.assets.len() + self.upgrades.len()
    }

    /// Flush all buffers. Blocks strictly before prices; the rest after.
    /// A flush that wrote price rows also freshens the candle views, at
    /// most once per refresh interval.
    pub async fn flush(&mut self) {
        let wrote_prices = !self.prices.is_empty();
        self.flush_blocks().await;
        self.flush_prices().await;
        self.flush_assets().await;
        self.flush_upgrades().await;
        if wrote_prices && self.candles_due() {
            refresh_candles(&self.client).await;
            self.last_candle_refresh = Some(Instant::now());
        }
    }

    fn candles_due(&self) -> bool {
        self.last_candle_refresh
            .map_or(true, |at| at.elapsed() >= Duration::from_secs(CANDLE_REFRESH_SECS))
    }

    async fn flush_blocks(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let token = height_token("blocks", self.blocks.iter().map(|r| r.block_height));
        let rows = std::mem::take(&mut self.blocks);
        let pgtx = self.client.transaction().await.unwrap();
        if dedup::claim(&pgtx, &token).await {
            blocks::insert_many(&pgtx, &rows).await;
        } else {
            tracing::info!(%token, "batch already applied, skipping");
        }
        pgtx.commit().await.unwrap();
    }

    async fn flush_prices(&mut self) {
        if self.prices.is_empty() {
            return;
        }
        let token = height_token("prices", self.prices.iter().map(|r| r.block_height));
        let rows = std::mem::take(&mut self.prices);
        let pgtx = self.client.transaction().await.unwrap();
        if dedup::claim(&pgtx, &token).await {
            prices::insert_many(&pgtx, &rows).await;
        } else {
            tracing::info!(%token, "batch already applied, skipping");
        }
        pgtx.commit().await.unwrap();
    }

    async fn flush_assets(&mut self) {
        if self.assets.is_empty() {
            return;
        }
        let token = height_token("assets", self.assets.iter().map(|r| r.asset_id));
        let rows = std::mem::take(&mut self.assets);
        let pgtx = self.client.transaction().await.unwrap();
        if dedup::claim(&pgtx, &token).await {
            assets::insert_many(&pgtx, &rows).await;
        } else {
            tracing::info!(%token, "batch already applied, skipping");
        }
        pgtx.commit().await.unwrap();
    }

    async fn flush_upgrades(&mut self) {
        if self.upgrades.is_empty() {
            return;
        }
        let token = height_token(
            "runtime_upgrades",
            self.upgrades.iter().map(|r| r.block_height),
        );
        let rows = std::mem::take(&mut self.upgrades);
        let pgtx = self.client.transaction().await.unwrap();
        if dedup::claim(&pgtx, &token).await {
            upgrades::insert_many(&pgtx, &rows).await;
        } else {
            tracing::info!(%token, "batch already applied, skipping");
        }
        pgtx.commit().await.unwrap();
    }

    pub async fn get_checkpoint(&self, id: &str) -> Option<Height> {
        state::get(&self.client, id).await
    }

    pub async fn set_checkpoint(&mut self, id: &str, height: Height) {
        let pgtx = self.client.transaction().await.unwrap();
        state::upsert(&pgtx, id, height).await;
        pgtx.commit().await.unwrap();
    }

    /// Latest stored price per asset at or below `height`.
    pub async fn price_map_at(&self, height: Height) -> PriceMap {
        prices::get_map_at(&self.client, height).await
    }

    /// Delete all rows at `height` and above, refresh candles and reset the
    /// main checkpoint to just below.
    pub async fn rollback_to(&mut self, height: Height) {
        admin::rollback_to(&mut self.client, height).await
    }

    /// Height ranges missing from the prices table.
    pub async fn detect_gaps(&self) -> Vec<(Height, Height)> {
        admin::detect_gaps(&self.client).await
    }
}

/// Rebuild the candle views from the prices and blocks tables.
async fn refresh_candles(client: &Client) {
    client
        .batch_execute(
            "refresh materialized view hyw.candles_1h;
             refresh materialized view hyw.candles_1d;",
        )
        .await
        .unwrap();
}

/// Token identifying one batch insert: table, key range and row count.
fn height_token<K>(table: &str, keys: impl Iterator<Item = K>) -> String
where
    K: Ord + Copy + std::fmt::Display,
{
    let mut min = None;
    let mut max = None;
    let mut count = 0usize;
    for key in keys {
        min = Some(min.map_or(key, |m: K| m.min(key)));
        max = Some(max.map_or(key, |m: K| m.max(key)));
        count += 1;
    }
    let (min, max) = (min.expect("empty batch"), max.expect("empty batch"));
    format!("{table}:{min}:{max}:{count}")
}

/// Applies schema.sql on first run, then checks the stored revision.
struct Schema {
    name: &'static str,
    sql: &'static str,
}

impl Schema {
    fn new(name: &'static str, sql: &'static str) -> Self {
        Self { name, sql }
    }

    async fn init(&self, client: &mut Client) {
        if !self.exists(client).await {
            tracing::debug!("loading {} schema", self.name);
            let pgtx = client.transaction().await.unwrap();
            pgtx.batch_execute(self.sql).await.unwrap();
            pgtx.commit().await.unwrap();
        }
        let qry = format!("select rev_major, rev_minor from {}._rev;", self.name);
        let row = client.query_one(&qry, &[]).await.unwrap();
        let (major, minor): (i32, i32) = (row.get(0), row.get(1));
        if major > 1 || minor > 0 {
            panic!("unsupported {} schema revision {major}.{minor}", self.name);
        }
    }

    async fn exists(&self, client: &Client) -> bool {
        let qry = "
        select exists(
            select schema_name
            from information_schema.schemata
            where schema_name = $1
        );";
        client.query_one(qry, &[&self.name]).await.unwrap().get(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_token() {
        let token = height_token("prices", [5u32, 3, 9, 3].into_iter());
        assert_eq!(token, "prices:3:9:4");
        let token = height_token("blocks", [7u32].into_iter());
        assert_eq!(token, "blocks:7:7:1");
    }

    #[test]
    fn test_height_token_deterministic_across_order() {
        let a = height_token("prices", [1u32, 2, 3].into_iter());
        let b = height_token("prices", [3u32, 1, 2].into_iter());
        assert_eq!(a, b);
    }
}
