//! The per-block pipeline and the batch-driving run loops.
//!
//! Blocks are strictly sequential: cache update, change detection, state
//! read, price resolution, volume extraction, merge, buffer. Batches come
//! from the block source; flushed rows advance the checkpoint only up to
//! the finalized head.

use tokio::time::timeout;
use tokio::time::Duration;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::changes;
use crate::constants::checkpoints;
use crate::constants::settings::FLUSH_THRESHOLD;
use crate::constants::settings::SHUTDOWN_TIMEOUT_SECS;
use crate::core::types::Block;
use crate::core::types::Head;
use crate::core::types::Height;
use crate::core::types::SpecVersion;
use crate::pools;
use crate::pools::accounts::StableswapAccounts;
use crate::pools::cache::PoolCache;
use crate::prices::resolver;
use crate::prices::PriceMap;
use crate::registry::RegistryTracker;
use crate::rows;
use crate::rows::AssetRow;
use crate::rows::BlockRow;
use crate::rows::PriceRow;
use crate::rows::RuntimeUpgradeRow;
use crate::source::BlockSource;
use crate::source::ChainStorage;
use crate::store::Store;
use crate::volumes;

/// Everything one block produces.
#[derive(Debug)]
pub struct BlockOutput {
    pub block_row: BlockRow,
    pub upgrade_row: Option<RuntimeUpgradeRow>,
    pub price_rows: Vec<PriceRow>,
    pub asset_rows: Vec<AssetRow>,
    pub carried_forward: bool,
}

pub struct Pipeline<S> {
    storage: S,
    pools: PoolCache,
    stableswap_accounts: StableswapAccounts,
    registry: RegistryTracker,
    last_prices: Option<PriceMap>,
    prev_spec_version: Option<SpecVersion>,
    parent: Option<Head>,
}

impl<S: ChainStorage> Pipeline<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            pools: PoolCache::new(),
            stableswap_accounts: StableswapAccounts::new(),
            registry: RegistryTracker::new(),
            last_prices: None,
            prev_spec_version: None,
            parent: None,
        }
    }

    /// Forget the last seen head. Called at batch boundaries so a gap
    /// between batches is not reported as a broken parent link.
    pub fn reset_parent_tracking(&mut self) {
        self.parent = None;
    }

    pub async fn process_block(&mut self, block: &Block, live: bool) -> BlockOutput {
        let head = block.head();
        self.check_parent(block);

        // Runtime upgrades can reshape pool storage without any events.
        let mut upgrade_row = None;
        if let Some(prev) = self.prev_spec_version {
            if prev != block.spec_version {
                info!(
                    height = block.height,
                    from = prev,
                    to = block.spec_version,
                    "runtime upgrade"
                );
                self.pools.invalidate_all();
                upgrade_row = Some(RuntimeUpgradeRow {
                    block_height: block.height,
                    spec_version: block.spec_version,
                    prev_spec_version: prev,
                });
            }
        }
        self.prev_spec_version = Some(block.spec_version);

        // After an upgrade the composition is unknown until re-bootstrapped,
        // so the block cannot carry forward.
        let composition_changed =
            self.pools.process_events(&block.events) || upgrade_row.is_some();
        let sudo_write = changes::has_pool_storage_write(&block.calls);
        if sudo_write {
            warn!(height = block.height, "pool storage written via sudo");
            self.pools.invalidate_all();
        }

        let asset_rows = if self.registry.due(block.height, live) {
            self.registry.scan(&self.storage, &head).await
        } else {
            vec![]
        };

        let pool_accounts =
            changes::known_pool_accounts(&self.pools, &mut self.stableswap_accounts);
        let full = changes::requires_full_processing(
            block,
            composition_changed,
            sudo_write,
            self.last_prices.is_some(),
            &pool_accounts,
        );

        let price_rows = if full {
            let states = pools::state::read_pool_states(
                &self.storage,
                &head,
                &mut self.pools,
                &mut self.stableswap_accounts,
            )
            .await;
            let prices = resolver::resolve(&states, &self.registry);
            let swaps = volumes::extract_swaps(&block.events);
            let totals = volumes::aggregate_volumes(&swaps, &prices, &self.registry);
            let rows = rows::merge_price_and_volume_rows(block.height, &prices, &totals);
            self.last_prices = Some(prices);
            rows
        } else {
            trace!(height = block.height, "carry-forward block");
            vec![]
        };

        BlockOutput {
            block_row: BlockRow {
                block_height: block.height,
                block_timestamp: block.timestamp / 1000,
                spec_version: block.spec_version,
            },
            upgrade_row,
            price_rows,
            asset_rows,
            carried_forward: !full,
        }
    }

    /// Volume-only processing against prices loaded from the store.
    pub async fn replay_block(&mut self, block: &Block, store: &Store, live: bool) -> BlockOutput {
        let head = block.head();
        self.check_parent(block);
        self.prev_spec_version = Some(block.spec_version);

        // Scans keep decimals available; replay does not rewrite assets.
        if self.registry.due(block.height, live) {
            self.registry.scan(&self.storage, &head).await;
        }

        let swaps = volumes::extract_swaps(&block.events);
        let price_rows = if swaps.is_empty() {
            vec![]
        } else {
            let prices = store.price_map_at(block.height).await;
            let totals = volumes::aggregate_volumes(&swaps, &prices, &self.registry);
            rows::volume_rows(block.height, &prices, &totals)
        };
        let carried_forward = price_rows.is_empty();

        BlockOutput {
            block_row: BlockRow {
                block_height: block.height,
                block_timestamp: block.timestamp / 1000,
                spec_version: block.spec_version,
            },
            upgrade_row: None,
            price_rows,
            asset_rows: vec![],
            carried_forward,
        }
    }

    fn check_parent(&mut self, block: &Block) {
        if let Some(parent) = &self.parent {
            if parent.height + 1 != block.height || parent.hash != block.parent_hash {
                warn!(
                    height = block.height,
                    parent = %block.parent_hash,
                    last = %parent.hash,
                    "parent hash mismatch within batch"
                );
            }
        }
        self.parent = Some(block.head());
    }
}

pub struct RunOpts {
    pub to_block: Option<Height>,
    pub replay: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Reached the requested target block.
    Completed,
    /// Shut down on an interrupt signal after a final flush.
    Interrupted,
}

/// Drive the pipeline until the target block is reached or a shutdown
/// signal arrives. The caller wires the block source to start one past the
/// checkpoint.
pub async fn run<B, S>(
    source: &mut B,
    storage: S,
    store: &mut Store,
    opts: RunOpts,
) -> Result<RunOutcome, crate::source::SourceError>
where
    B: BlockSource,
    S: ChainStorage,
{
    let checkpoint_id = if opts.replay {
        checkpoints::REPLAY
    } else {
        checkpoints::MAIN
    };
    let mut pipeline = Pipeline::new(storage);
    let mut checkpointed = store.get_checkpoint(checkpoint_id).await;
    let mut finalized: Option<Height> = None;
    let mut flushed: Option<Height> = None;

    loop {
        let batch = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, flushing");
                shutdown_flush(store, checkpoint_id, &mut checkpointed, finalized, flushed).await;
                return Ok(RunOutcome::Interrupted);
            }
            batch = source.next_batch() => batch?,
        };
        if batch.blocks.is_empty() {
            continue;
        }
        finalized = Some(batch.finalized_head.height);
        pipeline.reset_parent_tracking();

        // At the tip, registry snapshots tighten up.
        let live = batch
            .blocks
            .last()
            .map_or(false, |b| b.height >= batch.finalized_head.height);

        let mut done = false;
        let mut processed: Option<Height> = None;
        for block in &batch.blocks {
            if opts.to_block.map_or(false, |target| block.height > target) {
                done = true;
                break;
            }
            let output = if opts.replay {
                pipeline.replay_block(block, store, live).await
            } else {
                pipeline.process_block(block, live).await
            };
            stage_output(store, output, opts.replay);
            processed = Some(block.height);

            if store.buffered() >= FLUSH_THRESHOLD {
                store.flush().await;
                flushed = processed;
                advance_checkpoint(store, checkpoint_id, &mut checkpointed, finalized, flushed)
                    .await;
            }
            if opts.to_block == Some(block.height) {
                done = true;
                break;
            }
        }

        store.flush().await;
        if processed.is_some() {
            flushed = processed;
        }
        advance_checkpoint(store, checkpoint_id, &mut checkpointed, finalized, flushed).await;

        if done {
            info!("reached target block, stopping");
            return Ok(RunOutcome::Completed);
        }
    }
}

fn stage_output(store: &mut Store, output: BlockOutput, replay: bool) {
    // The replay pass only touches volume rows.
    if !replay {
        store.stage_block(output.block_row);
        if let Some(row) = output.upgrade_row {
            store.stage_upgrade(row);
        }
        store.stage_assets(output.asset_rows);
    }
    store.stage_prices(output.price_rows);
}

/// Checkpoint the highest flushed height that is known finalized.
async fn advance_checkpoint(
    store: &mut Store,
    id: &str,
    checkpointed: &mut Option<Height>,
    finalized: Option<Height>,
    flushed: Option<Height>,
) {
    let (Some(finalized), Some(flushed)) = (finalized, flushed) else {
        return;
    };
    let target = finalized.min(flushed);
    if checkpointed.map_or(true, |current| target > current) {
        store.set_checkpoint(id, target).await;
        *checkpointed = Some(target);
        trace!(id, height = target, "checkpoint advanced");
    }
}

async fn shutdown_flush(
    store: &mut Store,
    id: &str,
    checkpointed: &mut Option<Height>,
    finalized: Option<Height>,
    flushed: Option<Height>,
) {
    let result = timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), async {
        store.flush().await;
        advance_checkpoint(store, id, checkpointed, finalized, flushed).await;
    })
    .await;
    if result.is_err() {
        warn!("shutdown flush timed out");
    }
}
