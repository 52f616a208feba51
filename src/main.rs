use std::env;

use clap::Parser;

use hyw::config::Config;
use hyw::constants::checkpoints;
use hyw::pipeline;
use hyw::pipeline::RunOpts;
use hyw::pipeline::RunOutcome;
use hyw::source::gateway::Gateway;
use hyw::store::Store;

#[derive(Parser, Debug)]
#[command(version, about = "Hydration USDT price and volume indexer", long_about = None)]
struct Cli {
    /// Start at this block, ignoring the stored checkpoint
    #[arg(long, value_name = "HEIGHT")]
    from_block: Option<u32>,

    /// Stop after processing this block
    #[arg(long, value_name = "HEIGHT")]
    to_block: Option<u32>,

    /// Delete all rows at and above this height, reset the checkpoint and exit
    #[arg(long, value_name = "HEIGHT")]
    rollback_to_block: Option<u32>,

    /// Report missing heights in the prices table and exit
    #[arg(long)]
    detect_gaps: bool,

    /// Recompute volumes only, converting with prices already in the store
    #[arg(long)]
    replay_volumes: bool,
}

#[tokio::main]
async fn main() {
    let level = match env::var("HYW_LOG_DEBUG") {
        Ok(_) => tracing::Level::DEBUG,
        _ => tracing::Level::INFO,
    };
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_max_level(level)
        .finish();
    let _guard = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("starting HyW {}", env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };
    let mut store = Store::new(&config.postgres_uri).await;

    if let Some(height) = cli.rollback_to_block {
        store.rollback_to(height).await;
        tracing::info!(height, "rollback complete");
        return;
    }

    if cli.detect_gaps {
        let gaps = store.detect_gaps().await;
        if gaps.is_empty() {
            tracing::info!("no gaps found");
        }
        for (from, to) in gaps {
            tracing::warn!(from, to, "gap in prices table");
        }
        return;
    }

    let checkpoint_id = if cli.replay_volumes {
        checkpoints::REPLAY
    } else {
        checkpoints::MAIN
    };
    let start = match cli.from_block {
        Some(height) => {
            tracing::info!(height, "found option `--from-block`, ignoring checkpoint");
            height
        }
        None => store
            .get_checkpoint(checkpoint_id)
            .await
            .map_or(0, |h| h + 1),
    };
    tracing::info!(start, "resuming");

    let gateway = Gateway::new(&config.gateway_url);
    let mut stream = gateway.stream(start);
    let opts = RunOpts {
        to_block: cli.to_block,
        replay: cli.replay_volumes,
    };
    match pipeline::run(&mut stream, gateway.clone(), &mut store, opts).await {
        Ok(RunOutcome::Completed) => tracing::info!("done"),
        Ok(RunOutcome::Interrupted) => {
            tracing::info!("exiting on interrupt");
            std::process::exit(130);
        }
        Err(e) => {
            tracing::error!("fatal: {e}");
            std::process::exit(1);
        }
    }
}
