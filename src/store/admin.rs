use itertools::Itertools;
use tokio_postgres::Client;

use crate::constants::checkpoints;
use crate::core::types::Height;

use super::state;

/// Delete all rows at `height` and above, then rebuild the candle views
/// and reset the main checkpoint below the deleted range.
pub(super) async fn rollback_to(client: &mut Client, height: Height) {
    tracing::info!(height, "rolling back store");
    let floor = i64::from(height);

    let pgtx = client.transaction().await.unwrap();
    let n = pgtx
        .execute("delete from hyw.prices where block_height >= $1;", &[&floor])
        .await
        .unwrap();
    tracing::info!(rows = n, "deleted price rows");
    pgtx.execute("delete from hyw.blocks where block_height >= $1;", &[&floor])
        .await
        .unwrap();
    pgtx.execute(
        "delete from hyw.runtime_upgrades where block_height >= $1;",
        &[&floor],
    )
    .await
    .unwrap();
    if height == 0 {
        state::delete(&pgtx, checkpoints::MAIN).await;
    } else {
        state::upsert(&pgtx, checkpoints::MAIN, height - 1).await;
    }
    pgtx.commit().await.unwrap();

    // Candles covering the deleted range are rebuilt from what remains.
    super::refresh_candles(client).await;
}

/// Ranges of heights missing from the prices table.
pub(super) async fn detect_gaps(client: &Client) -> Vec<(Height, Height)> {
    let qry = "
        select distinct block_height
        from hyw.prices
        order by 1;";
    let heights: Vec<i64> = client
        .query(qry, &[])
        .await
        .unwrap()
        .iter()
        .map(|row| row.get(0))
        .collect();

    heights
        .iter()
        .tuple_windows()
        .filter(|(current, next)| *next - *current > 1)
        .map(|(current, next)| {
            (
                Height::try_from(current + 1).unwrap(),
                Height::try_from(next - 1).unwrap(),
            )
        })
        .collect()
}
