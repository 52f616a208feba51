use postgres_from_row::FromRow;
use rust_decimal::Decimal;
use tokio_postgres::types::Type;
use tokio_postgres::Client;
use tokio_postgres::Transaction;

use crate::core::types::AssetId;
use crate::core::types::Height;
use crate::prices::fixed::UsdtValue;
use crate::prices::PriceMap;
use crate::rows::PriceRow;

pub(super) async fn insert_many(pgtx: &Transaction<'_>, rows: &[PriceRow]) {
    let sql = "
        insert into hyw.prices (
            asset_id,
            block_height,
            usdt_price,
            native_volume_buy,
            native_volume_sell,
            usdt_volume_buy,
            usdt_volume_sell
        )
        values ($1, $2, $3, $4, $5, $6, $7)
        on conflict (asset_id, block_height) do update
        set usdt_price = EXCLUDED.usdt_price
            , native_volume_buy = EXCLUDED.native_volume_buy
            , native_volume_sell = EXCLUDED.native_volume_sell
            , usdt_volume_buy = EXCLUDED.usdt_volume_buy
            , usdt_volume_sell = EXCLUDED.usdt_volume_sell
        ;";
    let stmt = pgtx
        .prepare_typed(
            sql,
            &[
                Type::INT8,
                Type::INT8,
                Type::NUMERIC,
                Type::TEXT,
                Type::TEXT,
                Type::NUMERIC,
                Type::NUMERIC,
            ],
        )
        .await
        .unwrap();
    for r in rows {
        pgtx.execute(
            &stmt,
            &[
                &i64::from(r.asset_id),
                &i64::from(r.block_height),
                &r.usdt_price.to_decimal(),
                &r.native_volume_buy.to_string(),
                &r.native_volume_sell.to_string(),
                &r.usdt_volume_buy.to_decimal(),
                &r.usdt_volume_sell.to_decimal(),
            ],
        )
        .await
        .unwrap();
    }
}

#[derive(FromRow)]
struct StoredPrice {
    asset_id: i64,
    usdt_price: Decimal,
}

/// Latest non-zero price per asset at or below `height`.
pub(super) async fn get_map_at(client: &Client, height: Height) -> PriceMap {
    let qry = "
        select distinct on (asset_id)
            asset_id
            , usdt_price
        from hyw.prices
        where block_height <= $1 and usdt_price > 0
        order by asset_id, block_height desc;";
    client
        .query(qry, &[&i64::from(height)])
        .await
        .unwrap()
        .iter()
        .map(|row| {
            let stored = StoredPrice::from_row(row);
            (
                AssetId::try_from(stored.asset_id).unwrap(),
                UsdtValue::from_decimal(stored.usdt_price),
            )
        })
        .collect()
}
