use tokio_postgres::types::Type;
use tokio_postgres::Transaction;

use crate::rows::AssetRow;

pub(super) async fn insert_many(pgtx: &Transaction<'_>, rows: &[AssetRow]) {
    let sql = "
        insert into hyw.assets (asset_id, symbol, name, decimals)
        values ($1, $2, $3, $4)
        on conflict (asset_id) do update
        set symbol = EXCLUDED.symbol
            , name = EXCLUDED.name
            , decimals = EXCLUDED.decimals
        ;";
    let stmt = pgtx
        .prepare_typed(sql, &[Type::INT8, Type::TEXT, Type::TEXT, Type::INT2])
        .await
        .unwrap();
    for r in rows {
        pgtx.execute(
            &stmt,
            &[
                &i64::from(r.asset_id),
                &r.symbol,
                &r.name,
                &i16::from(r.decimals),
            ],
        )
        .await
        .unwrap();
    }
}
