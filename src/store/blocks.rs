use tokio_postgres::types::Type;
use tokio_postgres::Transaction;

use crate::rows::BlockRow;

pub(super) async fn insert_many(pgtx: &Transaction<'_>, rows: &[BlockRow]) {
    let sql = "
        insert into hyw.blocks (block_height, block_timestamp, spec_version)
        values ($1, $2, $3)
        on conflict (block_height) do update
        set block_timestamp = EXCLUDED.block_timestamp
            , spec_version = EXCLUDED.spec_version
        ;";
    let stmt = pgtx
        .prepare_typed(sql, &[Type::INT8, Type::INT8, Type::INT4])
        .await
        .unwrap();
    for r in rows {
        pgtx.execute(
            &stmt,
            &[
                &i64::from(r.block_height),
                &r.block_timestamp,
                &i32::try_from(r.spec_version).unwrap(),
            ],
        )
        .await
        .unwrap();
    }
}
