use tokio_postgres::types::Type;
use tokio_postgres::Transaction;

use crate::rows::RuntimeUpgradeRow;

pub(super) async fn insert_many(pgtx: &Transaction<'_>, rows: &[RuntimeUpgradeRow]) {
    let sql = "
        insert into hyw.runtime_upgrades (block_height, spec_version, prev_spec_version)
        values ($1, $2, $3)
        on conflict (block_height) do nothing
        ;";
    let stmt = pgtx
        .prepare_typed(sql, &[Type::INT8, Type::INT4, Type::INT4])
        .await
        .unwrap();
    for r in rows {
        pgtx.execute(
            &stmt,
            &[
                &i64::from(r.block_height),
                &i32::try_from(r.spec_version).unwrap(),
                &i32::try_from(r.prev_spec_version).unwrap(),
            ],
        )
        .await
        .unwrap();
    }
}
