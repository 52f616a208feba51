use postgres_from_row::FromRow;
use tokio_postgres::Client;
use tokio_postgres::GenericClient;

use crate::core::types::Height;

#[derive(FromRow)]
struct Checkpoint {
    last_block: i64,
}

pub(super) async fn get(client: &Client, id: &str) -> Option<Height> {
    let qry = "
        select last_block
        from hyw.indexer_state
        where id = $1;";
    client
        .query_opt(qry, &[&id])
        .await
        .unwrap()
        .map(|row| Height::try_from(Checkpoint::from_row(&row).last_block).unwrap())
}

pub(super) async fn upsert(client: &impl GenericClient, id: &str, height: Height) {
    let sql = "
        insert into hyw.indexer_state (id, last_block, updated_at)
        values ($1, $2, $3)
        on conflict (id) do update
        set last_block = EXCLUDED.last_block
            , updated_at = EXCLUDED.updated_at
        ;";
    client
        .execute(
            sql,
            &[
                &id,
                &i64::from(height),
                &time::OffsetDateTime::now_utc(),
            ],
        )
        .await
        .unwrap();
}

pub(super) async fn delete(client: &impl GenericClient, id: &str) {
    client
        .execute("delete from hyw.indexer_state where id = $1;", &[&id])
        .await
        .unwrap();
}
