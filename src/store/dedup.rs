use tokio_postgres::Transaction;

/// Claim a batch token. Returns false when the token is already present,
/// i.e. the batch was applied by a previous attempt.
pub(super) async fn claim(pgtx: &Transaction<'_>, token: &str) -> bool {
    let sql = "
        insert into hyw.dedup_log (token)
        values ($1)
        on conflict (token) do nothing
        ;";
    pgtx.execute(sql, &[&token]).await.unwrap() == 1
}
