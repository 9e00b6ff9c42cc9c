use anyhow::Context;
use outbox_core::postgres::PgStore;
use sqlx::postgres::PgPoolOptions;

use crate::config::ExecutorConfig;

/// Connect to the store and ensure its schema exists.
///
/// Implemented standalone (rather than inline in `main`) so the `migrate`
/// subcommand can verify connectivity and create the table without starting
/// the API or executor.
pub async fn run(cfg: &ExecutorConfig) -> anyhow::Result<PgStore> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await
        .context("connect outbox store")?;

    let store = PgStore::new(pool);
    outbox_core::Store::ensure_schema(&store)
        .await
        .context("ensure transactions schema")?;

    tracing::info!(event = "outbox.bootstrap.ready", "schema ready");
    Ok(store)
}
