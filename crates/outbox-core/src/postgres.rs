//! Postgres-backed implementation of the `Store` contract.
//!
//! Leasing uses `SELECT ... FOR UPDATE SKIP LOCKED` inside one store
//! transaction so concurrent worker cycles never contend for the same row
//! and never wait on a lock held by another cycle.

use crate::{BatchHandle, NewTransaction, Result, State, Store, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id BIGSERIAL NOT NULL,
                host TEXT NOT NULL,
                path TEXT NOT NULL,
                method TEXT NOT NULL,
                payload TEXT NULL,
                state TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                trace_carrier TEXT NOT NULL,
                PRIMARY KEY (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert(&self, record: NewTransaction) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (host, path, method, payload, state, trace_carrier)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&record.host)
        .bind(&record.path)
        .bind(&record.method)
        .bind(&record.payload)
        .bind(State::Pending.as_str())
        .bind(&record.trace_carrier)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    async fn begin_batch(&self, limit: i64) -> Result<(Box<dyn BatchHandle>, Vec<Transaction>)> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, host, path, method, payload, state, trace_carrier
            FROM transactions
            WHERE state != 'DONE'
            ORDER BY id
            FOR UPDATE SKIP LOCKED
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            let state_text: String = row.try_get("state")?;
            transactions.push(Transaction {
                id: row.try_get("id")?,
                host: row.try_get("host")?,
                path: row.try_get("path")?,
                method: row.try_get("method")?,
                payload: row.try_get("payload")?,
                state: state_text.parse()?,
                trace_carrier: row.try_get("trace_carrier")?,
            });
        }

        let handle: Box<dyn BatchHandle> = Box::new(PgBatchHandle { tx: Some(tx) });
        Ok((handle, transactions))
    }

    async fn created_at(&self, id: i64) -> Result<DateTime<Utc>> {
        let row = sqlx::query("SELECT created_at FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("created_at")?)
    }
}

/// Holds the open transaction for one leased batch. `tx` is `Option` only
/// because `commit`/`rollback` consume the inner `sqlx::Transaction` by
/// value; every code path that constructs this handle ends in exactly one
/// of the two.
struct PgBatchHandle {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

#[async_trait]
impl BatchHandle for PgBatchHandle {
    async fn update_state(&mut self, id: i64, new_state: State) -> Result<()> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| crate::Error::msg("batch handle already finalized"))?;

        sqlx::query("UPDATE transactions SET state = $2 WHERE id = $1")
            .bind(id)
            .bind(new_state.as_str())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| crate::Error::msg("batch handle already finalized"))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| crate::Error::msg("batch handle already finalized"))?;
        tx.rollback().await?;
        Ok(())
    }
}
