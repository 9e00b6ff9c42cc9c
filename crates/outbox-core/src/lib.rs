//! Shared core abstractions for the outbox executor.
//!
//! This crate defines the storage contract used by the executor binary: the
//! transaction record, its state machine, and the `Store`/`BatchHandle`
//! traits that hide the Postgres-specific row-locking behind an async trait
//! object.
//!
//! # API notes
//! `outbox-core` is an internal crate (`publish = false`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

pub mod postgres;

pub type Result<T> = std::result::Result<T, Error>;

/// Store errors distinguishable by kind, per SPEC_FULL.md §4.1/§9: callers
/// care whether a failure was connectivity loss, malformed data rejected by
/// a constraint, corrupted on-disk state, or something else entirely.
#[derive(Debug)]
pub enum Error {
    /// Connectivity loss: the store could not be reached at all.
    StoreUnavailable(anyhow::Error),
    /// The store rejected the write itself (a constraint violation) —
    /// malformed data that slipped past validation.
    StoreConstraint(anyhow::Error),
    /// A `state` value read back from storage is not one of
    /// `PENDING`/`RETRY`/`DONE`.
    CorruptState(String),
    /// Anything else (decode errors, missing rows, ad hoc failures).
    Other(anyhow::Error),
}

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Other(anyhow::anyhow!(message.into()))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::StoreUnavailable(err) => write!(f, "store unavailable: {err}"),
            Error::StoreConstraint(err) => write!(f, "store constraint violation: {err}"),
            Error::CorruptState(value) => write!(f, "corrupt transaction state {value:?}"),
            Error::Other(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::StoreUnavailable(err) | Error::StoreConstraint(err) | Error::Other(err) => {
                Some(err.as_ref())
            }
            Error::CorruptState(_) => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value)
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            // A rejected write because the data itself was bad (unique,
            // check, FK, not-null violations) — distinct from the store
            // simply being unreachable.
            sqlx::Error::Database(_) => Error::StoreConstraint(anyhow::Error::from(value)),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => {
                Error::StoreUnavailable(anyhow::Error::from(value))
            }
            _ => Error::Other(anyhow::Error::from(value)),
        }
    }
}

/// The three states a transaction row can be in. Closed on purpose: an
/// unrecognized value read back from storage is corruption, not a fourth
/// state to silently tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Retry,
    Done,
}

/// The result of one dispatch attempt as seen by the coordinator: either an
/// HTTP status was observed, or the attempt never concluded (transport
/// error exhausted by retry, or cancellation) and the row is left as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Status(u16),
    Unresolved,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Pending => "PENDING",
            State::Retry => "RETRY",
            State::Done => "DONE",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(State::Pending),
            "RETRY" => Ok(State::Retry),
            "DONE" => Ok(State::Done),
            other => Err(Error::CorruptState(other.to_string())),
        }
    }
}

/// A transaction as read back from the store: everything needed to dispatch
/// it and to report its id back for a state update.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub host: String,
    pub path: String,
    pub method: String,
    pub payload: Option<String>,
    pub state: State,
    pub trace_carrier: String,
}

/// A new transaction to enqueue. `state`/`id`/`created_at` are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub host: String,
    pub path: String,
    pub method: String,
    pub payload: Option<String>,
    pub trace_carrier: String,
}

/// A store transaction that has leased a batch of rows. Every handle must
/// end in exactly one of `commit`/`rollback`.
#[async_trait]
pub trait BatchHandle: Send {
    async fn update_state(&mut self, id: i64, new_state: State) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Relational persistence of transaction records, with row-locking primitives
/// safe for concurrent leasing by independent worker cycles.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ensure_schema(&self) -> Result<()>;

    async fn insert(&self, record: NewTransaction) -> Result<i64>;

    /// Open a store transaction and lease up to `limit` non-DONE rows in
    /// ascending id order, each held under an exclusive lock for the
    /// lifetime of the returned handle. Rows already locked by another
    /// in-flight handle are skipped, never waited on.
    async fn begin_batch(&self, limit: i64) -> Result<(Box<dyn BatchHandle>, Vec<Transaction>)>;

    /// Timestamp recorded at insert time. Exposed for tests asserting on
    /// ordering; not part of the dispatch contract.
    async fn created_at(&self, id: i64) -> Result<DateTime<Utc>>;
}
