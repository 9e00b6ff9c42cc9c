//! BatchCoordinator: runs one executor cycle — lease a batch, fan out to
//! sender tasks, collect responses, update state, commit or roll back.

use crate::remote::RemoteDispatcher;
use crate::retry::RetryPolicy;
use outbox_core::{DispatchOutcome, State, Store, Transaction};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct BatchCoordinator {
    store: Arc<dyn Store>,
    dispatcher: RemoteDispatcher,
    retry: RetryPolicy,
    batch_size: i64,
    sender_amount: usize,
}

impl BatchCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: RemoteDispatcher,
        retry: RetryPolicy,
        batch_size: i64,
        sender_amount: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            retry,
            batch_size,
            sender_amount,
        }
    }

    /// Run one cycle to completion. Errors here are the worker's cue to log
    /// and keep ticking, not to die; cancellation during the cycle is not an
    /// error, it just bounds how much of the leased batch gets resolved.
    pub async fn run_cycle(&self, ctx: &CancellationToken) -> anyhow::Result<()> {
        let (mut handle, transactions) = self.store.begin_batch(self.batch_size).await?;

        if transactions.is_empty() {
            handle.commit().await?;
            return Ok(());
        }

        let leased_count = transactions.len();
        tracing::debug!(
            event = "outbox.coordinator.leased",
            count = leased_count,
            "leased batch"
        );

        let (work_tx, work_rx) = mpsc::channel::<Transaction>(leased_count);
        let (resp_tx, mut resp_rx) = mpsc::channel::<(i64, DispatchOutcome)>(leased_count);

        for t in transactions {
            // Channel capacity equals leased_count; this never blocks.
            work_tx.send(t).await.ok();
        }
        drop(work_tx);

        let work_rx = Arc::new(tokio::sync::Mutex::new(work_rx));
        let mut senders = Vec::with_capacity(self.sender_amount);
        for _ in 0..self.sender_amount {
            let work_rx = work_rx.clone();
            let resp_tx = resp_tx.clone();
            let dispatcher = self.dispatcher.clone();
            let retry = self.retry.clone();
            let ctx = ctx.clone();
            senders.push(tokio::spawn(async move {
                loop {
                    if ctx.is_cancelled() {
                        return;
                    }
                    let next = work_rx.lock().await.recv().await;
                    let Some(record) = next else {
                        return;
                    };

                    let outcome = retry.dispatch(&dispatcher, &record, &ctx).await;
                    if resp_tx.send((record.id, outcome)).await.is_err() {
                        return;
                    }
                }
            }));
        }
        drop(resp_tx);

        for sender in senders {
            sender.await.ok();
        }

        let mut resolved = 0usize;
        for _ in 0..leased_count {
            // Senders stop producing once cancelled, closing this channel
            // once drained; `recv` returning `None` here means "nothing
            // more will ever arrive", which is the expected outcome of a
            // cycle cut short by cancellation, not an error.
            let Some((id, outcome)) = resp_rx.recv().await else {
                tracing::warn!(
                    event = "outbox.coordinator.cancelled",
                    resolved,
                    leased_count,
                    "cycle ended early, committing partial progress"
                );
                break;
            };

            match outcome {
                DispatchOutcome::Unresolved => {
                    continue;
                }
                DispatchOutcome::Status(500) => {
                    if let Err(err) = handle.update_state(id, State::Retry).await {
                        handle.rollback().await.ok();
                        return Err(err.into());
                    }
                }
                DispatchOutcome::Status(_) => {
                    if let Err(err) = handle.update_state(id, State::Done).await {
                        handle.rollback().await.ok();
                        return Err(err.into());
                    }
                }
            }
            resolved += 1;
        }

        handle.commit().await?;
        tracing::debug!(
            event = "outbox.coordinator.committed",
            resolved,
            leased_count,
            "cycle committed"
        );
        Ok(())
    }
}
