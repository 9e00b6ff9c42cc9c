//! Executor: owns the fixed pool of workers sharing one store and one
//! remote dispatcher.

use crate::config::ExecutorConfig;
use crate::coordinator::BatchCoordinator;
use crate::metrics::Metrics;
use crate::remote::RemoteDispatcher;
use crate::retry::RetryPolicy;
use crate::worker;
use outbox_core::Store;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Executor {
    store: Arc<dyn Store>,
    cfg: ExecutorConfig,
    metrics: Arc<Metrics>,
}

impl Executor {
    pub fn new(store: Arc<dyn Store>, cfg: ExecutorConfig, metrics: Arc<Metrics>) -> Self {
        Self { store, cfg, metrics }
    }

    /// Spawn `executor_worker_amount` workers and wait for all of them to
    /// exit. Returns once every worker has observed cancellation and
    /// finished its in-flight cycle.
    pub async fn start(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let dispatcher = RemoteDispatcher::new(self.metrics.clone())?;
        let retry = RetryPolicy::new(self.cfg.retry_initial_delay(), self.cfg.retry_max_delay());
        let coordinator = BatchCoordinator::new(
            self.store.clone(),
            dispatcher,
            retry,
            self.cfg.executor_batch_size,
            self.cfg.executor_sender_amount,
        );

        let mut handles = Vec::with_capacity(self.cfg.executor_worker_amount);
        for id in 0..self.cfg.executor_worker_amount {
            let coordinator = coordinator.clone();
            let ctx = ctx.clone();
            let interval = self.cfg.executor_transaction_interval();
            handles.push(tokio::spawn(async move {
                worker::run(coordinator, interval, ctx, id).await;
            }));
        }

        for handle in handles {
            handle.await?;
        }

        Ok(())
    }
}
