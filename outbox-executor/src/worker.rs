//! Worker: ticks on an interval, invoking the `BatchCoordinator` once per
//! tick. Cycle errors are logged, never fatal to the worker; the worker
//! exits once the cancellation token fires, after letting any in-flight
//! cycle finish.

use crate::coordinator::BatchCoordinator;
use tokio_util::sync::CancellationToken;

pub async fn run(coordinator: BatchCoordinator, interval: std::time::Duration, ctx: CancellationToken, id: usize) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(event = "outbox.worker.started", worker_id = id, "worker started");

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                tracing::info!(event = "outbox.worker.shutdown", worker_id = id, "worker shutting down");
                return;
            }
            _ = ticker.tick() => {
                if let Err(err) = coordinator.run_cycle(&ctx).await {
                    tracing::error!(
                        event = "outbox.worker.cycle.error",
                        worker_id = id,
                        error = %err,
                        "encountered error while trying to execute a transaction batch"
                    );
                }
            }
        }
    }
}
