//! RetryPolicy: wraps `RemoteDispatcher::dispatch` with exponential backoff
//! on transport errors. HTTP responses, including 5xx, are never retried
//! here; they are surfaced as-is so the coordinator can map them to a
//! terminal store state.

use crate::remote::RemoteDispatcher;
use outbox_core::{DispatchOutcome, Transaction};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    /// Retry `dispatcher.dispatch` until it succeeds at the transport level
    /// or `ctx` is cancelled. Delay doubles each attempt starting from
    /// `initial_delay`, capped at `max_delay`.
    pub async fn dispatch(
        &self,
        dispatcher: &RemoteDispatcher,
        record: &Transaction,
        ctx: &CancellationToken,
    ) -> DispatchOutcome {
        let mut delay = self.initial_delay;

        loop {
            if ctx.is_cancelled() {
                return DispatchOutcome::Unresolved;
            }

            let attempt = tokio::select! {
                _ = ctx.cancelled() => return DispatchOutcome::Unresolved,
                result = dispatcher.dispatch(record) => result,
            };

            match attempt {
                Ok(status) => return DispatchOutcome::Status(status),
                Err(err) => {
                    tracing::warn!(
                        event = "outbox.remote.transport_error",
                        id = record.id,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "failed to send transaction, retrying"
                    );

                    tokio::select! {
                        _ = ctx.cancelled() => return DispatchOutcome::Unresolved,
                        _ = tokio::time::sleep(delay) => {}
                    }

                    delay = (delay * 2).min(self.max_delay);
                }
            }
        }
    }
}
