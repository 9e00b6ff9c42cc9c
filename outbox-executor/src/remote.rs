//! RemoteDispatcher: performs one outbound HTTP call for a leased
//! transaction and surfaces the observed status code or transport error.
//!
//! Every call (including each individual retry attempt) is instrumented the
//! way `remoteClient.tryExecRemoteTransactionInstrumented` wraps the
//! original's single send: an in-flight gauge for the call's lifetime, and
//! a counter/histogram labeled by the observed status code (or `"error"`
//! on transport failure).

use crate::constants::{CONTENT_TYPE_JSON, TRACE_CARRIER_HEADER};
use crate::metrics::{InFlightGuard, Metrics};
use outbox_core::Transaction;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct RemoteDispatcher {
    http: Client,
    metrics: Arc<Metrics>,
}

impl RemoteDispatcher {
    pub fn new(metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, metrics })
    }

    /// Scheme is plain HTTP by design: the target is assumed to live inside
    /// a trust boundary reachable from this process. An HTTPS variant is a
    /// trivial swap of this one function; it is not wired up anywhere.
    fn build_url(host: &str, path: &str) -> String {
        format!("http://{host}{path}")
    }

    #[allow(dead_code)]
    fn build_secure_url(host: &str, path: &str) -> String {
        format!("https://{host}{path}")
    }

    /// Issue one outbound call. Returns the observed HTTP status on any
    /// response, or an error on transport failure (connect refused, DNS
    /// failure, TLS error, timeout).
    pub async fn dispatch(&self, record: &Transaction) -> anyhow::Result<u16> {
        let url = Self::build_url(&record.host, &record.path);
        let method: reqwest::Method = record.method.parse()?;

        let mut req = self.http.request(method, &url);

        if let Some(payload) = &record.payload {
            req = req
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
                .body(payload.clone());
        }

        if !record.trace_carrier.is_empty() {
            req = req.header(TRACE_CARRIER_HEADER, record.trace_carrier.clone());
        }

        let _in_flight = InFlightGuard::new(&self.metrics.dispatch_in_flight);
        let timer = Instant::now();
        let result = req.send().await;
        let elapsed = timer.elapsed();

        match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                self.metrics.observe_dispatch(Some(status), elapsed);
                Ok(status)
            }
            Err(err) => {
                self.metrics.observe_dispatch(None, elapsed);
                Err(err.into())
            }
        }
    }
}
