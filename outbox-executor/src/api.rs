//! EnqueueApi: the HTTP surface that accepts new transactions.

use crate::constants::{ALLOWED_METHODS, INBOUND_TRACE_HEADER};
use crate::metrics::{InFlightGuard, Metrics};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use outbox_core::{NewTransaction, Store};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
    metrics: Arc<Metrics>,
}

#[derive(Debug, Deserialize)]
struct EnqueueRequest {
    host: String,
    path: String,
    method: String,
    payload: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(event = "outbox.enqueue.internal_error", error = %err, "enqueue failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn valid_request(req: &EnqueueRequest) -> Result<String, String> {
    if req.host.trim().is_empty() {
        return Err("host must not be empty".to_string());
    }
    if req.path.trim().is_empty() {
        return Err("path must not be empty".to_string());
    }
    if req.method.trim().is_empty() {
        return Err("method must not be empty".to_string());
    }

    let method = req.method.to_uppercase();
    if !ALLOWED_METHODS.contains(&method.as_str()) {
        return Err(format!("unsupported method {method:?}"));
    }

    Ok(method)
}

/// The validate-then-insert body of the handler, factored out so the outer
/// handler can record request metrics uniformly regardless of which exit
/// path was taken (`?` inside here would otherwise skip instrumentation).
async fn handle_enqueue(
    state: &AppState,
    headers: &HeaderMap,
    req: EnqueueRequest,
) -> ApiResult<()> {
    let method = valid_request(&req).map_err(ApiError::bad_request)?;

    let trace_carrier = headers
        .get(INBOUND_TRACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let record = NewTransaction {
        host: req.host,
        path: req.path,
        method,
        payload: if req.payload.is_empty() {
            None
        } else {
            Some(req.payload)
        },
        trace_carrier,
    };

    let insert = tokio::time::timeout(Duration::from_secs(10), state.store.insert(record)).await;

    match insert {
        Ok(Ok(_id)) => Ok(()),
        Ok(Err(err)) => Err(ApiError::internal(err)),
        Err(_) => Err(ApiError::internal("store insert timed out")),
    }
}

/// `promhttp.InstrumentHandlerInFlight`/`...Duration`/`...Counter`,
/// generalized: in-flight gauge for the call's lifetime, duration and count
/// labeled by the response's own status code.
async fn enqueue_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EnqueueRequest>,
) -> ApiResult<StatusCode> {
    let _in_flight = InFlightGuard::new(&state.metrics.enqueue_in_flight);
    let timer = std::time::Instant::now();

    let result = handle_enqueue(&state, &headers, req).await;

    let status = match &result {
        Ok(()) => StatusCode::OK,
        Err(err) => err.status,
    };
    let code = status.as_u16().to_string();
    state
        .metrics
        .enqueue_duration_seconds
        .with_label_values(&[&code])
        .observe(timer.elapsed().as_secs_f64());
    state
        .metrics
        .enqueue_requests_total
        .with_label_values(&[&code])
        .inc();

    result.map(|()| StatusCode::OK)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics_handler(State(state): State<AppState>) -> ApiResult<String> {
    state.metrics.encode().map_err(ApiError::internal)
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/transactions/enqueue", post(enqueue_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<anyhow::Result<()>>,
}

impl ApiServer {
    pub async fn start(port: u16, store: Arc<dyn Store>, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let state = AppState { store, metrics };
        let router = build_router(state);

        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    wait_shutdown(&mut shutdown_rx).await;
                })
                .await?;
            Ok(())
        });

        tracing::info!(event = "outbox.enqueue.started", %addr, "enqueue api started");
        Ok(Self {
            addr,
            shutdown_tx,
            join,
        })
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown_tx.send(true).ok();
        self.join.await?
    }

    /// Run until `ctx` is cancelled, then shut down gracefully.
    pub async fn run_until_cancelled(self, ctx: CancellationToken) -> anyhow::Result<()> {
        ctx.cancelled().await;
        self.shutdown().await
    }
}

async fn wait_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}
