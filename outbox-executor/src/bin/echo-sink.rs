//! Standalone HTTP sink used by integration tests and by operators
//! exercising the executor by hand: accepts any request, logs it, and
//! replies with a configurable status code.
//!
//! Rust-idiom equivalent of the reference implementation's `dummy` load
//! target — a minimal collaborator, not part of the core executor.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::any,
    Router,
};
use clap::Parser;
use std::{
    sync::{
        atomic::{AtomicU16, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "ECHO_SINK_PORT", default_value_t = 0)]
    port: u16,

    #[arg(long, env = "ECHO_SINK_STATUS", default_value_t = 200)]
    status: u16,

    /// Artificial delay before responding, in milliseconds. Lets tests
    /// exercise graceful shutdown against a target slow enough to still
    /// have in-flight requests when the executor is cancelled.
    #[arg(long, env = "ECHO_SINK_DELAY_MS", default_value_t = 0)]
    delay_ms: u64,
}

#[derive(Clone)]
struct AppState {
    status: Arc<AtomicU16>,
    delay_ms: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
}

async fn handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let status = state.status.load(Ordering::SeqCst);
    let delay_ms = state.delay_ms.load(Ordering::SeqCst);
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    // Counted only once the delay has elapsed and a response is about to be
    // sent: this is what lets a test assert "no row reached DONE without a
    // matching completed request" for S5-style cancellation scenarios.
    state.completed.fetch_add(1, Ordering::SeqCst);
    tracing::info!(
        event = "echo_sink.request",
        content_length = body.len(),
        has_trace_carrier = headers.contains_key("traceparent"),
        responding_with = status,
        delay_ms,
        "received request"
    );
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

async fn stats_handler(State(state): State<AppState>) -> String {
    state.completed.load(Ordering::SeqCst).to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let state = AppState {
        status: Arc::new(AtomicU16::new(args.status)),
        delay_ms: Arc::new(AtomicU64::new(args.delay_ms)),
        completed: Arc::new(AtomicU64::new(0)),
    };

    let router = Router::new()
        .route("/_stats/completed", axum::routing::get(stats_handler))
        .route("/*path", any(handler))
        .route("/", any(handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    tracing::info!(event = "echo_sink.started", addr = %listener.local_addr()?, "echo sink started");
    axum::serve(listener, router).await?;
    Ok(())
}
