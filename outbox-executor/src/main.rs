use anyhow::Context;
use clap::{Parser, Subcommand};
use outbox_executor::{
    api::ApiServer, bootstrap, config::ExecutorConfig, enqueue, executor::Executor, metrics::Metrics,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "outbox-executor")]
#[command(about = "Durable HTTP call dispatcher (transactional outbox)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the transactions table if it does not exist yet.
    Migrate,

    /// Run the enqueue API and the executor worker pool together.
    Run,

    /// Submit a single transaction against a running enqueue API.
    EnqueueOnce {
        #[arg(long)]
        enqueue_url: String,
        #[arg(long)]
        host: String,
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "POST")]
        method: String,
        #[arg(long, default_value = "")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = ExecutorConfig::from_env().context("load executor config")?;

    match cli.command {
        Command::Migrate => {
            bootstrap::run(&cfg).await?;
            Ok(())
        }
        Command::Run => run(cfg).await,
        Command::EnqueueOnce {
            enqueue_url,
            host,
            path,
            method,
            payload,
        } => enqueue::run(&enqueue_url, &host, &path, &method, &payload).await,
    }
}

async fn run(cfg: ExecutorConfig) -> anyhow::Result<()> {
    let store = bootstrap::run(&cfg).await?;
    let store: Arc<dyn outbox_core::Store> = Arc::new(store);
    let metrics = Arc::new(Metrics::new().context("initialize metrics")?);

    let ctx = CancellationToken::new();
    let api = ApiServer::start(cfg.enqueue_port, store.clone(), metrics.clone()).await?;
    let executor = Executor::new(store, cfg, metrics);

    let api_ctx = ctx.clone();
    let api_task = tokio::spawn(async move { api.run_until_cancelled(api_ctx).await });
    let executor_task = tokio::spawn({
        let ctx = ctx.clone();
        async move { executor.start(ctx).await }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(event = "outbox.main.shutdown_signal", "shutdown requested");
        }
    }
    ctx.cancel();

    let (api_res, executor_res) = tokio::join!(api_task, executor_task);
    api_res??;
    executor_res??;
    Ok(())
}
