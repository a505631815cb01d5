#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use server::config::{CliArgs, MAX_CREDENTIAL_SIZE_IN_BYTES, MAX_LIST_SIZE_IN_BYTES, ServerConfig};
use server::fetch::HttpFetcher;
use server::service::handler::{AppState, build_router};
use server::signer::HttpSigner;
use server::telemetry::init_telemetry;
use statuslist_core::StatusLists;
use statuslist_core::store::postgres::PgStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let result = run(config).await;
    if let Err(err) = &result {
        tracing::error!(error = ?err, "service failed");
    }

    providers.shutdown();
    result
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let store = PgStore::connect(&config.database_url, &config.store)
        .await
        .context("failed to connect to postgres")?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("statuslist-server/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout)
        .build()
        .context("failed to build HTTP client")?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        lists: StatusLists::new(Arc::new(store), config.list_size_in_bytes),
        signer: Arc::new(HttpSigner::new(client.clone(), &config.signer_url)),
        fetcher: Arc::new(HttpFetcher::new(client, MAX_CREDENTIAL_SIZE_IN_BYTES)),
        defaults: config.defaults.clone(),
        token_ttl: config.token_ttl,
        request_timeout: config.request_timeout,
        max_remote_list_bytes: MAX_LIST_SIZE_IN_BYTES,
        shutdown: shutdown.clone(),
    });

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    tracing::info!(addr = %config.server_addr, "listening");

    let lists = state.lists.clone();
    let drain = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .with_graceful_shutdown(async move { drain.cancelled().await })
            .await
    });

    let served = tokio::select! {
        res = &mut server => res.context("server task panicked").and_then(|r| r.context("HTTP server error")),
        () = shutdown_signal() => {
            tracing::info!("Shutdown signal received, terminating gracefully...");
            // Cancelling the token also aborts in-flight store work.
            shutdown.cancel();
            match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
                Ok(res) => res.context("server task panicked").and_then(|r| r.context("HTTP server error")),
                Err(_) => {
                    tracing::warn!(timeout_secs = config.shutdown_timeout.as_secs(), "in-flight requests did not drain in time");
                    server.abort();
                    Ok(())
                }
            }
        }
    };

    lists.close().await;
    tracing::info!("Service shut down successfully");
    served
}

// The database URL may carry credentials and is never logged.
fn log_startup_info(config: &ServerConfig) {
    tracing::info!(
        addr = %config.server_addr,
        list_size_in_bytes = config.list_size_in_bytes.get(),
        request_timeout_ms = config.request_timeout.as_millis() as u64,
        signer = %config.signer_url,
        default_host = %config.defaults.host,
        "Starting status list service"
    );
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
