mod cli;
mod server;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::Parser;
use eyre::{eyre, WrapErr};

use txrecon_core::providers::{DragonglassClient, HgraphClient};
use txrecon_core::{Reconciler, TxFilter};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    if args.upstream_timeout_secs == 0 {
        return Err(eyre!("--upstream-timeout-secs must be at least 1"));
    }
    let timeout = Duration::from_secs(args.upstream_timeout_secs);

    let explorer = DragonglassClient::new(&args.dragonglass_url, timeout)
        .context("configure explorer client")?;
    let indexer_limit = (args.hgraph_limit > 0).then_some(args.hgraph_limit);
    let indexer = HgraphClient::new(&args.hgraph_url, timeout, indexer_limit)
        .context("configure indexer client")?;

    tracing::info!(
        dragonglass = %explorer.url(),
        hgraph = %indexer.url(),
        timeout_secs = args.upstream_timeout_secs,
        hgraph_limit = ?indexer_limit,
        "configured upstream providers"
    );

    let allowed_origins = args
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .wrap_err_with(|| format!("invalid --cors-origin `{origin}`"))
        })
        .collect::<eyre::Result<Vec<_>>>()?;

    let state = server::AppState {
        reconciler: Arc::new(Reconciler::new(
            Arc::new(explorer),
            Arc::new(indexer),
            timeout,
        )),
        dashboard_filter: TxFilter::new(
            args.dashboard_payer_id,
            args.dashboard_query.clone(),
            args.dashboard_account_from,
        ),
        expose_error_details: args.expose_error_details,
    };
    let router = server::build_router(state, allowed_origins);

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and reachable from the network");
    }

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("run HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
