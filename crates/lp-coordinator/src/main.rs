//! live-poll Coordinator Daemon
//!
//! Serves one classroom poll session over WebSocket (and optionally
//! line-delimited TCP).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lp_coordinator::server::{self, AppState};
use lp_coordinator::{Coordinator, TcpTransport};
use lp_core::config::{self, ServerConfig};

#[derive(Parser)]
#[command(name = "lp-coordinator")]
#[command(about = "live-poll session coordinator daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "LP_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP/WebSocket bind address (overrides config)
    #[arg(short, long, env = "LP_BIND")]
    bind: Option<String>,

    /// Line-delimited TCP bind address (overrides config)
    #[arg(long)]
    tcp_bind: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("live-poll coordinator starting...");

    // Load configuration
    let mut config: ServerConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                ServerConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            ServerConfig::default()
        }
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(tcp_bind) = args.tcp_bind {
        config.tcp_bind_address = Some(tcp_bind);
    }
    config.validate().context("Invalid configuration")?;

    if config.poll.strict_poll_id {
        tracing::info!("Strict poll ID checking enabled");
    }
    if config.poll.close_on_presenter_disconnect {
        tracing::info!("Polls close when the presenter disconnects");
    }

    let config = Arc::new(config);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    // Spawn the coordinator loop
    let (coordinator, coordinator_task) =
        Coordinator::spawn(config.poll.clone(), config.inbox_capacity, cancel.clone());

    // Optional TCP transport
    if let Some(tcp_address) = config.tcp_bind_address.clone() {
        let transport = TcpTransport::new(
            coordinator.clone(),
            config.outbound_queue_capacity,
            cancel.clone(),
        );
        let cancel_tcp = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.run(&tcp_address).await {
                tracing::error!("TCP transport failed: {:#}", e);
                cancel_tcp.cancel();
            }
        });
    }

    // HTTP / WebSocket transport
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    tracing::info!("Listening on http://{} (WebSocket at /ws)", listener.local_addr()?);

    let state = AppState::new(coordinator, Arc::clone(&config), cancel.clone());
    server::serve(listener, state)
        .await
        .context("HTTP server error")?;

    cancel.cancel();
    if let Err(e) = coordinator_task.await {
        tracing::warn!("Coordinator task ended abnormally: {}", e);
    }

    tracing::info!("Coordinator shutdown complete");
    Ok(())
}
