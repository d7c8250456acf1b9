//! Chess puzzle service (cpn-puzzle) - Main entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cpn_puzzle::clients::{ChatCompletionClient, HuggingFaceClient, LichessClient};
use cpn_puzzle::config::ServiceConfig;
use cpn_puzzle::services::{
    Capability, CompletionProvider, DatasetProvider, PuzzleService, RecencyTracker,
};
use cpn_puzzle::{build_router, AppState};

/// Command-line arguments for cpn-puzzle
#[derive(Parser, Debug)]
#[command(name = "cpn-puzzle")]
#[command(about = "Chess puzzle retrieval service")]
#[command(version)]
struct Args {
    /// Config file path (overrides CPN_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cpn_puzzle={0},cpn_common={0},tower_http=info", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting CPN Puzzle Service (cpn-puzzle) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let service = build_service(&config)?;
    let report = service.capabilities();
    info!(
        lichess_token = report.lichess_token,
        dataset = report.dataset,
        completion = report.completion,
        fallback_models = report.fallback_models,
        recency_window = service.recency().window(),
        "Puzzle service initialized"
    );
    if !report.completion {
        warn!("Completion model not configured; /puzzle/ai and /puzzle/generate will return 503");
    }

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        Arc::new(service),
        shutdown.clone(),
        Duration::from_secs(config.server.request_timeout_secs),
    );
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.server.bind, config.server.port))?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_service(config: &ServiceConfig) -> Result<PuzzleService> {
    let lichess = LichessClient::new(&config.lichess).context("Failed to build Lichess client")?;

    let dataset: Capability<dyn DatasetProvider> = if config.dataset.enabled {
        let client = HuggingFaceClient::new(&config.dataset).context("Failed to build dataset client")?;
        Capability::Configured(Arc::new(client))
    } else {
        info!("Dataset source disabled");
        Capability::Unconfigured
    };

    let completion_client =
        ChatCompletionClient::new(&config.completion).context("Failed to build completion client")?;
    let completion = Capability::<dyn CompletionProvider>::completion(Arc::new(completion_client));

    Ok(
        PuzzleService::new(Arc::new(lichess), RecencyTracker::new(config.recency.window))
            .with_dataset(dataset)
            .with_completion(completion, config.completion.fallback_models.clone()),
    )
}

/// Wait for Ctrl+C or SIGTERM, then cancel in-flight requests
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}
