use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use livecart_core::config::LivecartConfig;
use livecart_gateway::app::{build_router, AppState};
use livecart_store::SqliteRepository;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "livecart-gateway", version, about = "Live-shopping realtime gateway")]
struct Cli {
    /// Path to livecart.toml (defaults to $LIVECART_CONFIG, then ~/.livecart/livecart.toml)
    #[arg(long)]
    config: Option<String>,

    /// Address to bind, overrides `gateway.bind`
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on, overrides `gateway.port`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livecart_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > LIVECART_CONFIG env > ~/.livecart/livecart.toml
    let config_path = cli.config.or_else(|| std::env::var("LIVECART_CONFIG").ok());
    let mut config = LivecartConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        LivecartConfig::default()
    });
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    let repo = Arc::new(SqliteRepository::open(&db_path)?);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(AppState::new(config, repo));
    let hub = Arc::clone(&state.hub);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Livecart gateway listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
            // websocket sessions end here, so the server can drain
            hub.shutdown().await;
        })
        .await?;

    info!("Livecart gateway stopped");
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
