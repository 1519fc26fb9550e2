use axum::{extract::State, routing::get, Json, Router};
use clap::Parser;
use config::ServerConfig;
use game_manager::AppState;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use ws::ws_handler;

mod config;
mod game_manager;
mod ws;

#[derive(Debug, Parser)]
#[command(version, about = "Authoritative session server for skirmish matches")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Pair a lone queued player with a bot when matchmaking times out
    #[arg(long)]
    bots: bool,

    #[arg(long)]
    max_players: Option<usize>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.bots {
            config.bot.enabled = true;
        }
        if let Some(max_players) = self.max_players {
            config.max_players_per_session = max_players;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    sessions: usize,
    connections: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        sessions: state.sessions.len(),
        connections: state.connections.len(),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("server=info,tower_http=info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    let addr = config.bind_addr();
    tracing::info!(
        map_size = config.map_size,
        max_players = config.max_players_per_session,
        bots = config.bot.enabled,
        "Configuration loaded"
    );

    let state = Arc::new(AppState::new(config));
    Arc::clone(&state).spawn_cleanup_task();

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
