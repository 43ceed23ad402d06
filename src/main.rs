//! Crashiq Server Binary
//!
//! Runs the round scheduler and the HTTP/WebSocket API in one process.

use clap::Parser;
use crashiq::api::ApiServer;
use crashiq::config::RoundConfig;
use crashiq::{ConfigLoader, GameEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crashiq")]
#[command(about = "Crashiq Crash Game Server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// API server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// API server port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Run short rounds for local development
    #[arg(long)]
    fast: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    if args.fast {
        config.round = RoundConfig::fast();
    }
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    config.validate()?;

    info!(
        "🎲 Rounds: {}ms playing, {}ms waiting, crash range {:.2}x..{:.2}x",
        config.round.round_duration_ms,
        config.round.waiting_duration_ms,
        config.round.crash_point_min,
        config.round.crash_point_max,
    );

    let api_config = config.api.clone();
    let engine = Arc::new(GameEngine::in_memory(config).await?);
    engine.start();

    let server = ApiServer::new(api_config, Arc::clone(&engine));
    server.run().await?;

    engine.stop();
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crashiq=info,tower_http=info".into()),
        )
        .init();
}
