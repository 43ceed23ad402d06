//! API Server
//!
//! HTTP and WebSocket front end for the game engine.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::ApiConfig;
use crate::engine::GameEngine;
use std::{
    net::SocketAddr,
    sync::{atomic::AtomicU64, Arc},
    time::Duration,
};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Game API server
pub struct ApiServer {
    config: ApiConfig,
    engine: Arc<GameEngine>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, engine: Arc<GameEngine>) -> Self {
        Self { config, engine }
    }

    /// Start the API server
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🚀 Starting Crashiq API Server");
        self.run_http().await
    }

    /// Run HTTP server until a shutdown signal arrives
    async fn run_http(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_app();
        let addr = self.get_socket_addr()?;

        info!("🌐 Listen: http://{}", addr);
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server running");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("🛑 API Server stopped gracefully");
        Ok(())
    }

    /// Create the application with the full middleware stack. Public so
    /// tests can drive the router without binding a socket.
    pub fn create_app(&self) -> axum::Router {
        let state = Arc::new(AppState {
            engine: Arc::clone(&self.engine),
            ws_clients: AtomicU64::new(0),
        });

        create_router(state)
            // Request ID middleware (first for tracing)
            .layer(axum::middleware::from_fn(request_id_middleware))
            // CORS layer (before timeout to handle preflight)
            .layer(create_cors_layer(self.config.allowed_origins.clone()))
            // Timeout layer
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            // Tracing layer (last for complete request tracing)
            .layer(TraceLayer::new_for_http())
    }

    /// Get socket address from config
    fn get_socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }

    /// Log server information
    fn log_server_info(&self) {
        info!("📋 Server Configuration:");
        info!("   CORS: {:?}", self.config.allowed_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);

        info!("📊 Available endpoints:");
        info!("   GET  /health               - Health check");
        info!("   GET  /state                - Full game snapshot");
        info!("   GET  /history              - Recent crash points");
        info!("   GET  /bets/me              - A player's bets on the board");
        info!("   GET  /bets/:round_id       - Bets on one round");
        info!("   POST /bets                 - Place a bet");
        info!("   POST /bets/:bet_id/cashout - Cash out a pending bet");
        info!("   POST /bets/:bet_id/cancel  - Cancel a queued bet");
        info!("   POST /cases/open           - Open cases");
        info!("   GET  /inventory/:user_id   - Player inventory");
        info!("   POST /inventory            - Credit an item");
        info!("   GET  /ws                   - Live event stream");
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
