//! Route Definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check (high priority)
        .route("/health", get(health_handler))
        // Game state and crash history
        .route("/state", get(state_handler))
        .route("/history", get(history_handler))
        // Bets: the static /bets/me route must be registered alongside the
        // dynamic :round_id route; the router prefers the static match
        .route("/bets", post(place_bet_handler))
        .route("/bets/me", get(my_bets_handler))
        .route("/bets/:round_id", get(round_bets_handler))
        .route("/bets/:bet_id/cashout", post(cash_out_handler))
        .route("/bets/:bet_id/cancel", post(cancel_bet_handler))
        // Case openings
        .route("/cases/open", post(open_cases_handler))
        // Player inventories
        .route("/inventory", post(credit_item_handler))
        .route("/inventory/:user_id", get(inventory_handler))
        // WebSocket endpoint for real-time updates
        .route("/ws", get(websocket_handler))
        // Attach shared state
        .with_state(state)
}
