//! Request Handlers
//!
//! Thin HTTP adapters over the game engine. Input validation and error
//! mapping happen here; the game rules live in the engine.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::engine::{GameEngine, GameSnapshot, MyBets};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub engine: Arc<GameEngine>,
    pub ws_clients: AtomicU64,
}

fn require_field(request_id: &str, name: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(
            request_id.to_string(),
            format!("'{}' must not be empty", name),
        ));
    }
    Ok(())
}

/// Health check handler - minimal response time
/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let running = state.engine.is_running();
    Json(HealthResponse {
        status: if running { "Running" } else { "Degraded" }.to_string(),
        scheduler_running: running,
    })
}

/// Full game snapshot for first paint
/// GET /state
pub async fn state_handler(State(state): State<Arc<AppState>>) -> Json<GameSnapshot> {
    Json(state.engine.snapshot())
}

/// Recent crash points, newest first
/// GET /history
pub async fn history_handler(State(state): State<Arc<AppState>>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state.engine.history(),
    })
}

/// Bets on one round. Unknown or rotated-out rounds return an empty list
/// rather than 404 so pollers never have to special-case rotation.
/// GET /bets/{round_id}
pub async fn round_bets_handler(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<String>,
) -> Json<RoundBetsResponse> {
    Json(RoundBetsResponse {
        bets: state.engine.bets_for_round(&round_id),
        round_id,
    })
}

/// The caller's bets on the two rounds currently on the board
/// GET /bets/me?user_id={id}
pub async fn my_bets_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(params): Query<MyBetsQuery>,
) -> Result<Json<MyBets>, ApiError> {
    require_field(&request_id.0, "user_id", &params.user_id)?;
    Ok(Json(state.engine.my_bets(&params.user_id)))
}

/// Stake an inventory item on a round
/// POST /bets
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaceBetRequest>,
) -> Result<Json<BetResponse>, ApiError> {
    require_field(&request_id.0, "round_id", &request.round_id)?;
    require_field(&request_id.0, "user_id", &request.user_id)?;
    require_field(&request_id.0, "username", &request.username)?;
    require_field(&request_id.0, "item_id", &request.item_id)?;

    let bet = state
        .engine
        .place_bet(
            &request.round_id,
            &request.user_id,
            &request.username,
            &request.item_id,
        )
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(BetResponse {
        bet: bet.public_view(),
    }))
}

/// Cash out a pending bet at the live multiplier
/// POST /bets/{bet_id}/cashout
pub async fn cash_out_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(bet_id): Path<String>,
    Json(request): Json<CashOutRequest>,
) -> Result<Json<BetResponse>, ApiError> {
    require_field(&request_id.0, "user_id", &request.user_id)?;

    let bet = state
        .engine
        .cash_out(&bet_id, &request.user_id)
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(BetResponse {
        bet: bet.public_view(),
    }))
}

/// Withdraw a bet from a round that has not started
/// POST /bets/{bet_id}/cancel
pub async fn cancel_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(bet_id): Path<String>,
    Json(request): Json<CancelBetRequest>,
) -> Result<Json<CancelBetResponse>, ApiError> {
    require_field(&request_id.0, "user_id", &request.user_id)?;

    state
        .engine
        .cancel_bet(&bet_id, &request.user_id)
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(CancelBetResponse {
        bet_id,
        cancelled: true,
    }))
}

/// Open cases; winners are credited when a user is named
/// POST /cases/open
pub async fn open_cases_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenCasesRequest>,
) -> Result<Json<OpenCasesResponse>, ApiError> {
    if request.cases.is_empty() {
        return Err(ApiError::bad_request(
            request_id.0,
            "'cases' must not be empty".to_string(),
        ));
    }
    if let Some(user_id) = &request.user_id {
        require_field(&request_id.0, "user_id", user_id)?;
    }

    let results = state
        .engine
        .open_cases(request.user_id.as_deref(), &request.cases)
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(OpenCasesResponse { results }))
}

/// A player's item inventory
/// GET /inventory/{user_id}
pub async fn inventory_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let items = state
        .engine
        .inventory(&user_id)
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(InventoryResponse { user_id, items }))
}

/// Credit an item to a player's inventory
/// POST /inventory
pub async fn credit_item_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreditItemRequest>,
) -> Result<Json<CreditItemResponse>, ApiError> {
    require_field(&request_id.0, "user_id", &request.user_id)?;
    require_field(&request_id.0, "name", &request.item.name)?;
    if !request.item.price.is_finite() || request.item.price <= 0.0 {
        return Err(ApiError::bad_request(
            request_id.0,
            "'price' must be a positive amount".to_string(),
        ));
    }

    let item = request.item.into_snapshot();
    state
        .engine
        .credit_item(&request.user_id, item.clone())
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(CreditItemResponse {
        user_id: request.user_id,
        item,
    }))
}
