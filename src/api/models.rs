//! API Request and Response Models
//!
//! All payload types for the API endpoints.

use crate::game::selector::{CaseOpening, CaseSelection};
use crate::game::types::{BetView, ItemSnapshot, Rarity};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub scheduler_running: bool,
}

/// Recent crash points, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<f64>,
}

/// Bets on one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundBetsResponse {
    pub round_id: String,
    pub bets: Vec<BetView>,
}

/// Place a bet by staking an inventory item
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBetRequest {
    pub round_id: String,
    pub user_id: String,
    pub username: String,
    pub item_id: String,
}

/// Response wrapping a single bet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetResponse {
    pub bet: BetView,
}

/// Cash out or cancel a bet; the caller proves ownership by user id
#[derive(Debug, Clone, Deserialize)]
pub struct CashOutRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelBetRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBetResponse {
    pub bet_id: String,
    pub cancelled: bool,
}

/// Open one or more cases in a single request
#[derive(Debug, Clone, Deserialize)]
pub struct OpenCasesRequest {
    /// When present, winners are credited to this player's inventory
    #[serde(default)]
    pub user_id: Option<String>,
    pub cases: Vec<CaseSelection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenCasesResponse {
    pub results: Vec<CaseOpening>,
}

/// A player's inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub user_id: String,
    pub items: Vec<ItemSnapshot>,
}

/// Add an item to a player's inventory
#[derive(Debug, Clone, Deserialize)]
pub struct CreditItemRequest {
    pub user_id: String,
    pub item: NewItem,
}

/// Item attributes supplied by the caller; the id is assigned server-side
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub image_url: String,
    pub rarity: Rarity,
    pub price: f64,
}

impl NewItem {
    pub fn into_snapshot(self) -> ItemSnapshot {
        ItemSnapshot::new(self.name, self.image_url, self.rarity, self.price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditItemResponse {
    pub user_id: String,
    pub item: ItemSnapshot,
}

/// Query string for GET /bets/me
#[derive(Debug, Clone, Deserialize)]
pub struct MyBetsQuery {
    pub user_id: String,
}
