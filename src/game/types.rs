use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Rarity tiers in ascending order of scarcity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    /// Tiers the engine does not recognize; they sort after legendary
    Unknown,
}

impl Rarity {
    /// Sort rank used when ordering case candidates: common first,
    /// unrecognized tiers last.
    pub fn rank(&self) -> u8 {
        match self {
            Rarity::Common => 0,
            Rarity::Uncommon => 1,
            Rarity::Rare => 2,
            Rarity::Epic => 3,
            Rarity::Legendary => 4,
            Rarity::Unknown => 5,
        }
    }
}

impl From<String> for Rarity {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "common" => Rarity::Common,
            "uncommon" => Rarity::Uncommon,
            "rare" => Rarity::Rare,
            "epic" => Rarity::Epic,
            "legendary" => Rarity::Legendary,
            _ => Rarity::Unknown,
        }
    }
}

impl From<Rarity> for String {
    fn from(value: Rarity) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rarity::Common => write!(f, "common"),
            Rarity::Uncommon => write!(f, "uncommon"),
            Rarity::Rare => write!(f, "rare"),
            Rarity::Epic => write!(f, "epic"),
            Rarity::Legendary => write!(f, "legendary"),
            Rarity::Unknown => write!(f, "unknown"),
        }
    }
}

/// Display snapshot of an inventory item. Bets and case results freeze a
/// copy of these fields so later catalog edits never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemSnapshot {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub rarity: Rarity,
    pub price: f64,
}

impl ItemSnapshot {
    pub fn new(
        name: impl Into<String>,
        image_url: impl Into<String>,
        rarity: Rarity,
        price: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            image_url: image_url.into(),
            rarity,
            price,
        }
    }

    /// Copy of this item's display attributes under a fresh id and a new
    /// price. Used for cash-out winnings and case-opening credits.
    pub fn credited(&self, price: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: self.name.clone(),
            image_url: self.image_url.clone(),
            rarity: self.rarity,
            price,
        }
    }
}

/// Round lifecycle states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Waiting,
    Playing,
    Crashed,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Waiting => write!(f, "waiting"),
            RoundStatus::Playing => write!(f, "playing"),
            RoundStatus::Crashed => write!(f, "crashed"),
        }
    }
}

/// A single crash round. The crash point is drawn at creation and stays
/// server-side only; clients see it through `public_view` once the round
/// has crashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: String,
    pub status: RoundStatus,
    pub crash_point: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Round {
    /// New waiting round with a hidden crash point.
    pub fn new(crash_point: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: RoundStatus::Waiting,
            crash_point,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Client-safe view. The crash point is revealed only after the crash.
    pub fn public_view(&self) -> RoundView {
        RoundView {
            id: self.id.clone(),
            status: self.status,
            crash_point: (self.status == RoundStatus::Crashed).then_some(self.crash_point),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Round as exposed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundView {
    pub id: String,
    pub status: RoundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Bet lifecycle states. `pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    CashedOut,
    Lost,
}

impl BetStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "pending"),
            BetStatus::CashedOut => write!(f, "cashed_out"),
            BetStatus::Lost => write!(f, "lost"),
        }
    }
}

/// An item-staked bet on a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub round_id: String,
    pub user_id: String,
    pub username: String,
    pub item: ItemSnapshot,
    pub amount: f64,
    pub status: BetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashout_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winnings: Option<f64>,
    pub reservation_id: String,
    pub placed_at: DateTime<Utc>,
}

impl Bet {
    /// New pending bet against `round_id`, staking a reserved item.
    pub fn pending(
        round_id: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
        item: ItemSnapshot,
        amount: f64,
        reservation_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            round_id: round_id.into(),
            user_id: user_id.into(),
            username: username.into(),
            item,
            amount,
            status: BetStatus::Pending,
            cashout_multiplier: None,
            winnings: None,
            reservation_id: reservation_id.into(),
            placed_at: Utc::now(),
        }
    }

    /// Feed view: everything a spectator may see. Reservation handles stay
    /// internal.
    pub fn public_view(&self) -> BetView {
        BetView {
            id: self.id.clone(),
            round_id: self.round_id.clone(),
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            item: self.item.clone(),
            amount: self.amount,
            status: self.status,
            cashout_multiplier: self.cashout_multiplier,
            winnings: self.winnings,
            placed_at: self.placed_at,
        }
    }
}

/// Bet as exposed in the public feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetView {
    pub id: String,
    pub round_id: String,
    pub user_id: String,
    pub username: String,
    pub item: ItemSnapshot,
    pub amount: f64,
    pub status: BetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashout_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winnings: Option<f64>,
    pub placed_at: DateTime<Utc>,
}

/// Round a money amount to two decimal places.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
