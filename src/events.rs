//! Engine event fan-out.
//!
//! Every state change the outside world cares about is published once on a
//! broadcast channel. WebSocket sessions, tools, and tests subscribe here
//! instead of polling engine state.

use crate::game::types::BetView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the engine, in the order they happen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    /// A round entered its betting countdown
    #[serde(rename = "round_waiting")]
    RoundWaiting { round_id: String, countdown_ms: u64 },

    /// The current round started playing
    #[serde(rename = "round_started")]
    RoundStarted {
        round_id: String,
        started_at: DateTime<Utc>,
    },

    /// Live multiplier tick for the playing round
    #[serde(rename = "multiplier_changed")]
    MultiplierChanged { round_id: String, multiplier: f64 },

    /// The round crashed; the crash point is now public
    #[serde(rename = "round_crashed")]
    RoundCrashed { round_id: String, crash_point: f64 },

    /// A bet joined the feed
    #[serde(rename = "bet_placed")]
    BetPlaced { bet: BetView },

    /// A pending bet cashed out before the crash
    #[serde(rename = "bet_cashed_out")]
    BetCashedOut {
        bet_id: String,
        round_id: String,
        user_id: String,
        multiplier: f64,
        winnings: f64,
    },

    /// A pending bet was withdrawn during the countdown
    #[serde(rename = "bet_cancelled")]
    BetCancelled {
        bet_id: String,
        round_id: String,
        user_id: String,
    },

    /// Remaining pending bets on a crashed round were marked lost
    #[serde(rename = "bets_settled")]
    BetsSettled {
        round_id: String,
        lost_bet_ids: Vec<String>,
    },

    /// The scheduler hit an unrecoverable error and stopped
    #[serde(rename = "scheduler_fault")]
    SchedulerFault { message: String },
}

/// Broadcast wrapper. Publishing never fails; events sent with no live
/// subscribers are dropped.
pub struct EventBus {
    tx: broadcast::Sender<GameEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: GameEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
