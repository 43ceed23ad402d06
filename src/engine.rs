//! Engine facade.
//!
//! Builds the board, ledger, and scheduler from one config and exposes the
//! operations the API layer serves. Everything here is a thin delegation;
//! the interesting logic lives in the parts.

use crate::config::CrashiqConfig;
use crate::errors::CrashiqResult;
use crate::events::{EventBus, GameEvent};
use crate::game::board::RoundBoard;
use crate::game::clock::draw_crash_point;
use crate::game::ledger::BetLedger;
use crate::game::scheduler::RoundScheduler;
use crate::game::selector::{CaseOpening, CaseSelection, OutcomeSelector};
use crate::game::types::{Bet, BetView, ItemSnapshot, Round, RoundView};
use crate::inventory::{InMemoryInventory, InventoryBalanceCoordinator};
use crate::store::{with_retry, GameStore, MemoryStore};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Point-in-time view of the whole game, shaped for first paint: the live
/// round, the queued round's feed, and recent crash history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub round: RoundView,
    pub multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_ms: Option<u64>,
    pub next_round_id: String,
    pub bets: Vec<BetView>,
    pub next_bets: Vec<BetView>,
    pub history: Vec<f64>,
}

/// A player's bets on the two rounds currently on the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyBets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<BetView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<BetView>,
}

pub struct GameEngine {
    board: Arc<RoundBoard>,
    ledger: Arc<BetLedger>,
    scheduler: Arc<RoundScheduler>,
    selector: OutcomeSelector,
    coordinator: Arc<dyn InventoryBalanceCoordinator>,
    events: Arc<EventBus>,
}

impl GameEngine {
    /// Wire an engine against the given store and inventory backend. The
    /// first two rounds are drawn and persisted here so the board never
    /// holds a round the store has not seen.
    pub async fn new(
        config: CrashiqConfig,
        store: Arc<dyn GameStore>,
        coordinator: Arc<dyn InventoryBalanceCoordinator>,
    ) -> CrashiqResult<Self> {
        let round_config = config.round.clone();
        let current = Round::new(draw_crash_point(
            round_config.crash_point_min,
            round_config.crash_point_max,
            &mut OsRng,
        ));
        let next = Round::new(draw_crash_point(
            round_config.crash_point_min,
            round_config.crash_point_max,
            &mut OsRng,
        ));
        with_retry("insert_round", &config.persistence, || async {
            store.insert_round(&current).await
        })
        .await?;
        with_retry("insert_round", &config.persistence, || async {
            store.insert_round(&next).await
        })
        .await?;

        let board = Arc::new(RoundBoard::new(current, next, round_config));
        let events = Arc::new(EventBus::new());
        let ledger = Arc::new(BetLedger::new(
            Arc::clone(&board),
            Arc::clone(&coordinator),
            Arc::clone(&store),
            Arc::clone(&events),
            config.persistence.clone(),
        ));
        let scheduler = Arc::new(RoundScheduler::new(
            Arc::clone(&board),
            Arc::clone(&ledger),
            Arc::clone(&store),
            Arc::clone(&events),
            config.persistence.clone(),
        ));
        let selector = OutcomeSelector::new(&config);

        Ok(Self {
            board,
            ledger,
            scheduler,
            selector,
            coordinator,
            events,
        })
    }

    /// Engine backed entirely by memory. The default for the demo server
    /// and for tests.
    pub async fn in_memory(config: CrashiqConfig) -> CrashiqResult<Self> {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(InMemoryInventory::new()),
        )
        .await
    }

    pub fn start(&self) {
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub async fn place_bet(
        &self,
        round_id: &str,
        user_id: &str,
        username: &str,
        item_id: &str,
    ) -> CrashiqResult<Bet> {
        self.ledger
            .place_bet(round_id, user_id, username, item_id)
            .await
    }

    pub async fn cash_out(&self, bet_id: &str, user_id: &str) -> CrashiqResult<Bet> {
        self.ledger.cash_out(bet_id, user_id).await
    }

    pub async fn cancel_bet(&self, bet_id: &str, user_id: &str) -> CrashiqResult<()> {
        self.ledger.cancel_bet(bet_id, user_id).await
    }

    /// Open one or more cases. Winners are credited to the player's
    /// inventory when a user is named; anonymous openings just return the
    /// draws.
    pub async fn open_cases(
        &self,
        user_id: Option<&str>,
        selections: &[CaseSelection],
    ) -> CrashiqResult<Vec<CaseOpening>> {
        let openings = self.selector.open_cases(selections)?;
        if let Some(user_id) = user_id {
            for opening in &openings {
                for winner in &opening.winners {
                    self.coordinator
                        .credit(user_id, winner.credited(winner.price))
                        .await?;
                }
            }
        }
        Ok(openings)
    }

    pub async fn inventory(&self, user_id: &str) -> CrashiqResult<Vec<ItemSnapshot>> {
        self.coordinator.items_for(user_id).await
    }

    pub async fn credit_item(&self, user_id: &str, item: ItemSnapshot) -> CrashiqResult<()> {
        self.coordinator.credit(user_id, item).await
    }

    pub fn history(&self) -> Vec<f64> {
        self.scheduler.history()
    }

    pub fn bets_for_round(&self, round_id: &str) -> Vec<BetView> {
        self.ledger.bets_for_round(round_id)
    }

    pub fn my_bets(&self, user_id: &str) -> MyBets {
        let current_id = self.board.current().id;
        let next_id = self.board.next().id;
        MyBets {
            current: self
                .ledger
                .bet_for_user(&current_id, user_id)
                .map(|bet| bet.public_view()),
            next: self
                .ledger
                .bet_for_user(&next_id, user_id)
                .map(|bet| bet.public_view()),
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let current = self.board.current();
        let next_id = self.board.next().id;
        GameSnapshot {
            round: current.public_view(),
            multiplier: self.board.multiplier_now(),
            countdown_ms: self.board.countdown_ms(),
            bets: self.ledger.bets_for_round(&current.id),
            next_bets: self.ledger.bets_for_round(&next_id),
            next_round_id: next_id,
            history: self.scheduler.history(),
        }
    }
}
