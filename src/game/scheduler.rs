//! Round lifecycle driver.
//!
//! A single background task owns every round transition: it starts the
//! countdown, publishes multiplier ticks, crashes the round, sweeps losing
//! bets, and rotates the board. Because all writes funnel through this one
//! task, readers never see a half-applied transition.
//!
//! The loop treats a failed round write as unrecoverable once retries are
//! exhausted: it publishes a fault event and stops rather than keep running
//! rounds the store knows nothing about.

use crate::config::PersistenceConfig;
use crate::errors::CrashiqResult;
use crate::events::{EventBus, GameEvent};
use crate::game::board::{RoundBoard, TickAction};
use crate::game::clock::draw_crash_point;
use crate::game::ledger::BetLedger;
use crate::game::types::Round;
use crate::store::{with_retry, GameStore};
use chrono::Utc;
use rand::rngs::OsRng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub struct RoundScheduler {
    board: Arc<RoundBoard>,
    ledger: Arc<BetLedger>,
    store: Arc<dyn GameStore>,
    events: Arc<EventBus>,
    persistence: PersistenceConfig,
    running: AtomicBool,
    /// Crash points of finished rounds, newest first
    history: RwLock<VecDeque<f64>>,
}

impl RoundScheduler {
    pub fn new(
        board: Arc<RoundBoard>,
        ledger: Arc<BetLedger>,
        store: Arc<dyn GameStore>,
        events: Arc<EventBus>,
        persistence: PersistenceConfig,
    ) -> Self {
        Self {
            board,
            ledger,
            store,
            events,
            persistence,
            running: AtomicBool::new(false),
            history: RwLock::new(VecDeque::new()),
        }
    }

    /// Begin driving rounds. The countdown restarts from now, so time spent
    /// wiring the engine up does not eat into the first betting window.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.board.restart_countdown();
        self.events.publish(GameEvent::RoundWaiting {
            round_id: self.board.current().id,
            countdown_ms: self.board.config().waiting_duration_ms,
        });
        Arc::clone(self).spawn_loop();
    }

    /// Ask the loop to exit at its next tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Crash points of recent rounds, newest first.
    pub fn history(&self) -> Vec<f64> {
        self.history.read().unwrap().iter().copied().collect()
    }

    fn spawn_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.board.config().tick_interval());
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while self.running.load(Ordering::SeqCst) {
                tick.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = self.on_tick().await {
                    error!(error = %err, "scheduler stopped on unrecoverable error");
                    self.events.publish(GameEvent::SchedulerFault {
                        message: err.to_string(),
                    });
                    self.running.store(false, Ordering::SeqCst);
                }
            }
        });
    }

    async fn on_tick(&self) -> CrashiqResult<()> {
        match self.board.tick_action() {
            TickAction::Idle => Ok(()),
            TickAction::StartRound => self.start_round().await,
            TickAction::PublishMultiplier {
                round_id,
                multiplier,
            } => {
                self.events.publish(GameEvent::MultiplierChanged {
                    round_id,
                    multiplier,
                });
                Ok(())
            }
            TickAction::Crash => self.crash_round().await,
            TickAction::Rotate => self.rotate_rounds().await,
        }
    }

    async fn start_round(&self) -> CrashiqResult<()> {
        let round = self.board.set_playing();
        info!(round_id = %round.id, "round started");
        self.events.publish(GameEvent::RoundStarted {
            round_id: round.id.clone(),
            started_at: round.started_at.unwrap_or_else(Utc::now),
        });
        with_retry("update_round", &self.persistence, || async {
            self.store.update_round(&round).await
        })
        .await
    }

    /// Crash sequencing: flip the board first so cash-outs start failing,
    /// then reveal the crash point, then sweep the losers. The round write
    /// comes last; by then every player-visible effect already happened.
    async fn crash_round(&self) -> CrashiqResult<()> {
        let round = self.board.set_crashed();
        info!(
            round_id = %round.id,
            crash_point = round.crash_point,
            "round crashed"
        );
        self.push_history(round.crash_point);
        self.events.publish(GameEvent::RoundCrashed {
            round_id: round.id.clone(),
            crash_point: round.crash_point,
        });
        self.ledger.settle_losses(&round.id);
        with_retry("update_round", &self.persistence, || async {
            self.store.update_round(&round).await
        })
        .await
    }

    /// The next round is persisted before the swap so the board never
    /// points at a round the store has not seen.
    async fn rotate_rounds(&self) -> CrashiqResult<()> {
        let config = self.board.config();
        let crash_point = draw_crash_point(
            config.crash_point_min,
            config.crash_point_max,
            &mut OsRng,
        );
        let fresh = Round::new(crash_point);
        with_retry("insert_round", &self.persistence, || async {
            self.store.insert_round(&fresh).await
        })
        .await?;

        let retired_id = self.board.current().id;
        let promoted = self.board.rotate(fresh);
        self.ledger.retire_round(&retired_id);

        info!(round_id = %promoted.id, "round open for betting");
        self.events.publish(GameEvent::RoundWaiting {
            round_id: promoted.id,
            countdown_ms: self.board.config().waiting_duration_ms,
        });
        Ok(())
    }

    fn push_history(&self, crash_point: f64) {
        let mut history = self.history.write().unwrap();
        history.push_front(crash_point);
        history.truncate(self.board.config().history_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundConfig;
    use crate::errors::GameError;
    use crate::game::types::{Bet, BetStatus, ItemSnapshot, Rarity};
    use crate::inventory::{InMemoryInventory, InventoryBalanceCoordinator};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::broadcast;

    struct Harness {
        scheduler: Arc<RoundScheduler>,
        board: Arc<RoundBoard>,
        ledger: Arc<BetLedger>,
        inventory: Arc<InMemoryInventory>,
        store: Arc<MemoryStore>,
        events: Arc<EventBus>,
    }

    fn fast_config() -> RoundConfig {
        RoundConfig {
            round_duration_ms: 2_000,
            waiting_duration_ms: 1_000,
            reset_delay_ms: 500,
            tick_interval_ms: 100,
            crash_point_min: 3.0,
            crash_point_max: 3.0,
            history_limit: 10,
        }
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let board = Arc::new(RoundBoard::new(
            Round::new(3.0),
            Round::new(3.0),
            fast_config(),
        ));
        let inventory = Arc::new(InMemoryInventory::new());
        let events = Arc::new(EventBus::new());
        let ledger = Arc::new(BetLedger::new(
            Arc::clone(&board),
            Arc::clone(&inventory) as Arc<dyn InventoryBalanceCoordinator>,
            Arc::clone(&store) as Arc<dyn GameStore>,
            Arc::clone(&events),
            PersistenceConfig::default(),
        ));
        let scheduler = Arc::new(RoundScheduler::new(
            Arc::clone(&board),
            Arc::clone(&ledger),
            Arc::clone(&store) as Arc<dyn GameStore>,
            Arc::clone(&events),
            PersistenceConfig::default(),
        ));
        Harness {
            scheduler,
            board,
            ledger,
            inventory,
            store,
            events,
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<GameEvent>) -> GameEvent {
        rx.recv().await.unwrap()
    }

    /// Receive events until one matches, failing after a bounded number.
    async fn wait_for<F>(rx: &mut broadcast::Receiver<GameEvent>, mut matches: F) -> GameEvent
    where
        F: FnMut(&GameEvent) -> bool,
    {
        for _ in 0..200 {
            let event = next_event(rx).await;
            if matches(&event) {
                return event;
            }
        }
        panic!("event never arrived");
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_round_cycle_emits_lifecycle_events() {
        let h = harness();
        let mut rx = h.events.subscribe();
        let first_id = h.board.current().id;
        let next_id = h.board.next().id;

        h.scheduler.start();

        match next_event(&mut rx).await {
            GameEvent::RoundWaiting { round_id, countdown_ms } => {
                assert_eq!(round_id, first_id);
                assert_eq!(countdown_ms, 1_000);
            }
            other => panic!("expected waiting, got {:?}", other),
        }

        match wait_for(&mut rx, |e| matches!(e, GameEvent::RoundStarted { .. })).await {
            GameEvent::RoundStarted { round_id, .. } => assert_eq!(round_id, first_id),
            _ => unreachable!(),
        }

        // multiplier ticks arrive while the round plays
        match wait_for(&mut rx, |e| matches!(e, GameEvent::MultiplierChanged { .. })).await {
            GameEvent::MultiplierChanged { multiplier, .. } => {
                assert!(multiplier >= 1.0 && multiplier <= 3.0);
            }
            _ => unreachable!(),
        }

        match wait_for(&mut rx, |e| matches!(e, GameEvent::RoundCrashed { .. })).await {
            GameEvent::RoundCrashed { round_id, crash_point } => {
                assert_eq!(round_id, first_id);
                assert_eq!(crash_point, 3.0);
            }
            _ => unreachable!(),
        }

        // after the reset delay the queued round opens for betting
        match wait_for(&mut rx, |e| matches!(e, GameEvent::RoundWaiting { .. })).await {
            GameEvent::RoundWaiting { round_id, .. } => assert_eq!(round_id, next_id),
            _ => unreachable!(),
        }

        // a brand new round fills the queue slot
        assert_ne!(h.board.next().id, first_id);
        assert_ne!(h.board.next().id, next_id);
        assert_eq!(h.scheduler.history(), vec![3.0]);

        // the store followed every transition
        let stored = h.store.round(&first_id).unwrap();
        assert_eq!(stored.status, crate::game::types::RoundStatus::Crashed);
        assert!(h.store.round(&h.board.next().id).is_some());

        h.scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_crash_sweep_runs_through_scheduler() {
        let h = harness();
        let item = ItemSnapshot::new("M4 Howl", "https://img.test/howl.png", Rarity::Epic, 50.0);
        h.inventory.credit("bob", item.clone()).await.unwrap();

        let round_id = h.board.current().id;
        let bet = h
            .ledger
            .place_bet(&round_id, "bob", "Bob", &item.id)
            .await
            .unwrap();

        let mut rx = h.events.subscribe();
        h.scheduler.start();

        wait_for(&mut rx, |e| matches!(e, GameEvent::RoundCrashed { .. })).await;
        match wait_for(&mut rx, |e| matches!(e, GameEvent::BetsSettled { .. })).await {
            GameEvent::BetsSettled { lost_bet_ids, .. } => {
                assert_eq!(lost_bet_ids, vec![bet.id.clone()]);
            }
            _ => unreachable!(),
        }

        // the sweep's forfeit and store write run on spawned tasks
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        assert_eq!(h.store.bet(&bet.id).unwrap().status, BetStatus::Lost);
        assert!(h.inventory.items_for("bob").await.unwrap().is_empty());

        // after rotation the bet leaves the live ledger
        wait_for(&mut rx, |e| matches!(e, GameEvent::RoundWaiting { .. })).await;
        assert!(h.ledger.bet(&bet.id).is_none());

        h.scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_tracks_recent_crashes_newest_first() {
        let mut config = fast_config();
        config.crash_point_min = 2.0;
        config.crash_point_max = 4.0;
        config.history_limit = 2;

        let store = Arc::new(MemoryStore::new());
        let board = Arc::new(RoundBoard::new(
            Round::new(2.5),
            Round::new(3.5),
            config,
        ));
        let inventory = Arc::new(InMemoryInventory::new());
        let events = Arc::new(EventBus::new());
        let ledger = Arc::new(BetLedger::new(
            Arc::clone(&board),
            Arc::clone(&inventory) as Arc<dyn InventoryBalanceCoordinator>,
            Arc::clone(&store) as Arc<dyn GameStore>,
            Arc::clone(&events),
            PersistenceConfig::default(),
        ));
        let scheduler = Arc::new(RoundScheduler::new(
            Arc::clone(&board),
            Arc::clone(&ledger),
            Arc::clone(&store) as Arc<dyn GameStore>,
            Arc::clone(&events),
            PersistenceConfig::default(),
        ));

        let mut rx = events.subscribe();
        scheduler.start();

        let mut crashes = Vec::new();
        while crashes.len() < 3 {
            if let GameEvent::RoundCrashed { crash_point, .. } =
                wait_for(&mut rx, |e| matches!(e, GameEvent::RoundCrashed { .. })).await
            {
                crashes.push(crash_point);
            }
        }

        // bounded at two entries, newest first
        assert_eq!(scheduler.history(), vec![crashes[2], crashes[1]]);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_the_loop() {
        let h = harness();
        let mut rx = h.events.subscribe();
        h.scheduler.start();
        next_event(&mut rx).await; // initial waiting event

        h.scheduler.stop();
        assert!(!h.scheduler.is_running());

        // give the loop a chance to observe the flag and exit
        tokio::time::advance(std::time::Duration::from_millis(500)).await;
        tokio::task::yield_now().await;

        // restarting is allowed and re-announces the countdown
        h.scheduler.start();
        match wait_for(&mut rx, |e| matches!(e, GameEvent::RoundWaiting { .. })).await {
            GameEvent::RoundWaiting { countdown_ms, .. } => assert_eq!(countdown_ms, 1_000),
            _ => unreachable!(),
        }
        h.scheduler.stop();
    }

    /// Store whose round updates always fail; used to drive the fault path.
    struct BrokenRoundStore;

    #[async_trait]
    impl GameStore for BrokenRoundStore {
        async fn insert_round(&self, _round: &Round) -> CrashiqResult<()> {
            Ok(())
        }
        async fn update_round(&self, _round: &Round) -> CrashiqResult<()> {
            Err(GameError::persistence("round table offline"))
        }
        async fn insert_bet(&self, _bet: &Bet) -> CrashiqResult<()> {
            Ok(())
        }
        async fn update_bet(&self, _bet: &Bet) -> CrashiqResult<()> {
            Ok(())
        }
        async fn delete_bet(&self, _bet_id: &str) -> CrashiqResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_round_write_failure_faults_the_scheduler() {
        let store: Arc<dyn GameStore> = Arc::new(BrokenRoundStore);
        let board = Arc::new(RoundBoard::new(
            Round::new(3.0),
            Round::new(3.0),
            fast_config(),
        ));
        let inventory = Arc::new(InMemoryInventory::new());
        let events = Arc::new(EventBus::new());
        let ledger = Arc::new(BetLedger::new(
            Arc::clone(&board),
            Arc::clone(&inventory) as Arc<dyn InventoryBalanceCoordinator>,
            Arc::clone(&store),
            Arc::clone(&events),
            PersistenceConfig::default(),
        ));
        let scheduler = Arc::new(RoundScheduler::new(
            Arc::clone(&board),
            Arc::clone(&ledger),
            Arc::clone(&store),
            Arc::clone(&events),
            PersistenceConfig::default(),
        ));

        let mut rx = events.subscribe();
        scheduler.start();

        match wait_for(&mut rx, |e| matches!(e, GameEvent::SchedulerFault { .. })).await {
            GameEvent::SchedulerFault { message } => {
                assert!(message.contains("round table offline"));
            }
            _ => unreachable!(),
        }
        assert!(!scheduler.is_running());
    }
}
