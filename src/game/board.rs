//! Shared view of the current and next rounds.
//!
//! The scheduler task is the only writer; the ledger and API read through
//! `&self` methods. Phase timing uses `tokio::time::Instant` so tests can
//! drive it with a paused clock.

use crate::config::RoundConfig;
use crate::errors::{CrashiqResult, GameError};
use crate::game::clock;
use crate::game::types::{Round, RoundStatus, RoundView};
use chrono::Utc;
use std::sync::RwLock;
use tokio::time::Instant;

/// What the scheduler should do on this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    /// Nothing due yet
    Idle,
    /// Countdown expired; start the current round
    StartRound,
    /// Round in flight; publish the live multiplier
    PublishMultiplier { round_id: String, multiplier: f64 },
    /// Crash condition reached
    Crash,
    /// Reset delay expired; promote next and create a fresh round
    Rotate,
}

struct Slots {
    current: Round,
    next: Round,
    /// When the current round entered its present status
    phase_since: Instant,
}

pub struct RoundBoard {
    config: RoundConfig,
    inner: RwLock<Slots>,
}

impl RoundBoard {
    pub fn new(current: Round, next: Round, config: RoundConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Slots {
                current,
                next,
                phase_since: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn current(&self) -> Round {
        self.read().current.clone()
    }

    pub fn next(&self) -> Round {
        self.read().next.clone()
    }

    pub fn current_view(&self) -> RoundView {
        self.read().current.public_view()
    }

    pub fn next_view(&self) -> RoundView {
        self.read().next.public_view()
    }

    pub fn status_of(&self, round_id: &str) -> Option<RoundStatus> {
        let slots = self.read();
        if slots.current.id == round_id {
            Some(slots.current.status)
        } else if slots.next.id == round_id {
            Some(slots.next.status)
        } else {
            None
        }
    }

    /// Which round a bet naming `round_id` actually lands on: the round
    /// itself while it is waiting, or the next round while it is playing.
    pub fn resolve_bet_target(&self, round_id: &str) -> CrashiqResult<String> {
        let slots = self.read();
        if slots.current.id == round_id {
            return match slots.current.status {
                RoundStatus::Waiting => Ok(slots.current.id.clone()),
                RoundStatus::Playing => Ok(slots.next.id.clone()),
                RoundStatus::Crashed => Err(GameError::InvalidRoundState {
                    round_id: round_id.to_string(),
                    status: RoundStatus::Crashed,
                }),
            };
        }
        if slots.next.id == round_id {
            // the next round is always waiting
            return Ok(slots.next.id.clone());
        }
        Err(GameError::invalid_input(format!(
            "unknown round {}",
            round_id
        )))
    }

    /// Guard a cash-out attempt and return the live multiplier in the same
    /// critical section. Only the current round, while playing, is cashable.
    pub fn cash_out_state(&self, round_id: &str) -> CrashiqResult<f64> {
        let slots = self.read();
        if slots.current.id == round_id {
            return match slots.current.status {
                RoundStatus::Playing => Ok(clock::multiplier_at(
                    Self::elapsed_ms(slots.phase_since),
                    slots.current.crash_point,
                    self.config.round_duration_ms,
                )),
                RoundStatus::Waiting => Err(GameError::InvalidRoundState {
                    round_id: round_id.to_string(),
                    status: RoundStatus::Waiting,
                }),
                RoundStatus::Crashed => Err(GameError::too_late("round already crashed")),
            };
        }
        if slots.next.id == round_id {
            return Err(GameError::InvalidRoundState {
                round_id: round_id.to_string(),
                status: RoundStatus::Waiting,
            });
        }
        Err(GameError::too_late("round already settled"))
    }

    /// Live multiplier for snapshots: 1.0 while waiting, the curve while
    /// playing, the crash point once crashed.
    pub fn multiplier_now(&self) -> f64 {
        let slots = self.read();
        match slots.current.status {
            RoundStatus::Waiting => 1.0,
            RoundStatus::Playing => clock::multiplier_at(
                Self::elapsed_ms(slots.phase_since),
                slots.current.crash_point,
                self.config.round_duration_ms,
            ),
            RoundStatus::Crashed => slots.current.crash_point,
        }
    }

    /// Remaining countdown while the current round is waiting.
    pub fn countdown_ms(&self) -> Option<u64> {
        let slots = self.read();
        match slots.current.status {
            RoundStatus::Waiting => Some(
                self.config
                    .waiting_duration_ms
                    .saturating_sub(Self::elapsed_ms(slots.phase_since)),
            ),
            _ => None,
        }
    }

    /// Decide the scheduler's next move from the current phase and clock.
    pub fn tick_action(&self) -> TickAction {
        let slots = self.read();
        let elapsed = Self::elapsed_ms(slots.phase_since);
        match slots.current.status {
            RoundStatus::Waiting => {
                if elapsed >= self.config.waiting_duration_ms {
                    TickAction::StartRound
                } else {
                    TickAction::Idle
                }
            }
            RoundStatus::Playing => {
                if clock::has_crashed(
                    elapsed,
                    slots.current.crash_point,
                    self.config.round_duration_ms,
                ) {
                    TickAction::Crash
                } else {
                    TickAction::PublishMultiplier {
                        round_id: slots.current.id.clone(),
                        multiplier: clock::multiplier_at(
                            elapsed,
                            slots.current.crash_point,
                            self.config.round_duration_ms,
                        ),
                    }
                }
            }
            RoundStatus::Crashed => {
                if elapsed >= self.config.reset_delay_ms {
                    TickAction::Rotate
                } else {
                    TickAction::Idle
                }
            }
        }
    }

    /// Restart the waiting countdown. Called once when the scheduler starts
    /// so construction time does not eat into the first countdown.
    pub fn restart_countdown(&self) {
        let mut slots = self.write();
        slots.phase_since = Instant::now();
    }

    /// waiting -> playing. Returns the updated round for persistence.
    pub fn set_playing(&self) -> Round {
        let mut slots = self.write();
        slots.current.status = RoundStatus::Playing;
        slots.current.started_at = Some(Utc::now());
        slots.phase_since = Instant::now();
        slots.current.clone()
    }

    /// playing -> crashed. Returns the updated round for persistence.
    pub fn set_crashed(&self) -> Round {
        let mut slots = self.write();
        slots.current.status = RoundStatus::Crashed;
        slots.current.ended_at = Some(Utc::now());
        slots.phase_since = Instant::now();
        slots.current.clone()
    }

    /// Promote next to current and install a freshly created next round.
    /// The caller persists `fresh_next` before swapping so a failed write
    /// never leaves the slots pointing at an unpersisted round.
    pub fn rotate(&self, fresh_next: Round) -> Round {
        let mut slots = self.write();
        slots.current = std::mem::replace(&mut slots.next, fresh_next);
        slots.phase_since = Instant::now();
        slots.current.clone()
    }

    fn elapsed_ms(since: Instant) -> u64 {
        since.elapsed().as_millis() as u64
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Slots> {
        self.inner.read().unwrap()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Slots> {
        self.inner.write().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Duration};

    fn board() -> RoundBoard {
        let config = RoundConfig {
            round_duration_ms: 2_000,
            waiting_duration_ms: 1_000,
            reset_delay_ms: 500,
            tick_interval_ms: 100,
            crash_point_min: 3.0,
            crash_point_max: 3.0,
            history_limit: 10,
        };
        RoundBoard::new(Round::new(3.0), Round::new(3.0), config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_bet_targets_follow_round_status() {
        let board = board();
        let current_id = board.current().id;
        let next_id = board.next().id;

        // waiting: the named round takes the bet
        assert_eq!(board.resolve_bet_target(&current_id).unwrap(), current_id);
        assert_eq!(board.resolve_bet_target(&next_id).unwrap(), next_id);

        // playing: bets queue onto the next round
        board.set_playing();
        assert_eq!(board.resolve_bet_target(&current_id).unwrap(), next_id);

        // crashed: no target
        board.set_crashed();
        assert!(matches!(
            board.resolve_bet_target(&current_id),
            Err(GameError::InvalidRoundState { .. })
        ));

        assert!(matches!(
            board.resolve_bet_target("no-such-round"),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cash_out_state_only_while_playing() {
        let board = board();
        let current_id = board.current().id;
        let next_id = board.next().id;

        assert!(matches!(
            board.cash_out_state(&current_id),
            Err(GameError::InvalidRoundState { .. })
        ));
        assert!(matches!(
            board.cash_out_state(&next_id),
            Err(GameError::InvalidRoundState { .. })
        ));

        board.set_playing();
        advance(Duration::from_millis(1_000)).await;
        // halfway through a 2s round toward 3.0: 1 + 0.25 * 2 = 1.5
        let multiplier = board.cash_out_state(&current_id).unwrap();
        assert!((multiplier - 1.5).abs() < 1e-9);

        board.set_crashed();
        assert!(matches!(
            board.cash_out_state(&current_id),
            Err(GameError::TooLate(_))
        ));
        assert!(matches!(
            board.cash_out_state("gone-round"),
            Err(GameError::TooLate(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_action_walks_the_lifecycle() {
        let board = board();

        assert_eq!(board.tick_action(), TickAction::Idle);
        advance(Duration::from_millis(1_000)).await;
        assert_eq!(board.tick_action(), TickAction::StartRound);

        board.set_playing();
        advance(Duration::from_millis(500)).await;
        assert!(matches!(
            board.tick_action(),
            TickAction::PublishMultiplier { .. }
        ));
        advance(Duration::from_millis(1_500)).await;
        assert_eq!(board.tick_action(), TickAction::Crash);

        board.set_crashed();
        assert_eq!(board.tick_action(), TickAction::Idle);
        advance(Duration::from_millis(500)).await;
        assert_eq!(board.tick_action(), TickAction::Rotate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_preserves_next_round_id() {
        let board = board();
        let old_next = board.next().id;

        board.set_playing();
        board.set_crashed();
        let fresh = Round::new(3.0);
        let fresh_id = fresh.id.clone();
        let promoted = board.rotate(fresh);

        assert_eq!(promoted.id, old_next);
        assert_eq!(promoted.status, RoundStatus::Waiting);
        assert_eq!(board.current().id, old_next);
        assert_eq!(board.next().id, fresh_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_and_multiplier_views() {
        let board = board();
        assert_eq!(board.multiplier_now(), 1.0);
        assert_eq!(board.countdown_ms(), Some(1_000));

        advance(Duration::from_millis(400)).await;
        assert_eq!(board.countdown_ms(), Some(600));

        board.set_playing();
        assert_eq!(board.countdown_ms(), None);
        advance(Duration::from_millis(2_000)).await;
        assert_eq!(board.multiplier_now(), 3.0);

        board.set_crashed();
        assert_eq!(board.multiplier_now(), 3.0);
    }
}
