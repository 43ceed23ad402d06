//! Bet lifecycle and settlement.
//!
//! The ledger owns every live bet and enforces the two rules the rest of
//! the engine relies on:
//!
//! - one non-terminal bet per player per round, claimed atomically through
//!   a keyed index so concurrent placements cannot double-book
//! - a bet settles exactly once; the pending -> cashed_out and
//!   pending -> lost transitions happen under the bet's own entry lock so
//!   a cash-out racing the crash sweep has a single winner
//!
//! Escrow and persistence side effects run after the in-memory transition
//! commits. The in-memory state is authoritative for live rounds.

use crate::errors::{CrashiqResult, GameError};
use crate::events::{EventBus, GameEvent};
use crate::game::board::RoundBoard;
use crate::game::types::{round_cents, Bet, BetStatus, BetView, RoundStatus};
use crate::config::PersistenceConfig;
use crate::inventory::InventoryBalanceCoordinator;
use crate::store::{with_retry, GameStore};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::error;

pub struct BetLedger {
    /// Live bets for the rounds still on the board
    bets: DashMap<String, Bet>,
    /// (round_id, user_id) -> bet_id; a claim exists while the bet is live
    by_round_user: DashMap<(String, String), String>,
    board: Arc<RoundBoard>,
    coordinator: Arc<dyn InventoryBalanceCoordinator>,
    store: Arc<dyn GameStore>,
    events: Arc<EventBus>,
    persistence: PersistenceConfig,
}

impl BetLedger {
    pub fn new(
        board: Arc<RoundBoard>,
        coordinator: Arc<dyn InventoryBalanceCoordinator>,
        store: Arc<dyn GameStore>,
        events: Arc<EventBus>,
        persistence: PersistenceConfig,
    ) -> Self {
        Self {
            bets: DashMap::new(),
            by_round_user: DashMap::new(),
            board,
            coordinator,
            store,
            events,
            persistence,
        }
    }

    /// Stake `item_id` on a round. Bets naming the playing round queue onto
    /// the next one; the stake's value at placement becomes the bet amount.
    pub async fn place_bet(
        &self,
        round_id: &str,
        user_id: &str,
        username: &str,
        item_id: &str,
    ) -> CrashiqResult<Bet> {
        let target = self.board.resolve_bet_target(round_id)?;

        // cheap duplicate check before touching escrow
        if self
            .by_round_user
            .contains_key(&(target.clone(), user_id.to_string()))
        {
            return Err(GameError::AlreadyBetThisRound {
                round_id: target,
                user_id: user_id.to_string(),
            });
        }

        let reservation = self.coordinator.reserve(user_id, item_id).await?;
        let amount = reservation.item.price;
        let bet = Bet::pending(
            target.clone(),
            user_id,
            username,
            reservation.item.clone(),
            amount,
            reservation.id.clone(),
        );

        // claim the (round, user) slot; the entry lock decides races
        match self
            .by_round_user
            .entry((target.clone(), user_id.to_string()))
        {
            Entry::Occupied(_) => {
                self.release_quietly(&reservation.id).await;
                return Err(GameError::AlreadyBetThisRound {
                    round_id: target,
                    user_id: user_id.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(bet.id.clone());
            }
        }

        let persisted = with_retry("insert_bet", &self.persistence, || async {
            self.store.insert_bet(&bet).await
        })
        .await;
        if let Err(err) = persisted {
            self.by_round_user
                .remove(&(target.clone(), user_id.to_string()));
            self.release_quietly(&reservation.id).await;
            return Err(err);
        }

        self.bets.insert(bet.id.clone(), bet.clone());
        self.events.publish(GameEvent::BetPlaced {
            bet: bet.public_view(),
        });

        // if the target crashed while the insert was in flight, the crash
        // sweep may have run before this bet was visible
        if !matches!(
            self.board.status_of(&target),
            Some(RoundStatus::Waiting) | Some(RoundStatus::Playing)
        ) {
            self.settle_losses(&target);
        }

        Ok(bet)
    }

    /// Cash a pending bet out at the live multiplier. The status flip and
    /// the multiplier read share one critical section per bet, so either
    /// this wins or the crash sweep does, never both.
    pub async fn cash_out(&self, bet_id: &str, user_id: &str) -> CrashiqResult<Bet> {
        let settled = {
            let mut entry = self.bets.get_mut(bet_id).ok_or_else(|| {
                GameError::invalid_input(format!("unknown bet {}", bet_id))
            })?;
            let bet = entry.value_mut();
            if bet.user_id != user_id {
                return Err(GameError::invalid_input("bet belongs to another user"));
            }
            if bet.status.is_terminal() {
                return Err(GameError::too_late("bet already settled"));
            }
            let multiplier = self.board.cash_out_state(&bet.round_id)?;
            bet.status = BetStatus::CashedOut;
            bet.cashout_multiplier = Some(multiplier);
            bet.winnings = Some(round_cents(bet.amount * multiplier));
            bet.clone()
        };

        self.by_round_user
            .remove(&(settled.round_id.clone(), settled.user_id.clone()));

        // winnings keep the stake's display attributes under a fresh id
        let winnings = settled.winnings.unwrap_or(0.0);
        let credited = settled.item.credited(winnings);
        if let Err(err) = self.coordinator.commit(&settled.reservation_id, credited).await {
            error!(
                bet_id = %settled.id,
                reservation_id = %settled.reservation_id,
                error = %err,
                "failed to commit reservation after cash-out"
            );
        }

        if let Err(err) = with_retry("update_bet", &self.persistence, || async {
            self.store.update_bet(&settled).await
        })
        .await
        {
            error!(bet_id = %settled.id, error = %err, "failed to persist cashed-out bet");
        }

        self.events.publish(GameEvent::BetCashedOut {
            bet_id: settled.id.clone(),
            round_id: settled.round_id.clone(),
            user_id: settled.user_id.clone(),
            multiplier: settled.cashout_multiplier.unwrap_or(1.0),
            winnings,
        });

        Ok(settled)
    }

    /// Withdraw a pending bet while its round is still in the countdown.
    /// The stake returns to the player's inventory untouched.
    pub async fn cancel_bet(&self, bet_id: &str, user_id: &str) -> CrashiqResult<()> {
        {
            let bet = self.bets.get(bet_id).ok_or_else(|| {
                GameError::invalid_input(format!("unknown bet {}", bet_id))
            })?;
            if bet.user_id != user_id {
                return Err(GameError::invalid_input("bet belongs to another user"));
            }
            if bet.status.is_terminal() {
                return Err(GameError::too_late("bet already settled"));
            }
            match self.board.status_of(&bet.round_id) {
                Some(RoundStatus::Waiting) => {}
                Some(_) => return Err(GameError::too_late("round already started")),
                None => return Err(GameError::too_late("round already settled")),
            }
        }

        // re-check everything under the entry lock; the countdown may have
        // ended between the check above and the removal
        let removed = self.bets.remove_if(bet_id, |_, bet| {
            bet.status == BetStatus::Pending
                && bet.user_id == user_id
                && matches!(
                    self.board.status_of(&bet.round_id),
                    Some(RoundStatus::Waiting)
                )
        });
        let Some((_, bet)) = removed else {
            return Err(GameError::too_late("round already started"));
        };

        self.by_round_user
            .remove(&(bet.round_id.clone(), bet.user_id.clone()));
        self.release_quietly(&bet.reservation_id).await;

        if let Err(err) = with_retry("delete_bet", &self.persistence, || async {
            self.store.delete_bet(&bet.id).await
        })
        .await
        {
            error!(bet_id = %bet.id, error = %err, "failed to delete cancelled bet");
        }

        self.events.publish(GameEvent::BetCancelled {
            bet_id: bet.id.clone(),
            round_id: bet.round_id.clone(),
            user_id: bet.user_id.clone(),
        });

        Ok(())
    }

    /// Mark every still-pending bet on `round_id` as lost. Bets that cashed
    /// out between the scan and the flip are left alone. Returns the bets
    /// that lost. The in-memory sweep completes before this returns; the
    /// forfeit and store write for each lost bet run on their own task so a
    /// slow backend cannot stall the crash tick.
    pub fn settle_losses(&self, round_id: &str) -> Vec<Bet> {
        let candidates: Vec<String> = self
            .bets
            .iter()
            .filter(|entry| entry.round_id == round_id && entry.status == BetStatus::Pending)
            .map(|entry| entry.id.clone())
            .collect();

        let mut lost = Vec::new();
        for bet_id in candidates {
            if let Some(mut entry) = self.bets.get_mut(&bet_id) {
                let bet = entry.value_mut();
                if bet.status != BetStatus::Pending {
                    continue;
                }
                bet.status = BetStatus::Lost;
                lost.push(bet.clone());
            }
        }

        for bet in &lost {
            self.by_round_user
                .remove(&(bet.round_id.clone(), bet.user_id.clone()));
        }

        if !lost.is_empty() {
            self.events.publish(GameEvent::BetsSettled {
                round_id: round_id.to_string(),
                lost_bet_ids: lost.iter().map(|bet| bet.id.clone()).collect(),
            });
        }

        for bet in &lost {
            self.spawn_loss_side_effects(bet.clone());
        }

        lost
    }

    fn spawn_loss_side_effects(&self, bet: Bet) {
        let coordinator = Arc::clone(&self.coordinator);
        let store = Arc::clone(&self.store);
        let persistence = self.persistence.clone();
        tokio::spawn(async move {
            if let Err(err) = coordinator.forfeit(&bet.reservation_id).await {
                error!(
                    bet_id = %bet.id,
                    reservation_id = %bet.reservation_id,
                    error = %err,
                    "failed to forfeit reservation for lost bet"
                );
            }
            if let Err(err) = with_retry("update_bet", &persistence, || async {
                store.update_bet(&bet).await
            })
            .await
            {
                error!(bet_id = %bet.id, error = %err, "failed to persist lost bet");
            }
        });
    }

    /// Drop a rotated-out round's bets from the live maps. The store keeps
    /// the durable rows.
    pub fn retire_round(&self, round_id: &str) {
        self.bets.retain(|_, bet| bet.round_id != round_id);
        self.by_round_user.retain(|(round, _), _| round != round_id);
    }

    pub fn bet(&self, bet_id: &str) -> Option<Bet> {
        self.bets.get(bet_id).map(|entry| entry.clone())
    }

    /// A player's bet on a round, live or settled, if one exists.
    pub fn bet_for_user(&self, round_id: &str, user_id: &str) -> Option<Bet> {
        self.bets
            .iter()
            .find(|entry| entry.round_id == round_id && entry.user_id == user_id)
            .map(|entry| entry.clone())
    }

    /// Feed view of a round's bets, oldest first.
    pub fn bets_for_round(&self, round_id: &str) -> Vec<BetView> {
        let mut bets: Vec<Bet> = self
            .bets
            .iter()
            .filter(|entry| entry.round_id == round_id)
            .map(|entry| entry.clone())
            .collect();
        bets.sort_by_key(|bet| bet.placed_at);
        bets.into_iter().map(|bet| bet.public_view()).collect()
    }

    async fn release_quietly(&self, reservation_id: &str) {
        if let Err(err) = self.coordinator.release(reservation_id).await {
            error!(reservation_id, error = %err, "failed to release reservation");
        }
    }
}
