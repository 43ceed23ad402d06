//! Round and bet persistence.
//!
//! The engine treats the store as write-through: in-memory state is the
//! source of truth for live rounds and the store keeps the durable record.
//! `with_retry` wraps every write so transient backend failures get a
//! bounded number of attempts before surfacing.

use crate::config::PersistenceConfig;
use crate::errors::{CrashiqResult, GameError};
use crate::game::types::{Bet, Round};
use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use tracing::warn;

/// Durable record of rounds and bets.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Persist a newly created round.
    async fn insert_round(&self, round: &Round) -> CrashiqResult<()>;

    /// Overwrite an existing round after a status change.
    async fn update_round(&self, round: &Round) -> CrashiqResult<()>;

    /// Persist a newly placed bet.
    async fn insert_bet(&self, bet: &Bet) -> CrashiqResult<()>;

    /// Overwrite an existing bet after settlement.
    async fn update_bet(&self, bet: &Bet) -> CrashiqResult<()>;

    /// Remove a cancelled bet entirely.
    async fn delete_bet(&self, bet_id: &str) -> CrashiqResult<()>;
}

/// Retry a persistence operation with doubling backoff. Only retryable
/// failures are reattempted; logic errors surface immediately.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    policy: &PersistenceConfig,
    mut op: F,
) -> CrashiqResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CrashiqResult<T>>,
{
    let mut backoff = policy.retry_backoff();
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    operation = label,
                    attempt,
                    error = %err,
                    "persistence attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

/// In-memory store. Duplicate inserts and missing updates are integrity
/// violations and fail loudly rather than papering over engine bugs.
pub struct MemoryStore {
    rounds: DashMap<String, Round>,
    bets: DashMap<String, Bet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rounds: DashMap::new(),
            bets: DashMap::new(),
        }
    }

    pub fn round(&self, round_id: &str) -> Option<Round> {
        self.rounds.get(round_id).map(|entry| entry.clone())
    }

    pub fn bet(&self, bet_id: &str) -> Option<Bet> {
        self.bets.get(bet_id).map(|entry| entry.clone())
    }

    pub fn bet_count(&self) -> usize {
        self.bets.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn insert_round(&self, round: &Round) -> CrashiqResult<()> {
        match self.rounds.entry(round.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(GameError::persistence(format!(
                "round {} already exists",
                round.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(round.clone());
                Ok(())
            }
        }
    }

    async fn update_round(&self, round: &Round) -> CrashiqResult<()> {
        match self.rounds.get_mut(&round.id) {
            Some(mut entry) => {
                *entry = round.clone();
                Ok(())
            }
            None => Err(GameError::persistence(format!(
                "round {} not found",
                round.id
            ))),
        }
    }

    async fn insert_bet(&self, bet: &Bet) -> CrashiqResult<()> {
        match self.bets.entry(bet.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(GameError::persistence(format!(
                "bet {} already exists",
                bet.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(bet.clone());
                Ok(())
            }
        }
    }

    async fn update_bet(&self, bet: &Bet) -> CrashiqResult<()> {
        match self.bets.get_mut(&bet.id) {
            Some(mut entry) => {
                *entry = bet.clone();
                Ok(())
            }
            None => Err(GameError::persistence(format!("bet {} not found", bet.id))),
        }
    }

    async fn delete_bet(&self, bet_id: &str) -> CrashiqResult<()> {
        match self.bets.remove(bet_id) {
            Some(_) => Ok(()),
            None => Err(GameError::persistence(format!("bet {} not found", bet_id))),
        }
    }
}
