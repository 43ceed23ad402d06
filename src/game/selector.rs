//! Rarity-weighted outcome selection for case opening.

use crate::config::{CaseConfig, CrashiqConfig, WeightsConfig};
use crate::errors::{CrashiqResult, GameError};
use crate::game::types::ItemSnapshot;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One case to open: its candidate items and how many to draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSelection {
    pub case_id: String,
    pub items: Vec<ItemSnapshot>,
    pub count: usize,
}

/// Winners drawn for a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOpening {
    pub case_id: String,
    pub winners: Vec<ItemSnapshot>,
}

/// Draws case winners with rarity-tier weights.
///
/// Candidates are walked in rarity order (common first, unrecognized tiers
/// last) accumulating weight until the roll is covered. Draws are
/// independent with replacement, so the same item may win more than once.
#[derive(Debug, Clone)]
pub struct OutcomeSelector {
    weights: WeightsConfig,
    cases: CaseConfig,
}

impl OutcomeSelector {
    pub fn new(config: &CrashiqConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            cases: config.cases.clone(),
        }
    }

    /// Draw `count` winners from `candidates` using the system RNG.
    pub fn select_winners(
        &self,
        candidates: &[ItemSnapshot],
        count: usize,
    ) -> CrashiqResult<Vec<ItemSnapshot>> {
        self.select_winners_with(candidates, count, &mut OsRng)
    }

    /// Draw with a caller-supplied RNG. Production paths use `OsRng`; tests
    /// inject seeded generators to keep draws deterministic.
    pub fn select_winners_with<R: Rng>(
        &self,
        candidates: &[ItemSnapshot],
        count: usize,
        rng: &mut R,
    ) -> CrashiqResult<Vec<ItemSnapshot>> {
        if candidates.is_empty() {
            return Err(GameError::invalid_input("no candidate items to draw from"));
        }
        if count < self.cases.min_per_open || count > self.cases.max_per_open {
            return Err(GameError::invalid_input(format!(
                "count must be between {} and {}",
                self.cases.min_per_open, self.cases.max_per_open
            )));
        }

        let mut sorted: Vec<&ItemSnapshot> = candidates.iter().collect();
        sorted.sort_by_key(|item| item.rarity.rank());
        let total: f64 = sorted
            .iter()
            .map(|item| self.weights.weight_for(item.rarity))
            .sum();

        let mut winners = Vec::with_capacity(count);
        for _ in 0..count {
            winners.push(self.draw_one(&sorted, total, rng).clone());
        }

        Ok(winners)
    }

    /// Open several cases in one request. Each case resolves through
    /// `select_winners`; the total units across cases share the same upper
    /// bound as a single open.
    pub fn open_cases(&self, selections: &[CaseSelection]) -> CrashiqResult<Vec<CaseOpening>> {
        self.open_cases_with(selections, &mut OsRng)
    }

    pub fn open_cases_with<R: Rng>(
        &self,
        selections: &[CaseSelection],
        rng: &mut R,
    ) -> CrashiqResult<Vec<CaseOpening>> {
        if selections.is_empty() {
            return Err(GameError::invalid_input("no cases to open"));
        }
        let total_units: usize = selections.iter().map(|s| s.count).sum();
        if total_units > self.cases.max_per_open {
            return Err(GameError::invalid_input(format!(
                "total items across cases must not exceed {}",
                self.cases.max_per_open
            )));
        }

        selections
            .iter()
            .map(|selection| {
                let winners = self.select_winners_with(&selection.items, selection.count, rng)?;
                Ok(CaseOpening {
                    case_id: selection.case_id.clone(),
                    winners,
                })
            })
            .collect()
    }

    fn draw_one<'a, R: Rng>(
        &self,
        sorted: &[&'a ItemSnapshot],
        total: f64,
        rng: &mut R,
    ) -> &'a ItemSnapshot {
        let roll = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        for item in sorted {
            cumulative += self.weights.weight_for(item.rarity);
            if cumulative >= roll {
                return item;
            }
        }
        // float accumulation can land short of the total; the rarest
        // candidate takes the tail
        sorted[sorted.len() - 1]
    }
}
