//! Inventory reservation and crediting.
//!
//! Stakes follow a two-phase protocol: `reserve` moves the item out of the
//! player's inventory into escrow, then exactly one of `commit`, `release`,
//! or `forfeit` resolves the reservation. This keeps the game flow decoupled
//! from whatever backs the inventory.

use crate::errors::{CrashiqResult, GameError};
use crate::game::types::ItemSnapshot;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// An item held in escrow while a bet or case opening is in flight.
#[derive(Clone, Debug)]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub item: ItemSnapshot,
}

/// Escrow seam between the game flow and the inventory backend.
#[async_trait]
pub trait InventoryBalanceCoordinator: Send + Sync {
    /// Move `item_id` out of the player's inventory into escrow.
    async fn reserve(&self, user_id: &str, item_id: &str) -> CrashiqResult<Reservation>;

    /// Resolve a reservation in the player's favor: the staked item is
    /// consumed and `credited` lands in their inventory.
    async fn commit(&self, reservation_id: &str, credited: ItemSnapshot) -> CrashiqResult<()>;

    /// Undo a reservation, returning the staked item untouched.
    async fn release(&self, reservation_id: &str) -> CrashiqResult<()>;

    /// Resolve a reservation against the player: the staked item is gone.
    async fn forfeit(&self, reservation_id: &str) -> CrashiqResult<()>;

    /// Add an item to a player's inventory outside the escrow flow.
    async fn credit(&self, user_id: &str, item: ItemSnapshot) -> CrashiqResult<()>;

    /// Everything the player currently holds, escrowed items excluded.
    async fn items_for(&self, user_id: &str) -> CrashiqResult<Vec<ItemSnapshot>>;
}

/// DashMap-backed coordinator. Entry-level locking makes concurrent
/// reservations of the same item resolve to exactly one winner.
pub struct InMemoryInventory {
    available: DashMap<String, Vec<ItemSnapshot>>,
    reserved: DashMap<String, Reservation>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self {
            available: DashMap::new(),
            reserved: DashMap::new(),
        }
    }

    fn take_reservation(&self, reservation_id: &str) -> CrashiqResult<Reservation> {
        self.reserved
            .remove(reservation_id)
            .map(|(_, reservation)| reservation)
            .ok_or_else(|| {
                GameError::invalid_input(format!("unknown reservation {}", reservation_id))
            })
    }

    fn push_item(&self, user_id: &str, item: ItemSnapshot) {
        self.available
            .entry(user_id.to_string())
            .or_default()
            .push(item);
    }
}

impl Default for InMemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryBalanceCoordinator for InMemoryInventory {
    async fn reserve(&self, user_id: &str, item_id: &str) -> CrashiqResult<Reservation> {
        let mut items = self
            .available
            .get_mut(user_id)
            .ok_or_else(|| GameError::ItemUnavailable {
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
            })?;

        let position = items.iter().position(|item| item.id == item_id).ok_or_else(|| {
            GameError::ItemUnavailable {
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
            }
        })?;

        let item = items.remove(position);
        drop(items);

        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            item,
        };
        self.reserved
            .insert(reservation.id.clone(), reservation.clone());
        Ok(reservation)
    }

    async fn commit(&self, reservation_id: &str, credited: ItemSnapshot) -> CrashiqResult<()> {
        let reservation = self.take_reservation(reservation_id)?;
        self.push_item(&reservation.user_id, credited);
        Ok(())
    }

    async fn release(&self, reservation_id: &str) -> CrashiqResult<()> {
        let reservation = self.take_reservation(reservation_id)?;
        self.push_item(&reservation.user_id, reservation.item);
        Ok(())
    }

    async fn forfeit(&self, reservation_id: &str) -> CrashiqResult<()> {
        self.take_reservation(reservation_id)?;
        Ok(())
    }

    async fn credit(&self, user_id: &str, item: ItemSnapshot) -> CrashiqResult<()> {
        self.push_item(user_id, item);
        Ok(())
    }

    async fn items_for(&self, user_id: &str) -> CrashiqResult<Vec<ItemSnapshot>> {
        Ok(self
            .available
            .get(user_id)
            .map(|items| items.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::Rarity;
    use std::sync::Arc;

    fn knife() -> ItemSnapshot {
        ItemSnapshot::new("Karambit", "https://img.test/karambit.png", Rarity::Legendary, 120.0)
    }

    #[tokio::test]
    async fn test_reserve_moves_item_into_escrow() {
        let inventory = InMemoryInventory::new();
        let item = knife();
        inventory.credit("alice", item.clone()).await.unwrap();

        let reservation = inventory.reserve("alice", &item.id).await.unwrap();
        assert_eq!(reservation.user_id, "alice");
        assert_eq!(reservation.item.id, item.id);
        assert!(inventory.items_for("alice").await.unwrap().is_empty());

        // the same item cannot be reserved twice
        let again = inventory.reserve("alice", &item.id).await;
        assert!(matches!(again, Err(GameError::ItemUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_reserve_unknown_user_or_item() {
        let inventory = InMemoryInventory::new();
        assert!(matches!(
            inventory.reserve("nobody", "item-1").await,
            Err(GameError::ItemUnavailable { .. })
        ));

        inventory.credit("bob", knife()).await.unwrap();
        assert!(matches!(
            inventory.reserve("bob", "not-an-item").await,
            Err(GameError::ItemUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_commit_swaps_stake_for_credited_item() {
        let inventory = InMemoryInventory::new();
        let stake = knife();
        inventory.credit("alice", stake.clone()).await.unwrap();
        let reservation = inventory.reserve("alice", &stake.id).await.unwrap();

        let credited = stake.credited(180.0);
        inventory
            .commit(&reservation.id, credited.clone())
            .await
            .unwrap();

        let items = inventory.items_for("alice").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, credited.id);
        assert_eq!(items[0].price, 180.0);
        assert_ne!(items[0].id, stake.id);
    }

    #[tokio::test]
    async fn test_release_returns_original_item() {
        let inventory = InMemoryInventory::new();
        let stake = knife();
        inventory.credit("alice", stake.clone()).await.unwrap();
        let reservation = inventory.reserve("alice", &stake.id).await.unwrap();

        inventory.release(&reservation.id).await.unwrap();

        let items = inventory.items_for("alice").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, stake.id);
    }

    #[tokio::test]
    async fn test_forfeit_consumes_the_stake() {
        let inventory = InMemoryInventory::new();
        let stake = knife();
        inventory.credit("alice", stake.clone()).await.unwrap();
        let reservation = inventory.reserve("alice", &stake.id).await.unwrap();

        inventory.forfeit(&reservation.id).await.unwrap();

        assert!(inventory.items_for("alice").await.unwrap().is_empty());
        // resolving twice is an error
        assert!(matches!(
            inventory.release(&reservation.id).await,
            Err(GameError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_reservation_is_rejected() {
        let inventory = InMemoryInventory::new();
        assert!(matches!(
            inventory.commit("nope", knife()).await,
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            inventory.forfeit("nope").await,
            Err(GameError::InvalidInput(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_have_one_winner() {
        let inventory = Arc::new(InMemoryInventory::new());
        let item = knife();
        inventory.credit("alice", item.clone()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let inventory = Arc::clone(&inventory);
            let item_id = item.id.clone();
            handles.push(tokio::spawn(async move {
                inventory.reserve("alice", &item_id).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
