//! Order and inventory persistence.
//!
//! The executor only needs three operations, so relational storage can be
//! plugged in behind [`OrderStore`] without touching the run loop.

use crate::order::Order;
use crate::types::OrderId;
use async_trait::async_trait;
use brigade_core::{BrigadeError, BrigadeResult};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or replace an order.
    async fn save_order(&self, order: &Order) -> BrigadeResult<()>;

    async fn get_order(&self, id: OrderId) -> BrigadeResult<Option<Order>>;

    /// Apply `delta` to an ingredient's stock level and return the new level.
    /// A level never drops below zero.
    async fn update_inventory(&self, ingredient: &str, delta: i64) -> BrigadeResult<u32>;
}

/// Store kept entirely in memory. The default for scenario runs.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    inventory: RwLock<BTreeMap<String, u32>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with stock levels.
    pub fn with_inventory(stock: BTreeMap<String, u32>) -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            inventory: RwLock::new(stock),
        }
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn stock(&self, ingredient: &str) -> Option<u32> {
        self.inventory.read().await.get(ingredient).copied()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save_order(&self, order: &Order) -> BrigadeResult<()> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> BrigadeResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_inventory(&self, ingredient: &str, delta: i64) -> BrigadeResult<u32> {
        let mut inventory = self.inventory.write().await;
        let current = inventory.get(ingredient).copied().unwrap_or(0);
        let next = i64::from(current) + delta;
        if next < 0 {
            return Err(BrigadeError::TaskFailed(format!(
                "not enough {ingredient}: {current} in stock, {} requested",
                -delta
            )));
        }
        let level = u32::try_from(next)
            .map_err(|_| BrigadeError::TaskFailed(format!("stock of {ingredient} overflows")))?;
        inventory.insert(ingredient.to_string(), level);
        Ok(level)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::order::{OrderStatus, OrderType};
    use chrono::Utc;

    #[tokio::test]
    async fn test_save_and_get_order() {
        let store = InMemoryOrderStore::new();
        let mut order = Order::new(OrderType::TakeOut, Vec::new(), Utc::now());
        store.save_order(&order).await.unwrap();
        assert_eq!(store.order_count().await, 1);

        order.advance_to(OrderStatus::Assigned, Utc::now()).unwrap();
        store.save_order(&order).await.unwrap();
        let loaded = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Assigned);
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_order_is_none() {
        let store = InMemoryOrderStore::new();
        assert!(store.get_order(uuid::Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inventory_never_goes_negative() {
        let store = InMemoryOrderStore::with_inventory(BTreeMap::from([("beef".to_string(), 2)]));
        assert_eq!(store.update_inventory("beef", -1).await.unwrap(), 1);
        assert!(store.update_inventory("beef", -2).await.is_err());
        assert_eq!(store.stock("beef").await, Some(1));
        assert_eq!(store.update_inventory("basil", 5).await.unwrap(), 5);
    }
}
