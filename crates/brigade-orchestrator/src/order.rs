use crate::types::{AgentId, OrderId};
use brigade_core::{BrigadeError, BrigadeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How the order reached the kitchen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    TakeOut,
    Delivery,
    Catering,
    Special,
}

impl OrderType {
    /// Starting priority for an order of this type.
    pub fn base_priority(&self) -> u32 {
        match self {
            OrderType::DineIn | OrderType::TakeOut => 5,
            OrderType::Delivery => 4,
            OrderType::Catering => 6,
            OrderType::Special => 7,
        }
    }
}

/// Menu section a dish belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuCategory {
    Appetizer,
    Soup,
    Salad,
    Entree,
    Seafood,
    Poultry,
    Side,
    Dessert,
    Specialty,
}

impl MenuCategory {
    /// Serving course: appetizers first, desserts last.
    pub fn course(&self) -> u8 {
        match self {
            MenuCategory::Appetizer | MenuCategory::Soup | MenuCategory::Salad => 1,
            MenuCategory::Entree
            | MenuCategory::Seafood
            | MenuCategory::Poultry
            | MenuCategory::Side
            | MenuCategory::Specialty => 2,
            MenuCategory::Dessert => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MenuCategory::Appetizer => "appetizer",
            MenuCategory::Soup => "soup",
            MenuCategory::Salad => "salad",
            MenuCategory::Entree => "entree",
            MenuCategory::Seafood => "seafood",
            MenuCategory::Poultry => "poultry",
            MenuCategory::Side => "side",
            MenuCategory::Dessert => "dessert",
            MenuCategory::Specialty => "specialty",
        }
    }
}

/// A dish on the menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub category: MenuCategory,
    /// Station that cooks the dish.
    pub station: String,
    pub ingredients: Vec<String>,
    pub equipment: Vec<String>,
    /// Skills a cook needs for the cooking step.
    pub skills: Vec<String>,
    pub prep_minutes: i64,
    pub cook_minutes: i64,
}

impl MenuItem {
    pub fn expected_minutes(&self) -> i64 {
        self.prep_minutes + self.cook_minutes
    }
}

/// Measurements taken from a finished plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReadings {
    pub temperature_c: f64,
    pub visual: f64,
    pub plating: f64,
    pub garnish: f64,
    #[serde(default)]
    pub weight_g: Option<f64>,
    #[serde(default)]
    pub volume_ml: Option<f64>,
}

/// Progress of a single order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStage {
    Pending,
    Preparing,
    Cooking,
    Plating,
    Completed,
}

impl ItemStage {
    /// Contribution of the stage to order completion.
    pub fn weight(&self) -> f64 {
        match self {
            ItemStage::Pending => 0.0,
            ItemStage::Preparing => 0.25,
            ItemStage::Cooking => 0.6,
            ItemStage::Plating => 0.85,
            ItemStage::Completed => 1.0,
        }
    }

    /// Stage an item reaches once a step of `step_type` is done.
    pub fn after_step(step_type: &str) -> Option<ItemStage> {
        match step_type {
            "ingredient_prep" => Some(ItemStage::Preparing),
            "cooking_step" => Some(ItemStage::Plating),
            "plating" => Some(ItemStage::Completed),
            _ => None,
        }
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub menu_item: MenuItem,
    pub quantity: u32,
    pub stage: ItemStage,
    pub readings: ItemReadings,
    /// When the item finished plating.
    #[serde(default)]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

/// Order lifecycle. Variants are declared in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Received,
    Assigned,
    Preparing,
    Cooking,
    Plating,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Status implied by an item completion percentage in `[0, 100]`.
    pub fn from_completion(percentage: f64) -> OrderStatus {
        if percentage <= 0.0 {
            OrderStatus::Received
        } else if percentage < 25.0 {
            OrderStatus::Assigned
        } else if percentage < 50.0 {
            OrderStatus::Preparing
        } else if percentage < 75.0 {
            OrderStatus::Cooking
        } else if percentage < 100.0 {
            OrderStatus::Plating
        } else {
            OrderStatus::Completed
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Cooking => "cooking",
            OrderStatus::Plating => "plating",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an order was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Customer,
    QualityRejected,
    Unavailable,
}

/// A customer order moving through the kitchen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_type: OrderType,
    #[serde(default)]
    pub table: Option<u32>,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub priority: u32,
    /// Sous chef supervising the order.
    #[serde(default)]
    pub assigned_to: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_reason: Option<CancelReason>,
    #[serde(default)]
    pub quality_passed: bool,
    /// Set once the order has been handed to a new supervisor for lateness.
    #[serde(default)]
    pub reassigned: bool,
    #[serde(default)]
    pub delayed: bool,
}

impl Order {
    pub fn new(order_type: OrderType, items: Vec<OrderItem>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_type,
            table: None,
            items,
            status: OrderStatus::Received,
            priority: order_type.base_priority(),
            assigned_to: None,
            created_at,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            quality_passed: false,
            reassigned: false,
            delayed: false,
        }
    }

    /// Weighted item completion in `[0, 100]`. An order with no items is done.
    pub fn completion_percentage(&self) -> f64 {
        if self.items.is_empty() {
            return 100.0;
        }
        let total: f64 = self.items.iter().map(|i| i.stage.weight()).sum();
        total / self.items.len() as f64 * 100.0
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Minutes the order should take, summed over its items.
    pub fn expected_minutes(&self) -> i64 {
        self.items.iter().map(|i| i.menu_item.expected_minutes()).sum()
    }

    /// Move forward to `next`. Backward moves and moves out of a terminal
    /// state are rejected; staying put is allowed.
    pub fn advance_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> BrigadeResult<()> {
        if next == self.status {
            return Ok(());
        }
        if self.status.is_terminal() || next < self.status {
            return Err(BrigadeError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if next == OrderStatus::Cancelled {
            self.cancelled_at = Some(now);
        }
        if next == OrderStatus::Completed {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    /// Recompute status from item progress. Completion is held at plating
    /// until the quality gate passes. Returns the previous status on change.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> Option<OrderStatus> {
        if self.is_terminal() {
            return None;
        }
        let mut derived = OrderStatus::from_completion(self.completion_percentage());
        if derived == OrderStatus::Completed && !self.quality_passed {
            derived = OrderStatus::Plating;
        }
        let before = self.status;
        let next = before.max(derived);
        if next == before {
            return None;
        }
        self.advance_to(next, now).ok()?;
        Some(before)
    }

    /// Cancel the order. Idempotent: a terminal order keeps its state.
    pub fn cancel(&mut self, reason: CancelReason, now: DateTime<Utc>) -> OrderStatus {
        if !self.is_terminal() {
            self.status = OrderStatus::Cancelled;
            self.cancel_reason = Some(reason);
            self.cancelled_at = Some(now);
        }
        self.status
    }

    /// Record a passed quality gate and complete the order if every item is done.
    pub fn pass_quality(&mut self, now: DateTime<Utc>) -> OrderStatus {
        if self.is_terminal() {
            return self.status;
        }
        self.quality_passed = true;
        self.refresh_status(now);
        self.status
    }

    /// Whether elapsed time exceeds `factor` times the expected preparation
    /// time, scaled by `time_pressure`.
    pub fn is_delayed(&self, now: DateTime<Utc>, factor: f64, time_pressure: f64) -> bool {
        if self.is_terminal() {
            return false;
        }
        let elapsed = (now - self.created_at).num_seconds() as f64 / 60.0;
        elapsed > factor * self.expected_minutes() as f64 * time_pressure
    }

    /// Bump priority by one, capped at `max`. Returns the new priority.
    pub fn escalate_priority(&mut self, max: u32) -> u32 {
        self.priority = (self.priority + 1).min(max);
        self.priority
    }

    /// Set an item's stage; stages never move backward.
    pub fn set_item_stage(&mut self, index: usize, stage: ItemStage, now: DateTime<Utc>) -> bool {
        let Some(item) = self.items.get_mut(index) else {
            return false;
        };
        if stage <= item.stage {
            return false;
        }
        item.stage = stage;
        if stage == ItemStage::Completed {
            item.ready_at = Some(now);
        }
        true
    }
}

/// Counts over every order of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub total: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub active: usize,
    pub delayed: usize,
    pub reassigned: usize,
}

/// Every order of a run, in arrival order.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: Vec<Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, order: Order) -> OrderId {
        let id = order.id;
        self.orders.push(order);
        id
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Order> {
        self.orders.iter_mut()
    }

    /// Orders still in the kitchen.
    pub fn active(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| !o.is_terminal())
    }

    /// Active orders supervised for `station`.
    pub fn active_for_station(&self, station: &str) -> usize {
        self.active()
            .filter(|o| o.items.iter().any(|i| i.menu_item.station == station))
            .count()
    }

    /// Cancel an order by id. `None` when the id is unknown.
    pub fn cancel(
        &mut self,
        id: OrderId,
        reason: CancelReason,
        now: DateTime<Utc>,
    ) -> Option<OrderStatus> {
        self.get_mut(id).map(|o| o.cancel(reason, now))
    }

    pub fn summary(&self) -> OrderSummary {
        let mut summary = OrderSummary {
            total: self.orders.len(),
            ..OrderSummary::default()
        };
        for order in &self.orders {
            match order.status {
                OrderStatus::Completed => summary.completed += 1,
                OrderStatus::Cancelled => summary.cancelled += 1,
                _ => summary.active += 1,
            }
            if order.delayed {
                summary.delayed += 1;
            }
            if order.reassigned {
                summary.reassigned += 1;
            }
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
