use crate::types::{BlockReason, Task};
use std::collections::{BTreeMap, BTreeSet};

/// Availability checks consulted before a task runs.
///
/// Every method defaults to "available", so an empty impl is the
/// permissive kitchen.
pub trait KitchenPolicy: Send + Sync {
    fn equipment_available(&self, _equipment: &str) -> bool {
        true
    }

    fn ingredient_available(&self, _ingredient: &str) -> bool {
        true
    }

    /// Whether `held` covers every entry of `required`.
    fn skills_sufficient(&self, held: &BTreeSet<String>, required: &[String]) -> bool {
        required.iter().all(|r| held.contains(r))
    }

    /// The first resource that keeps `task` from running, if any.
    fn blocking_reason(&self, task: &Task) -> Option<BlockReason> {
        if let Some(e) = task
            .equipment()
            .into_iter()
            .find(|e| !self.equipment_available(e))
        {
            return Some(BlockReason::Equipment(e));
        }
        task.ingredients()
            .into_iter()
            .find(|i| !self.ingredient_available(i))
            .map(BlockReason::Ingredient)
    }

    /// Whether a task blocked for `reason` must stay blocked.
    fn still_blocked(&self, reason: &BlockReason) -> bool {
        match reason {
            BlockReason::Dependencies => true,
            BlockReason::Equipment(e) => !self.equipment_available(e),
            BlockReason::Ingredient(i) => !self.ingredient_available(i),
        }
    }
}

/// Everything is always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissivePolicy;

impl KitchenPolicy for PermissivePolicy {}

/// Tracks stock levels and equipment outages for a run.
///
/// Ingredients without a stock entry are treated as unlimited.
#[derive(Debug, Clone, Default)]
pub struct InventoryPolicy {
    stock: BTreeMap<String, u32>,
    out_of_service: BTreeSet<String>,
}

impl InventoryPolicy {
    pub fn new(stock: BTreeMap<String, u32>) -> Self {
        Self {
            stock,
            out_of_service: BTreeSet::new(),
        }
    }

    /// Use one unit of `ingredient`. Returns the remaining level, or `None`
    /// for untracked ingredients.
    pub fn consume(&mut self, ingredient: &str) -> Option<u32> {
        self.stock.get_mut(ingredient).map(|level| {
            *level = level.saturating_sub(1);
            *level
        })
    }

    pub fn restock(&mut self, ingredient: &str, level: u32) {
        self.stock.insert(ingredient.to_string(), level);
    }

    pub fn level(&self, ingredient: &str) -> Option<u32> {
        self.stock.get(ingredient).copied()
    }

    pub fn take_out_of_service(&mut self, equipment: &str) {
        self.out_of_service.insert(equipment.to_string());
    }

    pub fn return_to_service(&mut self, equipment: &str) {
        self.out_of_service.remove(equipment);
    }

    /// Equipment currently unavailable.
    pub fn outages(&self) -> impl Iterator<Item = &str> {
        self.out_of_service.iter().map(String::as_str)
    }
}

impl KitchenPolicy for InventoryPolicy {
    fn equipment_available(&self, equipment: &str) -> bool {
        !self.out_of_service.contains(equipment)
    }

    fn ingredient_available(&self, ingredient: &str) -> bool {
        self.stock.get(ingredient).map_or(true, |level| *level > 0)
    }
}
