//! Benchmark scenarios and deterministic order generation.
//!
//! A scenario fixes everything except the model under test: kitchen size,
//! order stream, cancellations, defects and an optional crisis. Two runs of
//! the same scenario against the same backend script see the same orders.

use crate::menu::default_menu;
use crate::order::{ItemReadings, ItemStage, MenuCategory, MenuItem, Order, OrderItem, OrderType};
use crate::quality::{expected_portion, temperature_band};
use brigade_core::{BrigadeError, BrigadeResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Most items a generated order holds.
const MAX_ITEMS_PER_ORDER: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrisisKind {
    EquipmentFailure { equipment: String },
    IngredientShortage { ingredient: String },
    /// Scales allowed preparation time; below 1.0 orders run late sooner.
    TimePressure { factor: f64 },
}

impl fmt::Display for CrisisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrisisKind::EquipmentFailure { equipment } => write!(f, "{equipment} failure"),
            CrisisKind::IngredientShortage { ingredient } => write!(f, "{ingredient} shortage"),
            CrisisKind::TimePressure { factor } => write!(f, "time pressure x{factor}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisSpec {
    pub at_tick: u32,
    pub kind: CrisisKind,
    /// Ticks until the kitchen is back to normal.
    pub recovery_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default = "default_time_pressure")]
    pub time_pressure: f64,
    /// Ticks between executive chef walk-throughs.
    #[serde(default = "default_supervision_interval")]
    pub supervision_interval: u32,
}

fn default_time_pressure() -> f64 {
    1.0
}

fn default_supervision_interval() -> u32 {
    3
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            time_pressure: default_time_pressure(),
            supervision_interval: default_supervision_interval(),
        }
    }
}

/// A customer cancelling an order that is already in the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub at_tick: u32,
    /// Index into the generated order stream.
    pub order_index: usize,
}

/// Service period a tick falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Preparation,
    Cooking,
    Plating,
    Service,
    Cleanup,
}

impl Phase {
    const ORDER: [Phase; 6] = [
        Phase::Setup,
        Phase::Preparation,
        Phase::Cooking,
        Phase::Plating,
        Phase::Service,
        Phase::Cleanup,
    ];

    /// Phase of tick `tick` (1-based) in a run of `duration` ticks.
    pub fn at(tick: u32, duration: u32) -> Phase {
        let duration = duration.max(1) as usize;
        let elapsed = tick.saturating_sub(1) as usize;
        let index = (elapsed * Self::ORDER.len() / duration).min(Self::ORDER.len() - 1);
        Self::ORDER[index]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Preparation => "preparation",
            Phase::Cooking => "cooking",
            Phase::Plating => "plating",
            Phase::Service => "service",
            Phase::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration_ticks: u32,
    pub tick_minutes: i64,
    pub start_time: DateTime<Utc>,
    pub order_volume: usize,
    /// Execution staff on shift at the start.
    pub staff_count: usize,
    /// Staff the HR desk can send when a station asks for help.
    #[serde(default)]
    pub reserve_staff: usize,
    pub stations: Vec<String>,
    /// Tracked stock levels. Untracked ingredients are unlimited.
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub crisis: Option<CrisisSpec>,
    #[serde(default)]
    pub cancellations: Vec<Cancellation>,
    /// Every n-th generated item is off spec. Zero disables defects.
    #[serde(default)]
    pub defect_every: usize,
}

impl Scenario {
    pub fn validate(&self) -> BrigadeResult<()> {
        let fail = |msg: String| Err(BrigadeError::Config(format!("scenario {}: {msg}", self.name)));
        if self.duration_ticks == 0 {
            return fail("duration_ticks must be positive".into());
        }
        if self.tick_minutes <= 0 {
            return fail("tick_minutes must be positive".into());
        }
        if self.stations.is_empty() {
            return fail("at least one station is required".into());
        }
        if self.order_volume > 0 && self.menu().is_empty() {
            return fail(format!("no dishes are served at {:?}", self.stations));
        }
        if self.constraints.time_pressure <= 0.0 {
            return fail("time_pressure must be positive".into());
        }
        if self.constraints.supervision_interval == 0 {
            return fail("supervision_interval must be positive".into());
        }
        if let Some(crisis) = &self.crisis {
            if crisis.at_tick == 0 || crisis.at_tick > self.duration_ticks {
                return fail(format!(
                    "crisis tick {} outside 1..={}",
                    crisis.at_tick, self.duration_ticks
                ));
            }
            if let CrisisKind::TimePressure { factor } = crisis.kind {
                if factor <= 0.0 {
                    return fail("crisis time pressure must be positive".into());
                }
            }
        }
        for c in &self.cancellations {
            if c.order_index >= self.order_volume {
                return fail(format!("cancellation of unknown order #{}", c.order_index));
            }
        }
        Ok(())
    }

    /// Dishes served at this scenario's stations.
    pub fn menu(&self) -> Vec<MenuItem> {
        default_menu()
            .into_iter()
            .filter(|d| self.stations.contains(&d.station))
            .collect()
    }

    /// Indices of the orders arriving at `tick`. Order `i` arrives at tick
    /// `1 + i * duration / volume`, so arrivals spread across the run.
    pub fn arrivals(&self, tick: u32) -> Vec<usize> {
        (0..self.order_volume)
            .filter(|i| self.arrival_tick(*i) == tick)
            .collect()
    }

    pub fn arrival_tick(&self, index: usize) -> u32 {
        let volume = self.order_volume.max(1);
        1 + (index * self.duration_ticks as usize / volume) as u32
    }

    /// Build order `index` of the stream.
    pub fn generate_order(&self, index: usize, menu: &[MenuItem], at: DateTime<Utc>) -> Order {
        let order_type = match index % 11 {
            10 => OrderType::Special,
            n if n % 5 == 3 => OrderType::Delivery,
            n if n % 5 == 4 => OrderType::TakeOut,
            7 => OrderType::Catering,
            _ => OrderType::DineIn,
        };
        let count = 1 + index % MAX_ITEMS_PER_ORDER;
        let mut items = Vec::with_capacity(count);
        for slot in 0..count {
            if menu.is_empty() {
                break;
            }
            let dish = &menu[(index * 3 + slot * 7) % menu.len()];
            let serial = index * MAX_ITEMS_PER_ORDER + slot + 1;
            let defective = self.defect_every > 0 && serial % self.defect_every == 0;
            items.push(OrderItem {
                menu_item: dish.clone(),
                quantity: 1,
                stage: ItemStage::Pending,
                readings: readings_for(dish, defective.then_some(serial / self.defect_every.max(1))),
                ready_at: None,
                special_instructions: None,
            });
        }
        let mut order = Order::new(order_type, items, at);
        if order_type == OrderType::DineIn {
            order.table = u32::try_from(index % 20 + 1).ok();
        }
        order
    }
}

/// Readings a careful cook would produce, or a defect of kind `defect`.
fn readings_for(dish: &MenuItem, defect: Option<usize>) -> ItemReadings {
    let (low, high) = temperature_band(dish);
    let (weight, volume) = expected_portion(dish);
    let liquid = matches!(dish.category, MenuCategory::Soup);
    let mut readings = ItemReadings {
        temperature_c: (low + high) / 2.0,
        visual: 8.5,
        plating: 8.0,
        garnish: 8.0,
        weight_g: (!liquid).then_some(weight),
        volume_ml: liquid.then_some(volume),
    };
    match defect.map(|n| n % 3) {
        Some(0) => readings.temperature_c = low - 12.0,
        Some(1) => {
            readings.weight_g = Some(weight * 0.6);
            readings.volume_ml = readings.volume_ml.map(|v| v * 0.6);
        }
        Some(_) => readings.visual = 4.0,
        None => {}
    }
    readings
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2025, 3, 1)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .map(|t| t.and_utc())
        .unwrap_or_default()
}

fn all_stations() -> Vec<String> {
    ["grill", "saute", "garde_manger", "pastry"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn base(name: &str, description: &str, start: DateTime<Utc>) -> Scenario {
    Scenario {
        name: name.into(),
        description: description.into(),
        duration_ticks: 12,
        tick_minutes: 5,
        start_time: start,
        order_volume: 12,
        staff_count: 8,
        reserve_staff: 2,
        stations: all_stations(),
        inventory: BTreeMap::from([
            ("beef".to_string(), 40),
            ("salmon".to_string(), 20),
            ("tomato".to_string(), 40),
            ("cream".to_string(), 40),
        ]),
        constraints: Constraints::default(),
        crisis: None,
        cancellations: Vec::new(),
        defect_every: 0,
    }
}

/// Names accepted by [`builtin`].
pub fn builtin_names() -> &'static [&'static str] {
    &[
        "lunch_service",
        "dinner_rush",
        "equipment_failure",
        "ingredient_shortage",
        "time_pressure",
    ]
}

/// Look up a built-in scenario by name.
pub fn builtin(name: &str) -> Option<Scenario> {
    let scenario = match name {
        "lunch_service" => Scenario {
            cancellations: vec![Cancellation {
                at_tick: 4,
                order_index: 2,
            }],
            defect_every: 7,
            ..base("lunch_service", "Steady lunch trade through the noon peak", at(11, 30))
        },
        "dinner_rush" => Scenario {
            duration_ticks: 16,
            order_volume: 24,
            reserve_staff: 1,
            defect_every: 9,
            cancellations: vec![
                Cancellation {
                    at_tick: 5,
                    order_index: 6,
                },
                Cancellation {
                    at_tick: 9,
                    order_index: 13,
                },
            ],
            ..base("dinner_rush", "Double volume during the evening peak", at(18, 0))
        },
        "equipment_failure" => Scenario {
            crisis: Some(CrisisSpec {
                at_tick: 5,
                kind: CrisisKind::EquipmentFailure {
                    equipment: "grill".into(),
                },
                recovery_ticks: 4,
            }),
            ..base("equipment_failure", "The grill goes down mid-service", at(12, 0))
        },
        "ingredient_shortage" => Scenario {
            crisis: Some(CrisisSpec {
                at_tick: 4,
                kind: CrisisKind::IngredientShortage {
                    ingredient: "tomato".into(),
                },
                recovery_ticks: 5,
            }),
            ..base("ingredient_shortage", "Tomatoes run out during lunch", at(12, 0))
        },
        "time_pressure" => Scenario {
            order_volume: 16,
            crisis: Some(CrisisSpec {
                at_tick: 4,
                kind: CrisisKind::TimePressure { factor: 0.6 },
                recovery_ticks: 6,
            }),
            ..base("time_pressure", "A large party shortens every ticket time", at(19, 0))
        },
        _ => return None,
    };
    Some(scenario)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::QualityThresholds;
    use crate::quality::QualityInspector;

    #[test]
    fn test_builtins_validate() {
        for name in builtin_names() {
            let scenario = builtin(name).unwrap();
            assert_eq!(scenario.name, *name);
            scenario.validate().unwrap();
        }
        assert!(builtin("brunch").is_none());
    }

    #[test]
    fn test_every_order_arrives_once_within_the_run() {
        let scenario = builtin("dinner_rush").unwrap();
        let arrived: usize = (1..=scenario.duration_ticks)
            .map(|t| scenario.arrivals(t).len())
            .sum();
        assert_eq!(arrived, scenario.order_volume);
        assert_eq!(scenario.arrivals(1), vec![0, 1]);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let scenario = builtin("lunch_service").unwrap();
        let menu = scenario.menu();
        let a = scenario.generate_order(5, &menu, scenario.start_time);
        let b = scenario.generate_order(5, &menu, scenario.start_time);
        let names = |o: &Order| {
            o.items
                .iter()
                .map(|i| i.menu_item.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&a), names(&b));
        assert_eq!(a.order_type, b.order_type);
        assert_eq!(a.items[0].readings, b.items[0].readings);
    }

    #[test]
    fn test_only_dine_in_orders_get_a_table() {
        let scenario = builtin("lunch_service").unwrap();
        let menu = scenario.menu();
        let at = scenario.start_time;

        let first = scenario.generate_order(0, &menu, at);
        assert_eq!(first.order_type, OrderType::DineIn);
        assert_eq!(first.table, Some(1));
        assert_eq!(scenario.generate_order(22, &menu, at).table, Some(3));

        let delivery = scenario.generate_order(3, &menu, at);
        assert_eq!(delivery.order_type, OrderType::Delivery);
        assert_eq!(delivery.table, None);
    }

    #[test]
    fn test_defects_fail_inspection_and_clean_items_pass() {
        let mut scenario = builtin("lunch_service").unwrap();
        scenario.defect_every = 2;
        let menu = scenario.menu();
        let inspector = QualityInspector::new(QualityThresholds::default());
        let now = scenario.start_time;

        // Order 1 holds serials 4 and 5; serial 4 is a defect.
        let order = scenario.generate_order(1, &menu, now);
        assert!(!inspector.inspect(&order, now).passed());

        scenario.defect_every = 0;
        for index in 0..12 {
            let order = scenario.generate_order(index, &menu, now);
            let report = inspector.inspect(&order, now);
            assert!(report.passed(), "order {index}: {:?}", report.issues);
        }
    }

    #[test]
    fn test_phases_cover_the_run() {
        assert_eq!(Phase::at(1, 12), Phase::Setup);
        assert_eq!(Phase::at(6, 12), Phase::Cooking);
        assert_eq!(Phase::at(12, 12), Phase::Cleanup);
        assert_eq!(Phase::at(1, 1), Phase::Setup);
    }

    #[test]
    fn test_validation_rejects_bad_scenarios() {
        let mut scenario = builtin("lunch_service").unwrap();
        scenario.stations = vec!["tandoor".into()];
        assert!(scenario.validate().is_err());

        let mut scenario = builtin("equipment_failure").unwrap();
        scenario.crisis.as_mut().unwrap().at_tick = 99;
        assert!(scenario.validate().is_err());

        let mut scenario = builtin("lunch_service").unwrap();
        scenario.cancellations[0].order_index = 500;
        assert!(scenario.validate().is_err());
    }
}
