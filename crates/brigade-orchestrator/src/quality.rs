//! The quality gate run on finished orders.

use crate::config::QualityThresholds;
use crate::order::{MenuCategory, MenuItem, Order, OrderItem};
use crate::types::OrderId;
use brigade_core::{BrigadeError, BrigadeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The individual checks of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Temperature,
    Presentation,
    Timing,
    Portion,
}

impl CheckKind {
    /// Critical checks block completion; the rest only warn.
    pub fn is_critical(&self) -> bool {
        !matches!(self, CheckKind::Timing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A single finding. Non-critical findings are quality warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub check: CheckKind,
    pub item: String,
    /// Machine-readable issue tag, e.g. `undersized_portion`.
    pub kind: String,
    pub severity: Severity,
    pub detail: String,
}

impl QualityIssue {
    pub fn is_critical(&self) -> bool {
        self.check.is_critical()
    }
}

/// Everything the gate found for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub order_id: OrderId,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        !self.issues.iter().any(QualityIssue::is_critical)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(|i| !i.is_critical())
    }

    pub fn failures(&self) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(|i| i.is_critical())
    }

    /// `Ok` with the warnings, or the aggregated critical failures.
    pub fn into_result(self) -> BrigadeResult<Vec<QualityIssue>> {
        if self.passed() {
            return Ok(self.issues);
        }
        Err(BrigadeError::QualityCheckFailed {
            order_id: self.order_id,
            failures: self
                .failures()
                .map(|i| format!("{}: {} ({})", i.item, i.kind, i.detail))
                .collect(),
        })
    }
}

/// Acceptable serving temperature in °C, boundaries included.
pub fn temperature_band(item: &MenuItem) -> (f64, f64) {
    let name = item.name.to_lowercase();
    if name.contains("ice cream") {
        return (-12.0, -6.0);
    }
    if name.contains("steak") {
        return (55.0, 65.0);
    }
    match item.category {
        MenuCategory::Soup => (65.0, 85.0),
        MenuCategory::Salad => (2.0, 10.0),
        MenuCategory::Dessert => (2.0, 22.0),
        MenuCategory::Seafood => (60.0, 70.0),
        MenuCategory::Poultry => (74.0, 85.0),
        _ => (60.0, 75.0),
    }
}

/// Expected portion as `(grams, millilitres)`.
pub fn expected_portion(item: &MenuItem) -> (f64, f64) {
    let (weight, volume) = match item.category {
        MenuCategory::Appetizer => (120.0, 150.0),
        MenuCategory::Entree => (350.0, 400.0),
        MenuCategory::Side => (180.0, 200.0),
        MenuCategory::Dessert => (150.0, 180.0),
        MenuCategory::Soup => (300.0, 350.0),
        _ => (250.0, 300.0),
    };
    let name = item.name.to_lowercase();
    if name.contains("steak") {
        (280.0, volume)
    } else if name.contains("salad") {
        (200.0, 400.0)
    } else if name.contains("soup") {
        (350.0, 400.0)
    } else {
        (weight, volume)
    }
}

/// Whether the dish is served hot.
pub fn is_hot(item: &MenuItem) -> bool {
    const HOT_NAMES: [&str; 7] = ["steak", "burger", "pasta", "chicken", "fish", "roast", "curry"];
    let category_hot = matches!(
        item.category,
        MenuCategory::Soup
            | MenuCategory::Entree
            | MenuCategory::Seafood
            | MenuCategory::Poultry
            | MenuCategory::Specialty
    );
    let name = item.name.to_lowercase();
    category_hot || HOT_NAMES.iter().any(|n| name.contains(n))
}

/// Runs every check against an order.
#[derive(Debug, Clone, Default)]
pub struct QualityInspector {
    thresholds: QualityThresholds,
}

impl QualityInspector {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn inspect(&self, order: &Order, now: DateTime<Utc>) -> QualityReport {
        let mut issues = Vec::new();
        for item in &order.items {
            self.check_temperature(item, &mut issues);
            self.check_presentation(item, &mut issues);
            self.check_portion(item, &mut issues);
            self.check_idle(item, now, &mut issues);
        }
        self.check_serving_order(order, &mut issues);
        QualityReport {
            order_id: order.id,
            issues,
        }
    }

    fn check_temperature(&self, item: &OrderItem, issues: &mut Vec<QualityIssue>) {
        let (min, max) = temperature_band(&item.menu_item);
        let t = item.readings.temperature_c;
        if t < min || t > max {
            issues.push(QualityIssue {
                check: CheckKind::Temperature,
                item: item.menu_item.name.clone(),
                kind: "temperature_out_of_range".into(),
                severity: Severity::High,
                detail: format!("{t:.1}°C outside {min:.1}..={max:.1}"),
            });
        }
    }

    fn check_presentation(&self, item: &OrderItem, issues: &mut Vec<QualityIssue>) {
        let min = self.thresholds.presentation_min;
        let r = &item.readings;
        for (score, kind, severity) in [
            (r.visual, "poor_visual_appeal", Severity::High),
            (r.plating, "inconsistent_plating", Severity::Medium),
            (r.garnish, "poor_garnish", Severity::Medium),
        ] {
            if score < min {
                issues.push(QualityIssue {
                    check: CheckKind::Presentation,
                    item: item.menu_item.name.clone(),
                    kind: kind.into(),
                    severity,
                    detail: format!("scored {score:.1}, need {min:.1}"),
                });
            }
        }
    }

    fn check_portion(&self, item: &OrderItem, issues: &mut Vec<QualityIssue>) {
        let (weight, volume) = expected_portion(&item.menu_item);
        let tolerance = self.thresholds.portion_tolerance;
        let name = &item.menu_item.name;

        if let Some(actual) = item.readings.weight_g {
            let deviation = (actual - weight) / weight;
            if deviation > tolerance {
                issues.push(portion_issue(name, "oversized_portion", Severity::Medium, actual, weight));
            } else if deviation < -tolerance {
                issues.push(portion_issue(name, "undersized_portion", Severity::High, actual, weight));
            }
        }
        if let Some(actual) = item.readings.volume_ml {
            let deviation = (actual - volume) / volume;
            if deviation > tolerance {
                issues.push(portion_issue(name, "oversized_volume", Severity::Low, actual, volume));
            } else if deviation < -tolerance {
                issues.push(portion_issue(name, "undersized_volume", Severity::Medium, actual, volume));
            }
        }
    }

    fn check_idle(&self, item: &OrderItem, now: DateTime<Utc>, issues: &mut Vec<QualityIssue>) {
        let Some(ready_at) = item.ready_at else {
            return;
        };
        if !is_hot(&item.menu_item) {
            return;
        }
        let idle = (now - ready_at).num_minutes();
        if idle > self.thresholds.hot_idle_minutes {
            issues.push(QualityIssue {
                check: CheckKind::Timing,
                item: item.menu_item.name.clone(),
                kind: "hot_item_idle".into(),
                severity: Severity::Medium,
                detail: format!("waited {idle} min before service"),
            });
        }
    }

    /// Courses must come out appetizer, then entree, then dessert.
    fn check_serving_order(&self, order: &Order, issues: &mut Vec<QualityIssue>) {
        let mut ready: Vec<(&DateTime<Utc>, &OrderItem)> = order
            .items
            .iter()
            .filter_map(|i| i.ready_at.as_ref().map(|t| (t, i)))
            .collect();
        ready.sort_by_key(|(t, _)| **t);
        for pair in ready.windows(2) {
            let (earlier, later) = (pair[0].1, pair[1].1);
            if later.menu_item.category.course() < earlier.menu_item.category.course() {
                issues.push(QualityIssue {
                    check: CheckKind::Timing,
                    item: later.menu_item.name.clone(),
                    kind: "serving_order_violation".into(),
                    severity: Severity::Low,
                    detail: format!(
                        "{} ready after {}",
                        later.menu_item.category.as_str(),
                        earlier.menu_item.category.as_str()
                    ),
                });
            }
        }
    }
}

fn portion_issue(item: &str, kind: &str, severity: Severity, actual: f64, expected: f64) -> QualityIssue {
    QualityIssue {
        check: CheckKind::Portion,
        item: item.to_string(),
        kind: kind.to_string(),
        severity,
        detail: format!("{actual:.0} vs expected {expected:.0}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::menu::default_menu;
    use crate::order::{ItemReadings, ItemStage, OrderType};
    use chrono::Duration;

    fn dish(name: &str) -> MenuItem {
        default_menu()
            .into_iter()
            .find(|d| d.name == name)
            .unwrap()
    }

    fn plated(menu_item: MenuItem, temperature_c: f64) -> OrderItem {
        let (weight, volume) = expected_portion(&menu_item);
        OrderItem {
            menu_item,
            quantity: 1,
            stage: ItemStage::Completed,
            readings: ItemReadings {
                temperature_c,
                visual: 8.0,
                plating: 8.0,
                garnish: 8.0,
                weight_g: Some(weight),
                volume_ml: Some(volume),
            },
            ready_at: None,
            special_instructions: None,
        }
    }

    fn order_of(items: Vec<OrderItem>) -> Order {
        Order::new(OrderType::DineIn, items, Utc::now())
    }

    #[test]
    fn test_temperature_inside_band_passes() {
        let inspector = QualityInspector::default();
        let soup = dish("tomato soup");
        let (min, max) = temperature_band(&soup);
        for t in [min, (min + max) / 2.0, max] {
            let report = inspector.inspect(&order_of(vec![plated(soup.clone(), t)]), Utc::now());
            assert!(report.passed(), "{t} should pass");
        }
    }

    #[test]
    fn test_temperature_outside_band_fails() {
        let inspector = QualityInspector::default();
        let steak = dish("grilled steak");
        for t in [54.9, 65.1, 20.0] {
            let report = inspector.inspect(&order_of(vec![plated(steak.clone(), t)]), Utc::now());
            assert!(!report.passed(), "{t} should fail");
            assert_eq!(report.failures().next().unwrap().check, CheckKind::Temperature);
        }
    }

    #[test]
    fn test_name_overrides_category_band() {
        assert_eq!(temperature_band(&dish("vanilla ice cream")), (-12.0, -6.0));
        assert_eq!(temperature_band(&dish("chocolate cake")), (2.0, 22.0));
        assert_eq!(expected_portion(&dish("grilled steak")), (280.0, 400.0));
        assert_eq!(expected_portion(&dish("tomato soup")), (350.0, 400.0));
    }

    #[test]
    fn test_presentation_below_threshold_is_critical() {
        let inspector = QualityInspector::default();
        let mut item = plated(dish("garden salad"), 5.0);
        item.readings.garnish = 6.5;
        let report = inspector.inspect(&order_of(vec![item]), Utc::now());
        assert!(!report.passed());
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.kind, "poor_garnish");
        assert_eq!(failure.severity, Severity::Medium);
    }

    #[test]
    fn test_portion_tolerance() {
        let inspector = QualityInspector::default();
        let mut item = plated(dish("classic burger"), 65.0);
        item.readings.weight_g = Some(400.0);
        assert!(inspector.inspect(&order_of(vec![item.clone()]), Utc::now()).passed());

        item.readings.weight_g = Some(350.0 * 0.8);
        let report = inspector.inspect(&order_of(vec![item]), Utc::now());
        assert_eq!(report.failures().next().unwrap().kind, "undersized_portion");
    }

    #[test]
    fn test_timing_issues_only_warn() {
        let inspector = QualityInspector::default();
        let now = Utc::now();
        let mut dessert = plated(dish("chocolate cake"), 15.0);
        dessert.ready_at = Some(now - Duration::minutes(20));
        let mut steak = plated(dish("grilled steak"), 60.0);
        steak.ready_at = Some(now - Duration::minutes(15));

        let report = inspector.inspect(&order_of(vec![dessert, steak]), now);
        assert!(report.passed());
        let kinds: Vec<&str> = report.warnings().map(|w| w.kind.as_str()).collect();
        assert!(kinds.contains(&"hot_item_idle"));
        assert!(kinds.contains(&"serving_order_violation"));
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_failures_aggregate_into_error() {
        let inspector = QualityInspector::default();
        let mut item = plated(dish("roast chicken"), 40.0);
        item.readings.visual = 3.0;
        let order = order_of(vec![item]);
        let err = inspector.inspect(&order, Utc::now()).into_result().unwrap_err();
        match err {
            BrigadeError::QualityCheckFailed { order_id, failures } => {
                assert_eq!(order_id, order.id);
                assert_eq!(failures.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
