use super::HandlerEntry;
use crate::agent::Workbench;
use crate::messages::Report;
use crate::order::MenuItem;
use crate::types::{AgentRole, Task};
use brigade_core::{BrigadeError, BrigadeResult, EventKind};
use brigade_security::Permission;
use tracing::{error, info};

pub const HANDLERS: &[HandlerEntry] = &[
    HandlerEntry {
        task_type: "menu_planning",
        permission: Permission::MenuPlanning,
        handler: menu_planning,
    },
    HandlerEntry {
        task_type: "kitchen_supervision",
        permission: Permission::KitchenSupervision,
        handler: kitchen_supervision,
    },
    HandlerEntry {
        task_type: "order_assignment",
        permission: Permission::StaffManagement,
        handler: order_assignment,
    },
];

/// Pick the sous chef for an incoming order.
fn order_assignment(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    let order_id = task
        .order_id
        .ok_or_else(|| BrigadeError::TaskFailed("order_assignment needs an order".into()))?;
    let orders = wb.ctx.orders;
    let roster = wb.ctx.roster;
    let order = orders
        .get(order_id)
        .ok_or_else(|| BrigadeError::TaskFailed(format!("unknown order {order_id}")))?;
    if order.is_terminal() || order.assigned_to.is_some() {
        wb.record(
            EventKind::Communication,
            format!("order {order_id} needs no assignment ({})", order.status),
        );
        return Ok(());
    }

    let mut assigner = wb.assigner();
    match assigner.select(roster.by_role(AgentRole::SousChef), task) {
        Ok(supervisor) => {
            info!(order = %order_id, supervisor = %supervisor, "Order assigned");
            let handling = Task::new(
                "order_handling",
                format!("run order {order_id} ({} items)", order.items.len()),
            )
            .for_order(order_id)
            .with_priority(order.priority);
            wb.assign(supervisor, handling);
            wb.record(
                EventKind::OrderStatus,
                format!("order {order_id} assigned"),
            );
            wb.report(Report::OrderAssigned {
                order_id,
                supervisor,
            });
            Ok(())
        }
        Err(e @ BrigadeError::NoSuitableAssignee { .. }) => {
            error!(order = %order_id, "No sous chef can take the order");
            wb.record(
                EventKind::Error,
                format!("order {order_id} could not be assigned: {e}"),
            );
            wb.report(Report::AssignmentExhausted {
                task_type: task.task_type.clone(),
                detail: format!("order {order_id}: {e}"),
            });
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Check which dishes can be served with current stock and equipment.
fn menu_planning(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    let dishes: Vec<MenuItem> = match task.metadata.get("dishes") {
        Some(raw) => serde_json::from_value(raw.clone())?,
        None => Vec::new(),
    };
    let policy = wb.ctx.policy;
    let mut restricted = Vec::new();
    for dish in &dishes {
        let missing_equipment: Vec<&String> = dish
            .equipment
            .iter()
            .filter(|e| !policy.equipment_available(e))
            .collect();
        let missing_stock: Vec<&String> = dish
            .ingredients
            .iter()
            .filter(|i| !policy.ingredient_available(i))
            .collect();
        if missing_equipment.is_empty() && missing_stock.is_empty() {
            continue;
        }
        for e in &missing_equipment {
            wb.record(
                EventKind::EquipmentIssue,
                format!("{} off the menu: {e} unavailable", dish.name),
            );
        }
        if !missing_stock.is_empty() {
            wb.record(
                EventKind::Decision,
                format!("{} off the menu: out of {missing_stock:?}", dish.name),
            );
        }
        restricted.push(dish.name.clone());
    }
    wb.record(
        EventKind::Decision,
        format!(
            "menu set: {} of {} dishes available",
            dishes.len() - restricted.len(),
            dishes.len()
        ),
    );
    wb.report(Report::MenuRestricted { dishes: restricted });
    Ok(())
}

/// Ask each sous chef for a station review and send idle porters to clean.
fn kitchen_supervision(wb: &mut Workbench<'_>, _task: &Task) -> BrigadeResult<()> {
    let roster = wb.ctx.roster;
    for sous in roster.by_role(AgentRole::SousChef) {
        let Some(station) = sous.station.clone() else {
            continue;
        };
        wb.assign(
            sous.id,
            Task::new("station_management", format!("review {station}"))
                .with_priority(6)
                .with_meta("station", station),
        );
    }
    for porter in roster.by_role(AgentRole::KitchenPorter) {
        if porter.active_tasks == 0 {
            let area = porter.station.clone().unwrap_or_else(|| "kitchen".into());
            wb.assign(
                porter.id,
                Task::new("area_cleaning", format!("clean {area}")).with_priority(2),
            );
        }
    }
    wb.record(
        EventKind::Communication,
        format!("kitchen walk-through, {} staff on shift", roster.len()),
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::agent::{AgentCard, StepContext};
    use crate::assignment::{CandidateProfile, Roster};
    use crate::config::KitchenConfig;
    use crate::menu::default_menu;
    use crate::messages::Envelope;
    use crate::order::{ItemReadings, ItemStage, Order, OrderBook, OrderItem, OrderType};
    use crate::policy::{InventoryPolicy, KitchenPolicy, PermissivePolicy};
    use crate::types::{OrderId, TaskId};
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet, HashSet};
    use uuid::Uuid;

    fn member(role: AgentRole, station: &str) -> CandidateProfile {
        CandidateProfile {
            id: Uuid::new_v4(),
            name: format!("{role} {station}"),
            role,
            station: Some(station.into()),
            supervisor: None,
            active_tasks: 0,
            unresolved_tasks: 0,
            skills: BTreeSet::new(),
            equipment: BTreeSet::new(),
            experience: BTreeSet::new(),
            completed: 0,
            failed: 0,
        }
    }

    fn chef() -> AgentCard {
        AgentCard {
            id: Uuid::new_v4(),
            name: "Executive Chef".into(),
            role: AgentRole::ExecutiveChef,
            station: None,
            supervisor: None,
        }
    }

    fn steak_order() -> Order {
        let dish = default_menu()
            .into_iter()
            .find(|d| d.name == "grilled steak")
            .unwrap();
        let item = OrderItem {
            menu_item: dish,
            quantity: 1,
            stage: ItemStage::Pending,
            readings: ItemReadings {
                temperature_c: 60.0,
                visual: 8.0,
                plating: 8.0,
                garnish: 8.0,
                weight_g: None,
                volume_ml: None,
            },
            ready_at: None,
            special_instructions: None,
        };
        Order::new(OrderType::DineIn, vec![item], Utc::now())
    }

    fn run(
        handler: crate::roles::Handler,
        task: &Task,
        roster: &Roster,
        orders: &OrderBook,
        policy: &dyn KitchenPolicy,
    ) -> crate::agent::HandlerOutput {
        let config = KitchenConfig::default();
        let completed: HashSet<TaskId> = HashSet::new();
        let cancelled: HashSet<OrderId> = HashSet::new();
        let ctx = StepContext {
            now: Utc::now(),
            roster,
            orders,
            config: &config,
            policy,
            completed_steps: &completed,
            cancelled_orders: &cancelled,
            peak: false,
        };
        let me = chef();
        let mut wb = Workbench::new(&me, &ctx, "go".into());
        handler(&mut wb, task).unwrap();
        wb.finish()
    }

    #[test]
    fn test_order_goes_to_a_sous_chef() {
        let sous = member(AgentRole::SousChef, "grill");
        let roster = Roster::new(vec![member(AgentRole::LineCook, "grill"), sous.clone()]);
        let mut orders = OrderBook::new();
        let order_id = orders.add(steak_order());
        let task = Task::new("order_assignment", "assign").for_order(order_id);

        let out = run(order_assignment, &task, &roster, &orders, &PermissivePolicy);
        assert_eq!(out.outbox.len(), 1);
        match &out.outbox[0] {
            Envelope::Assign { to, task } => {
                assert_eq!(*to, sous.id);
                assert_eq!(task.task_type, "order_handling");
                assert_eq!(task.order_id, Some(order_id));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            out.reports[0],
            Report::OrderAssigned { supervisor, .. } if supervisor == sous.id
        ));
    }

    #[test]
    fn test_no_sous_chef_reports_exhaustion() {
        let roster = Roster::new(vec![member(AgentRole::LineCook, "grill")]);
        let mut orders = OrderBook::new();
        let order_id = orders.add(steak_order());
        let task = Task::new("order_assignment", "assign").for_order(order_id);

        let out = run(order_assignment, &task, &roster, &orders, &PermissivePolicy);
        assert!(out.outbox.is_empty());
        assert!(matches!(out.reports[0], Report::AssignmentExhausted { .. }));
        assert!(out.events.iter().any(|e| e.kind == EventKind::Error));
    }

    #[test]
    fn test_menu_planning_restricts_dishes_without_equipment() {
        let mut policy = InventoryPolicy::new(BTreeMap::new());
        policy.take_out_of_service("grill");
        let task = Task::new("menu_planning", "replan")
            .with_meta("dishes", serde_json::to_value(default_menu()).unwrap());

        let out = run(
            menu_planning,
            &task,
            &Roster::default(),
            &OrderBook::new(),
            &policy,
        );
        let Report::MenuRestricted { dishes } = &out.reports[0] else {
            panic!("expected a menu report");
        };
        assert!(dishes.contains(&"grilled steak".to_string()));
        assert!(!dishes.contains(&"garden salad".to_string()));
        assert!(out.events.iter().any(|e| e.kind == EventKind::EquipmentIssue));
    }

    #[test]
    fn test_supervision_reaches_every_sous_chef_and_idle_porter() {
        let mut busy = member(AgentRole::KitchenPorter, "grill");
        busy.active_tasks = 2;
        let roster = Roster::new(vec![
            member(AgentRole::SousChef, "grill"),
            member(AgentRole::SousChef, "pastry"),
            member(AgentRole::KitchenPorter, "pastry"),
            busy,
        ]);
        let task = Task::new("kitchen_supervision", "walk the line");
        let out = run(
            kitchen_supervision,
            &task,
            &roster,
            &OrderBook::new(),
            &PermissivePolicy,
        );
        let types: Vec<&str> = out
            .outbox
            .iter()
            .filter_map(|e| match e {
                Envelope::Assign { task, .. } => Some(task.task_type.as_str()),
                Envelope::Note { .. } => None,
            })
            .collect();
        assert_eq!(
            types,
            vec!["station_management", "station_management", "area_cleaning"]
        );
    }
}
