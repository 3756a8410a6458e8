use super::HandlerEntry;
use crate::agent::Workbench;
use crate::assignment::sort_steps;
use crate::messages::Report;
use crate::order::{Order, OrderItem};
use crate::quality::QualityInspector;
use crate::roles;
use crate::types::{AgentId, Task};
use brigade_core::{BrigadeError, BrigadeResult, EventKind};
use brigade_security::Permission;
use tracing::{debug, warn};

pub const HANDLERS: &[HandlerEntry] = &[
    HandlerEntry {
        task_type: "recipe_execution",
        permission: Permission::RecipeExecution,
        handler: recipe_execution,
    },
    HandlerEntry {
        task_type: "line_supervision",
        permission: Permission::LineCookSupervision,
        handler: line_supervision,
    },
    HandlerEntry {
        task_type: "quality_check",
        permission: Permission::QualityControl,
        handler: quality_check,
    },
    HandlerEntry {
        task_type: "inventory_update",
        permission: Permission::InventoryTracking,
        handler: inventory_update,
    },
];

/// Success rate below which a cook is flagged during supervision.
const SUCCESS_RATE_FLOOR: f64 = 0.8;

/// Split one order item into prep, cooking and plating steps.
///
/// Every ingredient gets a prep step; cooking waits on all preps and
/// plating waits on cooking.
pub(crate) fn decompose(order: &Order, item_index: usize, item: &OrderItem) -> Vec<Task> {
    let dish = &item.menu_item;
    let base = order.priority;
    let mut steps = Vec::with_capacity(dish.ingredients.len() + 2);

    for ingredient in &dish.ingredients {
        steps.push(
            Task::new("ingredient_prep", format!("prep {ingredient} for {}", dish.name))
                .for_item(order.id, item_index)
                .with_priority(base)
                .with_list("ingredients", std::slice::from_ref(ingredient))
                .with_list("required_skills", &["knife_work".to_string()])
                .with_meta("dish", dish.name.clone()),
        );
    }
    let prep_ids = steps.iter().map(|s| s.id).collect();

    let cook = Task::new("cooking_step", format!("cook {}", dish.name))
        .for_item(order.id, item_index)
        .with_priority(base + 1)
        .with_dependencies(prep_ids)
        .with_list("equipment", &dish.equipment)
        .with_list("required_skills", &dish.skills)
        .with_meta("dish", dish.name.clone());
    let plate = Task::new("plating", format!("plate {}", dish.name))
        .for_item(order.id, item_index)
        .with_priority(base + 2)
        .with_dependencies(vec![cook.id])
        .with_list("required_skills", &["plating".to_string()])
        .with_meta("dish", dish.name.clone());
    steps.push(cook);
    steps.push(plate);
    steps
}

/// Hand each step to the best station cook. Steps nobody at the station can
/// take go to `escalate_to` for a kitchen-wide search; with nobody to
/// escalate to they are searched kitchen-wide directly.
pub(crate) fn dispatch_steps(
    wb: &mut Workbench<'_>,
    mut steps: Vec<Task>,
    station: &str,
    escalate_to: Option<AgentId>,
) -> BrigadeResult<()> {
    sort_steps(&mut steps);
    let roster = wb.ctx.roster;
    let mut assigner = wb.assigner();
    for step in steps {
        let local = roster
            .station_staff(station)
            .filter(|m| roles::handles(m.role, &step.task_type));
        match assigner.select(local, &step) {
            Ok(to) => wb.assign(to, step),
            Err(BrigadeError::NoSuitableAssignee { .. }) => match escalate_to {
                Some(supervisor) => {
                    debug!(station, task_type = %step.task_type, "Escalating step");
                    wb.record(
                        EventKind::OrderEscalation,
                        format!("no one at {station} can take '{}'", step.description),
                    );
                    wb.report(Report::Escalated {
                        task_type: step.task_type.clone(),
                        to: supervisor,
                    });
                    let escalation = Task::new(
                        "preparation_supervision",
                        format!("find someone for '{}'", step.description),
                    )
                    .with_priority(step.priority)
                    .with_meta("mode", "escalated_step")
                    .with_meta("step", serde_json::to_value(&step)?);
                    wb.assign(supervisor, escalation);
                }
                None => super::sous_chef::assign_kitchen_wide(wb, step)?,
            },
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn recipe_execution(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    let (order_id, item_index) = match (task.order_id, task.item_index) {
        (Some(o), Some(i)) => (o, i),
        _ => {
            return Err(BrigadeError::TaskFailed(
                "recipe_execution needs an order item".into(),
            ))
        }
    };
    let orders = wb.ctx.orders;
    let order = orders
        .get(order_id)
        .ok_or_else(|| BrigadeError::TaskFailed(format!("unknown order {order_id}")))?;
    if order.is_terminal() {
        wb.record(
            EventKind::Communication,
            format!("order {order_id} already {}, nothing to cook", order.status),
        );
        return Ok(());
    }
    let item = order.items.get(item_index).ok_or_else(|| {
        BrigadeError::TaskFailed(format!("order {order_id} has no item {item_index}"))
    })?;

    let station = wb
        .me
        .station
        .clone()
        .unwrap_or_else(|| item.menu_item.station.clone());
    let steps = decompose(order, item_index, item);
    wb.record(
        EventKind::Decision,
        format!("{} broken into {} steps", item.menu_item.name, steps.len()),
    );
    let supervisor = wb.me.supervisor;
    dispatch_steps(wb, steps, &station, supervisor)?;

    wb.add_own_task(
        Task::new(
            "inventory_update",
            format!("book stock for {}", item.menu_item.name),
        )
        .for_order(order_id)
        .with_priority(1)
        .with_list("consumed", &item.menu_item.ingredients),
    );
    Ok(())
}

fn quality_check(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    let order_id = task
        .order_id
        .ok_or_else(|| BrigadeError::TaskFailed("quality_check needs an order".into()))?;
    let orders = wb.ctx.orders;
    let order = orders
        .get(order_id)
        .ok_or_else(|| BrigadeError::TaskFailed(format!("unknown order {order_id}")))?;
    if order.is_terminal() {
        return Ok(());
    }

    let inspector = QualityInspector::new(wb.ctx.config.quality.clone());
    match inspector.inspect(order, wb.now()).into_result() {
        Ok(warnings) => {
            for w in &warnings {
                wb.record(
                    EventKind::QualityWarning,
                    format!("{}: {} ({})", w.item, w.kind, w.detail),
                )
                .metadata
                .insert("order_id".into(), order_id.to_string().into());
            }
            wb.record(
                EventKind::OrderStatus,
                format!("order {order_id} passed quality control"),
            );
            wb.report(Report::QualityPassed { order_id, warnings });
        }
        Err(BrigadeError::QualityCheckFailed { failures, .. }) => {
            warn!(order = %order_id, failures = failures.len(), "Order rejected at the pass");
            wb.record(
                EventKind::Error,
                format!("order {order_id} failed quality control: {}", failures.join("; ")),
            );
            wb.report(Report::QualityRejected { order_id, failures });
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

fn line_supervision(wb: &mut Workbench<'_>, _task: &Task) -> BrigadeResult<()> {
    let Some(station) = wb.me.station.clone() else {
        return Ok(());
    };
    let roster = wb.ctx.roster;
    let capacity = wb.ctx.config.assignment.capacity;
    let threshold = wb.ctx.config.assignment.workload_threshold;
    let mut flagged = 0;
    for cook in roster.station_staff(&station) {
        if cook.success_rate() < SUCCESS_RATE_FLOOR {
            flagged += 1;
            wb.record(
                EventKind::Communication,
                format!(
                    "{} at {:.0}% success, needs support",
                    cook.name,
                    cook.success_rate() * 100.0
                ),
            );
        }
        if cook.workload(capacity) >= threshold {
            wb.record(
                EventKind::Communication,
                format!("{} is overloaded", cook.name),
            );
        }
    }
    let staff = roster.station_staff(&station).count();
    wb.record(
        EventKind::StationStatus,
        format!("{station} line: {staff} cooks, {flagged} flagged"),
    );
    Ok(())
}

fn inventory_update(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    let consumed = task.meta_list("consumed");
    if consumed.is_empty() {
        return Ok(());
    }
    wb.record(
        EventKind::Decision,
        format!("booked {} ingredients", consumed.len()),
    );
    wb.report(Report::InventoryConsumed {
        ingredients: consumed,
    });
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::menu::default_menu;
    use crate::order::{ItemReadings, ItemStage, OrderType};
    use chrono::Utc;

    fn order() -> Order {
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

    #[test]
    fn test_decompose_builds_dependency_chain() {
        let order = order();
        let steps = decompose(&order, 0, &order.items[0]);
        assert_eq!(steps.len(), 5);
        let preps: Vec<&Task> = steps
            .iter()
            .filter(|s| s.task_type == "ingredient_prep")
            .collect();
        assert_eq!(preps.len(), 3);
        let cook = steps.iter().find(|s| s.task_type == "cooking_step").unwrap();
        assert_eq!(cook.dependencies.len(), 3);
        assert!(preps.iter().all(|p| cook.dependencies.contains(&p.id)));
        let plate = steps.iter().find(|s| s.task_type == "plating").unwrap();
        assert_eq!(plate.dependencies, vec![cook.id]);
        assert!(steps.iter().all(|s| s.item_index == Some(0)));
        assert_eq!(cook.equipment(), vec!["grill"]);
    }

    #[test]
    fn test_sorted_steps_put_plating_first() {
        let order = order();
        let mut steps = decompose(&order, 0, &order.items[0]);
        sort_steps(&mut steps);
        assert_eq!(steps[0].task_type, "plating");
        assert_eq!(steps[1].task_type, "cooking_step");
        assert!(steps[2..].iter().all(|s| s.task_type == "ingredient_prep"));
    }
}
