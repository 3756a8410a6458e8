use super::chef_de_partie::{decompose, dispatch_steps};
use super::HandlerEntry;
use crate::agent::Workbench;
use crate::messages::Report;
use crate::order::ItemStage;
use crate::staffing::{required_staff, urgency, StationStatus};
use crate::types::{AgentRole, Task};
use brigade_core::{BrigadeError, BrigadeResult, EventKind};
use brigade_security::Permission;
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const HANDLERS: &[HandlerEntry] = &[
    HandlerEntry {
        task_type: "station_management",
        permission: Permission::StationManagement,
        handler: station_management,
    },
    HandlerEntry {
        task_type: "order_handling",
        permission: Permission::OrderManagement,
        handler: order_handling,
    },
    HandlerEntry {
        task_type: "preparation_supervision",
        permission: Permission::StaffSupervision,
        handler: preparation_supervision,
    },
];

/// Assign a step to anyone in the kitchen able to do it.
pub(crate) fn assign_kitchen_wide(wb: &mut Workbench<'_>, step: Task) -> BrigadeResult<()> {
    let roster = wb.ctx.roster;
    let mut assigner = wb.assigner();
    let pool = roster.capable_of(&step.task_type);
    match assigner.select(pool, &step) {
        Ok(to) => {
            wb.record(
                EventKind::TaskReassignment,
                format!("'{}' placed outside its station", step.description),
            );
            wb.assign(to, step);
        }
        Err(e @ BrigadeError::NoSuitableAssignee { .. }) => {
            warn!(task_type = %step.task_type, "No one in the kitchen can take step");
            wb.record(
                EventKind::Error,
                format!("step '{}' failed: {e}", step.description),
            );
            wb.report(Report::StepFailed {
                order_id: step.order_id,
                task_type: step.task_type.clone(),
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Break an order down for the station leads, or decompose it here when a
/// station has no chef de partie.
fn order_handling(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    let order_id = task
        .order_id
        .ok_or_else(|| BrigadeError::TaskFailed("order_handling needs an order".into()))?;
    let orders = wb.ctx.orders;
    let roster = wb.ctx.roster;
    let order = orders
        .get(order_id)
        .ok_or_else(|| BrigadeError::TaskFailed(format!("unknown order {order_id}")))?;
    if order.is_terminal() {
        return Ok(());
    }

    for (index, item) in order.items.iter().enumerate() {
        let dish_station = item.menu_item.station.as_str();
        let lead = roster
            .station_lead(AgentRole::ChefDePartie, dish_station)
            .or_else(|| {
                wb.me
                    .station
                    .as_deref()
                    .and_then(|own| roster.station_lead(AgentRole::ChefDePartie, own))
            });
        match lead {
            Some(lead) => {
                let recipe = Task::new(
                    "recipe_execution",
                    format!("{} for order {order_id}", item.menu_item.name),
                )
                .for_item(order_id, index)
                .with_priority(order.priority)
                .with_meta("dish", item.menu_item.name.clone());
                wb.assign(lead.id, recipe);
            }
            None => {
                info!(station = dish_station, "No chef de partie, decomposing directly");
                let steps = decompose(order, index, item);
                dispatch_steps(wb, steps, dish_station, None)?;
            }
        }
    }
    Ok(())
}

/// Size up a station and ask for staff changes.
fn station_management(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    let Some(station) = task
        .meta_str("station")
        .map(str::to_string)
        .or_else(|| wb.me.station.clone())
    else {
        return Ok(());
    };
    let ctx = wb.ctx;
    let staffing = &ctx.config.staffing;

    let load = ctx.orders.active_for_station(&station);
    let staff = ctx.roster.station_staff(&station).count();
    let mut equipment: BTreeSet<String> = ctx
        .roster
        .station_staff(&station)
        .flat_map(|m| m.equipment.iter().cloned())
        .collect();
    if let Some(lead) = ctx.roster.station_lead(AgentRole::ChefDePartie, &station) {
        equipment.extend(lead.equipment.iter().cloned());
    }
    let status = StationStatus::assess(
        &station,
        staffing.station_capacity,
        load,
        staff,
        equipment.into_iter().collect(),
        ctx.policy,
    );
    wb.record(
        EventKind::StationStatus,
        format!(
            "{station}: load {load}/{}, {staff} staff, {:?}",
            status.capacity, status.condition
        ),
    );
    for down in &status.equipment_down {
        wb.record(
            EventKind::EquipmentIssue,
            format!("{down} out of service at {station}"),
        );
    }

    let required = required_staff(load, ctx.peak, staffing);
    if staff < required {
        let level = urgency(staff, required, load, ctx.peak);
        wb.record(
            EventKind::StaffRequest,
            format!("{station} needs {required} staff, has {staff} ({level})"),
        );
        wb.report(Report::StaffRequested {
            station,
            requester: wb.me.id,
            required,
            current: staff,
            urgency: level,
        });
    } else if staff > required {
        wb.report(Report::ReleaseRequested {
            station,
            requester: wb.me.id,
            excess: staff - required,
        });
    }
    Ok(())
}

/// Handle an escalated step, or take over a late order.
fn preparation_supervision(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    match task.meta_str("mode") {
        Some("escalated_step") => {
            let raw = task
                .metadata
                .get("step")
                .cloned()
                .ok_or_else(|| BrigadeError::TaskFailed("escalation without a step".into()))?;
            let step: Task = serde_json::from_value(raw)?;
            assign_kitchen_wide(wb, step)
        }
        _ => supervise_order(wb, task),
    }
}

fn supervise_order(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    let Some(order_id) = task.order_id else {
        return Ok(());
    };
    let orders = wb.ctx.orders;
    let roster = wb.ctx.roster;
    let Some(order) = orders.get(order_id) else {
        return Err(BrigadeError::TaskFailed(format!("unknown order {order_id}")));
    };
    if order.is_terminal() {
        return Ok(());
    }
    wb.record(
        EventKind::OrderEscalation,
        format!(
            "took over order {order_id} at {} ({:.0}% done, priority {})",
            order.status,
            order.completion_percentage(),
            order.priority
        ),
    )
    .metadata
    .insert("priority".into(), i64::from(order.priority).into());

    let mut stations: Vec<&str> = order
        .items
        .iter()
        .filter(|i| i.stage != ItemStage::Completed)
        .map(|i| i.menu_item.station.as_str())
        .collect();
    stations.sort_unstable();
    stations.dedup();
    for station in stations {
        if let Some(lead) = roster.station_lead(AgentRole::ChefDePartie, station) {
            wb.assign(
                lead.id,
                Task::new("line_supervision", format!("push late order {order_id}"))
                    .for_order(order_id)
                    .with_priority(order.priority),
            );
        }
    }
    Ok(())
}
