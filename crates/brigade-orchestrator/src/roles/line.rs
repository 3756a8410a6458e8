//! Execution-level staff: line cooks, prep cooks and porters.

use super::HandlerEntry;
use crate::agent::Workbench;
use crate::messages::Report;
use crate::types::Task;
use brigade_core::BrigadeResult;
use brigade_security::Permission;

pub const LINE_COOK: &[HandlerEntry] = &[
    HandlerEntry {
        task_type: "cooking_step",
        permission: Permission::Cooking,
        handler: execute,
    },
    HandlerEntry {
        task_type: "plating",
        permission: Permission::RecipeFollowing,
        handler: execute,
    },
    HandlerEntry {
        task_type: "equipment_prep",
        permission: Permission::EquipmentOperation,
        handler: execute,
    },
    HandlerEntry {
        task_type: "cleanup",
        permission: Permission::BasicPrep,
        handler: execute,
    },
];

pub const PREP_COOK: &[HandlerEntry] = &[
    HandlerEntry {
        task_type: "ingredient_prep",
        permission: Permission::IngredientPrep,
        handler: execute,
    },
    HandlerEntry {
        task_type: "batch_prep",
        permission: Permission::IngredientPrep,
        handler: execute,
    },
    HandlerEntry {
        task_type: "station_setup",
        permission: Permission::BasicEquipment,
        handler: execute,
    },
    HandlerEntry {
        task_type: "cleanup",
        permission: Permission::Cleaning,
        handler: execute,
    },
];

pub const KITCHEN_PORTER: &[HandlerEntry] = &[
    HandlerEntry {
        task_type: "area_cleaning",
        permission: Permission::Cleaning,
        handler: execute,
    },
    HandlerEntry {
        task_type: "equipment_washing",
        permission: Permission::Cleaning,
        handler: execute,
    },
    HandlerEntry {
        task_type: "waste_disposal",
        permission: Permission::WasteManagement,
        handler: execute,
    },
    HandlerEntry {
        task_type: "equipment_transport",
        permission: Permission::EquipmentTransport,
        handler: execute,
    },
];

/// Carry out the task. Recipe steps report item progress.
fn execute(wb: &mut Workbench<'_>, task: &Task) -> BrigadeResult<()> {
    if let (Some(order_id), Some(item_index)) = (task.order_id, task.item_index) {
        wb.report(Report::StepCompleted {
            order_id,
            item_index,
            step_type: task.task_type.clone(),
        });
    }
    Ok(())
}
