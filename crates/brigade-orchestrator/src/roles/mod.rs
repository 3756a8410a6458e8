//! Role handler tables.
//!
//! Each role is a fixed table from task type to the permission it needs
//! and the function that carries it out. The shared pipeline in
//! [`crate::agent`] does the gating and the backend call; handlers only
//! turn a decision into events, messages and reports.

pub mod chef_de_partie;
pub mod executive_chef;
pub mod line;
pub mod sous_chef;

use crate::agent::Workbench;
use crate::types::{AgentRole, Task};
use brigade_core::BrigadeResult;
use brigade_security::Permission;

/// A role-specific task handler.
pub type Handler = fn(&mut Workbench<'_>, &Task) -> BrigadeResult<()>;

/// One row of a role's handler table.
pub struct HandlerEntry {
    pub task_type: &'static str,
    pub permission: Permission,
    pub handler: Handler,
}

/// The handler table for `role`.
pub fn table(role: AgentRole) -> &'static [HandlerEntry] {
    match role {
        AgentRole::ExecutiveChef => executive_chef::HANDLERS,
        AgentRole::SousChef => sous_chef::HANDLERS,
        AgentRole::ChefDePartie => chef_de_partie::HANDLERS,
        AgentRole::LineCook => line::LINE_COOK,
        AgentRole::PrepCook => line::PREP_COOK,
        AgentRole::KitchenPorter => line::KITCHEN_PORTER,
    }
}

pub fn lookup(role: AgentRole, task_type: &str) -> Option<&'static HandlerEntry> {
    table(role).iter().find(|e| e.task_type == task_type)
}

/// Whether `role` has a handler for `task_type`.
pub fn handles(role: AgentRole, task_type: &str) -> bool {
    lookup(role, task_type).is_some()
}

pub fn task_types(role: AgentRole) -> impl Iterator<Item = &'static str> {
    table(role).iter().map(|e| e.task_type)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::profiles::profile_for;

    #[test]
    fn test_every_handler_permission_is_granted() {
        for role in AgentRole::ALL {
            let profile = profile_for(role);
            for entry in table(role) {
                assert!(
                    profile.permissions.has(entry.permission),
                    "{role} lacks {} for {}",
                    entry.permission,
                    entry.task_type
                );
            }
        }
    }

    #[test]
    fn test_task_types_are_unique_per_role() {
        for role in AgentRole::ALL {
            let mut types: Vec<&str> = task_types(role).collect();
            let before = types.len();
            types.sort_unstable();
            types.dedup();
            assert_eq!(types.len(), before, "{role}");
        }
    }

    #[test]
    fn test_step_types_belong_to_execution_staff() {
        for step in ["ingredient_prep", "cooking_step", "plating"] {
            for role in AgentRole::ALL {
                if handles(role, step) {
                    assert!(role.is_execution_level(), "{role} handles {step}");
                }
            }
        }
        assert!(handles(AgentRole::PrepCook, "ingredient_prep"));
        assert!(!handles(AgentRole::LineCook, "ingredient_prep"));
        assert!(handles(AgentRole::KitchenPorter, "area_cleaning"));
    }
}
