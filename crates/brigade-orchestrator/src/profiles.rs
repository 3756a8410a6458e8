use crate::types::AgentRole;
use brigade_security::{Permission, PermissionSet};

/// Static description of a role: what it may do and how it is prompted.
#[derive(Debug, Clone)]
pub struct RoleProfile {
    pub role: AgentRole,
    pub permissions: PermissionSet,
    pub system_prompt: &'static str,
    /// Skills every holder of the role has, on top of station skills.
    pub base_skills: Vec<String>,
}

/// Profiles for every role, top of the hierarchy first.
pub fn default_profiles() -> Vec<RoleProfile> {
    AgentRole::ALL.iter().map(|r| profile_for(*r)).collect()
}

pub fn profile_for(role: AgentRole) -> RoleProfile {
    use Permission::*;
    let (grants, system_prompt, skills): (&[Permission], &'static str, &[&str]) = match role {
        AgentRole::ExecutiveChef => (
            &[
                MenuPlanning,
                StaffManagement,
                InventoryControl,
                QualityControl,
                KitchenSupervision,
            ],
            EXECUTIVE_CHEF_PROMPT,
            &["menu_design", "kitchen_management"],
        ),
        AgentRole::SousChef => (
            &[
                OrderManagement,
                StaffSupervision,
                QualityControl,
                StationManagement,
                InventoryMonitoring,
            ],
            SOUS_CHEF_PROMPT,
            &["expediting"],
        ),
        AgentRole::ChefDePartie => (
            &[
                StationOperation,
                LineCookSupervision,
                QualityControl,
                RecipeExecution,
                InventoryTracking,
            ],
            CHEF_DE_PARTIE_PROMPT,
            &["plating", "tasting"],
        ),
        AgentRole::LineCook => (
            &[Cooking, EquipmentOperation, RecipeFollowing, BasicPrep],
            LINE_COOK_PROMPT,
            &["plating"],
        ),
        AgentRole::PrepCook => (
            &[IngredientPrep, BasicEquipment, InventoryAccess, Cleaning],
            PREP_COOK_PROMPT,
            &["knife_work"],
        ),
        AgentRole::KitchenPorter => (
            &[Cleaning, WasteManagement, EquipmentTransport, BasicMaintenance],
            KITCHEN_PORTER_PROMPT,
            &["cleaning"],
        ),
    };
    RoleProfile {
        role,
        permissions: grants.iter().copied().collect(),
        system_prompt,
        base_skills: skills.iter().map(|s| s.to_string()).collect(),
    }
}

const EXECUTIVE_CHEF_PROMPT: &str = "\
You are the Executive Chef of a busy restaurant kitchen. \
You plan the menu, assign incoming orders to sous chefs, and keep the \
whole kitchen running.

Rules:
1. Give each order to the sous chef best placed to deliver it.
2. Take dishes off the menu when ingredients or equipment run out.
3. Check on every station regularly.
";

const SOUS_CHEF_PROMPT: &str = "\
You are a Sous Chef running one station. You break orders down for your \
station, keep staffing in line with demand, and step in when a cook \
cannot take a job.
";

const CHEF_DE_PARTIE_PROMPT: &str = "\
You are a Chef de Partie. You turn each dish into prep, cooking and \
plating steps, hand them to your cooks, and check every plate before it \
leaves the pass.
";

const LINE_COOK_PROMPT: &str = "\
You are a Line Cook. Cook and plate exactly what the ticket says, \
following the recipe.
";

const PREP_COOK_PROMPT: &str = "\
You are a Prep Cook. Wash, cut and portion ingredients so the line \
never waits.
";

const KITCHEN_PORTER_PROMPT: &str = "\
You are a Kitchen Porter. Keep the kitchen clean, wash equipment and \
move it where it is needed.
";

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles_cover_every_role() {
        let profiles = default_profiles();
        assert_eq!(profiles.len(), AgentRole::ALL.len());
        for p in &profiles {
            assert!(!p.permissions.is_empty(), "{} has no permissions", p.role);
            assert!(!p.system_prompt.is_empty());
        }
    }

    #[test]
    fn test_permissions_follow_hierarchy() {
        let exec = profile_for(AgentRole::ExecutiveChef);
        assert!(exec.permissions.has(Permission::StaffManagement));
        assert!(!exec.permissions.has(Permission::Cooking));

        let porter = profile_for(AgentRole::KitchenPorter);
        assert!(porter.permissions.has(Permission::WasteManagement));
        assert!(!porter.permissions.has(Permission::QualityControl));
    }

    #[test]
    fn test_quality_control_held_by_supervisors() {
        for role in AgentRole::ALL {
            let holds = profile_for(role).permissions.has(Permission::QualityControl);
            assert_eq!(holds, !role.is_execution_level(), "{role}");
        }
    }
}
