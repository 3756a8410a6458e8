use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A kitchen authority an agent may hold.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // Executive level
    MenuPlanning,
    StaffManagement,
    InventoryControl,
    KitchenSupervision,
    // Supervisory level
    OrderManagement,
    StaffSupervision,
    StationManagement,
    InventoryMonitoring,
    QualityControl,
    // Station level
    StationOperation,
    LineCookSupervision,
    RecipeExecution,
    InventoryTracking,
    // Execution level
    Cooking,
    EquipmentOperation,
    RecipeFollowing,
    BasicPrep,
    IngredientPrep,
    BasicEquipment,
    InventoryAccess,
    Cleaning,
    WasteManagement,
    EquipmentTransport,
    BasicMaintenance,
}

impl Permission {
    /// The snake_case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MenuPlanning => "menu_planning",
            Self::StaffManagement => "staff_management",
            Self::InventoryControl => "inventory_control",
            Self::KitchenSupervision => "kitchen_supervision",
            Self::OrderManagement => "order_management",
            Self::StaffSupervision => "staff_supervision",
            Self::StationManagement => "station_management",
            Self::InventoryMonitoring => "inventory_monitoring",
            Self::QualityControl => "quality_control",
            Self::StationOperation => "station_operation",
            Self::LineCookSupervision => "line_cook_supervision",
            Self::RecipeExecution => "recipe_execution",
            Self::InventoryTracking => "inventory_tracking",
            Self::Cooking => "cooking",
            Self::EquipmentOperation => "equipment_operation",
            Self::RecipeFollowing => "recipe_following",
            Self::BasicPrep => "basic_prep",
            Self::IngredientPrep => "ingredient_prep",
            Self::BasicEquipment => "basic_equipment",
            Self::InventoryAccess => "inventory_access",
            Self::Cleaning => "cleaning",
            Self::WasteManagement => "waste_management",
            Self::EquipmentTransport => "equipment_transport",
            Self::BasicMaintenance => "basic_maintenance",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The permissions granted to one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant one permission.
    pub fn grant(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    /// Revoke one permission; revoking an absent permission is a no-op.
    pub fn revoke(&mut self, permission: Permission) {
        self.permissions.remove(&permission);
    }

    /// Whether the permission is held.
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Whether no permission is held.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Iterate in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().copied()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_set() {
        let mut perms = PermissionSet::new();
        assert!(perms.is_empty());

        perms.grant(Permission::Cooking);
        assert!(perms.has(Permission::Cooking));
        assert!(!perms.has(Permission::MenuPlanning));

        perms.revoke(Permission::Cooking);
        assert!(!perms.has(Permission::Cooking));
        perms.revoke(Permission::Cooking);
        assert!(perms.is_empty());
    }

    #[test]
    fn test_collect_and_iterate_in_order() {
        let perms: PermissionSet = [Permission::Cleaning, Permission::MenuPlanning]
            .into_iter()
            .collect();
        let names: Vec<&str> = perms.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["menu_planning", "cleaning"]);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Permission::LineCookSupervision).unwrap();
        assert_eq!(json, "\"line_cook_supervision\"");
        assert_eq!(Permission::LineCookSupervision.to_string(), "line_cook_supervision");
    }
}
