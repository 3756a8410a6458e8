//! Built-in menu used by scenario order generation.

use crate::order::{MenuCategory, MenuItem};

#[allow(clippy::too_many_arguments)]
fn dish(
    name: &str,
    category: MenuCategory,
    station: &str,
    ingredients: &[&str],
    equipment: &[&str],
    skills: &[&str],
    prep_minutes: i64,
    cook_minutes: i64,
) -> MenuItem {
    let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    MenuItem {
        name: name.to_string(),
        category,
        station: station.to_string(),
        ingredients: owned(ingredients),
        equipment: owned(equipment),
        skills: owned(skills),
        prep_minutes,
        cook_minutes,
    }
}

/// Every dish the kitchen can produce.
pub fn default_menu() -> Vec<MenuItem> {
    vec![
        dish(
            "grilled steak",
            MenuCategory::Entree,
            "grill",
            &["beef", "butter", "thyme"],
            &["grill"],
            &["grilling"],
            5,
            15,
        ),
        dish(
            "classic burger",
            MenuCategory::Entree,
            "grill",
            &["beef", "bun", "cheddar"],
            &["grill"],
            &["grilling"],
            5,
            10,
        ),
        dish(
            "roast chicken",
            MenuCategory::Poultry,
            "grill",
            &["chicken", "thyme", "butter"],
            &["oven"],
            &["roasting"],
            10,
            25,
        ),
        dish(
            "pan seared salmon",
            MenuCategory::Seafood,
            "saute",
            &["salmon", "butter", "lemon"],
            &["stove"],
            &["sauteing"],
            5,
            10,
        ),
        dish(
            "mushroom pasta",
            MenuCategory::Entree,
            "saute",
            &["pasta", "mushroom", "cream"],
            &["stove"],
            &["sauteing"],
            5,
            12,
        ),
        dish(
            "tomato soup",
            MenuCategory::Soup,
            "saute",
            &["tomato", "cream", "basil"],
            &["stockpot"],
            &["simmering"],
            5,
            20,
        ),
        dish(
            "garden salad",
            MenuCategory::Salad,
            "garde_manger",
            &["lettuce", "tomato", "cucumber"],
            &["cutting_board"],
            &["knife_work"],
            8,
            0,
        ),
        dish(
            "bruschetta",
            MenuCategory::Appetizer,
            "garde_manger",
            &["bread", "tomato", "basil"],
            &["oven"],
            &["knife_work"],
            6,
            4,
        ),
        dish(
            "chocolate cake",
            MenuCategory::Dessert,
            "pastry",
            &["chocolate", "flour", "egg"],
            &["oven"],
            &["baking"],
            15,
            30,
        ),
        dish(
            "vanilla ice cream",
            MenuCategory::Dessert,
            "pastry",
            &["cream", "vanilla", "sugar"],
            &["freezer"],
            &["churning"],
            5,
            5,
        ),
    ]
}

/// Skills practised at `station`, derived from its dishes.
pub fn station_skills(menu: &[MenuItem], station: &str) -> Vec<String> {
    let mut skills: Vec<String> = menu
        .iter()
        .filter(|d| d.station == station)
        .flat_map(|d| d.skills.iter().cloned())
        .collect();
    skills.sort();
    skills.dedup();
    skills
}

/// Equipment in use at `station`.
pub fn station_equipment(menu: &[MenuItem], station: &str) -> Vec<String> {
    let mut equipment: Vec<String> = menu
        .iter()
        .filter(|d| d.station == station)
        .flat_map(|d| d.equipment.iter().cloned())
        .collect();
    equipment.sort();
    equipment.dedup();
    equipment
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_is_well_formed() {
        let menu = default_menu();
        assert!(!menu.is_empty());
        for dish in &menu {
            assert!(!dish.ingredients.is_empty(), "{} has no ingredients", dish.name);
            assert!(!dish.skills.is_empty(), "{} has no skills", dish.name);
            assert!(dish.expected_minutes() > 0);
        }
    }

    #[test]
    fn test_station_skills_deduplicated() {
        let menu = default_menu();
        assert_eq!(station_skills(&menu, "grill"), vec!["grilling", "roasting"]);
        assert_eq!(station_equipment(&menu, "grill"), vec!["grill", "oven"]);
        assert!(station_skills(&menu, "bakery").is_empty());
    }
}
