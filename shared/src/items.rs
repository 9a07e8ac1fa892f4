//! Item definitions usable from combat.

use serde::{Deserialize, Serialize};

/// Item definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub max_stack: u32,
    pub effect: ItemEffect,
}

/// Effects an item has when used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEffect {
    RestoreHealth(u32),
}

pub const HEALTH_POTION: u32 = 1;
pub const GREATER_HEALTH_POTION: u32 = 2;

/// Built-in item definitions
pub fn get_item_definitions() -> Vec<ItemDef> {
    vec![
        ItemDef {
            id: HEALTH_POTION,
            name: "Health Potion".into(),
            description: "Restores 30 health.".into(),
            max_stack: 20,
            effect: ItemEffect::RestoreHealth(30),
        },
        ItemDef {
            id: GREATER_HEALTH_POTION,
            name: "Greater Health Potion".into(),
            description: "Restores 80 health.".into(),
            max_stack: 10,
            effect: ItemEffect::RestoreHealth(80),
        },
    ]
}

/// Look up a built-in item by id
pub fn find_item(item_id: u32) -> Option<ItemDef> {
    get_item_definitions().into_iter().find(|i| i.id == item_id)
}
