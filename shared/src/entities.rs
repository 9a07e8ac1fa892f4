//! Entity definitions and persistent character records.

use serde::{Deserialize, Serialize};

use crate::items::find_item;

/// Definition id that must always be present in a registry.
pub const FALLBACK_DEFINITION_ID: &str = "human";

/// Numeric id of a persistent character record
pub type CharacterId = u64;

/// Whether a definition describes a playable race or a monster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Race,
    Monster,
}

impl EntityCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Race => "race",
            Self::Monster => "monster",
        }
    }
}

fn default_encounter_weight() -> f32 {
    1.0
}

/// Static archetype a combatant is derived from.
///
/// Base stats describe the archetype at `level`; combat units scale them with
/// their own level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub category: EntityCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Overrides the level-based experience reward
    #[serde(default)]
    pub experience_reward: Option<u64>,
    /// Coins dropped on defeat (none when absent)
    #[serde(default)]
    pub currency_reward: Option<u64>,
    /// Relative weight when rolling random encounters
    #[serde(default = "default_encounter_weight")]
    pub encounter_weight: f32,
}

impl EntityDefinition {
    pub fn is_monster(&self) -> bool {
        self.category == EntityCategory::Monster
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Where a character currently stands on the world map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterLocation {
    pub map_id: u32,
    pub node_id: u32,
}

/// A stack of identical items in an inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: u32,
    pub quantity: u32,
}

/// Coins and carried items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub currency: u64,
    #[serde(default)]
    pub items: Vec<ItemStack>,
}

impl Inventory {
    pub fn item_count(&self, item_id: u32) -> u32 {
        self.items
            .iter()
            .filter(|s| s.item_id == item_id)
            .fold(0u32, |acc, s| acc.saturating_add(s.quantity))
    }

    /// Add items, stacking onto an existing stack when there is one.
    /// A stack never grows past the item's `max_stack`; returns how many
    /// were actually added.
    pub fn add_item(&mut self, item_id: u32, quantity: u32) -> u32 {
        let max_stack = find_item(item_id).map(|def| def.max_stack).unwrap_or(u32::MAX);
        match self.items.iter_mut().find(|s| s.item_id == item_id) {
            Some(stack) => {
                let before = stack.quantity;
                stack.quantity = before.saturating_add(quantity).min(max_stack).max(before);
                stack.quantity - before
            }
            None => {
                let added = quantity.min(max_stack);
                if added > 0 {
                    self.items.push(ItemStack { item_id, quantity: added });
                }
                added
            }
        }
    }

    /// Remove up to `quantity` items and return how many were actually removed.
    /// Emptied stacks are dropped.
    pub fn remove_item(&mut self, item_id: u32, quantity: u32) -> u32 {
        let mut remaining = quantity;
        for stack in self.items.iter_mut().filter(|s| s.item_id == item_id) {
            if remaining == 0 {
                break;
            }
            let taken = stack.quantity.min(remaining);
            stack.quantity -= taken;
            remaining -= taken;
        }
        self.items.retain(|s| s.quantity > 0);
        quantity - remaining
    }
}

/// Problems found by [`Character::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterViolation {
    LevelZero,
    HealthAboveMax,
}

/// Persistent game-entity record (player or NPC).
///
/// Owned by the save layer; combat reads it on entry and hands back an
/// updated copy when the session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub location: CharacterLocation,
    pub level: u32,
    pub experience: u64,
    /// Entity definition id (race or monster kind)
    pub race: String,
    pub max_hp: u32,
    pub current_hp: u32,
    pub attack: u32,
    #[serde(default)]
    pub inventory: Inventory,
}

impl Character {
    pub fn new(id: CharacterId, name: impl Into<String>, race: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: CharacterLocation::default(),
            level: 1,
            experience: 0,
            race: race.into(),
            max_hp: 0,
            current_hp: 0,
            attack: 0,
            inventory: Inventory::default(),
        }
    }

    /// Set recorded stats; current HP starts full
    pub fn with_stats(mut self, max_hp: u32, attack: u32) -> Self {
        self.max_hp = max_hp;
        self.current_hp = max_hp;
        self.attack = attack;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn validate(&self) -> Vec<CharacterViolation> {
        let mut violations = Vec::new();
        if self.level == 0 {
            violations.push(CharacterViolation::LevelZero);
        }
        if self.current_hp > self.max_hp {
            violations.push(CharacterViolation::HealthAboveMax);
        }
        violations
    }

    /// Copy with level and HP clamped into their valid ranges
    pub fn normalized(&self) -> Self {
        let mut c = self.clone();
        c.level = c.level.max(1);
        c.current_hp = c.current_hp.min(c.max_hp);
        c
    }

    pub fn is_dead(&self) -> bool {
        self.current_hp == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{GREATER_HEALTH_POTION, HEALTH_POTION};

    #[test]
    fn test_inventory_stacking() {
        let mut inv = Inventory::default();
        inv.add_item(1, 2);
        inv.add_item(1, 3);
        inv.add_item(2, 1);
        assert_eq!(inv.items.len(), 2);
        assert_eq!(inv.item_count(1), 5);

        assert_eq!(inv.remove_item(1, 4), 4);
        assert_eq!(inv.item_count(1), 1);

        // Removing more than carried only removes what is there
        assert_eq!(inv.remove_item(1, 10), 1);
        assert_eq!(inv.item_count(1), 0);
        assert!(inv.items.iter().all(|s| s.item_id != 1));
    }

    #[test]
    fn test_stacks_stop_at_max_stack() {
        let mut inv = Inventory::default();
        assert_eq!(inv.add_item(HEALTH_POTION, 15), 15);
        assert_eq!(inv.add_item(HEALTH_POTION, 10), 5);
        assert_eq!(inv.item_count(HEALTH_POTION), 20);
        assert_eq!(inv.add_item(HEALTH_POTION, 1), 0);

        assert_eq!(inv.add_item(GREATER_HEALTH_POTION, 25), 10);
        assert_eq!(inv.item_count(GREATER_HEALTH_POTION), 10);
        assert_eq!(inv.items.len(), 2);
    }

    #[test]
    fn test_unknown_item_stack_saturates() {
        let mut inv = Inventory::default();
        inv.add_item(99, u32::MAX);
        assert_eq!(inv.add_item(99, u32::MAX), 0);
        assert_eq!(inv.item_count(99), u32::MAX);
    }

    #[test]
    fn test_character_normalization() {
        let mut c = Character::new(1, "Aria", "human").with_stats(50, 10).with_level(0);
        c.current_hp = 80;
        assert_eq!(
            c.validate(),
            vec![CharacterViolation::LevelZero, CharacterViolation::HealthAboveMax]
        );

        let n = c.normalized();
        assert!(n.validate().is_empty());
        assert_eq!(n.level, 1);
        assert_eq!(n.current_hp, 50);
    }

    #[test]
    fn test_definition_defaults_from_json() {
        let json = r#"{
            "id": "goblin", "name": "Goblin", "level": 1,
            "max_hp": 30, "attack": 8, "category": "monster"
        }"#;
        let def: EntityDefinition = serde_json::from_str(json).unwrap();
        assert!(def.is_monster());
        assert_eq!(def.encounter_weight, 1.0);
        assert!(def.experience_reward.is_none());
        assert!(def.tags.is_empty());
    }
}
