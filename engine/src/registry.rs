//! Entity definition registry.
//!
//! A fixed catalog of races and monsters. Built once at startup and only read
//! afterwards; sessions receive it behind an `Arc`.

use std::collections::HashMap;
use std::path::Path;

use log::{error, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use wayfarer_shared::{EntityCategory, EntityDefinition, FALLBACK_DEFINITION_ID};

use crate::error::RegistryError;

/// Default number of levels below the player a suitable enemy may be
pub const DEFAULT_LEVELS_BELOW: u32 = 2;

/// Default number of levels above the player a suitable enemy may be
pub const DEFAULT_LEVELS_ABOVE: u32 = 3;

/// Lookup table of entity definitions
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    /// Definitions in catalog order
    definitions: Vec<EntityDefinition>,
    /// Definition id -> index into `definitions`
    index: HashMap<String, usize>,
}

impl EntityRegistry {
    /// Build a registry, rejecting duplicate ids and a missing `human`
    pub fn from_definitions(definitions: Vec<EntityDefinition>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if index.insert(def.id.clone(), i).is_some() {
                return Err(RegistryError::DuplicateId(def.id.clone()));
            }
        }
        if !index.contains_key(FALLBACK_DEFINITION_ID) {
            return Err(RegistryError::MissingHuman);
        }
        Ok(Self { definitions, index })
    }

    /// Registry with the built-in catalog
    pub fn with_defaults() -> Self {
        let definitions = default_definitions();
        let index = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
        Self { definitions, index }
    }

    /// Load definitions from a JSON array, falling back to the built-in
    /// catalog when the file is absent or unusable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    error!("Failed to read entity definitions {:?}: {}", path, e);
                } else {
                    info!("No entity definitions at {:?}, using built-in catalog", path);
                }
                return Self::with_defaults();
            }
        };

        let definitions: Vec<EntityDefinition> = match serde_json::from_str(&content) {
            Ok(d) => d,
            Err(e) => {
                error!("Failed to parse entity definitions {:?}: {}", path, e);
                return Self::with_defaults();
            }
        };

        match Self::from_definitions(definitions) {
            Ok(registry) => {
                info!("Loaded {} entity definitions from {:?}", registry.len(), path);
                registry
            }
            Err(e) => {
                error!("Invalid entity definitions in {:?}: {}", path, e);
                Self::with_defaults()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&EntityDefinition> {
        self.index.get(id).map(|&i| &self.definitions[i])
    }

    /// The guaranteed fallback definition
    pub fn human(&self) -> &EntityDefinition {
        // Both constructors guarantee the entry exists
        &self.definitions[self.index[FALLBACK_DEFINITION_ID]]
    }

    /// Look up `id`, substituting `human` for unknown ids
    pub fn resolve(&self, id: &str) -> &EntityDefinition {
        match self.get(id) {
            Some(def) => def,
            None => {
                warn!("Unknown entity definition `{}`, falling back to `{}`", id, FALLBACK_DEFINITION_ID);
                self.human()
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.definitions.iter()
    }

    pub fn monsters(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.definitions.iter().filter(|d| d.is_monster())
    }

    /// Monsters whose level lies in `[max(1, level - 2), level + 3]`
    pub fn suitable_enemies(&self, player_level: u32) -> Vec<&EntityDefinition> {
        self.suitable_enemies_within(player_level, DEFAULT_LEVELS_BELOW, DEFAULT_LEVELS_ABOVE)
    }

    /// Monsters whose level lies in `[max(1, level - below), level + above]`
    pub fn suitable_enemies_within(
        &self,
        player_level: u32,
        below: u32,
        above: u32,
    ) -> Vec<&EntityDefinition> {
        let min = player_level.saturating_sub(below).max(1);
        let max = player_level.saturating_add(above);
        self.monsters_in_range(min, max)
    }

    /// Uniformly random monster with level in `[min_level, max_level]`
    pub fn random_suitable<R: Rng + ?Sized>(
        &self,
        min_level: u32,
        max_level: u32,
        rng: &mut R,
    ) -> Option<&EntityDefinition> {
        self.monsters_in_range(min_level, max_level).choose(rng).copied()
    }

    fn monsters_in_range(&self, min: u32, max: u32) -> Vec<&EntityDefinition> {
        self.monsters()
            .filter(|d| d.level >= min && d.level <= max)
            .collect()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[allow(clippy::too_many_arguments)]
fn definition(
    id: &str,
    name: &str,
    category: EntityCategory,
    level: u32,
    max_hp: u32,
    attack: u32,
    currency_reward: Option<u64>,
    description: &str,
) -> EntityDefinition {
    EntityDefinition {
        id: id.into(),
        name: name.into(),
        level,
        max_hp,
        attack,
        category,
        tags: Vec::new(),
        description: Some(description.into()),
        experience_reward: None,
        currency_reward,
        encounter_weight: 1.0,
    }
}

/// Built-in catalog
pub fn default_definitions() -> Vec<EntityDefinition> {
    use EntityCategory::{Monster, Race};

    let mut slime = definition("slime", "Slime", Monster, 1, 20, 5, Some(2), "A wobbling mass of goo.");
    slime.encounter_weight = 1.5;
    slime.tags = vec!["ooze".into()];

    let mut goblin = definition("goblin", "Goblin", Monster, 1, 30, 8, Some(5), "Small, green and greedy.");
    goblin.tags = vec!["humanoid".into()];

    let mut wolf = definition("wolf", "Wolf", Monster, 2, 35, 10, None, "Hunts in packs.");
    wolf.tags = vec!["beast".into()];

    let mut bandit = definition("bandit", "Bandit", Monster, 3, 45, 12, Some(20), "Wants your coins.");
    bandit.tags = vec!["humanoid".into()];

    let mut skeleton = definition("skeleton", "Skeleton", Monster, 4, 55, 13, Some(8), "Rattles as it walks.");
    skeleton.tags = vec!["undead".into()];

    let mut orc_warrior = definition("orc_warrior", "Orc Warrior", Monster, 5, 70, 16, Some(15), "Scarred veteran of many raids.");
    orc_warrior.tags = vec!["humanoid".into()];

    let mut wraith = definition("wraith", "Wraith", Monster, 7, 65, 20, Some(12), "A cold whisper in the dark.");
    wraith.tags = vec!["undead".into()];
    wraith.experience_reward = Some(420);
    wraith.encounter_weight = 0.7;

    let mut troll = definition("troll", "Troll", Monster, 8, 120, 22, Some(30), "Slow to anger, slower to fall.");
    troll.tags = vec!["giant".into()];

    let mut drake = definition("drake", "Drake", Monster, 10, 160, 28, Some(100), "A young dragon, already dangerous.");
    drake.tags = vec!["dragon".into()];
    drake.experience_reward = Some(800);
    drake.encounter_weight = 0.5;

    vec![
        definition("human", "Human", Race, 1, 50, 10, None, "Adaptable and stubborn."),
        definition("elf", "Elf", Race, 1, 42, 12, None, "Quick hands, keen eyes."),
        definition("dwarf", "Dwarf", Race, 1, 60, 9, None, "Hard to knock over."),
        definition("orc", "Orc", Race, 1, 58, 11, None, "Strong and proud."),
        slime,
        goblin,
        wolf,
        bandit,
        skeleton,
        orc_warrior,
        wraith,
        troll,
        drake,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults_are_valid() {
        let registry = EntityRegistry::from_definitions(default_definitions()).unwrap();
        assert_eq!(registry.len(), default_definitions().len());
        assert_eq!(registry.human().id, "human");

        let goblin = registry.get("goblin").unwrap();
        assert_eq!((goblin.level, goblin.max_hp, goblin.attack), (1, 30, 8));
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let registry = EntityRegistry::with_defaults();
        assert!(registry.get("beholder").is_none());
        assert_eq!(registry.resolve("beholder").id, "human");
        assert_eq!(registry.resolve("elf").id, "elf");
    }

    #[test]
    fn test_rejects_duplicates_and_missing_human() {
        let mut defs = default_definitions();
        defs.push(defs[5].clone());
        assert!(matches!(
            EntityRegistry::from_definitions(defs),
            Err(RegistryError::DuplicateId(id)) if id == "goblin"
        ));

        let defs: Vec<_> = default_definitions()
            .into_iter()
            .filter(|d| d.id != "human")
            .collect();
        assert!(matches!(
            EntityRegistry::from_definitions(defs),
            Err(RegistryError::MissingHuman)
        ));
    }

    #[test]
    fn test_suitable_enemies_window() {
        let registry = EntityRegistry::with_defaults();

        // Level 1: window is [1, 4]
        let ids: Vec<_> = registry.suitable_enemies(1).iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["slime", "goblin", "wolf", "bandit", "skeleton"]);

        // Level 6: window is [4, 9]
        for def in registry.suitable_enemies(6) {
            assert!(def.is_monster());
            assert!((4..=9).contains(&def.level), "{} out of window", def.id);
        }

        // Races are never enemies
        assert!(registry.suitable_enemies(1).iter().all(|d| d.id != "human"));
    }

    #[test]
    fn test_random_suitable() {
        let registry = EntityRegistry::with_defaults();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..20 {
            let def = registry.random_suitable(7, 8, &mut rng).unwrap();
            assert!(def.id == "wraith" || def.id == "troll");
        }
        assert!(registry.random_suitable(50, 60, &mut rng).is_none());
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = std::env::temp_dir();

        let missing = dir.join("wayfarer-no-such-registry.json");
        assert_eq!(EntityRegistry::load_or_default(&missing).len(), default_definitions().len());

        let bad = dir.join(format!("wayfarer-registry-no-human-{}.json", std::process::id()));
        let defs: Vec<_> = default_definitions().into_iter().filter(|d| d.id != "human").collect();
        std::fs::write(&bad, serde_json::to_string(&defs).unwrap()).unwrap();
        let registry = EntityRegistry::load_or_default(&bad);
        let _ = std::fs::remove_file(&bad);
        assert!(registry.get("human").is_some());
    }
}
