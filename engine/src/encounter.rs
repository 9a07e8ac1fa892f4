//! Encounter generation.
//!
//! An encounter is the enemy roster for one combat session. It comes either
//! from a scripted list of enemy characters or from a weighted random roll
//! over the monsters suited to the player's level.

use std::collections::HashMap;

use log::{debug, info};
use rand::Rng;
use wayfarer_shared::{Character, CombatUnit, EntityDefinition, UnitId};

use crate::config::EncounterConfig;
use crate::rules::CombatRules;

/// Hands out combat-instance ids in increasing order
#[derive(Debug, Clone)]
pub struct UnitIds {
    next: u64,
}

impl UnitIds {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> UnitId {
        let id = UnitId(self.next);
        self.next += 1;
        id
    }
}

impl Default for UnitIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Enemy roster for one combat session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encounter {
    units: Vec<CombatUnit>,
}

impl Encounter {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Convert scripted enemy characters into enemy units
    pub fn from_characters(enemies: &[Character], rules: &CombatRules, ids: &mut UnitIds) -> Self {
        let units = enemies
            .iter()
            .map(|c| rules.derive_enemy_unit(c, ids.next_id()))
            .collect();
        Self { units: label_duplicates(units) }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> &[CombatUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<CombatUnit> {
        self.units
    }
}

/// Append " A", " B", ... to enemies sharing a name so log lines stay readable
fn label_duplicates(units: Vec<CombatUnit>) -> Vec<CombatUnit> {
    let mut totals: HashMap<String, usize> = HashMap::new();
    for u in &units {
        *totals.entry(u.name.clone()).or_insert(0) += 1;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    units
        .into_iter()
        .map(|u| {
            if totals.get(&u.name).copied().unwrap_or(0) < 2 {
                return u;
            }
            let n = seen.entry(u.name.clone()).or_insert(0);
            let suffix = (b'A' + (*n % 26) as u8) as char;
            *n += 1;
            let name = format!("{} {}", u.name, suffix);
            u.with_name(name)
        })
        .collect()
}

/// Rolls random encounters for a player level
#[derive(Debug, Clone)]
pub struct EncounterGenerator {
    rules: CombatRules,
    config: EncounterConfig,
}

impl EncounterGenerator {
    pub fn new(rules: CombatRules, config: EncounterConfig) -> Self {
        Self { rules, config }
    }

    /// Pick an encounter size within the configured bounds
    pub fn roll_size<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let min = self.config.min_size.max(1);
        let max = self.config.max_size.max(min);
        rng.gen_range(min..=max)
    }

    /// Draw `size` enemies (with replacement) from the monsters suited to
    /// `player_level`. Returns an empty encounter when nothing fits.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        player_level: u32,
        size: usize,
        ids: &mut UnitIds,
        rng: &mut R,
    ) -> Encounter {
        let rules_config = self.rules.config();
        let pool = self.rules.registry().suitable_enemies_within(
            player_level,
            rules_config.enemy_levels_below,
            rules_config.enemy_levels_above,
        );

        if pool.is_empty() {
            info!("No suitable enemies for level {}", player_level);
            return Encounter::empty();
        }

        let mut units = Vec::with_capacity(size);
        for _ in 0..size {
            let Some(def) = pick_weighted(&pool, rng) else {
                break;
            };
            let character = self.rules.enemy_character(def, def.level);
            let mut unit = self.rules.derive_enemy_unit(&character, ids.next_id());
            // Generated enemies have no persistent record
            unit.character_id = None;
            debug!("Encounter roll: {} (level {})", unit.name, unit.level);
            units.push(unit);
        }

        Encounter { units: label_duplicates(units) }
    }
}

/// Weighted pick by `encounter_weight`; non-positive totals pick the first entry
fn pick_weighted<'a, R: Rng + ?Sized>(
    pool: &[&'a EntityDefinition],
    rng: &mut R,
) -> Option<&'a EntityDefinition> {
    if pool.is_empty() {
        return None;
    }

    let total_weight: f32 = pool.iter().map(|d| d.encounter_weight.max(0.0)).sum();
    if total_weight <= 0.0 {
        return Some(pool[0]);
    }

    let roll = rng.gen_range(0.0..total_weight);

    let mut cumulative = 0.0;
    for &def in pool {
        cumulative += def.encounter_weight.max(0.0);
        if roll < cumulative {
            return Some(def);
        }
    }

    pool.last().copied()
}
