//! Combat unit derivation and combat arithmetic.
//!
//! Translates persistent [`Character`] records into ephemeral [`CombatUnit`]s
//! and back, and holds the damage, reward and leveling formulas. Everything
//! here is a pure function of its inputs (plus the RNG for damage rolls);
//! units are never modified in place.

use std::sync::Arc;

use rand::Rng;
use wayfarer_shared::{Character, CombatUnit, EntityDefinition, UnitId, UnitReward};

use crate::config::RulesConfig;
use crate::registry::EntityRegistry;

/// Result of checking both rosters for a winner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatStatus {
    Ongoing,
    Victory,
    Defeat,
}

impl CombatStatus {
    pub fn is_over(&self) -> bool {
        !matches!(self, Self::Ongoing)
    }

    pub fn player_won(&self) -> bool {
        matches!(self, Self::Victory)
    }
}

/// Totals earned from defeated enemies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rewards {
    pub experience: u64,
    pub currency: u64,
    pub defeated: usize,
}

/// Combat rules bound to a registry and a tuning config
#[derive(Debug, Clone)]
pub struct CombatRules {
    registry: Arc<EntityRegistry>,
    config: RulesConfig,
}

impl CombatRules {
    pub fn new(registry: Arc<EntityRegistry>, config: RulesConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// `1.0 + (level - 1) * 0.15`
    pub fn level_multiplier(&self, level: u32) -> f64 {
        1.0 + (level.max(1) as f64 - 1.0) * self.config.level_scaling
    }

    /// Scale a base stat to `level`, rounding down
    pub fn scaled_stat(&self, base: u32, level: u32) -> u32 {
        (base as f64 * self.level_multiplier(level)).floor() as u32
    }

    /// Max HP and attack for a definition at `level`, never below the
    /// character's recorded values.
    fn player_stats(&self, def: &EntityDefinition, character: &Character, level: u32) -> (u32, u32) {
        let max_hp = self.scaled_stat(def.max_hp, level).max(character.max_hp);
        let attack = self.scaled_stat(def.attack, level).max(character.attack);
        (max_hp, attack)
    }

    /// Derive a player-side unit. Prior damage carries over.
    pub fn derive_player_unit(&self, character: &Character, id: UnitId) -> CombatUnit {
        let def = self.registry.resolve(&character.race);
        let level = character.level.max(1);
        let (max_hp, attack) = self.player_stats(def, character, level);

        CombatUnit::player(
            id,
            Some(character.id),
            character.name.clone(),
            level,
            max_hp,
            character.current_hp.min(max_hp),
            attack,
            def.id.clone(),
        )
    }

    /// Derive an enemy unit at full health with its reward attached
    pub fn derive_enemy_unit(&self, character: &Character, id: UnitId) -> CombatUnit {
        let def = self.registry.resolve(&character.race);
        let level = character.level.max(1);

        CombatUnit::enemy(
            id,
            Some(character.id),
            character.name.clone(),
            level,
            self.scaled_stat(def.max_hp, level),
            self.scaled_stat(def.attack, level),
            def.id.clone(),
            self.reward_for(def, level),
        )
    }

    /// Transient enemy character for a definition at `level`
    pub fn enemy_character(&self, def: &EntityDefinition, level: u32) -> Character {
        let max_hp = self.scaled_stat(def.max_hp, level);
        let attack = self.scaled_stat(def.attack, level);
        Character::new(0, def.name.clone(), def.id.clone())
            .with_level(level.max(1))
            .with_stats(max_hp, attack)
    }

    /// Experience and coins for defeating `def` at `level`
    pub fn reward_for(&self, def: &EntityDefinition, level: u32) -> UnitReward {
        UnitReward {
            experience: def
                .experience_reward
                .unwrap_or(self.config.experience_per_enemy_level * level.max(1) as u64),
            currency: def.currency_reward.unwrap_or(0),
        }
    }

    /// Roll damage for one attack. Always at least 1.
    pub fn calculate_damage<R: Rng + ?Sized>(
        &self,
        attacker: &CombatUnit,
        defender: &CombatUnit,
        rng: &mut R,
    ) -> u32 {
        let variance = self.config.damage_variance.abs();
        let roll = if variance > 0.0 {
            rng.gen_range((1.0 - variance)..(1.0 + variance))
        } else {
            1.0
        };
        let base = (attacker.attack as f64 * roll).floor();

        let level_diff = attacker.level as f64 - defender.level as f64;
        let adjusted = (base * (1.0 + self.config.level_damage_factor * level_diff)).floor();

        adjusted.max(1.0) as u32
    }

    /// New unit with `amount` damage applied
    pub fn apply_damage(&self, unit: &CombatUnit, amount: u32) -> CombatUnit {
        unit.with_hp(unit.current_hp.saturating_sub(amount))
    }

    /// New unit healed by `amount`, capped at max HP
    pub fn heal_unit(&self, unit: &CombatUnit, amount: u32) -> CombatUnit {
        unit.with_hp(unit.current_hp.saturating_add(amount))
    }

    /// Check whether either side has been wiped out
    pub fn is_combat_over(&self, players: &[CombatUnit], enemies: &[CombatUnit]) -> CombatStatus {
        if !players.iter().any(CombatUnit::is_alive) {
            CombatStatus::Defeat
        } else if !enemies.iter().any(CombatUnit::is_alive) {
            CombatStatus::Victory
        } else {
            CombatStatus::Ongoing
        }
    }

    /// Sum rewards over the defeated enemies
    pub fn calculate_rewards(&self, enemies: &[CombatUnit]) -> Rewards {
        enemies
            .iter()
            .filter(|u| !u.is_alive())
            .filter_map(CombatUnit::reward)
            .fold(Rewards::default(), |acc, r| Rewards {
                experience: acc.experience + r.experience,
                currency: acc.currency + r.currency,
                defeated: acc.defeated + 1,
            })
    }

    /// Curve base in use; a configured 0 counts as 1
    fn curve_base(&self) -> u64 {
        self.config.level_curve_base.max(1)
    }

    /// Total experience needed to reach `level`: `n * (n - 1) * 50`.
    /// Saturates at `u64::MAX` for levels the curve cannot express.
    pub fn experience_for_level(&self, level: u32) -> u64 {
        let n = level.max(1) as u64;
        n.saturating_mul(n - 1).saturating_mul(self.curve_base())
    }

    /// Level reached with `experience` total experience (at least 1)
    pub fn level_from_experience(&self, experience: u64) -> u32 {
        let base = self.curve_base() as f64;
        let estimate = ((1.0 + (1.0 + 4.0 * experience as f64 / base).sqrt()) / 2.0).floor();
        let mut level = (estimate as u32).max(1);

        // Correct float rounding at the thresholds
        while level > 1 && self.experience_for_level(level) > experience {
            level -= 1;
        }
        while let Some(next) = level.checked_add(1) {
            let threshold = self.experience_for_level(next);
            // A saturated threshold is out of reach, not a level up
            if threshold > experience || threshold == u64::MAX {
                break;
            }
            level = next;
        }
        level
    }

    /// Fold a finished unit back into its character.
    ///
    /// Adds `experience_gained`, recomputes level (never lowering it) and
    /// re-derives stats for the new level. Current HP keeps its in-combat
    /// value. Currency is left to the caller.
    pub fn sync_to_character(
        &self,
        unit: &CombatUnit,
        character: &Character,
        experience_gained: u64,
    ) -> Character {
        let experience = character.experience.saturating_add(experience_gained);
        let level = self.level_from_experience(experience).max(character.level).max(1);

        let def = self.registry.resolve(&character.race);
        let (max_hp, attack) = self.player_stats(def, character, level);

        Character {
            level,
            experience,
            max_hp,
            attack,
            current_hp: unit.current_hp.min(max_hp),
            ..character.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rules() -> CombatRules {
        CombatRules::new(Arc::new(EntityRegistry::with_defaults()), RulesConfig::default())
    }

    fn unit(id: u64, level: u32, hp: u32, attack: u32) -> CombatUnit {
        CombatUnit::player(UnitId(id), None, "Test", level, hp, hp, attack, "human")
    }

    fn goblin(rules: &CombatRules, id: u64) -> CombatUnit {
        let def = rules.registry().get("goblin").unwrap().clone();
        rules.derive_enemy_unit(&rules.enemy_character(&def, 1), UnitId(id))
    }

    #[test]
    fn test_level_multiplier() {
        let rules = rules();
        assert_eq!(rules.level_multiplier(1), 1.0);
        assert!((rules.level_multiplier(3) - 1.3).abs() < 1e-9);
        assert_eq!(rules.scaled_stat(30, 3), 39);
        assert_eq!(rules.scaled_stat(8, 3), 10);
    }

    #[test]
    fn test_player_stats_never_downgraded() {
        let rules = rules();

        // Recorded stats above the formula win
        let strong = Character::new(1, "Aria", "human").with_stats(200, 40);
        let u = rules.derive_player_unit(&strong, UnitId(1));
        assert_eq!((u.max_hp, u.attack), (200, 40));
        assert_eq!(u.character_id, Some(1));

        // Formula above recorded stats wins; damage persists
        let mut weak = Character::new(2, "Bo", "human").with_stats(10, 1).with_level(3);
        weak.current_hp = 7;
        let u = rules.derive_player_unit(&weak, UnitId(2));
        assert_eq!((u.max_hp, u.attack), (65, 13));
        assert_eq!(u.current_hp, 7);
        assert!(u.is_player());
    }

    #[test]
    fn test_unknown_race_falls_back_to_human() {
        let rules = rules();
        let c = Character::new(1, "Mystery", "beholder").with_stats(1, 1);
        let u = rules.derive_player_unit(&c, UnitId(1));
        assert_eq!(u.definition_id, "human");
        assert_eq!(u.max_hp, 50);
    }

    #[test]
    fn test_enemy_starts_full_with_reward() {
        let rules = rules();
        let mut c = rules.enemy_character(rules.registry().get("wolf").unwrap(), 4);
        c.current_hp = 1;
        let u = rules.derive_enemy_unit(&c, UnitId(9));
        assert_eq!(u.max_hp, 50); // floor(35 * 1.45)
        assert_eq!(u.current_hp, u.max_hp);
        assert_eq!(u.reward(), Some(UnitReward { experience: 200, currency: 0 }));

        let drake = rules.registry().get("drake").unwrap();
        assert_eq!(rules.reward_for(drake, 10).experience, 800);
    }

    #[test]
    fn test_damage_with_fixed_roll() {
        let rules = rules();
        // Zero RNG rolls the bottom of the variance band (0.8)
        let mut rng = StepRng::new(0, 0);
        let attacker = unit(1, 1, 50, 15);
        let defender = unit(2, 1, 30, 8);
        assert_eq!(rules.calculate_damage(&attacker, &defender, &mut rng), 12);

        // Two levels up: floor(12 * 1.2) = 14
        let veteran = unit(3, 3, 50, 15);
        assert_eq!(rules.calculate_damage(&veteran, &defender, &mut rng), 14);

        // Huge level gap still deals at least 1
        let weakling = unit(4, 1, 10, 2);
        let boss = unit(5, 30, 500, 90);
        assert_eq!(rules.calculate_damage(&weakling, &boss, &mut rng), 1);
    }

    #[test]
    fn test_combat_over() {
        let rules = rules();
        let alive = unit(1, 1, 10, 1);
        let dead = alive.with_hp(0);

        assert_eq!(rules.is_combat_over(&[alive.clone()], &[alive.clone()]), CombatStatus::Ongoing);
        assert!(!rules.is_combat_over(&[alive.clone(), dead.clone()], &[dead.clone(), alive.clone()]).is_over());

        let won = rules.is_combat_over(&[alive.clone()], &[dead.clone(), dead.clone()]);
        assert!(won.is_over() && won.player_won());

        let lost = rules.is_combat_over(&[dead.clone()], &[alive.clone()]);
        assert!(lost.is_over() && !lost.player_won());
    }

    #[test]
    fn test_rewards_only_count_dead_enemies() {
        let rules = rules();
        let a = goblin(&rules, 1);
        let b = goblin(&rules, 2);
        let c = goblin(&rules, 3);
        let roster = vec![a.with_hp(0), b.with_hp(0), c];

        let first = rules.calculate_rewards(&roster);
        assert_eq!(first, Rewards { experience: 100, currency: 10, defeated: 2 });

        // Pure function: asking again does not double count
        assert_eq!(rules.calculate_rewards(&roster), first);
    }

    #[test]
    fn test_level_thresholds() {
        let rules = rules();
        assert_eq!(rules.level_from_experience(0), 1);
        assert_eq!(rules.level_from_experience(99), 1);
        assert_eq!(rules.level_from_experience(100), 2);
        assert_eq!(rules.level_from_experience(299), 2);
        assert_eq!(rules.level_from_experience(300), 3);
        for n in 1..=200 {
            assert_eq!(rules.level_from_experience(rules.experience_for_level(n)), n);
        }
    }

    #[test]
    fn test_level_curve_saturates_at_the_top() {
        let rules = rules();
        assert_eq!(rules.experience_for_level(u32::MAX), u64::MAX);

        let level = rules.level_from_experience(u64::MAX);
        assert!(level > 1);
        assert!(rules.experience_for_level(level) < u64::MAX);
        assert_eq!(rules.experience_for_level(level.saturating_add(1)), u64::MAX);
    }

    #[test]
    fn test_sync_with_huge_experience_does_not_panic() {
        let rules = rules();
        let mut character = Character::new(1, "Aria", "human").with_stats(50, 15);
        character.experience = u64::MAX - 10;
        let unit = rules.derive_player_unit(&character, UnitId(1));
        let synced = rules.sync_to_character(&unit, &character, 100);
        assert_eq!(synced.experience, u64::MAX);
        assert_eq!(synced.level, rules.level_from_experience(u64::MAX));
    }

    #[test]
    fn test_zero_curve_base_counts_as_one() {
        let config = RulesConfig { level_curve_base: 0, ..RulesConfig::default() };
        let flat = CombatRules::new(Arc::new(EntityRegistry::with_defaults()), config);
        let unit_curve = CombatRules::new(
            Arc::new(EntityRegistry::with_defaults()),
            RulesConfig { level_curve_base: 1, ..RulesConfig::default() },
        );
        assert_eq!(flat.experience_for_level(2), 2);
        assert_eq!(flat.level_from_experience(0), 1);
        assert_eq!(flat.level_from_experience(1), 1);
        assert_eq!(flat.level_from_experience(10), unit_curve.level_from_experience(10));
        assert_eq!(flat.level_from_experience(10), 3);
    }

    #[test]
    fn test_sync_levels_up_and_keeps_hp() {
        let rules = rules();
        let character = Character::new(1, "Aria", "human").with_stats(50, 10);
        let mut u = rules.derive_player_unit(&character, UnitId(1));
        u = rules.apply_damage(&u, 20);

        let synced = rules.sync_to_character(&u, &character, 100);
        assert_eq!(synced.level, 2);
        assert_eq!(synced.experience, 100);
        assert_eq!(synced.max_hp, 57); // floor(50 * 1.15)
        assert_eq!(synced.attack, 11);
        assert_eq!(synced.current_hp, 30); // not refilled
        assert_eq!(synced.inventory, character.inventory);
    }

    #[test]
    fn test_sync_never_lowers_level() {
        let rules = rules();
        let character = Character::new(1, "Aria", "human").with_stats(50, 10).with_level(5);
        let u = rules.derive_player_unit(&character, UnitId(1));
        let synced = rules.sync_to_character(&u, &character, 10);
        assert_eq!(synced.level, 5);
    }

    #[test]
    fn test_goblin_scenario() {
        let rules = rules();
        let mut rng = StdRng::seed_from_u64(11);
        let player = rules.derive_player_unit(
            &Character::new(1, "Aria", "human").with_stats(50, 15),
            UnitId(1),
        );
        let mut enemy = goblin(&rules, 2);
        assert_eq!((enemy.max_hp, enemy.attack), (30, 8));

        let mut swings = 0;
        while enemy.is_alive() {
            let dmg = rules.calculate_damage(&player, &enemy, &mut rng);
            assert!(dmg >= 1);
            enemy = rules.apply_damage(&enemy, dmg);
            swings += 1;
            assert!(swings <= 30);
        }

        assert_eq!(enemy.current_hp, 0);
        let status = rules.is_combat_over(&[player], std::slice::from_ref(&enemy));
        assert!(status.player_won());
        assert_eq!(rules.calculate_rewards(&[enemy]).experience, 50);
    }

    proptest! {
        #[test]
        fn prop_damage_at_least_one(
            a_level in 1u32..60,
            d_level in 1u32..60,
            attack in 0u32..500,
            seed in any::<u64>(),
        ) {
            let rules = rules();
            let mut rng = StdRng::seed_from_u64(seed);
            let a = unit(1, a_level, 100, attack);
            let d = unit(2, d_level, 100, 10);
            prop_assert!(rules.calculate_damage(&a, &d, &mut rng) >= 1);
        }

        #[test]
        fn prop_hp_stays_in_bounds(max_hp in 1u32..10_000, start in 0u32..10_000, amount in 0u32..20_000, heal in any::<bool>()) {
            let rules = rules();
            let u = unit(1, 1, max_hp, 5).with_hp(start);
            let out = if heal { rules.heal_unit(&u, amount) } else { rules.apply_damage(&u, amount) };
            prop_assert!(out.current_hp <= out.max_hp);
            prop_assert_eq!(out.is_alive(), out.current_hp > 0);
            prop_assert_eq!(out.id, u.id);
        }

        #[test]
        fn prop_level_is_monotonic(e in 0u64..10_000_000) {
            let rules = rules();
            let level = rules.level_from_experience(e);
            prop_assert!(level >= 1);
            prop_assert!(rules.experience_for_level(level) <= e);
            prop_assert!(rules.experience_for_level(level + 1) > e);
        }
    }
}
