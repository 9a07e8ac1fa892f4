//! Post-combat settlement.
//!
//! Turns the final rosters into updated character records: rewards and
//! level-ups on victory, the penalty policy on defeat, plain HP write-back
//! for every other way out.

use wayfarer_shared::{Character, CombatOutcome, CombatUnit, ItemStack, LogEntry};

use crate::config::SessionConfig;
use crate::log_sink::LogSink;
use crate::navigation::CombatExit;
use crate::rules::{CombatRules, Rewards};

/// Sync every party member, handing out `experience` and announcing level-ups
fn sync_party(
    rules: &CombatRules,
    party: &[(CombatUnit, Character)],
    experience: u64,
    sink: &mut dyn LogSink,
) -> Vec<Character> {
    party
        .iter()
        .map(|(unit, record)| {
            let synced = rules.sync_to_character(unit, record, experience);
            if synced.level > record.level {
                sink.emit(LogEntry::success(format!(
                    "{} reached level {}!",
                    synced.name, synced.level
                )));
            }
            synced
        })
        .collect()
}

/// Remove items used during combat from the leader's inventory
fn remove_consumed(party: &mut [Character], consumed: &[ItemStack]) {
    if let Some(leader) = party.first_mut() {
        for stack in consumed {
            leader.inventory.remove_item(stack.item_id, stack.quantity);
        }
    }
}

pub(crate) fn settle_victory(
    rules: &CombatRules,
    party: &[(CombatUnit, Character)],
    enemies: &[CombatUnit],
    consumed: &[ItemStack],
    sink: &mut dyn LogSink,
) -> CombatExit {
    let rewards = rules.calculate_rewards(enemies);
    sink.emit(LogEntry::success(format!(
        "Victory! You gained {} experience and {} coins!",
        rewards.experience, rewards.currency
    )));

    let mut records = sync_party(rules, party, rewards.experience, sink);
    remove_consumed(&mut records, consumed);
    if let Some(leader) = records.first_mut() {
        leader.inventory.currency = leader.inventory.currency.saturating_add(rewards.currency);
    }

    CombatExit {
        outcome: CombatOutcome::Victory,
        party: records,
        rewards,
        currency_delta: rewards.currency as i64,
    }
}

pub(crate) fn settle_defeat(
    rules: &CombatRules,
    config: &SessionConfig,
    party: &[(CombatUnit, Character)],
    consumed: &[ItemStack],
    sink: &mut dyn LogSink,
) -> CombatExit {
    let mut records = sync_party(rules, party, 0, sink);
    remove_consumed(&mut records, consumed);

    // Everyone is patched up after a defeat
    for record in records.iter_mut() {
        record.current_hp = record.max_hp;
    }

    let penalty = config.defeat_penalty;
    let mut paid = 0;
    if let Some(leader) = records.first_mut() {
        paid = leader.inventory.currency.min(penalty);
        leader.inventory.currency -= paid;
    }

    sink.emit(LogEntry::error(format!(
        "You have been defeated... You lost {} coins.",
        paid
    )));
    if paid < penalty {
        sink.emit(LogEntry::warning(format!(
            "You could only pay {} of the {} coin penalty ({} short).",
            paid,
            penalty,
            penalty - paid
        )));
    }

    CombatExit {
        outcome: CombatOutcome::Defeat,
        party: records,
        rewards: Rewards::default(),
        currency_delta: -(paid as i64),
    }
}

/// Fled, forfeited or aborted: write back HP and used items, nothing else
pub(crate) fn settle_withdrawal(
    rules: &CombatRules,
    outcome: CombatOutcome,
    party: &[(CombatUnit, Character)],
    consumed: &[ItemStack],
    sink: &mut dyn LogSink,
) -> CombatExit {
    let mut records = sync_party(rules, party, 0, sink);
    remove_consumed(&mut records, consumed);

    CombatExit {
        outcome,
        party: records,
        rewards: Rewards::default(),
        currency_delta: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wayfarer_shared::{Severity, UnitId, HEALTH_POTION};

    use crate::config::RulesConfig;
    use crate::log_sink::CombatLog;
    use crate::registry::EntityRegistry;

    fn rules() -> CombatRules {
        CombatRules::new(Arc::new(EntityRegistry::with_defaults()), RulesConfig::default())
    }

    fn hero(currency: u64) -> Character {
        let mut c = Character::new(1, "Aria", "human").with_stats(50, 15);
        c.inventory.currency = currency;
        c.inventory.add_item(HEALTH_POTION, 2);
        c
    }

    #[test]
    fn test_defeat_penalty_shortfall() {
        let rules = rules();
        let record = hero(40);
        let unit = rules.derive_player_unit(&record, UnitId(1)).with_hp(0);
        let mut log = CombatLog::new(10);

        let exit = settle_defeat(&rules, &SessionConfig::default(), &[(unit, record)], &[], &mut log);

        let leader = exit.leader().unwrap();
        assert_eq!(leader.inventory.currency, 0);
        assert_eq!(leader.current_hp, leader.max_hp);
        assert_eq!(exit.currency_delta, -40);
        assert!(log.contains("60 short"));
        assert_eq!(log.count(Severity::Warning), 1);
    }

    #[test]
    fn test_defeat_penalty_paid_in_full() {
        let rules = rules();
        let record = hero(250);
        let unit = rules.derive_player_unit(&record, UnitId(1)).with_hp(0);
        let mut log = CombatLog::new(10);

        let exit = settle_defeat(&rules, &SessionConfig::default(), &[(unit, record)], &[], &mut log);
        assert_eq!(exit.leader().unwrap().inventory.currency, 150);
        assert_eq!(log.count(Severity::Warning), 0);
    }

    #[test]
    fn test_withdrawal_keeps_hp_and_removes_items() {
        let rules = rules();
        let record = hero(10);
        let unit = rules.derive_player_unit(&record, UnitId(1)).with_hp(17);
        let used = [ItemStack { item_id: HEALTH_POTION, quantity: 1 }];

        let exit = settle_withdrawal(
            &rules,
            CombatOutcome::Fled,
            &[(unit, record)],
            &used,
            &mut CombatLog::new(10),
        );
        let leader = exit.leader().unwrap();
        assert_eq!(leader.current_hp, 17);
        assert_eq!(leader.inventory.item_count(HEALTH_POTION), 1);
        assert_eq!(leader.inventory.currency, 10);
        assert_eq!(exit.rewards, Rewards::default());
    }
}
