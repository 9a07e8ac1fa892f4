//! Text commands for the terminal driver.

use rand::Rng;
use wayfarer_shared::{find_item, get_item_definitions, Character, CombatUnit, UnitId};

use crate::error::CommandError;
use crate::log_sink::LogSink;
use crate::navigation::Navigator;
use crate::rules::CombatRules;
use crate::session::{CombatSession, PlayerAction, TurnPhase};

/// A parsed line of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Explore,
    Rest,
    Status,
    Help,
    Quit,
    Act(PlayerAction),
    /// Show the current target, or pick enemy number `n` (1-based)
    Target(Option<usize>),
    NextTarget,
    /// Pick party member number `n` (1-based)
    Ally(usize),
}

/// Result of executing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command was successful
    pub success: bool,
    /// Message to display to the user; may be empty when the combat log
    /// already said everything
    pub message: String,
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Parse a line of input. `in_combat` decides which commands are allowed.
pub fn parse(content: &str, in_combat: bool) -> Result<Command, CommandError> {
    let content = content.trim().trim_start_matches('/');
    let parts: Vec<&str> = content.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Err(CommandError::Empty);
    };

    let command = first.to_lowercase();
    let args = &parts[1..];

    let parsed = match command.as_str() {
        // === Always available ===
        "help" | "h" | "?" => Command::Help,
        "status" | "s" => Command::Status,
        "quit" | "q" | "exit" => Command::Quit,

        // === Outside combat ===
        "explore" | "x" => Command::Explore,
        "rest" => Command::Rest,

        // === Combat ===
        "attack" | "a" => Command::Act(PlayerAction::Attack),
        "defend" | "d" => Command::Act(PlayerAction::Defend),
        "flee" | "run" => Command::Act(PlayerAction::Flee),
        "forfeit" | "surrender" => Command::Act(PlayerAction::Forfeit),
        "next" | "n" => Command::NextTarget,
        "target" | "t" => match args.first() {
            None => Command::Target(None),
            Some(arg) => Command::Target(Some(parse_index(arg, "target [number]")?)),
        },
        "ally" => match args.first() {
            None => return Err(CommandError::Usage("ally <number>")),
            Some(arg) => Command::Ally(parse_index(arg, "ally <number>")?),
        },
        "use" | "u" => {
            if args.is_empty() {
                return Err(CommandError::Usage("use <item name or id>"));
            }
            Command::Act(PlayerAction::UseItem(resolve_item(&args.join(" "))?))
        }

        _ => return Err(CommandError::Unknown(command)),
    };

    match parsed {
        Command::Explore | Command::Rest if in_combat => Err(CommandError::NotDuringCombat(command)),
        Command::Act(_) | Command::Target(_) | Command::NextTarget | Command::Ally(_)
            if !in_combat =>
        {
            Err(CommandError::CombatOnly(command))
        }
        other => Ok(other),
    }
}

fn parse_index(arg: &str, usage: &'static str) -> Result<usize, CommandError> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::Usage(usage)),
    }
}

/// Find an item by id or (partial, case-insensitive) name.
/// An exact name match wins over a partial one.
pub fn resolve_item(query: &str) -> Result<u32, CommandError> {
    if let Ok(id) = query.parse::<u32>() {
        return find_item(id)
            .map(|item| item.id)
            .ok_or_else(|| CommandError::UnknownItem(query.to_string()));
    }

    let query_lower = query.to_lowercase();
    let items = get_item_definitions();
    items
        .iter()
        .find(|item| item.name.to_lowercase() == query_lower)
        .or_else(|| items.iter().find(|item| item.name.to_lowercase().contains(&query_lower)))
        .map(|item| item.id)
        .ok_or_else(|| CommandError::UnknownItem(query.to_string()))
}

// =============================================================================
// Combat commands
// =============================================================================

/// Run a combat command against the live session
pub fn execute_combat<L: LogSink, N: Navigator, R: Rng>(
    session: &mut CombatSession<L, N, R>,
    command: Command,
) -> CommandResult {
    match command {
        Command::Act(action) => match session.act(action) {
            // The session logs both outcomes
            Ok(()) => CommandResult::success(""),
            Err(_) => CommandResult::error(""),
        },
        Command::Target(None) => match session.begin_targeting() {
            Some(id) => CommandResult::success(format!(
                "Targeting {}. Use `next` to cycle or `target <number>` to pick.",
                unit_name(&session.enemies(), id)
            )),
            None => CommandResult::error("There is nothing to target."),
        },
        Command::Target(Some(n)) => {
            let Some(id) = n.checked_sub(1).and_then(|i| session.enemies().get(i).map(|u| u.id)) else {
                return CommandResult::error(format!("There is no enemy number {}.", n));
            };
            match session.select_target(id) {
                Ok(()) => {
                    session.confirm_target();
                    CommandResult::success(format!(
                        "Targeting {}.",
                        unit_name(&session.enemies(), id)
                    ))
                }
                Err(_) => CommandResult::error(""),
            }
        }
        Command::NextTarget => match session.cycle_target() {
            Some(id) => CommandResult::success(format!(
                "Targeting {}.",
                unit_name(&session.enemies(), id)
            )),
            None => CommandResult::error("There is nothing to target."),
        },
        Command::Ally(n) => {
            let Some(id) = n.checked_sub(1).and_then(|i| session.players().get(i).map(|u| u.id)) else {
                return CommandResult::error(format!("There is no party member number {}.", n));
            };
            match session.select_ally(id) {
                Ok(()) => CommandResult::success(format!(
                    "{} is ready to act.",
                    unit_name(&session.players(), id)
                )),
                Err(_) => CommandResult::error(""),
            }
        }
        Command::Status => CommandResult::success(combat_status(session)),
        Command::Help => help(true),
        Command::Explore | Command::Rest | Command::Quit => {
            CommandResult::error("That is not available during combat.")
        }
    }
}

fn unit_name(roster: &[CombatUnit], id: UnitId) -> String {
    roster
        .iter()
        .find(|u| u.id == id)
        .map(|u| u.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn roster_line(index: usize, unit: &CombatUnit, selected: Option<UnitId>) -> String {
    let marker = if selected == Some(unit.id) { ">" } else { " " };
    if unit.is_alive() {
        format!(
            "  {}. {} {} (Lv{}) {}/{} HP",
            index + 1,
            marker,
            unit.name,
            unit.level,
            unit.current_hp,
            unit.max_hp
        )
    } else {
        format!("  {}. {} {} (defeated)", index + 1, marker, unit.name)
    }
}

/// Both rosters with HP and the current selections
pub fn combat_status<L: LogSink, N: Navigator, R: Rng>(session: &CombatSession<L, N, R>) -> String {
    let turn = match session.phase() {
        TurnPhase::PlayerTurn => "your turn",
        TurnPhase::EnemyTurn => "enemy turn",
        _ => "combat over",
    };

    let mut msg = format!("Round {} - {}\nParty:\n", session.round(), turn);
    for (i, unit) in session.players().iter().enumerate() {
        msg.push_str(&roster_line(i, unit, session.selected_ally()));
        msg.push('\n');
    }
    msg.push_str("Enemies:\n");
    for (i, unit) in session.enemies().iter().enumerate() {
        msg.push_str(&roster_line(i, unit, session.selected_target()));
        msg.push('\n');
    }
    msg
}

// =============================================================================
// Commands outside combat
// =============================================================================

/// Run a command that needs no session. `Explore` and `Quit` are left to
/// the driver.
pub fn execute_idle(command: Command, character: &mut Character, rules: &CombatRules) -> CommandResult {
    match command {
        Command::Status => cmd_status(character, rules),
        Command::Rest => cmd_rest(character),
        Command::Help => help(false),
        _ => CommandResult::error("That only works during combat."),
    }
}

fn cmd_status(character: &Character, rules: &CombatRules) -> CommandResult {
    let next = rules.experience_for_level(character.level.saturating_add(1));
    let mut msg = format!(
        "{} the {}, level {} ({} XP, {} to next level)\n",
        character.name,
        rules.registry().resolve(&character.race).name,
        character.level,
        character.experience,
        next.saturating_sub(character.experience)
    );
    msg.push_str(&format!(
        "HP {}/{}  Attack {}  Coins {}\n",
        character.current_hp, character.max_hp, character.attack, character.inventory.currency
    ));

    if character.inventory.items.is_empty() {
        msg.push_str("Items: none");
    } else {
        let items: Vec<String> = character
            .inventory
            .items
            .iter()
            .map(|stack| match find_item(stack.item_id) {
                Some(item) => format!("{} x{}", item.name, stack.quantity),
                None => format!("item #{} x{}", stack.item_id, stack.quantity),
            })
            .collect();
        msg.push_str(&format!("Items: {}", items.join(", ")));
    }

    CommandResult::success(msg)
}

fn cmd_rest(character: &mut Character) -> CommandResult {
    let restored = character.max_hp.saturating_sub(character.current_hp);
    if restored == 0 {
        return CommandResult::error("You are already at full health.");
    }
    character.current_hp = character.max_hp;
    CommandResult::success(format!("You rest and recover {} HP.", restored))
}

fn help(in_combat: bool) -> CommandResult {
    let mut help = String::from("Available commands:\n");
    if in_combat {
        help.push_str("  attack (a)          - Attack the selected target\n");
        help.push_str("  defend (d)          - Brace and pass the turn\n");
        help.push_str("  flee                - Try to escape\n");
        help.push_str("  forfeit             - Give up the fight\n");
        help.push_str("  target [n] (t)      - Show or pick the target\n");
        help.push_str("  next (n)            - Cycle to the next target\n");
        help.push_str("  ally <n>            - Pick which party member acts\n");
        help.push_str("  use <item> (u)      - Use an item, e.g. `use potion`\n");
    } else {
        help.push_str("  explore (x)         - Look for trouble\n");
        help.push_str("  rest                - Recover to full health\n");
    }
    help.push_str("  status (s)          - Show your status\n");
    help.push_str("  help (h)            - Show this help message\n");
    help.push_str("  quit (q)            - Save and exit\n");
    CommandResult::success(help)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rand::rngs::mock::StepRng;
    use wayfarer_shared::{GREATER_HEALTH_POTION, HEALTH_POTION};

    use crate::config::{RulesConfig, SessionConfig};
    use crate::log_sink::CombatLog;
    use crate::navigation::RecordingNavigator;
    use crate::registry::EntityRegistry;
    use crate::session::{EncounterSource, SessionContext};

    fn rules() -> CombatRules {
        CombatRules::new(Arc::new(EntityRegistry::with_defaults()), RulesConfig::default())
    }

    fn session(enemy_count: usize) -> CombatSession<CombatLog, RecordingNavigator, StepRng> {
        let rules = rules();
        let goblin = rules.registry().get("goblin").unwrap().clone();
        let enemies: Vec<Character> =
            (0..enemy_count).map(|_| rules.enemy_character(&goblin, 1)).collect();
        let context = SessionContext {
            rules,
            config: SessionConfig::default(),
            sink: CombatLog::new(50),
            navigator: RecordingNavigator::default(),
        };
        let hero = Character::new(1, "Aria", "human").with_stats(50, 10);
        CombatSession::start(context, vec![hero], EncounterSource::Scripted(&enemies), StepRng::new(0, 0))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_parse_combat_commands() {
        assert_eq!(parse("attack", true), Ok(Command::Act(PlayerAction::Attack)));
        assert_eq!(parse("  A ", true), Ok(Command::Act(PlayerAction::Attack)));
        assert_eq!(parse("/flee", true), Ok(Command::Act(PlayerAction::Flee)));
        assert_eq!(parse("target", true), Ok(Command::Target(None)));
        assert_eq!(parse("target 2", true), Ok(Command::Target(Some(2))));
        assert_eq!(parse("ally 1", true), Ok(Command::Ally(1)));
        assert_eq!(
            parse("use greater", true),
            Ok(Command::Act(PlayerAction::UseItem(GREATER_HEALTH_POTION)))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(parse("   ", false), Err(CommandError::Empty));
        assert_eq!(parse("dance", false), Err(CommandError::Unknown("dance".into())));
        assert_eq!(parse("target 0", true), Err(CommandError::Usage("target [number]")));
        assert_eq!(parse("ally", true), Err(CommandError::Usage("ally <number>")));
        assert_eq!(parse("use elixir", true), Err(CommandError::UnknownItem("elixir".into())));
    }

    #[test]
    fn test_parse_respects_combat_state() {
        assert_eq!(parse("attack", false), Err(CommandError::CombatOnly("attack".into())));
        assert_eq!(parse("explore", true), Err(CommandError::NotDuringCombat("explore".into())));
        assert_eq!(parse("status", true), Ok(Command::Status));
        assert_eq!(parse("status", false), Ok(Command::Status));
        assert_eq!(parse("quit", true), Ok(Command::Quit));
    }

    #[test]
    fn test_resolve_item() {
        assert_eq!(resolve_item("potion"), Ok(HEALTH_POTION));
        assert_eq!(resolve_item("Greater Health Potion"), Ok(GREATER_HEALTH_POTION));
        assert_eq!(resolve_item("1"), Ok(HEALTH_POTION));
        assert!(resolve_item("999").is_err());
    }

    #[test]
    fn test_target_by_number() {
        let mut session = session(3);
        let result = execute_combat(&mut session, Command::Target(Some(3)));
        assert!(result.success);
        assert_eq!(result.message, "Targeting Goblin C.");
        assert_eq!(session.selected_target(), Some(session.enemies()[2].id));
        assert!(!session.is_targeting());

        let missing = execute_combat(&mut session, Command::Target(Some(9)));
        assert!(!missing.success);
    }

    #[test]
    fn test_next_target_cycles() {
        let mut session = session(2);
        let result = execute_combat(&mut session, Command::NextTarget);
        assert_eq!(result.message, "Targeting Goblin B.");
        let result = execute_combat(&mut session, Command::NextTarget);
        assert_eq!(result.message, "Targeting Goblin A.");
    }

    #[test]
    fn test_rejected_action_reports_failure() {
        let mut session = session(1);
        let result = execute_combat(&mut session, Command::Act(PlayerAction::UseItem(HEALTH_POTION)));
        assert!(!result.success);
        assert!(session.sink().contains("no Health Potion left"));
    }

    #[test]
    fn test_combat_status_marks_selection() {
        let session = session(2);
        let status = combat_status(&session);
        assert!(status.starts_with("Round 1 - your turn"));
        assert!(status.contains("1. > Aria (Lv1) 50/50 HP"));
        assert!(status.contains("1. > Goblin A (Lv1) 30/30 HP"));
        assert!(status.contains("2.   Goblin B"));
    }

    #[test]
    fn test_rest_restores_health() {
        let rules = rules();
        let mut hero = Character::new(1, "Aria", "human").with_stats(50, 10);
        hero.current_hp = 12;

        let result = execute_idle(Command::Rest, &mut hero, &rules);
        assert!(result.success);
        assert_eq!(result.message, "You rest and recover 38 HP.");
        assert_eq!(hero.current_hp, hero.max_hp);

        assert!(!execute_idle(Command::Rest, &mut hero, &rules).success);
    }

    #[test]
    fn test_idle_status() {
        let rules = rules();
        let mut hero = Character::new(1, "Aria", "dwarf").with_stats(60, 9);
        hero.inventory.add_item(HEALTH_POTION, 2);

        let result = execute_idle(Command::Status, &mut hero, &rules);
        assert!(result.message.starts_with("Aria the Dwarf, level 1 (0 XP, 100 to next level)"));
        assert!(result.message.contains("Items: Health Potion x2"));
    }
}
