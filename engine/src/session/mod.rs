//! Turn state machine for a single combat session.
//!
//! The player acts during [`TurnPhase::PlayerTurn`]; each action that
//! consumes the turn hands over to the enemies, who act one after another
//! with a telegraph delay before and a recovery delay after each strike.
//! Delays are steps in a [`StepQueue`] driven by [`CombatSession::advance`],
//! so a forfeit or scene change can cut an enemy turn short at any point.
//!
//! Rosters are shared snapshots (`Arc<[CombatUnit]>`). Every change builds a
//! new roster, so an observer holding an older snapshot never sees a
//! half-applied update.

mod scheduler;
mod settlement;


pub use scheduler::{Step, StepQueue};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use wayfarer_shared::{
    find_item, Character, CombatOutcome, CombatUnit, ItemEffect, ItemStack, LogEntry, UnitId,
};

use crate::config::SessionConfig;
use crate::encounter::{Encounter, EncounterGenerator, UnitIds};
use crate::error::{CombatError, InvalidAction};
use crate::log_sink::LogSink;
use crate::navigation::{CombatExit, Navigator};
use crate::rules::{CombatRules, CombatStatus};

/// Terminal result of a fight that was fought to the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Victory,
    Defeat,
}

/// Where the state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    PlayerTurn,
    EnemyTurn,
    Resolved(Resolution),
    Fled,
    Forfeited,
    Aborted,
}

impl TurnPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::PlayerTurn | Self::EnemyTurn)
    }

    pub fn outcome(&self) -> Option<CombatOutcome> {
        match self {
            Self::PlayerTurn | Self::EnemyTurn => None,
            Self::Resolved(Resolution::Victory) => Some(CombatOutcome::Victory),
            Self::Resolved(Resolution::Defeat) => Some(CombatOutcome::Defeat),
            Self::Fled => Some(CombatOutcome::Fled),
            Self::Forfeited => Some(CombatOutcome::Forfeited),
            Self::Aborted => Some(CombatOutcome::Aborted),
        }
    }
}

/// Actions available to the player on their turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    /// Selected ally attacks the selected target
    Attack,
    /// Consumes the turn without further effect
    Defend,
    /// Try to escape; failure passes the turn
    Flee,
    /// Give up immediately, without rewards
    Forfeit,
    /// Use a consumable from the leader's inventory on the selected ally
    UseItem(u32),
}

/// Where the enemy roster comes from
#[derive(Debug, Clone, Copy)]
pub enum EncounterSource<'a> {
    /// A fixed list of enemy characters, e.g. from a scripted event
    Scripted(&'a [Character]),
    /// A random roll suited to the leader's level
    Random {
        generator: &'a EncounterGenerator,
        size: usize,
    },
}

/// Collaborators and tuning a session is built with
pub struct SessionContext<L, N> {
    pub rules: CombatRules,
    pub config: SessionConfig,
    pub sink: L,
    pub navigator: N,
}

/// One combat session, from the first player turn to the navigator hand-off
pub struct CombatSession<L, N, R = StdRng> {
    rules: CombatRules,
    config: SessionConfig,
    sink: L,
    navigator: N,
    rng: R,

    phase: TurnPhase,
    players: Arc<[CombatUnit]>,
    enemies: Arc<[CombatUnit]>,
    /// Persistent records, parallel to `players`
    records: Vec<Character>,

    selected_ally: Option<UnitId>,
    selected_target: Option<UnitId>,
    targeting: bool,
    consumed: Vec<ItemStack>,

    queue: StepQueue,
    enemy_order: VecDeque<UnitId>,
    now: Duration,
    round: u32,

    exit: Option<CombatExit>,
    navigated: bool,
}

/// Copy of `roster` with the unit sharing `updated`'s id replaced
fn replace_unit(roster: &[CombatUnit], updated: CombatUnit) -> Arc<[CombatUnit]> {
    roster
        .iter()
        .map(|u| if u.id == updated.id { updated.clone() } else { u.clone() })
        .collect()
}

fn find_unit(roster: &[CombatUnit], id: UnitId) -> Option<&CombatUnit> {
    roster.iter().find(|u| u.id == id)
}

fn first_living(roster: &[CombatUnit]) -> Option<UnitId> {
    roster.iter().find(|u| u.is_alive()).map(|u| u.id)
}

impl<L: LogSink, N: Navigator, R: Rng> CombatSession<L, N, R> {
    /// Start a session.
    ///
    /// `party` holds the controlled character first, followed by any
    /// companions. An empty party is fatal for the session. An empty
    /// encounter is not an error: `Ok(None)` means no fight takes place.
    pub fn start(
        context: SessionContext<L, N>,
        party: Vec<Character>,
        source: EncounterSource<'_>,
        mut rng: R,
    ) -> Result<Option<Self>, CombatError> {
        let SessionContext { rules, config, mut sink, navigator } = context;

        if party.is_empty() {
            return Err(CombatError::EmptyParty);
        }

        let records: Vec<Character> = party
            .into_iter()
            .map(|c| {
                if !c.validate().is_empty() {
                    warn!("Character {} has out-of-range stats, normalizing", c.id);
                }
                c.normalized()
            })
            .collect();

        let mut ids = UnitIds::new();
        let players: Arc<[CombatUnit]> = records
            .iter()
            .map(|c| rules.derive_player_unit(c, ids.next_id()))
            .collect();

        if !players.iter().any(CombatUnit::is_alive) {
            warn!("Party has no member able to fight, not starting combat");
            sink.emit(LogEntry::warning("Your party is in no shape to fight. Rest first."));
            return Ok(None);
        }

        let encounter = match source {
            EncounterSource::Scripted(enemies) => Encounter::from_characters(enemies, &rules, &mut ids),
            EncounterSource::Random { generator, size } => {
                generator.generate(records[0].level, size, &mut ids, &mut rng)
            }
        };

        if encounter.is_empty() {
            info!("No enemies to fight, skipping combat");
            sink.emit(LogEntry::info("The area is quiet. Nothing attacks."));
            return Ok(None);
        }

        let enemies: Arc<[CombatUnit]> = encounter.into_units().into();
        let names: Vec<&str> = enemies.iter().map(|u| u.name.as_str()).collect();
        sink.emit(LogEntry::warning(format!("Enemies appear: {}!", names.join(", "))));
        info!(
            "Combat started: {} party member(s) vs {} enemies",
            players.len(),
            enemies.len()
        );

        let mut session = Self {
            rules,
            config,
            sink,
            navigator,
            rng,
            phase: TurnPhase::PlayerTurn,
            selected_ally: first_living(&players),
            selected_target: first_living(&enemies),
            players,
            enemies,
            records,
            targeting: false,
            consumed: Vec::new(),
            queue: StepQueue::new(),
            enemy_order: VecDeque::new(),
            now: Duration::ZERO,
            round: 1,
            exit: None,
            navigated: false,
        };

        if !session.check_combat_over() {
            session.announce_player_turn();
        }

        Ok(Some(session))
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Snapshot of the player side
    pub fn players(&self) -> Arc<[CombatUnit]> {
        Arc::clone(&self.players)
    }

    /// Snapshot of the enemy side
    pub fn enemies(&self) -> Arc<[CombatUnit]> {
        Arc::clone(&self.enemies)
    }

    pub fn selected_ally(&self) -> Option<UnitId> {
        self.selected_ally
    }

    pub fn selected_target(&self) -> Option<UnitId> {
        self.selected_target
    }

    pub fn is_targeting(&self) -> bool {
        self.targeting
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Clock value the session last advanced to
    pub fn now(&self) -> Duration {
        self.now
    }

    /// When the next pending step is due, if any
    pub fn next_step_due(&self) -> Option<Duration> {
        self.queue.next_due()
    }

    /// Settlement result once combat has ended (until it is handed off)
    pub fn pending_exit(&self) -> Option<&CombatExit> {
        self.exit.as_ref()
    }

    /// Whether the navigator has been invoked
    pub fn is_finished(&self) -> bool {
        self.navigated
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    // ------------------------------------------------------------------
    // Targeting (never consumes a turn)
    // ------------------------------------------------------------------

    /// Enter targeting mode, making sure a living enemy is selected
    pub fn begin_targeting(&mut self) -> Option<UnitId> {
        if self.phase.is_terminal() {
            return None;
        }
        self.targeting = true;
        let current_alive = self
            .selected_target
            .and_then(|id| find_unit(&self.enemies, id))
            .is_some_and(CombatUnit::is_alive);
        if !current_alive {
            self.selected_target = first_living(&self.enemies);
        }
        self.selected_target
    }

    /// Move the selection to the next living enemy, wrapping around
    pub fn cycle_target(&mut self) -> Option<UnitId> {
        if self.phase.is_terminal() {
            return None;
        }
        self.targeting = true;

        let living: Vec<UnitId> = self
            .enemies
            .iter()
            .filter(|u| u.is_alive())
            .map(|u| u.id)
            .collect();
        if living.is_empty() {
            self.selected_target = None;
            return None;
        }

        let start = self
            .selected_target
            .and_then(|id| self.enemies.iter().position(|u| u.id == id));
        let next = match start {
            Some(pos) => self
                .enemies
                .iter()
                .cycle()
                .skip(pos + 1)
                .take(self.enemies.len())
                .find(|u| u.is_alive())
                .map(|u| u.id),
            None => living.first().copied(),
        };

        self.selected_target = next;
        self.selected_target
    }

    /// Select a specific enemy, e.g. by clicking its roster entry
    pub fn select_target(&mut self, id: UnitId) -> Result<(), InvalidAction> {
        let result = match find_unit(&self.enemies, id) {
            None => Err(InvalidAction::UnknownUnit(id)),
            Some(u) if !u.is_alive() => Err(InvalidAction::TargetDown(u.name.clone())),
            Some(_) if self.phase.is_terminal() => Err(InvalidAction::SessionOver),
            Some(_) => Ok(()),
        };
        match result {
            Ok(()) => {
                self.selected_target = Some(id);
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Leave targeting mode, keeping the current selection. Idempotent.
    pub fn confirm_target(&mut self) -> Option<UnitId> {
        self.targeting = false;
        self.selected_target
    }

    /// Choose which party member acts
    pub fn select_ally(&mut self, id: UnitId) -> Result<(), InvalidAction> {
        let result = match find_unit(&self.players, id) {
            None => Err(InvalidAction::UnknownUnit(id)),
            Some(u) if !u.is_alive() => Err(InvalidAction::AllyDown(u.name.clone())),
            Some(_) if self.phase.is_terminal() => Err(InvalidAction::SessionOver),
            Some(_) => Ok(()),
        };
        match result {
            Ok(()) => {
                self.selected_ally = Some(id);
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    // ------------------------------------------------------------------
    // Player actions
    // ------------------------------------------------------------------

    /// Perform a player action. Rejected actions leave the session untouched
    /// apart from an error entry in the log.
    pub fn act(&mut self, action: PlayerAction) -> Result<(), InvalidAction> {
        if self.phase.is_terminal() {
            return Err(self.reject(InvalidAction::SessionOver));
        }

        match action {
            PlayerAction::Forfeit => {
                self.forfeit();
                Ok(())
            }
            _ if self.phase != TurnPhase::PlayerTurn => {
                Err(self.reject(InvalidAction::NotPlayerTurn))
            }
            PlayerAction::Attack => self.attack(),
            PlayerAction::Defend => self.defend(),
            PlayerAction::Flee => self.flee(),
            PlayerAction::UseItem(item_id) => self.use_item(item_id),
        }
    }

    fn reject(&mut self, error: InvalidAction) -> InvalidAction {
        debug!("Rejected action: {}", error);
        self.sink.emit(LogEntry::error(error.to_string()));
        error
    }

    /// The selected ally, if it exists and can act
    fn acting_ally(&self) -> Result<CombatUnit, InvalidAction> {
        let id = self.selected_ally.ok_or(InvalidAction::NoAllySelected)?;
        let ally = find_unit(&self.players, id).ok_or(InvalidAction::UnknownUnit(id))?;
        if !ally.is_alive() {
            return Err(InvalidAction::AllyDown(ally.name.clone()));
        }
        Ok(ally.clone())
    }

    fn attack(&mut self) -> Result<(), InvalidAction> {
        let checked = self.acting_ally().and_then(|ally| {
            let id = self.selected_target.ok_or(InvalidAction::NoTargetSelected)?;
            let target = find_unit(&self.enemies, id).ok_or(InvalidAction::UnknownUnit(id))?;
            if !target.is_alive() {
                return Err(InvalidAction::TargetDown(target.name.clone()));
            }
            Ok((ally, target.clone()))
        });
        let (ally, target) = match checked {
            Ok(pair) => pair,
            Err(e) => return Err(self.reject(e)),
        };

        let damage = self.rules.calculate_damage(&ally, &target, &mut self.rng);
        let hit = self.rules.apply_damage(&target, damage);
        self.sink.emit(LogEntry::info(format!(
            "{} attacks {} for {} damage!",
            ally.name, target.name, damage
        )));

        let defeated = !hit.is_alive();
        self.enemies = replace_unit(&self.enemies, hit);

        if defeated {
            self.sink.emit(LogEntry::success(format!("{} has been defeated!", target.name)));
            if self.selected_target == Some(target.id) {
                self.selected_target = first_living(&self.enemies);
            }
        }

        self.end_player_turn();
        Ok(())
    }

    fn defend(&mut self) -> Result<(), InvalidAction> {
        let ally = match self.acting_ally() {
            Ok(a) => a,
            Err(e) => return Err(self.reject(e)),
        };
        self.sink.emit(LogEntry::info(format!("{} takes a defensive stance.", ally.name)));
        self.end_player_turn();
        Ok(())
    }

    fn flee(&mut self) -> Result<(), InvalidAction> {
        let roll: f64 = self.rng.gen();
        if roll > self.config.flee_threshold {
            info!("Flee succeeded (roll {:.3})", roll);
            self.sink.emit(LogEntry::success("You escaped successfully!"));
            self.phase = TurnPhase::Fled;
            self.finish(CombatOutcome::Fled);
        } else {
            debug!("Flee failed (roll {:.3})", roll);
            self.sink.emit(LogEntry::warning("You couldn't escape!"));
            self.end_player_turn();
        }
        Ok(())
    }

    fn use_item(&mut self, item_id: u32) -> Result<(), InvalidAction> {
        let checked = self.acting_ally().and_then(|ally| {
            let item = find_item(item_id).ok_or(InvalidAction::UnknownItem(item_id))?;
            let carried = self.records[0].inventory.item_count(item_id);
            let used: u32 = self
                .consumed
                .iter()
                .filter(|s| s.item_id == item_id)
                .map(|s| s.quantity)
                .sum();
            if carried <= used {
                return Err(InvalidAction::ItemUnavailable(item.name));
            }
            Ok((ally, item))
        });
        let (ally, item) = match checked {
            Ok(pair) => pair,
            Err(e) => return Err(self.reject(e)),
        };

        let ItemEffect::RestoreHealth(amount) = item.effect;
        let healed = self.rules.heal_unit(&ally, amount);
        let restored = healed.current_hp - ally.current_hp;
        self.players = replace_unit(&self.players, healed);

        match self.consumed.iter_mut().find(|s| s.item_id == item_id) {
            Some(stack) => stack.quantity += 1,
            None => self.consumed.push(ItemStack { item_id, quantity: 1 }),
        }

        self.sink.emit(LogEntry::success(format!(
            "{} uses {} and recovers {} HP.",
            ally.name, item.name, restored
        )));

        self.end_player_turn();
        Ok(())
    }

    /// Give up immediately. Allowed during the enemy turn as well, where it
    /// cancels whatever enemy actions are still pending.
    fn forfeit(&mut self) {
        info!("Player forfeited in round {}", self.round);
        self.sink.emit(LogEntry::warning("You forfeit the battle."));
        self.queue.cancel_all();
        self.enemy_order.clear();
        self.phase = TurnPhase::Forfeited;
        self.finish(CombatOutcome::Forfeited);
        self.leave();
    }

    /// Abort the session because the scene is changing. Pending steps are
    /// cancelled and the navigator is invoked right away if it hasn't been.
    pub fn preempt(&mut self) {
        self.queue.cancel_all();
        self.enemy_order.clear();

        if !self.phase.is_terminal() {
            info!("Combat preempted in round {}", self.round);
            self.phase = TurnPhase::Aborted;
            self.finish(CombatOutcome::Aborted);
        }
        self.leave();
    }

    // ------------------------------------------------------------------
    // Turn sequencing
    // ------------------------------------------------------------------

    fn end_player_turn(&mut self) {
        if self.check_combat_over() {
            return;
        }

        self.phase = TurnPhase::EnemyTurn;
        self.targeting = false;
        self.enemy_order = self
            .enemies
            .iter()
            .filter(|u| u.is_alive())
            .map(|u| u.id)
            .collect();
        self.queue.schedule(self.now, Step::NextEnemy);
    }

    fn announce_player_turn(&mut self) {
        let ally_alive = self
            .selected_ally
            .and_then(|id| find_unit(&self.players, id))
            .is_some_and(CombatUnit::is_alive);
        if !ally_alive {
            self.selected_ally = first_living(&self.players);
        }
        let target_alive = self
            .selected_target
            .and_then(|id| find_unit(&self.enemies, id))
            .is_some_and(CombatUnit::is_alive);
        if !target_alive {
            self.selected_target = first_living(&self.enemies);
        }
        self.sink.emit(LogEntry::info(format!("Round {}: your turn.", self.round)));
    }

    /// Run every step due at or before `now`. Returns how many ran.
    pub fn advance(&mut self, now: Duration) -> usize {
        let mut ran = 0;
        while let Some((due, step)) = self.queue.pop_due(now) {
            // Follow-up steps are timed from when this one was due
            self.now = self.now.max(due);
            self.run_step(step);
            ran += 1;
        }
        self.now = self.now.max(now);
        ran
    }

    fn run_step(&mut self, step: Step) {
        match step {
            Step::NextEnemy => self.next_enemy(),
            Step::Strike(id) => self.enemy_strike(id),
            Step::Leave => self.leave(),
        }
    }

    fn next_enemy(&mut self) {
        if self.phase != TurnPhase::EnemyTurn {
            return;
        }

        while let Some(id) = self.enemy_order.pop_front() {
            let Some(enemy) = find_unit(&self.enemies, id) else {
                continue;
            };
            if !enemy.is_alive() {
                continue;
            }
            self.sink.emit(LogEntry::info(format!("{} prepares to attack...", enemy.name)));
            self.queue
                .schedule(self.now + self.config.telegraph_delay(), Step::Strike(id));
            return;
        }

        // Every enemy has acted
        if !self.check_combat_over() {
            self.round += 1;
            self.phase = TurnPhase::PlayerTurn;
            self.announce_player_turn();
        }
    }

    fn enemy_strike(&mut self, id: UnitId) {
        if self.phase != TurnPhase::EnemyTurn {
            return;
        }
        let Some(enemy) = find_unit(&self.enemies, id).filter(|u| u.is_alive()).cloned() else {
            self.queue.schedule(self.now, Step::NextEnemy);
            return;
        };

        let living: Vec<&CombatUnit> = self.players.iter().filter(|u| u.is_alive()).collect();
        let Some(target) = living.choose(&mut self.rng).map(|u| (*u).clone()) else {
            self.check_combat_over();
            return;
        };

        let damage = self.rules.calculate_damage(&enemy, &target, &mut self.rng);
        let hit = self.rules.apply_damage(&target, damage);
        self.sink.emit(LogEntry::info(format!(
            "{} attacks {} for {} damage!",
            enemy.name, target.name, damage
        )));

        let downed = !hit.is_alive();
        self.players = replace_unit(&self.players, hit);
        if downed {
            self.sink.emit(LogEntry::warning(format!("{} has been defeated!", target.name)));
        }

        if self.check_combat_over() {
            return;
        }
        self.queue
            .schedule(self.now + self.config.recover_delay(), Step::NextEnemy);
    }

    /// Resolve the session if either side is wiped out
    fn check_combat_over(&mut self) -> bool {
        let status = self.rules.is_combat_over(&self.players, &self.enemies);
        let resolution = match status {
            CombatStatus::Ongoing => return false,
            CombatStatus::Victory => Resolution::Victory,
            CombatStatus::Defeat => Resolution::Defeat,
        };

        info!("Combat resolved: {:?} after {} round(s)", resolution, self.round);
        self.queue.cancel_all();
        self.enemy_order.clear();
        self.targeting = false;
        self.phase = TurnPhase::Resolved(resolution);
        self.finish(match resolution {
            Resolution::Victory => CombatOutcome::Victory,
            Resolution::Defeat => CombatOutcome::Defeat,
        });
        true
    }

    /// Settle the outcome and schedule the hand-off
    fn finish(&mut self, outcome: CombatOutcome) {
        let party: Vec<(CombatUnit, Character)> = self
            .players
            .iter()
            .cloned()
            .zip(self.records.iter().cloned())
            .collect();

        let exit = match outcome {
            CombatOutcome::Victory => settlement::settle_victory(
                &self.rules,
                &party,
                &self.enemies,
                &self.consumed,
                &mut self.sink,
            ),
            CombatOutcome::Defeat => settlement::settle_defeat(
                &self.rules,
                &self.config,
                &party,
                &self.consumed,
                &mut self.sink,
            ),
            CombatOutcome::Fled | CombatOutcome::Forfeited | CombatOutcome::Aborted => {
                settlement::settle_withdrawal(
                    &self.rules,
                    outcome,
                    &party,
                    &self.consumed,
                    &mut self.sink,
                )
            }
        };

        self.exit = Some(exit);
        self.queue
            .schedule(self.now + self.config.exit_delay(), Step::Leave);
    }

    /// Invoke the navigator, once
    fn leave(&mut self) {
        if self.navigated {
            return;
        }
        let Some(exit) = self.exit.take() else {
            return;
        };
        self.queue.cancel_all();
        self.navigated = true;
        info!("Leaving combat ({})", exit.outcome.name());
        self.navigator.leave_combat(exit);
    }
}
