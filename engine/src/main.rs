//! Wayfarer terminal driver
//!
//! Plays the combat engine from a terminal: explore to run into enemies,
//! fight them turn by turn, and have the result saved between runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use wayfarer_shared::{Character, CharacterId, HEALTH_POTION};

use wayfarer_engine::commands::{self, Command, CommandResult};
use wayfarer_engine::config::{EngineConfig, DEFAULT_CONFIG_PATH};
use wayfarer_engine::encounter::EncounterGenerator;
use wayfarer_engine::error::CombatError;
use wayfarer_engine::log_sink::ConsoleSink;
use wayfarer_engine::navigation::{ChannelNavigator, CombatExit};
use wayfarer_engine::persistence::{self, PersistenceHandle};
use wayfarer_engine::registry::EntityRegistry;
use wayfarer_engine::rules::CombatRules;
use wayfarer_engine::session::{CombatSession, EncounterSource, SessionContext};

/// How often pending enemy steps are checked
const TICK_INTERVAL_MS: u64 = 50;

/// Coins a brand new character starts with
const STARTER_CURRENCY: u64 = 20;

type DriverSession = CombatSession<ConsoleSink, ChannelNavigator>;

/// A running fight and the instant its clock started
struct ActiveCombat {
    session: DriverSession,
    started: Instant,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match EngineConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("Wayfarer stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: EngineConfig) -> Result<(), CombatError> {
    let registry = match &config.registry_path {
        Some(path) => EntityRegistry::load_or_default(path),
        None => EntityRegistry::with_defaults(),
    };
    info!("Entity registry ready ({} definitions)", registry.len());

    let rules = CombatRules::new(Arc::new(registry), config.rules.clone());
    let generator = EncounterGenerator::new(rules.clone(), config.encounter.clone());

    let persistence = persistence::init(&config.save_path).await?;
    let mut player = load_player(&persistence, &rules, config.player_id).await?;

    let mut rng = match config.seed {
        Some(seed) => {
            info!("Using fixed seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel::<CombatExit>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
    let mut combat: Option<ActiveCombat> = None;

    println!("Welcome back, {}. Type `help` for commands.", player.name);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                // End of input behaves like `quit`
                let Some(line) = line? else {
                    if let Some(active) = combat.as_mut() {
                        active.session.preempt();
                    }
                    break;
                };

                let command = match commands::parse(&line, combat.is_some()) {
                    Ok(c) => c,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                if let Some(active) = combat.as_mut() {
                    if command == Command::Quit {
                        active.session.preempt();
                        break;
                    }
                    print_result(commands::execute_combat(&mut active.session, command));
                } else {
                    match command {
                        Command::Quit => break,
                        Command::Explore => {
                            let context = SessionContext {
                                rules: rules.clone(),
                                config: config.session.clone(),
                                sink: ConsoleSink::new(config.session.log_capacity),
                                navigator: ChannelNavigator::new(exit_tx.clone()),
                            };
                            let size = generator.roll_size(&mut rng);
                            let session_rng = StdRng::seed_from_u64(rng.gen());
                            let started = CombatSession::start(
                                context,
                                vec![player.clone()],
                                EncounterSource::Random { generator: &generator, size },
                                session_rng,
                            )?;
                            combat = started.map(|session| ActiveCombat {
                                session,
                                started: Instant::now(),
                            });
                        }
                        other => print_result(commands::execute_idle(other, &mut player, &rules)),
                    }
                }
            }

            _ = ticker.tick() => {
                if let Some(active) = combat.as_mut() {
                    active.session.advance(active.started.elapsed());
                }
            }

            Some(exit) = exit_rx.recv() => {
                player = apply_exit(exit, config.player_id, &persistence)?;
                combat = None;
                println!("What now? (`explore`, `rest`, `status`)");
            }
        }
    }

    // A fight cut short by `quit` has already handed over its exit
    while let Ok(exit) = exit_rx.try_recv() {
        player = apply_exit(exit, config.player_id, &persistence)?;
    }
    persistence.save_character(player);
    persistence.shutdown().await;
    info!("Goodbye");
    Ok(())
}

/// Load the controlled character, creating a starter on first run
async fn load_player(
    persistence: &PersistenceHandle,
    rules: &CombatRules,
    id: CharacterId,
) -> Result<Character, CombatError> {
    match persistence.require_character(id).await {
        Ok(character) => {
            info!("Loaded {} (level {})", character.name, character.level);
            Ok(character)
        }
        Err(CombatError::MissingPlayer(_)) => {
            let human = rules.registry().human();
            let mut character = Character::new(id, "Wayfarer", human.id.clone())
                .with_stats(human.max_hp, human.attack);
            character.inventory.currency = STARTER_CURRENCY;
            character.inventory.add_item(HEALTH_POTION, 3);

            info!("Created starter character {}", id);
            persistence.save_character(character.clone());
            Ok(character)
        }
        Err(e) => Err(e),
    }
}

/// Take the updated record out of a combat exit and save it
fn apply_exit(
    exit: CombatExit,
    id: CharacterId,
    persistence: &PersistenceHandle,
) -> Result<Character, CombatError> {
    info!(
        "Combat ended ({}), currency change {}",
        exit.outcome.name(),
        exit.currency_delta
    );
    let character = exit
        .party
        .into_iter()
        .next()
        .ok_or(CombatError::MissingPlayer(id))?;
    persistence.save_character(character.clone());
    Ok(character)
}

fn print_result(result: CommandResult) {
    if !result.message.is_empty() {
        println!("{}", result.message);
    }
}
