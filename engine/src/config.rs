//! Engine configuration.
//!
//! Every field has a default so a partial (or absent) JSON file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::CombatError;

/// Default config file looked up by the terminal driver
pub const DEFAULT_CONFIG_PATH: &str = "wayfarer.json";

/// Stat derivation and reward arithmetic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Stat growth per level above 1
    pub level_scaling: f64,
    /// Random spread applied to attack (0.2 = ±20%)
    pub damage_variance: f64,
    /// Damage bonus per level of difference between attacker and defender
    pub level_damage_factor: f64,
    /// Experience per enemy level when a definition has no override
    pub experience_per_enemy_level: u64,
    /// Level `n` needs `n * (n - 1) * level_curve_base` total experience
    pub level_curve_base: u64,
    /// Suitable enemies may be this many levels below the player
    pub enemy_levels_below: u32,
    /// Suitable enemies may be this many levels above the player
    pub enemy_levels_above: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            level_scaling: 0.15,
            damage_variance: 0.2,
            level_damage_factor: 0.1,
            experience_per_enemy_level: 50,
            level_curve_base: 50,
            enemy_levels_below: 2,
            enemy_levels_above: 3,
        }
    }
}

/// Turn state machine policy and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A flee roll above this value succeeds
    pub flee_threshold: f64,
    /// Coins lost on defeat
    pub defeat_penalty: u64,
    /// Pause before an enemy strikes
    pub telegraph_delay_ms: u64,
    /// Pause after an enemy strikes
    pub recover_delay_ms: u64,
    /// Pause between the final result and leaving combat
    pub exit_delay_ms: u64,
    /// Entries kept by the in-memory combat log
    pub log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flee_threshold: 0.5,
            defeat_penalty: 100,
            telegraph_delay_ms: 600,
            recover_delay_ms: 400,
            exit_delay_ms: 1500,
            log_capacity: 50,
        }
    }
}

impl SessionConfig {
    pub fn telegraph_delay(&self) -> Duration {
        Duration::from_millis(self.telegraph_delay_ms)
    }

    pub fn recover_delay(&self) -> Duration {
        Duration::from_millis(self.recover_delay_ms)
    }

    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms)
    }
}

/// Random encounter sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterConfig {
    pub min_size: usize,
    pub max_size: usize,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self { min_size: 1, max_size: 3 }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rules: RulesConfig,
    pub session: SessionConfig,
    pub encounter: EncounterConfig,
    /// JSON save file used by the terminal driver
    pub save_path: PathBuf,
    /// Optional JSON file with entity definitions
    pub registry_path: Option<PathBuf>,
    /// Character controlled by the terminal driver
    pub player_id: u64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules: RulesConfig::default(),
            session: SessionConfig::default(),
            encounter: EncounterConfig::default(),
            save_path: PathBuf::from("wayfarer-save.json"),
            registry_path: None,
            player_id: 1,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CombatError> {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut config: Self = serde_json::from_str(&content)?;
        if config.rules.level_curve_base == 0 {
            warn!("level_curve_base 0 would put every level at 0 XP, using 1");
            config.rules.level_curve_base = 1;
        }
        if config.encounter.min_size > config.encounter.max_size {
            warn!(
                "Encounter min_size {} exceeds max_size {}",
                config.encounter.min_size, config.encounter.max_size
            );
        }
        info!("Loaded config from {:?}", path);
        Ok(config)
    }
}
