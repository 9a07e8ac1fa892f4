//! Ephemeral combat participants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CharacterId;

/// Combat-instance id, unique within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What defeating an enemy unit is worth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReward {
    pub experience: u64,
    pub currency: u64,
}

/// In-combat snapshot of a character's fighting capability.
///
/// Units are treated as immutable values: damage and healing produce a new
/// unit with the same [`UnitId`]. The reward is only ever present on the
/// enemy side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatUnit {
    pub id: UnitId,
    /// Originating character record, if the unit was built from one
    pub character_id: Option<CharacterId>,
    pub name: String,
    pub level: u32,
    pub max_hp: u32,
    pub current_hp: u32,
    pub attack: u32,
    pub definition_id: String,
    is_player: bool,
    reward: Option<UnitReward>,
}

impl CombatUnit {
    /// Build a player-side unit
    #[allow(clippy::too_many_arguments)]
    pub fn player(
        id: UnitId,
        character_id: Option<CharacterId>,
        name: impl Into<String>,
        level: u32,
        max_hp: u32,
        current_hp: u32,
        attack: u32,
        definition_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            character_id,
            name: name.into(),
            level,
            max_hp,
            current_hp: current_hp.min(max_hp),
            attack,
            definition_id: definition_id.into(),
            is_player: true,
            reward: None,
        }
    }

    /// Build an enemy unit at full health
    #[allow(clippy::too_many_arguments)]
    pub fn enemy(
        id: UnitId,
        character_id: Option<CharacterId>,
        name: impl Into<String>,
        level: u32,
        max_hp: u32,
        attack: u32,
        definition_id: impl Into<String>,
        reward: UnitReward,
    ) -> Self {
        Self {
            id,
            character_id,
            name: name.into(),
            level,
            max_hp,
            current_hp: max_hp,
            attack,
            definition_id: definition_id.into(),
            is_player: false,
            reward: Some(reward),
        }
    }

    pub fn is_player(&self) -> bool {
        self.is_player
    }

    pub fn is_alive(&self) -> bool {
        self.current_hp > 0
    }

    pub fn reward(&self) -> Option<UnitReward> {
        self.reward
    }

    /// Copy of this unit with a different HP value, clamped to `[0, max_hp]`
    pub fn with_hp(&self, hp: u32) -> Self {
        Self {
            current_hp: hp.min(self.max_hp),
            ..self.clone()
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// How a combat session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatOutcome {
    Victory,
    Defeat,
    Fled,
    Forfeited,
    /// Cut short by a scene change before reaching a result
    Aborted,
}

impl CombatOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Victory => "victory",
            Self::Defeat => "defeat",
            Self::Fled => "fled",
            Self::Forfeited => "forfeited",
            Self::Aborted => "aborted",
        }
    }
}
