//! Error types for the combat engine.

use thiserror::Error;
use wayfarer_shared::{CharacterId, UnitId};

/// Problems building an entity registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate entity definition id `{0}`")]
    DuplicateId(String),
    #[error("registry has no `human` definition")]
    MissingHuman,
}

/// Conditions that prevent a combat session (or the driver) from proceeding
#[derive(Debug, Error)]
pub enum CombatError {
    #[error("no player character available for combat (character {0})")]
    MissingPlayer(CharacterId),
    #[error("cannot start combat without a party")]
    EmptyParty,
    #[error("save data is missing or unreadable")]
    MissingSaveData,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A player action rejected by the turn state machine.
///
/// Rejections never change session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAction {
    #[error("it is not your turn")]
    NotPlayerTurn,
    #[error("combat is already over")]
    SessionOver,
    #[error("no ally is selected")]
    NoAllySelected,
    #[error("{0} cannot act")]
    AllyDown(String),
    #[error("no target is selected")]
    NoTargetSelected,
    #[error("{0} is already defeated")]
    TargetDown(String),
    #[error("unknown combatant {0}")]
    UnknownUnit(UnitId),
    #[error("unknown item {0}")]
    UnknownItem(u32),
    #[error("no {0} left")]
    ItemUnavailable(String),
}

/// A line of terminal input that could not be turned into a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("type a command (try `help`)")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{0}` only works during combat")]
    CombatOnly(String),
    #[error("`{0}` is not available during combat")]
    NotDuringCombat(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("there is no item called `{0}`")]
    UnknownItem(String),
}
