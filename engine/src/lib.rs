//! Turn-based combat engine for the Wayfarer adventure game.
//!
//! The registry and rules are built once and shared; each fight is a
//! [`session::CombatSession`] that owns its rosters, talks to the outside
//! world through a [`log_sink::LogSink`] and a [`navigation::Navigator`],
//! and is paced by the caller advancing its clock.

pub mod commands;
pub mod config;
pub mod encounter;
pub mod error;
pub mod log_sink;
pub mod navigation;
pub mod persistence;
pub mod registry;
pub mod rules;
pub mod session;

pub use config::EngineConfig;
pub use error::{CombatError, InvalidAction};
pub use registry::EntityRegistry;
pub use rules::CombatRules;
pub use session::{CombatSession, PlayerAction, TurnPhase};
