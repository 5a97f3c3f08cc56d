//! `damage-reflection` - damage interception and punishment policy engine
//!
//! The engine sits between a game server's damage pipeline and its
//! enforcement tools. Unauthorized player-vs-player and player-vs-structure
//! damage is nullified and reflected onto the attacker; repeat offenders
//! collect strikes that decay over time and escalate to a kick or a
//! temporary ban.
//!
//! The host implements the collaborator traits in [`host`] and registers a
//! [`engine::ReflectionEngine`] through [`host::DamageHooks`]. [`sim`] is an
//! in-memory host used by the tests and the `simulate` command.

pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod model;
pub mod observability;
pub mod sim;
