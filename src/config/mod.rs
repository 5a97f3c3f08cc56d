//! Configuration module
//!
//! Loads and validates the engine configuration: subsystem switches,
//! reflection tunables, raid relevance lists, and notification templates.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, inline_origin};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
