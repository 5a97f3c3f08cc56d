//! Entity type catalog
//!
//! The closed set of entity kinds the engine classifies, the static type
//! hierarchy behind them, and the resolver that turns raid include/exclude
//! configuration into O(1) membership lookups.

pub mod kinds;
pub mod resolver;

pub use kinds::{EntityKind, TypeInfo};
pub use resolver::{ListName, MemberKey, RaidEntry, Relevance, ResolveWarning, TypeMembership};
