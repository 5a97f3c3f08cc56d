//! Compiles raid include/exclude lists into membership sets.
//!
//! Entries are either opaque prefab identifiers (anything containing `/` or
//! `.`) or type names. A type name with a trailing `*` stands for the type
//! and everything deriving from it. Exclusions are resolved first and always
//! win: an include entry whose key is already excluded is skipped.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::kinds::{self, EntityKind};

/// Marker suffix meaning "this type and all of its subclasses".
pub const SUBCLASS_MARKER: char = '*';

/// A parsed configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaidEntry {
    /// Opaque prefab identifier, normalized to lowercase.
    Prefab(String),
    /// Runtime type name.
    Type {
        /// Name without the subclass marker.
        name: String,
        /// Whether subclasses are included.
        subclasses: bool,
    },
}

impl RaidEntry {
    /// Parses one configuration entry. Returns `None` for blank entries.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let entry = raw.trim();
        if entry.is_empty() {
            return None;
        }
        if entry.contains('/') || entry.contains('.') {
            return Some(Self::Prefab(entry.to_ascii_lowercase()));
        }
        let (name, subclasses) = entry
            .strip_suffix(SUBCLASS_MARKER)
            .map_or((entry, false), |n| (n.trim_end(), true));
        Some(Self::Type {
            name: name.to_string(),
            subclasses,
        })
    }
}

/// A key in a membership set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MemberKey {
    /// A concrete entity kind.
    Kind(EntityKind),
    /// A prefab identifier.
    Prefab(String),
}

/// Which list an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListName {
    /// The exclude list.
    Exclude,
    /// The include list.
    Include,
}

/// An entry that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveWarning {
    /// List the entry came from.
    pub list: ListName,
    /// The raw entry.
    pub entry: String,
    /// What went wrong.
    pub message: String,
    /// Closest known type name, if any.
    pub suggestion: Option<&'static str>,
}

impl std::fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}': {}", self.entry, self.message)?;
        if let Some(s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

/// Where a target falls relative to the membership sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    /// Matched the exclude set.
    Excluded,
    /// Matched the include set.
    Included,
    /// Matched neither.
    Unlisted,
}

/// Compiled include/exclude sets.
///
/// Built wholesale from configuration and never mutated afterwards. Ordered
/// sets keep two builds from identical lists byte-identical when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeMembership {
    included: BTreeSet<MemberKey>,
    excluded: BTreeSet<MemberKey>,
}

impl TypeMembership {
    /// Builds membership sets from exclude and include lists.
    ///
    /// Unresolvable entries are skipped, logged, and returned as warnings.
    #[must_use]
    pub fn build(exclude: &[String], include: &[String]) -> (Self, Vec<ResolveWarning>) {
        let (membership, warnings) = Self::compile(exclude, include);
        for w in &warnings {
            warn!(list = ?w.list, "skipping raid entry {w}");
        }
        (membership, warnings)
    }

    /// Same as [`build`](Self::build) without logging.
    #[must_use]
    pub fn compile(exclude: &[String], include: &[String]) -> (Self, Vec<ResolveWarning>) {
        let mut membership = Self::default();
        let mut warnings = Vec::new();

        for raw in exclude {
            for key in resolve(raw, ListName::Exclude, &mut warnings) {
                membership.excluded.insert(key);
            }
        }
        for raw in include {
            for key in resolve(raw, ListName::Include, &mut warnings) {
                if membership.excluded.contains(&key) {
                    debug!(entry = %raw, ?key, "include entry shadowed by exclusion");
                    continue;
                }
                membership.included.insert(key);
            }
        }
        (membership, warnings)
    }

    /// Classifies a target by kind and prefab.
    #[must_use]
    pub fn relevance(&self, kind: EntityKind, prefab: &str) -> Relevance {
        let prefab = MemberKey::Prefab(prefab.to_ascii_lowercase());
        let kind = MemberKey::Kind(kind);
        if self.excluded.contains(&kind) || self.excluded.contains(&prefab) {
            Relevance::Excluded
        } else if self.included.contains(&kind) || self.included.contains(&prefab) {
            Relevance::Included
        } else {
            Relevance::Unlisted
        }
    }

    /// Returns `true` if the key is in the include set.
    #[must_use]
    pub fn is_included(&self, key: &MemberKey) -> bool {
        self.included.contains(key)
    }

    /// Returns `true` if the key is in the exclude set.
    #[must_use]
    pub fn is_excluded(&self, key: &MemberKey) -> bool {
        self.excluded.contains(key)
    }

    /// Returns `true` if no include entries resolved.
    #[must_use]
    pub fn include_is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Number of included keys.
    #[must_use]
    pub fn included_len(&self) -> usize {
        self.included.len()
    }

    /// Number of excluded keys.
    #[must_use]
    pub fn excluded_len(&self) -> usize {
        self.excluded.len()
    }
}

fn resolve(raw: &str, list: ListName, warnings: &mut Vec<ResolveWarning>) -> Vec<MemberKey> {
    let Some(entry) = RaidEntry::parse(raw) else {
        warnings.push(ResolveWarning {
            list,
            entry: raw.to_string(),
            message: "blank entry".to_string(),
            suggestion: None,
        });
        return Vec::new();
    };

    match entry {
        RaidEntry::Prefab(id) => vec![MemberKey::Prefab(id)],
        RaidEntry::Type { name, subclasses } => {
            let Some(info) = kinds::lookup(&name) else {
                warnings.push(ResolveWarning {
                    list,
                    entry: raw.to_string(),
                    message: "unknown type".to_string(),
                    suggestion: kinds::suggest_type(&name),
                });
                return Vec::new();
            };
            if subclasses {
                kinds::concrete_descendants(info.name)
                    .into_iter()
                    .map(MemberKey::Kind)
                    .collect()
            } else if let Some(kind) = info.kind {
                vec![MemberKey::Kind(kind)]
            } else {
                warnings.push(ResolveWarning {
                    list,
                    entry: raw.to_string(),
                    message: format!(
                        "abstract type matches nothing without '{SUBCLASS_MARKER}'"
                    ),
                    suggestion: None,
                });
                Vec::new()
            }
        }
    }
}
