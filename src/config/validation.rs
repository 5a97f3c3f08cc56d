//! Configuration validation
//!
//! Runs on a fully deserialized [`ReflectionConfig`]. All issues are
//! collected rather than stopping at the first one, so a single run reports
//! everything wrong with a file.

use std::time::Duration;

use crate::catalog::TypeMembership;
use crate::config::loader::ConfigLimits;
use crate::config::schema::ReflectionConfig;
use crate::error::{Severity, ValidationIssue};

/// Largest reflection percentage accepted.
const MAX_REFLECT_PERCENT: f32 = 1000.0;

/// TTLs above this are no longer same-tick bridges.
const LONG_TTL: Duration = Duration::from_secs(5);

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &ReflectionConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_pvp(config);
        self.validate_structure(config, limits);
        self.validate_forgiveness(config);
        self.validate_bypass(config);
        self.validate_dispatch(config);

        if !config.bleed.amount.is_finite() || config.bleed.amount < 0.0 {
            self.add_error("bleed.amount", "Bleed amount must be a non-negative number");
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_pvp(&mut self, config: &ReflectionConfig) {
        self.check_percent("pvp.reflect_percent", config.pvp.reflect_percent);
        let mult = config.pvp.headshot_multiplier;
        if !mult.is_finite() || mult <= 0.0 {
            self.add_error(
                "pvp.headshot_multiplier",
                "Headshot multiplier must be greater than zero",
            );
        }
    }

    fn validate_structure(&mut self, config: &ReflectionConfig, limits: &ConfigLimits) {
        self.check_percent("structure.reflect_percent", config.structure.reflect_percent);

        let raid = &config.structure.raid;
        for (path, len) in [
            ("structure.raid.include", raid.include.len()),
            ("structure.raid.exclude", raid.exclude.len()),
        ] {
            if len > limits.max_raid_entries {
                self.add_error(
                    path,
                    &format!(
                        "List has {len} entries (limit: {})",
                        limits.max_raid_entries
                    ),
                );
            }
        }

        let (_, warnings) = TypeMembership::compile(&raid.exclude, &raid.include);
        for w in warnings {
            let path = match w.list {
                crate::catalog::ListName::Exclude => "structure.raid.exclude",
                crate::catalog::ListName::Include => "structure.raid.include",
            };
            self.add_warning(path, &format!("Skipping entry {w}"));
        }

        if raid.explosive_fragments.iter().any(|f| f.trim().is_empty()) {
            self.add_error(
                "structure.raid.explosive_fragments",
                "Explosive name fragments cannot be empty (they would match every name)",
            );
        }
    }

    fn validate_forgiveness(&mut self, config: &ReflectionConfig) {
        let f = &config.forgiveness;
        if f.enabled && f.threshold == 0 {
            self.add_warning(
                "forgiveness.threshold",
                "Threshold 0 disables strike tracking",
            );
        }
        if !f.enabled && f.death_penalty {
            self.add_warning(
                "forgiveness.death_penalty",
                "Death penalty only fires when forgiveness is enabled",
            );
        }
        if f.auto_ban && f.ban_hours == 0 {
            self.add_error(
                "forgiveness.ban_hours",
                "Ban duration must be at least one hour when auto_ban is enabled",
            );
        }
    }

    fn validate_bypass(&mut self, config: &ReflectionConfig) {
        let b = &config.bypass;
        for (path, ttl) in [
            ("bypass.token_ttl", b.token_ttl),
            ("bypass.intent_ttl", b.intent_ttl),
        ] {
            if ttl.is_zero() {
                self.add_error(path, "TTL must be greater than zero");
            } else if ttl > LONG_TTL {
                self.add_warning(
                    path,
                    "TTL is unusually long; stale entries may match unrelated events",
                );
            }
        }
        if b.table_bound == 0 {
            self.add_error("bypass.table_bound", "Table bound must be greater than zero");
        }
    }

    fn validate_dispatch(&mut self, config: &ReflectionConfig) {
        let d = &config.dispatch;
        if !d.epsilon.is_finite() || d.epsilon <= 0.0 {
            self.add_error("dispatch.epsilon", "Epsilon must be a small positive number");
        }
        if !d.lethal_floor.is_finite() || d.lethal_floor <= 0.0 {
            self.add_error("dispatch.lethal_floor", "Lethal floor must be positive");
        }
        if !d.lethal_multiplier.is_finite() || d.lethal_multiplier < 1.0 {
            self.add_error(
                "dispatch.lethal_multiplier",
                "Lethal multiplier must be at least 1.0",
            );
        }
    }

    fn check_percent(&mut self, path: &str, value: f32) {
        if !value.is_finite() || !(0.0..=MAX_REFLECT_PERCENT).contains(&value) {
            self.add_error(
                path,
                &format!("Percentage must be between 0 and {MAX_REFLECT_PERCENT}"),
            );
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(config: &ReflectionConfig) -> ValidationResult {
        Validator::new().validate(config, &ConfigLimits::default())
    }

    #[test]
    fn default_config_is_valid() {
        let result = validate(&ReflectionConfig::default());
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ReflectionConfig::default();
        config.pvp.reflect_percent = -1.0;
        config.structure.reflect_percent = f32::NAN;
        config.dispatch.epsilon = 0.0;
        config.bypass.token_ttl = Duration::ZERO;
        let result = validate(&config);
        assert_eq!(result.errors.len(), 4, "{:?}", result.errors);
    }

    #[test]
    fn zero_threshold_warns() {
        let mut config = ReflectionConfig::default();
        config.forgiveness.enabled = true;
        config.forgiveness.threshold = 0;
        let result = validate(&config);
        assert!(result.is_valid());
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.path == "forgiveness.threshold")
        );
    }

    #[test]
    fn auto_ban_requires_hours() {
        let mut config = ReflectionConfig::default();
        config.forgiveness.auto_ban = true;
        config.forgiveness.ban_hours = 0;
        assert!(validate(&config).has_errors());
    }

    #[test]
    fn long_ttl_warns() {
        let mut config = ReflectionConfig::default();
        config.bypass.intent_ttl = Duration::from_secs(30);
        let result = validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings[0].path, "bypass.intent_ttl");
    }

    #[test]
    fn unresolvable_raid_entries_warn() {
        let mut config = ReflectionConfig::default();
        config.structure.raid.exclude = vec!["Dooor".to_string()];
        let result = validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("Door"));
    }

    #[test]
    fn raid_list_limit_enforced() {
        let mut config = ReflectionConfig::default();
        config.structure.raid.include = vec!["Door".to_string(); 3];
        let limits = ConfigLimits {
            max_config_size: 1024,
            max_raid_entries: 2,
        };
        let result = Validator::new().validate(&config, &limits);
        assert!(result.has_errors());
    }

    #[test]
    fn empty_fragment_rejected() {
        let mut config = ReflectionConfig::default();
        config.structure.raid.explosive_fragments.push("  ".to_string());
        assert!(validate(&config).has_errors());
    }
}
