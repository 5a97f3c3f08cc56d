//! Configuration loader
//!
//! Loading runs in stages:
//! 1. Size check and read (UTF-8 BOM stripped)
//! 2. Environment variable expansion on the raw text
//! 3. YAML parsing into [`ReflectionConfig`]
//! 4. Validation (all issues collected)
//! 5. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::ReflectionConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Limits applied while loading.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,

    /// Maximum entries per raid include/exclude list.
    pub max_raid_entries: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("DAMAGE_REFLECTION_MAX_CONFIG_SIZE", 1024 * 1024),
            max_raid_entries: env_or("DAMAGE_REFLECTION_MAX_RAID_ENTRIES", 4096),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<ReflectionConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Creates a loader with default limits.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ConfigLimits::default())
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is empty or too large,
    /// fails to parse, or fails validation.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let raw = std::fs::read(path).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: None,
            message: e.to_string(),
        })?;

        if raw.len() > self.limits.max_config_size {
            return Err(ConfigError::TooLarge {
                size: raw.len(),
                limit: self.limits.max_config_size,
            });
        }

        let text = String::from_utf8(raw).map_err(|_| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: None,
            message: "file is not valid UTF-8".to_string(),
        })?;

        self.load_str(&text, path)
    }

    /// Loads and validates configuration text.
    ///
    /// `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty, fails to parse, or fails
    /// validation.
    pub fn load_str(&self, text: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: origin.to_path_buf(),
            });
        }

        let mut warnings = Vec::new();
        let expanded = expand_env(text, origin, &mut warnings)?;

        let config: ReflectionConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        let result = Validator::new().validate(&config, &self.limits);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors: result.errors,
            });
        }

        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expands `${VAR}` and `${VAR:-default}` references; `$$` is a literal `$`.
///
/// An unset variable without a default expands to an empty string and
/// produces a warning.
fn expand_env(
    raw: &str,
    origin: &Path,
    warnings: &mut Vec<LoadWarning>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(body) = tail.strip_prefix('{') {
            let end = body.find('}').ok_or_else(|| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: None,
                message: "unclosed environment variable reference".to_string(),
            })?;
            let spec = &body[..end];
            let (name, default) = spec
                .split_once(":-")
                .map_or((spec, None), |(n, d)| (n, Some(d)));

            match (std::env::var(name), default) {
                (Ok(value), _) => out.push_str(&value),
                (Err(_), Some(d)) => out.push_str(d),
                (Err(_), None) => warnings.push(LoadWarning {
                    message: format!(
                        "Environment variable '{name}' is not set, using empty string"
                    ),
                    location: Some(origin.display().to_string()),
                }),
            }
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = tail;
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Path used for configuration built from text with no file behind it.
#[must_use]
pub fn inline_origin() -> PathBuf {
    PathBuf::from("<inline>")
}

// ============================================================================
// Tests
// ============================================================================
