//! Error types for the damage reflection engine.
//!
//! Only the outer surfaces (configuration loading, scenario replay, the CLI)
//! return these errors. The engine's damage hooks never fail toward the host:
//! anything that goes wrong inside them is logged and dropped.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Process exit codes for CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Scenario replay error (unknown entity, malformed step)
    pub const SCENARIO_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for crate operations.
#[derive(Debug, Error)]
pub enum ReflectError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scenario loading or replay error
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Enforcement collaborator error that escaped to an outer surface
    #[error(transparent)]
    Enforce(#[from] EnforceError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ReflectError {
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Scenario(_) => ExitCode::SCENARIO_ERROR,
            Self::Enforce(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(.errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Configuration file is empty
    #[error("configuration file is empty: {path}")]
    Empty {
        /// Path to the empty file
        path: PathBuf,
    },

    /// Configuration file exceeds the size limit
    #[error("configuration file too large: {size} bytes (limit: {limit})")]
    TooLarge {
        /// Actual file size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g., "forgiveness.threshold")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Reported but does not prevent loading
    Warning,
}

// ============================================================================
// Enforcement Errors
// ============================================================================

/// Failures reported by enforcement collaborators (kick, temporary ban).
///
/// The engine catches these where it calls the collaborator and treats the
/// consequence as dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnforceError {
    /// The actor is no longer connected
    #[error("actor {0} is not connected")]
    NotConnected(u64),

    /// The collaborator did not answer in time
    #[error("enforcement timed out: {0}")]
    Timeout(String),

    /// The collaborator rejected the request
    #[error("enforcement rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// Scenario Errors
// ============================================================================

/// Errors raised while loading or replaying a simulation scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A step references an entity the scenario never declared
    #[error("step {step}: unknown entity {id}")]
    UnknownEntity {
        /// Zero-based step index
        step: usize,
        /// Entity id that could not be resolved
        id: u64,
    },

    /// Two entities were declared with the same id
    #[error("duplicate entity id {0}")]
    DuplicateEntity(u64),

    /// A step is malformed
    #[error("step {step}: {message}")]
    InvalidStep {
        /// Zero-based step index
        step: usize,
        /// What is wrong with it
        message: String,
    },

    /// Scenario file could not be parsed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the scenario file
        path: PathBuf,
        /// Error message from the parser
        message: String,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, ReflectError>;

// ============================================================================
// Tests
// ============================================================================
