//! `validate` command
//!
//! Loads each configuration file and reports errors and warnings without
//! building an engine.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, ReflectError, Severity, ValidationIssue};

#[derive(Debug, Serialize)]
struct FileReport {
    path: PathBuf,
    valid: bool,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total: usize,
    valid: usize,
    invalid: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    files: Vec<FileReport>,
    summary: Summary,
}

/// Validate configuration files.
///
/// Every file is checked even after a failure; the first failure is
/// returned.
///
/// # Errors
///
/// Returns an I/O error if a file does not exist, or a config error if a
/// file fails validation (or has warnings under `--strict`).
pub fn run(args: &ValidateArgs) -> Result<(), ReflectError> {
    let loader = ConfigLoader::with_defaults();
    let mut files = Vec::with_capacity(args.files.len());
    let mut first_error: Option<ReflectError> = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let outcome = if path.exists() {
            loader
                .load(path)
                .map_err(ReflectError::from)
                .and_then(|result| strict_check(args.strict, path, result.warnings))
        } else {
            Err(ReflectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )))
        };

        let report = match outcome {
            Ok(warnings) => {
                for w in &warnings {
                    tracing::warn!(
                        location = w.location.as_deref().unwrap_or("<unknown>"),
                        "{}",
                        w.message
                    );
                }
                tracing::info!(file = %path.display(), "configuration valid");
                FileReport {
                    path: path.clone(),
                    valid: true,
                    warnings: warnings.iter().map(describe_warning).collect(),
                    error: None,
                }
            }
            Err(e) => {
                let report = FileReport {
                    path: path.clone(),
                    valid: false,
                    warnings: Vec::new(),
                    error: Some(e.to_string()),
                };
                first_error.get_or_insert(e);
                report
            }
        };
        files.push(report);
    }

    let valid = files.iter().filter(|f| f.valid).count();
    let report = Report {
        summary: Summary {
            total: files.len(),
            valid,
            invalid: files.len() - valid,
        },
        files,
    };

    match args.format {
        OutputFormat::Human => print_human(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    first_error.map_or(Ok(()), Err)
}

/// Turns warnings into a validation failure under `--strict`.
fn strict_check(
    strict: bool,
    path: &std::path::Path,
    warnings: Vec<LoadWarning>,
) -> Result<Vec<LoadWarning>, ReflectError> {
    if !strict || warnings.is_empty() {
        return Ok(warnings);
    }
    Err(ConfigError::ValidationError {
        path: path.display().to_string(),
        errors: warnings
            .into_iter()
            .map(|w| ValidationIssue {
                path: w.location.unwrap_or_default(),
                message: w.message,
                severity: Severity::Warning,
            })
            .collect(),
    }
    .into())
}

fn describe_warning(w: &LoadWarning) -> String {
    match &w.location {
        Some(location) => format!("{}: {location}", w.message),
        None => w.message.clone(),
    }
}

fn print_human(report: &Report) {
    for file in &report.files {
        let mark = if file.valid { "ok" } else { "FAILED" };
        println!("{} ... {mark}", file.path.display());
        for w in &file.warnings {
            println!("  warning: {w}");
        }
        if let Some(e) = &file.error {
            println!("  error: {e}");
        }
    }
    println!(
        "{} file(s): {} valid, {} invalid",
        report.summary.total, report.summary.valid, report.summary.invalid
    );
}
