//! Defines the error types for the catalog module.
use std::path::PathBuf;
use thiserror::Error;

/// The specific category of a catalog validation issue.
///
// Kept as an enum so callers can filter issues without matching on messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// A referenced variable is not defined in the catalog.
    DanglingReference,
    /// A median bin table is empty, unordered or has inverted bounds.
    MalformedBins,
    /// A design factor that is not a positive finite number.
    DesignFactor,
    /// A special composite whose constituents do not match its function.
    Arity,
    /// A plain variable with no raw source fields.
    NoFields,
}

/// A structured report from the static catalog checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The variable the issue was found on.
    pub variable: String,
    pub kind: IssueKind,
    /// A human-readable message explaining the issue.
    pub message: String,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Catalog failed validation:\n{}", format_issues(.0))]
    Invalid(Vec<ValidationIssue>),
    #[error("Dependency cycle through variable '{variable}'")]
    Cycle { variable: String },
    #[error("Cannot read '{path}': {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Cannot parse '{path}': {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("Median range for '{variable}' is malformed: {msg}")]
    MalformedRange { variable: String, msg: String },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  {}: {}", i.variable, i.message))
        .collect::<Vec<_>>()
        .join("\n")
}
