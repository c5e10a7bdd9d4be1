// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Error types
//!
//! Every error raised while building, wiring or loading a pipeline is a
//! build-time configuration error. Nothing here is transient, so nothing is
//! retried; errors surface at the call that caused them.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for flowspec operations
pub type FlowspecResult<T> = Result<T, FlowspecError>;

/// Main error type for flowspec
#[derive(Error, Debug, Diagnostic)]
pub enum FlowspecError {
    // ─────────────────────────────────────────────────────────────────────────
    // Naming Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Name '{name}' already exists in {scope}")]
    #[diagnostic(
        code(flowspec::name_conflict),
        help("Step names must be unique in a pipeline, variable names unique per direction")
    )]
    NameConflict { scope: String, name: String },

    #[error("Invalid step name '{name}': {reason}")]
    #[diagnostic(
        code(flowspec::invalid_step_name),
        help("Step names must be non-empty and at most 30 characters")
    )]
    InvalidStepName { name: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Step '{step}' has no input named '{input}'")]
    #[diagnostic(
        code(flowspec::unknown_input),
        help("Only inputs declared by the step's operator can be assigned")
    )]
    UnknownInput { step: String, input: String },

    #[error("'{owner}' declares no variable named '{name}'")]
    #[diagnostic(code(flowspec::unknown_variable))]
    UnknownVariable { owner: String, name: String },

    #[error("Step '{step}' not found in pipeline")]
    #[diagnostic(code(flowspec::unknown_step))]
    UnknownStep { step: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Binding Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid value for '{variable}': {reason}")]
    #[diagnostic(code(flowspec::invalid_value))]
    InvalidValue { variable: String, reason: String },

    #[error("Cannot bind '{target}' to '{source_ref}': {reason}")]
    #[diagnostic(
        code(flowspec::invalid_assignment),
        help("Inputs take step outputs or pipeline inputs of the same category and a compatible type")
    )]
    InvalidAssignment {
        target: String,
        source_ref: String,
        reason: String,
    },

    #[error("Artifact '{variable}' is not repeated")]
    #[diagnostic(
        code(flowspec::not_repeated),
        help("Fan-out counts and element indexing only apply to repeated artifacts")
    )]
    NotRepeated { variable: String },

    #[error("Required input '{variable}' is not bound")]
    #[diagnostic(
        code(flowspec::missing_required_input),
        help("Assign a value or an upstream output, or declare a default")
    )]
    MissingRequiredInput { variable: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Step '{step}' depends on '{dependency}' which belongs to another pipeline")]
    #[diagnostic(
        code(flowspec::dependency_scope),
        help("Insert '{dependency}' into the same pipeline before wiring to it")
    )]
    DependencyScope { step: String, dependency: String },

    #[error("Step '{step}' already belongs to a pipeline")]
    #[diagnostic(
        code(flowspec::step_already_attached),
        help("Explicit ordering and re-parenting are only allowed before insertion")
    )]
    StepAlreadyAttached { step: String },

    #[error("Cycle detected between steps: {}", steps.join(", "))]
    #[diagnostic(
        code(flowspec::cycle_detected),
        help("Review your step bindings to remove the cycle")
    )]
    CycleDetected { steps: Vec<String> },

    // ─────────────────────────────────────────────────────────────────────────
    // Manifest Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Manifest schema error: {reason}")]
    #[diagnostic(code(flowspec::manifest_schema))]
    ManifestSchema { reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Service Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline not found: {key}")]
    #[diagnostic(
        code(flowspec::pipeline_not_found),
        help("Publish it first with 'flowspec push'")
    )]
    PipelineNotFound { key: String },

    #[error("Operator not found: {key}")]
    #[diagnostic(code(flowspec::operator_not_found))]
    OperatorNotFound { key: String },

    #[error("Run not found: {run_id}")]
    #[diagnostic(code(flowspec::run_not_found))]
    RunNotFound { run_id: String },

    #[error("Registry error: {message}")]
    #[diagnostic(code(flowspec::registry_error))]
    Registry { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(flowspec::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(flowspec::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(flowspec::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(flowspec::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(flowspec::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(flowspec::toml_error))]
    Toml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(flowspec::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for FlowspecError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for FlowspecError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for FlowspecError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for FlowspecError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for FlowspecError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl FlowspecError {
    /// Create a manifest schema error
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::ManifestSchema {
            reason: reason.into(),
        }
    }

    /// Create an invalid value error for a variable
    pub fn invalid_value(variable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            variable: variable.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid assignment error
    pub fn invalid_assignment(
        target: impl Into<String>,
        source: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAssignment {
            target: target.into(),
            source_ref: source.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_steps() {
        let err = FlowspecError::CycleDetected {
            steps: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected between steps: a, b");
    }

    #[test]
    fn test_yaml_conversion() {
        let parsed: Result<serde_yaml::Value, _> = serde_yaml::from_str("a: [");
        let err: FlowspecError = parsed.unwrap_err().into();
        assert!(matches!(err, FlowspecError::Yaml { .. }));
    }
}
