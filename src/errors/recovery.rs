// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from build-time errors.

use super::FlowspecError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &FlowspecError) -> Option<Self> {
        match error {
            FlowspecError::CycleDetected { steps } => Some(Self::fix_cycle(steps)),
            FlowspecError::DependencyScope { step, dependency } => {
                Some(Self::fix_dependency_scope(step, dependency))
            }
            FlowspecError::MissingRequiredInput { variable } => {
                Some(Self::bind_required_input(variable))
            }
            FlowspecError::ManifestSchema { reason } => Some(Self::fix_manifest(reason)),
            FlowspecError::PipelineNotFound { key } => Some(Self::publish_pipeline(key)),
            _ => None,
        }
    }

    /// Suggest breaking a dependency cycle
    pub fn fix_cycle(steps: &[String]) -> Self {
        Self {
            action: "Remove the cyclic binding".into(),
            steps: vec![
                format!("Steps left unordered: {}", steps.join(", ")),
                "A step input bound to a downstream output closes a loop".into(),
                "Rebind that input to an upstream output or a pipeline input".into(),
            ],
            commands: vec![
                "# Inspect the dependency graph:".into(),
                "flowspec graph <manifest> --format mermaid".into(),
            ],
        }
    }

    /// Suggest moving a dependency into the right pipeline
    pub fn fix_dependency_scope(step: &str, dependency: &str) -> Self {
        Self {
            action: format!("Insert '{}' into the pipeline of '{}'", dependency, step),
            steps: vec![
                "Steps may only depend on steps of the same pipeline".into(),
                "Add the upstream step first, then wire its outputs".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest binding a required input
    pub fn bind_required_input(variable: &str) -> Self {
        Self {
            action: format!("Bind '{}'", variable),
            steps: vec![
                "Assign a literal value, an upstream output or a pipeline input".into(),
                "Or configure a step default in flowspec.toml under [step_defaults]".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest fixing a malformed manifest
    pub fn fix_manifest(reason: &str) -> Self {
        Self {
            action: "Fix the manifest structure".into(),
            steps: vec![
                reason.to_string(),
                "A pipeline spec holds either 'execution' or 'pipelines', never both".into(),
                "A loop step uses exactly one of withItems, withSequence, withParam".into(),
            ],
            commands: vec![
                "# Re-emit a canonical manifest:".into(),
                "flowspec fmt <manifest>".into(),
            ],
        }
    }

    /// Suggest publishing a missing pipeline
    pub fn publish_pipeline(key: &str) -> Self {
        Self {
            action: format!("Publish '{}'", key),
            steps: vec!["The registry has no pipeline under this key".into()],
            commands: vec![
                "# Publish a manifest:".into(),
                "flowspec push <manifest>".into(),
                "".into(),
                "# List what is published:".into(),
                "flowspec list".into(),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
