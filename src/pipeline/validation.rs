// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Pipeline validation
//!
//! Whole-graph checks run before a manifest leaves the process. Wiring
//! checks happen eagerly on mutation; these catch what can only be judged
//! once the pipeline is complete.

use crate::errors::FlowspecError;
use crate::pipeline::modifier::{Condition, ExecutionModifier};
use crate::pipeline::variable::{IoDirection, Owner, Source, VariableRef};
use crate::pipeline::{Pipeline, Step};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a complete pipeline
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.execution().is_none() && pipeline.steps().is_empty() {
            result.add_warning(&format!(
                "Pipeline '{}' has no steps and no execution block",
                pipeline.metadata().identifier
            ));
        }

        for step in pipeline.steps() {
            Self::validate_step(step, pipeline, &mut result);
        }

        for output in pipeline.outputs() {
            match output.source().and_then(Source::variable) {
                Some(reference) => Self::check_reference(reference, pipeline, &mut result),
                None => result.add_error(FlowspecError::invalid_value(
                    output.fullname(),
                    "pipeline output is not bound to a step output",
                )),
            }
        }

        match pipeline.graph() {
            Ok(graph) => {
                if let Some(steps) = graph.detect_cycle() {
                    result.add_error(FlowspecError::CycleDetected { steps });
                }
            }
            Err(e) => result.add_error(e),
        }

        result
    }

    /// Validate a single step
    fn validate_step(step: &Step, pipeline: &Pipeline, result: &mut ValidationResult) {
        for input in step.inputs() {
            if input.required() && !input.is_bound() {
                result.add_error(FlowspecError::MissingRequiredInput {
                    variable: input.fullname(),
                });
            }
            if let Some(reference) = input.source().and_then(Source::variable) {
                Self::check_reference(reference, pipeline, result);
            }
        }

        for (reference, _) in step.modifier().references() {
            Self::check_reference(reference, pipeline, result);
        }

        if let ExecutionModifier::Condition(Condition::Raw(expr)) = step.modifier() {
            result.add_warning(&format!(
                "Step '{}': condition '{}' is passed through verbatim and adds no dependencies",
                step.name(),
                expr
            ));
        }
    }

    /// A reference must name a pipeline input or an output of a step in the pipeline
    fn check_reference(reference: &VariableRef, pipeline: &Pipeline, result: &mut ValidationResult) {
        let resolved = match (&reference.owner, reference.direction) {
            (Owner::Pipeline, IoDirection::Inputs) => {
                pipeline.inputs().iter().any(|v| v.name() == reference.name)
            }
            (Owner::Step(step), IoDirection::Outputs) => pipeline
                .step(step)
                .and_then(|s| s.output_variable(&reference.name))
                .is_some(),
            _ => false,
        };

        if !resolved {
            result.add_error(FlowspecError::UnknownVariable {
                owner: reference.owner.to_string(),
                name: reference.name.clone(),
            });
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<FlowspecError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: FlowspecError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::operator::{OperatorDefinition, VariableDecl};
    use crate::pipeline::Manifest;

    fn op() -> OperatorDefinition {
        OperatorDefinition::local("op")
            .input(VariableDecl::any_parameter("x").required())
            .output(VariableDecl::any_parameter("out"))
    }

    #[test]
    fn test_empty_pipeline_warns() {
        let pipeline = Pipeline::builder("empty", "v1").build();
        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_unbound_required_input() {
        let mut pipeline = Pipeline::builder("p", "v1").build();
        pipeline.add_step(Step::new("s", &op()).unwrap()).unwrap();

        let result = PipelineValidator::validate(&pipeline);
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            &result.errors[0],
            FlowspecError::MissingRequiredInput { variable } if variable == "pipelines.s.inputs.parameters.x"
        ));
    }

    #[test]
    fn test_raw_condition_warns() {
        let mut pipeline = Pipeline::builder("p", "v1").build();
        let mut step = Step::condition("gate", &op(), "{{env.flag}} == yes && true").unwrap();
        step.assign_inputs([("x", "v")]).unwrap();
        pipeline.add_step(step).unwrap();

        let result = PipelineValidator::validate(&pipeline);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("verbatim")));
    }

    #[test]
    fn test_unresolved_reference_from_manifest() {
        let manifest = Manifest::from_yaml(
            r#"
apiVersion: core/v1
metadata: {identifier: p, version: v1}
spec:
  outputs:
    parameters:
      - {name: result, from: "{{inputs.parameters.nothing}}"}
  pipelines:
    - metadata: {name: s, guid: g}
      spec:
        arguments:
          parameters:
            - {name: x, from: "{{inputs.parameters.missing}}"}
"#,
        )
        .unwrap();
        let pipeline = Pipeline::from_manifest(manifest).unwrap();

        let result = PipelineValidator::validate(&pipeline);
        let unknown: Vec<&str> = result
            .errors
            .iter()
            .filter_map(|e| match e {
                FlowspecError::UnknownVariable { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(unknown, vec!["missing", "nothing"]);
    }
}
