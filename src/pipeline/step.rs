// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Pipeline steps
//!
//! A step is one node of the pipeline DAG: an operator invocation with its
//! input bindings, its dependencies and an optional execution modifier.
//! Dependencies are kept by step name; binding an input to another step's
//! output adds that step as a dependency.

use serde_json::Value;
use tracing::debug;

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::manifest::{Argument, Arguments, SequenceSpec, StepManifest, StepMetadata, StepSpec};
use crate::pipeline::modifier::{Condition, ExecutionModifier, LoopItems};
use crate::pipeline::operator::{instantiate_all, OperatorDefinition, OperatorRef};
use crate::pipeline::variable::{
    AssignValue, IoDirection, Origin, Owner, ScopeId, Source, StepId, Variable, VariableCategory,
    VariableHandle, VariableRef,
};

/// Longest accepted step name
pub const MAX_STEP_NAME_LEN: usize = 30;

/// A dependency edge, from the named step to the owning one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDependency {
    pub name: String,
    /// Step instance and pipeline the edge was recorded against
    pub origin: Origin,
}

/// One node of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    id: StepId,
    name: String,
    operator: OperatorRef,
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    /// Inputs bound explicitly, in binding order
    assigned: Vec<String>,
    /// Where each input bound to a handle took it from
    origins: Vec<(String, Origin)>,
    dependencies: Vec<StepDependency>,
    modifier: ExecutionModifier,
    parent: Option<ScopeId>,
}

pub(crate) fn validate_name(name: &str) -> FlowspecResult<()> {
    let invalid = |reason: &str| {
        Err(FlowspecError::InvalidStepName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return invalid("name is empty");
    }
    if name.chars().count() > MAX_STEP_NAME_LEN {
        return invalid("name is longer than 30 characters");
    }
    // Step names are embedded in `{{pipelines.<name>...}}` references
    if name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '.' | '{' | '}'))
    {
        return invalid("name may not contain whitespace, dots or braces");
    }
    Ok(())
}

impl Step {
    /// Create a step running `operator`, with unbound inputs
    pub fn new(name: impl Into<String>, operator: &OperatorDefinition) -> FlowspecResult<Self> {
        let name = name.into();
        validate_name(&name)?;

        let owner = Owner::Step(name.clone());
        Ok(Self {
            inputs: instantiate_all(operator.inputs(), &owner, IoDirection::Inputs)?,
            outputs: instantiate_all(operator.outputs(), &owner, IoDirection::Outputs)?,
            id: StepId::next(),
            operator: operator.reference(),
            name,
            assigned: Vec::new(),
            origins: Vec::new(),
            dependencies: Vec::new(),
            modifier: ExecutionModifier::None,
            parent: None,
        })
    }

    /// Step that runs only when `condition` holds
    pub fn condition(
        name: impl Into<String>,
        operator: &OperatorDefinition,
        condition: impl Into<Condition>,
    ) -> FlowspecResult<Self> {
        let mut step = Self::new(name, operator)?;
        step.set_modifier(ExecutionModifier::condition(condition))?;
        Ok(step)
    }

    /// Step that runs once per loop item, at most `parallelism` at a time
    pub fn for_each(
        name: impl Into<String>,
        operator: &OperatorDefinition,
        items: impl Into<LoopItems>,
        parallelism: Option<usize>,
    ) -> FlowspecResult<Self> {
        let mut step = Self::new(name, operator)?;
        step.set_modifier(ExecutionModifier::for_each(items, parallelism)?)?;
        Ok(step)
    }

    /// Step assembled from already-built variables, used by manifest loading
    pub(crate) fn from_parts(
        name: String,
        operator: OperatorRef,
        inputs: Vec<Variable>,
        outputs: Vec<Variable>,
    ) -> FlowspecResult<Self> {
        validate_name(&name)?;
        Ok(Self {
            id: StepId::next(),
            name,
            operator,
            inputs,
            outputs,
            assigned: Vec::new(),
            origins: Vec::new(),
            dependencies: Vec::new(),
            modifier: ExecutionModifier::None,
            parent: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance identity; clones of a step share it
    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn operator(&self) -> &OperatorRef {
        &self.operator
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Option<&Variable> {
        self.inputs.iter().find(|v| v.name() == name)
    }

    pub fn output_variable(&self, name: &str) -> Option<&Variable> {
        self.outputs.iter().find(|v| v.name() == name)
    }

    /// Handle to an output, for wiring into downstream steps
    pub fn output(&self, name: &str) -> FlowspecResult<VariableHandle> {
        self.output_variable(name)
            .map(|v| v.handle(Origin::step(self.parent, self.id)))
            .ok_or_else(|| FlowspecError::UnknownVariable {
                owner: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Inputs bound explicitly, in binding order
    pub fn assigned_inputs(&self) -> impl Iterator<Item = &Variable> {
        self.assigned.iter().filter_map(|name| self.input(name))
    }

    pub fn dependencies(&self) -> &[StepDependency] {
        &self.dependencies
    }

    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies.iter().map(|d| d.name.as_str()).collect()
    }

    /// Variables read through input bindings and the modifier, with their origins
    pub fn bound_references(&self) -> Vec<(&VariableRef, Origin)> {
        let bound = self.inputs.iter().filter_map(|v| {
            let reference = v.source().and_then(Source::variable)?;
            let origin = self
                .origins
                .iter()
                .find(|(name, _)| name == v.name())
                .map(|(_, origin)| *origin)
                .unwrap_or_default();
            Some((reference, origin))
        });
        bound.chain(self.modifier.references()).collect()
    }

    pub fn modifier(&self) -> &ExecutionModifier {
        &self.modifier
    }

    /// Pipeline this step was inserted into
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub(crate) fn attach(&mut self, scope: ScopeId) {
        self.parent = Some(scope);
    }

    /// Bind inputs by name; on any error the step is left unchanged
    pub fn assign_inputs<I, K, V>(&mut self, bindings: I) -> FlowspecResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AssignValue>,
    {
        let mut candidate = self.clone();
        for (name, value) in bindings {
            candidate.assign_one(name.into(), value.into())?;
        }
        *self = candidate;
        Ok(())
    }

    fn assign_one(&mut self, input: String, value: AssignValue) -> FlowspecResult<()> {
        if let Some(handle) = value.handle() {
            self.check_scope(handle)?;
        }

        let step = self.name.clone();
        let variable = self
            .inputs
            .iter_mut()
            .find(|v| v.name() == input)
            .ok_or_else(|| FlowspecError::UnknownInput {
                step: step.clone(),
                input: input.clone(),
            })?;
        variable.assign(value.clone())?;

        if !self.assigned.contains(&input) {
            self.assigned.push(input.clone());
        }

        self.origins.retain(|(name, _)| *name != input);
        if let Some(handle) = value.handle() {
            self.origins.push((input.clone(), handle.origin()));
            if let Some(producer) = handle.reference().step_name() {
                self.add_dependency(producer, handle.origin())?;
            }
        }

        debug!(step = %self.name, input = %input, "Bound step input");
        Ok(())
    }

    fn check_scope(&self, handle: &VariableHandle) -> FlowspecResult<()> {
        if let Some(own) = self.parent {
            if handle.origin().is_foreign_to(own) {
                let dependency = handle
                    .reference()
                    .step_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| handle.fullname());
                return Err(FlowspecError::DependencyScope {
                    step: self.name.clone(),
                    dependency,
                });
            }
        }
        Ok(())
    }

    fn add_dependency(&mut self, name: &str, origin: Origin) -> FlowspecResult<()> {
        if name == self.name {
            return Err(FlowspecError::CycleDetected {
                steps: vec![self.name.clone()],
            });
        }
        let foreign = || FlowspecError::DependencyScope {
            step: self.name.clone(),
            dependency: name.to_string(),
        };
        if self.parent.is_some_and(|own| origin.is_foreign_to(own)) {
            return Err(foreign());
        }

        match self.dependencies.iter().position(|d| d.name == name) {
            Some(index) => {
                let existing = self.dependencies[index].origin;
                let clash = matches!((existing.scope, origin.scope), (Some(a), Some(b)) if a != b)
                    || matches!((existing.step, origin.step), (Some(a), Some(b)) if a != b);
                if clash {
                    return Err(foreign());
                }
                let merged = &mut self.dependencies[index].origin;
                merged.scope = merged.scope.or(origin.scope);
                merged.step = merged.step.or(origin.step);
            }
            None => self.dependencies.push(StepDependency {
                name: name.to_string(),
                origin,
            }),
        }
        Ok(())
    }

    /// Order this step after `steps`; only legal before insertion
    pub fn after(&mut self, steps: &[&Step]) -> FlowspecResult<()> {
        if self.parent.is_some() {
            return Err(FlowspecError::StepAlreadyAttached {
                step: self.name.clone(),
            });
        }
        let mut candidate = self.clone();
        for step in steps {
            candidate.add_dependency(&step.name, Origin::step(step.parent, step.id))?;
        }
        *self = candidate;
        Ok(())
    }

    /// Depend on a step by name, as read from a manifest
    pub(crate) fn depend_on_name(&mut self, name: &str, origin: Origin) -> FlowspecResult<()> {
        self.add_dependency(name, origin)
    }

    /// Replace the execution modifier, adding the dependencies it implies
    pub fn set_modifier(&mut self, modifier: ExecutionModifier) -> FlowspecResult<()> {
        if self.parent.is_some() {
            return Err(FlowspecError::StepAlreadyAttached {
                step: self.name.clone(),
            });
        }
        let producers: Vec<(String, Origin)> = modifier
            .depends_steps()
            .into_iter()
            .map(|(name, origin)| (name.to_string(), origin))
            .collect();

        let mut candidate = self.clone();
        for (name, origin) in &producers {
            candidate.add_dependency(name, *origin)?;
        }
        candidate.modifier = modifier;
        *self = candidate;
        Ok(())
    }

    /// Fix the fan-out of a repeated artifact
    pub fn set_artifact_count(&mut self, name: &str, count: usize) -> FlowspecResult<&mut Self> {
        let variable = self
            .outputs
            .iter_mut()
            .chain(self.inputs.iter_mut())
            .find(|v| v.name() == name && v.category() == VariableCategory::Artifacts)
            .ok_or_else(|| FlowspecError::UnknownVariable {
                owner: self.name.clone(),
                name: name.to_string(),
            })?;
        variable.set_count(count)?;
        Ok(self)
    }

    pub(crate) fn mark_assigned(&mut self, name: &str) {
        if !self.assigned.iter().any(|n| n == name) {
            self.assigned.push(name.to_string());
        }
    }

    pub(crate) fn input_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.inputs.iter_mut().find(|v| v.name() == name)
    }

    pub(crate) fn output_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.outputs.iter_mut().find(|v| v.name() == name)
    }

    pub(crate) fn push_output(&mut self, variable: Variable) {
        self.outputs.push(variable);
    }

    pub(crate) fn replace_modifier(&mut self, modifier: ExecutionModifier) {
        self.modifier = modifier;
    }

    /// Serialized form placed in the pipeline manifest
    pub fn to_manifest(&self) -> StepManifest {
        let assigned: Vec<&Variable> = self.assigned_inputs().collect();
        let arguments_of = |category: VariableCategory| -> Vec<Argument> {
            assigned
                .iter()
                .filter(|v| v.category() == category)
                .filter_map(|v| v.to_argument())
                .collect()
        };

        let mut artifacts = arguments_of(VariableCategory::Artifacts);
        let unassigned_inputs = self
            .inputs
            .iter()
            .filter(|v| !self.assigned.iter().any(|n| n == v.name()));
        for variable in unassigned_inputs.chain(self.outputs.iter()) {
            if let Some(count) = variable.count() {
                artifacts.push(Argument::with_value(
                    variable.name(),
                    Value::Array(vec![Value::Null; count]),
                ));
            }
        }

        let mut spec = StepSpec {
            arguments: Arguments {
                parameters: arguments_of(VariableCategory::Parameters),
                artifacts,
            },
            dependencies: self.dependencies.iter().map(|d| d.name.clone()).collect(),
            ..StepSpec::default()
        };

        match &self.modifier {
            ExecutionModifier::None => {}
            ExecutionModifier::Condition(condition) => spec.when = Some(condition.to_expr()),
            ExecutionModifier::Loop { items, parallelism } => {
                match items {
                    LoopItems::Sequence { start, end } => {
                        spec.with_sequence = Some(SequenceSpec {
                            start: *start,
                            end: *end,
                        })
                    }
                    LoopItems::Items(values) => spec.with_items = Some(values.clone()),
                    LoopItems::Param { reference, .. } => {
                        spec.with_param = Some(reference.enclosed())
                    }
                }
                spec.parallelism = Some(*parallelism);
            }
        }

        StepManifest {
            metadata: StepMetadata::new(&self.name, &self.operator),
            spec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::operator::VariableDecl;
    use crate::pipeline::types::{ArtifactType, LocationType, ParameterType};
    use serde_json::json;

    fn op() -> OperatorDefinition {
        OperatorDefinition::local("op")
            .input(VariableDecl::any_parameter("x"))
            .input(VariableDecl::parameter("n", ParameterType::Int))
            .output(VariableDecl::any_parameter("out"))
            .output(
                VariableDecl::artifact("parts", ArtifactType::dataset(LocationType::Oss))
                    .repeated(),
            )
    }

    #[test]
    fn test_step_name_rules() {
        assert!(matches!(
            Step::new("", &op()),
            Err(FlowspecError::InvalidStepName { .. })
        ));
        assert!(Step::new("a".repeat(31), &op()).is_err());
        assert!(Step::new("a".repeat(30), &op()).is_ok());
        assert!(Step::new("has.dot", &op()).is_err());
        assert!(Step::new("two words", &op()).is_err());
        assert!(Step::new("shard[0]", &op()).is_ok());
        assert!(Step::new("train-v2_final", &op()).is_ok());
    }

    #[test]
    fn test_binding_output_adds_dependency() {
        let a = Step::new("a", &op()).unwrap();
        let mut b = Step::new("b", &op()).unwrap();
        b.assign_inputs([("x", a.output("out").unwrap())]).unwrap();
        assert_eq!(b.dependency_names(), vec!["a"]);

        let mut c = Step::new("c", &op()).unwrap();
        c.after(&[&a]).unwrap();
        assert_eq!(c.dependency_names(), b.dependency_names());
    }

    #[test]
    fn test_unknown_input_leaves_step_unchanged() {
        let mut step = Step::new("s", &op()).unwrap();
        let result = step.assign_inputs([
            ("x", AssignValue::from("ok")),
            ("missing", AssignValue::from(1i64)),
        ]);
        assert!(matches!(result, Err(FlowspecError::UnknownInput { .. })));
        assert!(!step.input("x").unwrap().is_bound());
        assert_eq!(step.assigned_inputs().count(), 0);
    }

    #[test]
    fn test_reassign_is_idempotent() {
        let mut step = Step::new("s", &op()).unwrap();
        step.assign_inputs([("n", 1i64)]).unwrap();
        step.assign_inputs([("n", 2i64)]).unwrap();
        assert_eq!(step.assigned_inputs().count(), 1);
        assert_eq!(step.input("n").unwrap().default_value(), Some(&json!(2)));
    }

    #[test]
    fn test_self_binding_is_a_cycle() {
        let mut step = Step::new("s", &op()).unwrap();
        let own = step.output("out").unwrap();
        assert!(matches!(
            step.assign_inputs([("x", own)]),
            Err(FlowspecError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_after_rejected_once_attached() {
        let a = Step::new("a", &op()).unwrap();
        let mut b = Step::new("b", &op()).unwrap();
        b.attach(ScopeId::next());
        assert!(matches!(
            b.after(&[&a]),
            Err(FlowspecError::StepAlreadyAttached { .. })
        ));
    }

    #[test]
    fn test_condition_step_depends_on_condition_source() {
        let a = Step::new("stepA", &op()).unwrap();
        let cond = Step::condition("gate", &op(), a.output("out").unwrap().eq("true")).unwrap();
        assert_eq!(cond.dependency_names(), vec!["stepA"]);

        let manifest = cond.to_manifest();
        assert_eq!(
            manifest.spec.when.as_deref(),
            Some("{{pipelines.stepA.outputs.parameters.out}} == true")
        );
    }

    #[test]
    fn test_loop_manifest_shapes() {
        let seq = Step::for_each("seq", &op(), 0i64..10, None).unwrap().to_manifest();
        assert_eq!(seq.spec.with_sequence, Some(SequenceSpec { start: 0, end: 10 }));
        assert_eq!(seq.spec.parallelism, Some(5));

        let items = Step::for_each("items", &op(), vec![json!({"a": 1}), json!({"a": 2})], Some(2))
            .unwrap()
            .to_manifest();
        assert_eq!(items.spec.with_items.map(|v| v.len()), Some(2));

        let producer = Step::new("gen", &op()).unwrap();
        let items = LoopItems::param(&producer.output("out").unwrap()).unwrap();
        let param = Step::for_each("each", &op(), items, None).unwrap();
        assert_eq!(param.dependency_names(), vec!["gen"]);
        assert_eq!(
            param.to_manifest().spec.with_param.as_deref(),
            Some("{{pipelines.gen.outputs.parameters.out}}")
        );
    }

    #[test]
    fn test_artifact_count_placeholders() {
        let mut step = Step::new("split", &op()).unwrap();
        assert!(matches!(
            step.set_artifact_count("out", 2),
            Err(FlowspecError::UnknownVariable { .. })
        ));
        step.set_artifact_count("parts", 3).unwrap();

        let manifest = step.to_manifest();
        let placeholder = &manifest.spec.arguments.artifacts[0];
        assert_eq!(placeholder.name, "parts");
        assert_eq!(placeholder.value, Some(json!([null, null, null])));
    }

    #[test]
    fn test_manifest_lists_only_assigned_inputs() {
        let mut step = Step::new("s", &op()).unwrap();
        step.assign_inputs([("n", 3i64)]).unwrap();
        let manifest = step.to_manifest();
        assert_eq!(manifest.spec.arguments.parameters.len(), 1);
        assert_eq!(manifest.spec.arguments.parameters[0].name, "n");
        assert!(manifest.spec.dependencies.is_empty());
    }
}
