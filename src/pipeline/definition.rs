// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Pipeline container
//!
//! A pipeline owns its steps and its boundary variables. Every mutation that
//! can add a dependency edge is checked against a candidate graph first and
//! committed only when the graph stays acyclic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::manifest::{Manifest, PipelineMetadata};
use crate::pipeline::operator::VariableDecl;
use crate::pipeline::variable::{
    AssignValue, IoDirection, Origin, Owner, ScopeId, Variable, VariableHandle, VariableKind,
};
use crate::pipeline::{PipelineValidator, Step, StepGraph, ValidationResult};

/// API version written to new manifests
pub const DEFAULT_API_VERSION: &str = "core/v1";

/// Input bindings applied to every step inserted into a pipeline
///
/// Only inputs the operator declares and the step has not bound itself are
/// touched; a default the input rejects is skipped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepDefaults(BTreeMap<String, Value>);

impl StepDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, input: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(input, value);
        self
    }

    pub fn insert(&mut self, input: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(input.into(), value.into());
    }

    pub fn get(&self, input: &str) -> Option<&Value> {
        self.0.get(input)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of `step` with the defaults bound
    pub fn apply(&self, step: &Step) -> Step {
        let mut result = step.clone();
        for (input, value) in &self.0 {
            if step.input(input).is_none() || step.assigned_inputs().any(|v| v.name() == input) {
                continue;
            }
            if let Err(e) = result.assign_inputs([(input.as_str(), value.clone())]) {
                warn!(step = %step.name(), input = %input, error = %e, "Skipping step default");
            }
        }
        result
    }
}

impl From<BTreeMap<String, Value>> for StepDefaults {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// A named, versioned DAG of steps
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub(crate) metadata: PipelineMetadata,
    pub(crate) api_version: String,
    pub(crate) scope: ScopeId,
    pub(crate) inputs: Vec<Variable>,
    pub(crate) outputs: Vec<Variable>,
    pub(crate) steps: Vec<Step>,
    pub(crate) execution: Option<Value>,
    pub(crate) defaults: StepDefaults,
}

/// Builder for an empty pipeline
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    identifier: String,
    version: String,
    provider: Option<String>,
    api_version: String,
    defaults: StepDefaults,
}

impl PipelineBuilder {
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn step_defaults(mut self, defaults: StepDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            metadata: PipelineMetadata {
                identifier: self.identifier,
                provider: self.provider,
                version: self.version,
            },
            api_version: self.api_version,
            scope: ScopeId::next(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            steps: Vec::new(),
            execution: None,
            defaults: self.defaults,
        }
    }
}

impl Pipeline {
    pub fn builder(identifier: impl Into<String>, version: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            identifier: identifier.into(),
            version: version.into(),
            provider: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            defaults: StepDefaults::default(),
        }
    }

    pub fn metadata(&self) -> &PipelineMetadata {
        &self.metadata
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    /// Steps in insertion order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name() == name)
    }

    pub fn execution(&self) -> Option<&Value> {
        self.execution.as_ref()
    }

    pub fn step_defaults(&self) -> &StepDefaults {
        &self.defaults
    }

    fn scope_label(&self) -> String {
        format!("pipeline '{}'", self.metadata.identifier)
    }

    /// Declare a pipeline input
    pub fn add_input(&mut self, decl: VariableDecl) -> FlowspecResult<VariableHandle> {
        if self.inputs.iter().any(|v| v.name() == decl.name) {
            return Err(FlowspecError::NameConflict {
                scope: format!("{} inputs", self.scope_label()),
                name: decl.name,
            });
        }
        let variable = decl.instantiate(Owner::Pipeline, IoDirection::Inputs)?;
        let handle = variable.handle(Origin::pipeline(self.scope));
        debug!(pipeline = %self.metadata.identifier, input = %variable.name(), "Declared pipeline input");
        self.inputs.push(variable);
        Ok(handle)
    }

    /// Handle to a pipeline input
    pub fn input(&self, name: &str) -> FlowspecResult<VariableHandle> {
        self.inputs
            .iter()
            .find(|v| v.name() == name)
            .map(|v| v.handle(Origin::pipeline(self.scope)))
            .ok_or_else(|| FlowspecError::UnknownVariable {
                owner: Owner::Pipeline.to_string(),
                name: name.to_string(),
            })
    }

    /// Handle to an output of one of this pipeline's steps
    pub fn output_of(&self, step: &str, output: &str) -> FlowspecResult<VariableHandle> {
        self.step(step)
            .ok_or_else(|| FlowspecError::UnknownStep {
                step: step.to_string(),
            })?
            .output(output)
    }

    /// Expose a step output as a pipeline output, copying its type
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        source: &VariableHandle,
        description: Option<&str>,
    ) -> FlowspecResult<()> {
        let name = name.into();
        if self.outputs.iter().any(|v| v.name() == name) {
            return Err(FlowspecError::NameConflict {
                scope: format!("{} outputs", self.scope_label()),
                name,
            });
        }

        let reference = source.reference();
        let producer = match (reference.step_name(), reference.direction) {
            (Some(step), IoDirection::Outputs) => step,
            _ => {
                return Err(FlowspecError::invalid_assignment(
                    format!("outputs.{}", name),
                    source.fullname(),
                    "pipeline outputs must come from a step output",
                ))
            }
        };
        let foreign = || FlowspecError::DependencyScope {
            step: self.scope_label(),
            dependency: producer.to_string(),
        };
        if source.origin().is_foreign_to(self.scope) {
            return Err(foreign());
        }

        let producing_step = self.step(producer);
        if let (Some(step), Some(id)) = (producing_step, source.origin().step) {
            if step.id() != id {
                return Err(foreign());
            }
        }
        let produced = producing_step
            .and_then(|s| s.output_variable(&reference.name))
            .ok_or_else(|| FlowspecError::UnknownVariable {
                owner: producer.to_string(),
                name: reference.name.clone(),
            })?;

        let kind = match (produced.kind(), reference.index) {
            (VariableKind::Artifact { typ, .. }, Some(_)) => VariableKind::Artifact {
                typ: typ.clone(),
                repeated: false,
            },
            (kind, _) => kind.clone(),
        };

        let mut variable = Variable::new(&name, IoDirection::Outputs, Owner::Pipeline, kind)
            .with_description(description.map(str::to_string));
        variable.assign(AssignValue::Reference(source.clone()))?;

        debug!(pipeline = %self.metadata.identifier, output = %name, source = %source.fullname(), "Declared pipeline output");
        self.outputs.push(variable);
        Ok(())
    }

    /// Mark this pipeline as an atomic leaf with an opaque execution block
    pub fn set_execution(&mut self, execution: Value) -> FlowspecResult<()> {
        if !self.steps.is_empty() {
            return Err(FlowspecError::schema(format!(
                "{} has steps and cannot take an execution block",
                self.scope_label()
            )));
        }
        self.execution = Some(execution);
        Ok(())
    }

    /// Pipeline inputs a step reads, through bindings or its modifier
    fn check_pipeline_inputs(&self, step: &Step) -> FlowspecResult<()> {
        for (reference, origin) in step.bound_references() {
            if reference.owner != Owner::Pipeline || reference.direction != IoDirection::Inputs {
                continue;
            }
            if !self.inputs.iter().any(|v| v.name() == reference.name) {
                return Err(FlowspecError::UnknownVariable {
                    owner: Owner::Pipeline.to_string(),
                    name: reference.name.clone(),
                });
            }
            if origin.is_foreign_to(self.scope) {
                return Err(FlowspecError::DependencyScope {
                    step: step.name().to_string(),
                    dependency: reference.fullname(),
                });
            }
        }
        Ok(())
    }

    /// Dependencies must be this pipeline's own steps, by instance when known
    fn check_dependencies(&self, step: &Step) -> FlowspecResult<()> {
        for dependency in step.dependencies() {
            let foreign = || FlowspecError::DependencyScope {
                step: step.name().to_string(),
                dependency: dependency.name.clone(),
            };
            if dependency.origin.is_foreign_to(self.scope) {
                return Err(foreign());
            }
            let attached = self
                .step(&dependency.name)
                .ok_or_else(|| FlowspecError::UnknownStep {
                    step: dependency.name.clone(),
                })?;
            if dependency.origin.step.is_some_and(|id| id != attached.id()) {
                return Err(foreign());
            }
        }
        Ok(())
    }

    /// Cycle check over the current steps with `candidate` swapped in or appended
    fn check_candidate(&self, candidate: &Step) -> FlowspecResult<()> {
        let mut entries: Vec<(&str, Vec<&str>)> = self
            .steps
            .iter()
            .map(|s| {
                let step = if s.name() == candidate.name() { candidate } else { s };
                (step.name(), step.dependency_names())
            })
            .collect();
        if self.step(candidate.name()).is_none() {
            entries.push((candidate.name(), candidate.dependency_names()));
        }
        let graph = StepGraph::from_dependencies(entries)?;

        if let Some(steps) = graph.detect_cycle() {
            warn!(
                pipeline = %self.metadata.identifier,
                step = %candidate.name(),
                untraveled = ?steps,
                "Rejected wiring: cycle detected"
            );
            return Err(FlowspecError::CycleDetected { steps });
        }
        Ok(())
    }

    /// Insert a step; its dependencies must already be in the pipeline
    pub fn add_step(&mut self, step: Step) -> FlowspecResult<()> {
        if step.parent().is_some() {
            return Err(FlowspecError::StepAlreadyAttached {
                step: step.name().to_string(),
            });
        }
        if self.execution.is_some() {
            return Err(FlowspecError::schema(format!(
                "{} has an execution block and cannot hold steps",
                self.scope_label()
            )));
        }
        if self.step(step.name()).is_some() {
            return Err(FlowspecError::NameConflict {
                scope: self.scope_label(),
                name: step.name().to_string(),
            });
        }
        self.check_dependencies(&step)?;
        self.check_pipeline_inputs(&step)?;

        let mut step = self.defaults.apply(&step);
        self.check_candidate(&step)?;
        step.attach(self.scope);

        debug!(
            pipeline = %self.metadata.identifier,
            step = %step.name(),
            operator = %step.operator(),
            dependencies = ?step.dependency_names(),
            "Added step"
        );
        self.steps.push(step);
        Ok(())
    }

    /// Insert a batch of steps in any order; nothing is inserted on failure
    pub fn add_steps(&mut self, steps: impl IntoIterator<Item = Step>) -> FlowspecResult<()> {
        let mut candidate = self.clone();
        let mut pending: Vec<Step> = steps.into_iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();

            for step in pending {
                let ready = step
                    .dependency_names()
                    .iter()
                    .all(|d| candidate.step(d).is_some());
                if ready {
                    candidate.add_step(step)?;
                } else {
                    waiting.push(step);
                }
            }

            if waiting.len() == before {
                return Err(Self::stuck_batch(&candidate, &waiting));
            }
            pending = waiting;
        }

        *self = candidate;
        Ok(())
    }

    /// Why no step of a batch could be inserted
    fn stuck_batch(pipeline: &Pipeline, waiting: &[Step]) -> FlowspecError {
        for step in waiting {
            for dependency in step.dependency_names() {
                let known = pipeline.step(dependency).is_some()
                    || waiting.iter().any(|w| w.name() == dependency);
                if !known {
                    return FlowspecError::UnknownStep {
                        step: dependency.to_string(),
                    };
                }
            }
        }

        let entries = waiting.iter().map(|s| {
            let local: Vec<&str> = s
                .dependency_names()
                .into_iter()
                .filter(|d| waiting.iter().any(|w| w.name() == *d))
                .collect();
            (s.name(), local)
        });
        match StepGraph::from_dependencies(entries) {
            Ok(graph) => FlowspecError::CycleDetected {
                steps: graph
                    .detect_cycle()
                    .unwrap_or_else(|| waiting.iter().map(|s| s.name().to_string()).collect()),
            },
            Err(e) => e,
        }
    }

    /// Bind inputs of an inserted step; the pipeline is unchanged on failure
    pub fn assign_inputs<I, K, V>(&mut self, step: &str, bindings: I) -> FlowspecResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AssignValue>,
    {
        let index = self
            .steps
            .iter()
            .position(|s| s.name() == step)
            .ok_or_else(|| FlowspecError::UnknownStep {
                step: step.to_string(),
            })?;

        let mut candidate = self.steps[index].clone();
        candidate.assign_inputs(bindings)?;
        self.check_dependencies(&candidate)?;
        self.check_pipeline_inputs(&candidate)?;
        self.check_candidate(&candidate)?;

        debug!(
            pipeline = %self.metadata.identifier,
            step = %step,
            dependencies = ?candidate.dependency_names(),
            "Committed step wiring"
        );
        self.steps[index] = candidate;
        Ok(())
    }

    /// Dependency graph of the current steps
    pub fn graph(&self) -> FlowspecResult<StepGraph> {
        StepGraph::build(&self.steps)
    }

    pub fn has_cycle(&self) -> bool {
        self.graph().map(|g| g.has_cycle()).unwrap_or(false)
    }

    /// Full-graph validation
    pub fn validate(&self) -> ValidationResult {
        PipelineValidator::validate(self)
    }

    /// Validate, then produce the manifest
    pub fn export(&self) -> FlowspecResult<Manifest> {
        let result = self.validate();
        for warning in &result.warnings {
            warn!(pipeline = %self.metadata.identifier, "{}", warning);
        }
        if let Some(error) = result.errors.into_iter().next() {
            return Err(error);
        }
        Ok(self.to_manifest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::operator::OperatorDefinition;
    use crate::pipeline::types::ParameterType;
    use serde_json::json;

    fn op() -> OperatorDefinition {
        OperatorDefinition::local("op")
            .input(VariableDecl::any_parameter("x"))
            .input(VariableDecl::parameter("threads", ParameterType::Int))
            .output(VariableDecl::any_parameter("out"))
    }

    fn abc() -> Pipeline {
        let mut pipeline = Pipeline::builder("abc", "v1").build();
        pipeline.add_step(Step::new("A", &op()).unwrap()).unwrap();
        pipeline.add_step(Step::new("B", &op()).unwrap()).unwrap();
        pipeline.add_step(Step::new("C", &op()).unwrap()).unwrap();
        let a_out = pipeline.output_of("A", "out").unwrap();
        pipeline.assign_inputs("B", [("x", a_out)]).unwrap();
        let b_out = pipeline.output_of("B", "out").unwrap();
        pipeline.assign_inputs("C", [("x", b_out)]).unwrap();
        pipeline
    }

    #[test]
    fn test_chain_is_acyclic() {
        let pipeline = abc();
        assert!(!pipeline.has_cycle());
        assert_eq!(pipeline.step("B").unwrap().dependency_names(), vec!["A"]);
        assert_eq!(pipeline.step("C").unwrap().dependency_names(), vec!["B"]);
    }

    #[test]
    fn test_cycle_rejected_and_rolled_back() {
        let mut pipeline = abc();
        let before = pipeline.to_manifest();
        let c_out = pipeline.output_of("C", "out").unwrap();

        match pipeline.assign_inputs("A", [("x", c_out)]) {
            Err(FlowspecError::CycleDetected { steps }) => {
                assert_eq!(steps, vec!["A", "B", "C"]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
        assert!(!pipeline.has_cycle());
        assert!(pipeline.step("A").unwrap().dependencies().is_empty());
        assert_eq!(pipeline.to_manifest(), before);
    }

    #[test]
    fn test_duplicate_step_name() {
        let mut pipeline = abc();
        let result = pipeline.add_step(Step::new("B", &op()).unwrap());
        assert!(matches!(result, Err(FlowspecError::NameConflict { .. })));
        assert_eq!(pipeline.steps().len(), 3);
    }

    #[test]
    fn test_cross_pipeline_dependency_rejected() {
        let other = abc();
        let mut pipeline = Pipeline::builder("other", "v1").build();
        let mut step = Step::new("D", &op()).unwrap();
        step.assign_inputs([("x", other.output_of("C", "out").unwrap())])
            .unwrap();
        assert!(matches!(
            pipeline.add_step(step),
            Err(FlowspecError::DependencyScope { .. })
        ));

        let mut inserted = abc();
        let foreign = other.output_of("A", "out").unwrap();
        assert!(matches!(
            inserted.assign_inputs("C", [("x", foreign)]),
            Err(FlowspecError::DependencyScope { .. })
        ));
    }

    fn with_seed(identifier: &str) -> Pipeline {
        let mut pipeline = Pipeline::builder(identifier, "v1").build();
        pipeline.add_input(VariableDecl::any_parameter("seed")).unwrap();
        pipeline
    }

    #[test]
    fn test_same_named_input_of_other_pipeline_rejected() {
        let p = with_seed("p");
        let mut q = with_seed("q");

        let mut step = Step::new("s", &op()).unwrap();
        step.assign_inputs([("x", p.input("seed").unwrap())]).unwrap();
        assert!(matches!(
            q.add_step(step.clone()),
            Err(FlowspecError::DependencyScope { .. })
        ));
        assert!(q.steps().is_empty());

        let gate = p.input("seed").unwrap().eq("go");
        let guarded = Step::condition("g", &op(), gate).unwrap();
        assert!(matches!(
            q.add_step(guarded),
            Err(FlowspecError::DependencyScope { .. })
        ));

        let mut own = Step::new("s", &op()).unwrap();
        own.assign_inputs([("x", q.input("seed").unwrap())]).unwrap();
        q.add_step(own).unwrap();

        let mut p = p;
        p.add_step(step).unwrap();
    }

    #[test]
    fn test_rebinding_to_literal_clears_foreign_input() {
        let p = with_seed("p");
        let mut q = with_seed("q");

        let mut step = Step::new("s", &op()).unwrap();
        step.assign_inputs([("x", p.input("seed").unwrap())]).unwrap();
        step.assign_inputs([("x", "plain")]).unwrap();
        q.add_step(step).unwrap();
    }

    #[test]
    fn test_dependency_bound_to_step_instance() {
        let a = Step::new("a", &op()).unwrap();
        let mut b = Step::new("b", &op()).unwrap();
        b.assign_inputs([("x", a.output("out").unwrap())]).unwrap();

        let mut p = Pipeline::builder("p", "v1").build();
        p.add_step(a).unwrap();

        let mut q = Pipeline::builder("q", "v1").build();
        q.add_step(Step::new("a", &op()).unwrap()).unwrap();
        assert!(matches!(
            q.add_step(b.clone()),
            Err(FlowspecError::DependencyScope { .. })
        ));
        assert_eq!(q.steps().len(), 1);

        p.add_step(b).unwrap();
        assert_eq!(p.step("b").unwrap().dependency_names(), vec!["a"]);
    }

    #[test]
    fn test_after_bound_to_step_instance() {
        let a = Step::new("a", &op()).unwrap();
        let mut b = Step::new("b", &op()).unwrap();
        b.after(&[&a]).unwrap();

        let mut q = Pipeline::builder("q", "v1").build();
        let result = q.add_steps(vec![Step::new("a", &op()).unwrap(), b]);
        assert!(matches!(result, Err(FlowspecError::DependencyScope { .. })));
        assert!(q.steps().is_empty());
    }

    #[test]
    fn test_pipeline_output_from_other_instance_rejected() {
        let stray = Step::new("eval", &op()).unwrap();
        let mut pipeline = Pipeline::builder("o", "v1").build();
        pipeline.add_step(Step::new("eval", &op()).unwrap()).unwrap();
        assert!(matches!(
            pipeline.add_output("out", &stray.output("out").unwrap(), None),
            Err(FlowspecError::DependencyScope { .. })
        ));
    }

    #[test]
    fn test_inserted_step_cannot_be_reordered() {
        let pipeline = abc();
        let mut copy = pipeline.step("B").unwrap().clone();
        let a = pipeline.step("A").unwrap();
        assert!(matches!(
            copy.after(&[a]),
            Err(FlowspecError::StepAlreadyAttached { .. })
        ));

        let mut target = Pipeline::builder("t", "v1").build();
        assert!(matches!(
            target.add_step(copy),
            Err(FlowspecError::StepAlreadyAttached { .. })
        ));
    }

    #[test]
    fn test_add_steps_any_order() {
        let first = Step::new("first", &op()).unwrap();
        let mut second = Step::new("second", &op()).unwrap();
        second.after(&[&first]).unwrap();

        let mut pipeline = Pipeline::builder("batch", "v1").build();
        pipeline.add_steps(vec![second, first]).unwrap();
        let order = pipeline.graph().unwrap().topological_order().unwrap();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn test_add_steps_all_or_nothing() {
        let first = Step::new("first", &op()).unwrap();
        let mut orphan = Step::new("orphan", &op()).unwrap();
        let ghost = Step::new("ghost", &op()).unwrap();
        orphan.after(&[&ghost]).unwrap();

        let mut pipeline = Pipeline::builder("batch", "v1").build();
        let result = pipeline.add_steps(vec![first, orphan]);
        assert!(matches!(result, Err(FlowspecError::UnknownStep { .. })));
        assert!(pipeline.steps().is_empty());
    }

    #[test]
    fn test_step_defaults_fill_unbound_inputs() {
        let defaults = StepDefaults::new().with("threads", 4).with("missing", 1);
        let mut pipeline = Pipeline::builder("d", "v1").step_defaults(defaults).build();

        let mut own = Step::new("own", &op()).unwrap();
        own.assign_inputs([("threads", 8i64)]).unwrap();
        pipeline.add_step(own).unwrap();
        pipeline.add_step(Step::new("plain", &op()).unwrap()).unwrap();

        let threads = |name: &str| pipeline.step(name).unwrap().input("threads").unwrap().default_value().cloned();
        assert_eq!(threads("own"), Some(json!(8)));
        assert_eq!(threads("plain"), Some(json!(4)));
    }

    #[test]
    fn test_invalid_step_default_skipped() {
        let defaults = StepDefaults::new().with("threads", "many");
        let step = Step::new("s", &op()).unwrap();
        let applied = defaults.apply(&step);
        assert!(!applied.input("threads").unwrap().is_bound());
    }

    #[test]
    fn test_pipeline_output_copies_type() {
        let typed = OperatorDefinition::local("typed")
            .output(VariableDecl::parameter("score", ParameterType::Double));
        let mut pipeline = Pipeline::builder("o", "v1").build();
        pipeline.add_step(Step::new("eval", &typed).unwrap()).unwrap();
        let score = pipeline.output_of("eval", "score").unwrap();
        pipeline.add_output("score", &score, None).unwrap();

        assert!(matches!(
            pipeline.outputs()[0].kind(),
            VariableKind::Parameter {
                typ: Some(ParameterType::Double)
            }
        ));

        let input = pipeline
            .add_input(VariableDecl::parameter("p", ParameterType::String))
            .unwrap();
        assert!(matches!(
            pipeline.add_output("bad", &input, None),
            Err(FlowspecError::InvalidAssignment { .. })
        ));
    }

    #[test]
    fn test_execution_excludes_steps() {
        let mut leaf = Pipeline::builder("leaf", "v1").build();
        leaf.set_execution(json!({"image": "busybox"})).unwrap();
        assert!(matches!(
            leaf.add_step(Step::new("s", &op()).unwrap()),
            Err(FlowspecError::ManifestSchema { .. })
        ));
        assert!(abc().set_execution(json!({})).is_err());
    }

    #[test]
    fn test_unknown_pipeline_input_reference() {
        let other = {
            let mut p = Pipeline::builder("x", "v1").build();
            p.add_input(VariableDecl::any_parameter("seed")).unwrap();
            p
        };
        let mut step = Step::new("s", &op()).unwrap();
        step.assign_inputs([("x", other.input("seed").unwrap())])
            .unwrap();

        let mut pipeline = Pipeline::builder("y", "v1").build();
        assert!(matches!(
            pipeline.add_step(step),
            Err(FlowspecError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_export_requires_required_inputs() {
        let strict = OperatorDefinition::local("strict")
            .input(VariableDecl::any_parameter("must").required());
        let mut pipeline = Pipeline::builder("r", "v1").build();
        pipeline.add_step(Step::new("s", &strict).unwrap()).unwrap();
        assert!(matches!(
            pipeline.export(),
            Err(FlowspecError::MissingRequiredInput { .. })
        ));
        pipeline.assign_inputs("s", [("must", "yes")]).unwrap();
        assert!(pipeline.export().is_ok());
    }
}
