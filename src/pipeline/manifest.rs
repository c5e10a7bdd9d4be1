// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Manifest documents
//!
//! The declarative form of a pipeline handed to the execution service, and
//! the loader that rebuilds a pipeline from it. Field names here are the
//! service's contract and must not change.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::modifier::{Condition, ExecutionModifier, LoopItems, DEFAULT_PARALLELISM};
use crate::pipeline::operator::{
    instantiate_all, OperatorCatalog, OperatorRef, VariableDecl, DEFAULT_VERSION,
};
use crate::pipeline::types::{ArtifactType, ParameterType, ParameterValidator};
use crate::pipeline::variable::{
    Binding, IoDirection, Origin, Owner, ScopeId, Source, Variable, VariableCategory, VariableKind,
    VariableRef,
};
use crate::pipeline::{Pipeline, Step, StepGraph};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Top-level pipeline manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub metadata: PipelineMetadata,
    pub spec: PipelineSpec,
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> FlowspecResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn from_json(json: &str) -> FlowspecResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    pub fn to_yaml(&self) -> FlowspecResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    pub fn to_json(&self) -> FlowspecResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Read a manifest file; JSON files parse as YAML too
    pub fn from_file(path: &Path) -> FlowspecResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FlowspecError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }
}

/// Key of a published pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl PipelineMetadata {
    /// `provider/identifier@version`
    pub fn key(&self) -> String {
        format!(
            "{}/{}@{}",
            self.provider.as_deref().unwrap_or("-"),
            self.identifier,
            self.version
        )
    }
}

/// Body of a pipeline manifest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default, skip_serializing_if = "IoSpec::is_empty")]
    pub inputs: IoSpec,
    #[serde(default, skip_serializing_if = "IoSpec::is_empty")]
    pub outputs: IoSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines: Option<Vec<StepManifest>>,
}

/// Variable declarations grouped by category
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IoSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<ParameterType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feasible: Option<ParameterValidator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ArtifactType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub repeated: bool,
}

impl IoSpec {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.artifacts.is_empty()
    }

    /// Group declarations by category, keeping their relative order
    pub fn from_decls(decls: &[VariableDecl]) -> Self {
        let mut spec = Self::default();
        for decl in decls {
            match &decl.kind {
                VariableKind::Parameter { typ } => spec.parameters.push(ParameterDecl {
                    name: decl.name.clone(),
                    typ: *typ,
                    value: decl.default.clone(),
                    from: None,
                    description: decl.description.clone(),
                    required: decl.required,
                    feasible: decl.validator.clone(),
                }),
                VariableKind::Artifact { typ, repeated } => spec.artifacts.push(ArtifactDecl {
                    name: decl.name.clone(),
                    metadata: typ.clone(),
                    value: decl.default.clone(),
                    from: None,
                    description: decl.description.clone(),
                    required: decl.required,
                    repeated: *repeated,
                }),
            }
        }
        spec
    }

    /// Declarations, parameters first
    pub fn to_decls(&self) -> Vec<VariableDecl> {
        let parameters = self.parameters.iter().map(|p| VariableDecl {
            name: p.name.clone(),
            kind: VariableKind::Parameter { typ: p.typ },
            description: p.description.clone(),
            required: p.required,
            default: p.value.clone(),
            validator: p.feasible.clone(),
        });
        let artifacts = self.artifacts.iter().map(|a| VariableDecl {
            name: a.name.clone(),
            kind: VariableKind::Artifact {
                typ: a.metadata.clone(),
                repeated: a.repeated,
            },
            description: a.description.clone(),
            required: a.required,
            default: a.value.clone(),
            validator: None,
        });
        parameters.chain(artifacts).collect()
    }

    /// Pipeline boundary variables as declarations with their bindings
    pub(crate) fn from_variables(variables: &[Variable]) -> Self {
        let mut spec = Self::default();
        for variable in variables {
            let from = variable.source().map(Source::to_reference_string);
            let value = variable.default_value().cloned();
            let description = variable.description().map(str::to_string);

            match variable.kind() {
                VariableKind::Parameter { typ } => spec.parameters.push(ParameterDecl {
                    name: variable.name().to_string(),
                    typ: *typ,
                    value,
                    from,
                    description,
                    required: variable.required(),
                    feasible: variable.validator().cloned(),
                }),
                VariableKind::Artifact { typ, repeated } => spec.artifacts.push(ArtifactDecl {
                    name: variable.name().to_string(),
                    metadata: typ.clone(),
                    value,
                    from,
                    description,
                    required: variable.required(),
                    repeated: *repeated,
                }),
            }
        }
        spec
    }

    fn sources(&self) -> impl Iterator<Item = (&str, &str)> {
        let parameters = self
            .parameters
            .iter()
            .filter_map(|p| p.from.as_deref().map(|f| (p.name.as_str(), f)));
        let artifacts = self
            .artifacts
            .iter()
            .filter_map(|a| a.from.as_deref().map(|f| (a.name.as_str(), f)));
        parameters.chain(artifacts)
    }

    /// Rebuild boundary variables; `from` becomes an unchecked source
    fn load_variables(&self, direction: IoDirection) -> FlowspecResult<Vec<Variable>> {
        let mut variables = instantiate_all(&self.to_decls(), &Owner::Pipeline, direction)?;

        for (name, from) in self.sources() {
            if direction == IoDirection::Inputs {
                return Err(FlowspecError::schema(format!(
                    "pipeline input '{}' may not declare 'from'",
                    name
                )));
            }
            if let Some(variable) = variables.iter_mut().find(|v| v.name() == name) {
                variable.bind_raw(Binding::From(Source::parse(from)));
            }
        }
        Ok(variables)
    }
}

/// One step entry under `spec.pipelines`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepManifest {
    pub metadata: StepMetadata,
    pub spec: StepSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

impl StepMetadata {
    pub fn new(name: &str, operator: &OperatorRef) -> Self {
        let mut metadata = Self {
            name: name.to_string(),
            identifier: None,
            provider: None,
            version: None,
            guid: None,
        };
        match operator {
            OperatorRef::Registered {
                identifier,
                provider,
                version,
            } => {
                metadata.identifier = Some(identifier.clone());
                metadata.provider = Some(provider.clone());
                metadata.version = Some(version.clone());
            }
            OperatorRef::Unregistered { guid } => metadata.guid = Some(guid.clone()),
        }
        metadata
    }

    /// Operator reference named by the step metadata
    pub fn operator_ref(&self) -> FlowspecResult<OperatorRef> {
        match (&self.identifier, &self.guid) {
            (Some(_), Some(_)) => Err(FlowspecError::schema(format!(
                "step '{}' names both an identifier and a guid",
                self.name
            ))),
            (Some(identifier), None) => {
                let provider = self.provider.clone().ok_or_else(|| {
                    FlowspecError::schema(format!(
                        "step '{}' references operator '{}' without a provider",
                        self.name, identifier
                    ))
                })?;
                Ok(OperatorRef::registered(
                    identifier,
                    provider,
                    self.version.clone().unwrap_or_else(default_version),
                ))
            }
            (None, Some(guid)) => Ok(OperatorRef::Unregistered { guid: guid.clone() }),
            (None, None) => Err(FlowspecError::schema(format!(
                "step '{}' names neither an operator identifier nor a guid",
                self.name
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(default)]
    pub arguments: Arguments,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(rename = "withItems", default, skip_serializing_if = "Option::is_none")]
    pub with_items: Option<Vec<Value>>,
    #[serde(rename = "withSequence", default, skip_serializing_if = "Option::is_none")]
    pub with_sequence: Option<SequenceSpec>,
    #[serde(rename = "withParam", default, skip_serializing_if = "Option::is_none")]
    pub with_param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSpec {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub parameters: Vec<Argument>,
    #[serde(default)]
    pub artifacts: Vec<Argument>,
}

/// A bound input: a literal `value` or a `from` reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl Argument {
    pub fn with_value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn with_from(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            from: Some(reference.into()),
        }
    }

    /// Fan-out count, when this is a repeated-artifact placeholder
    fn placeholder_count(&self) -> Option<usize> {
        match (&self.value, &self.from) {
            (Some(Value::Array(items)), None)
                if !items.is_empty() && items.iter().all(Value::is_null) =>
            {
                Some(items.len())
            }
            _ => None,
        }
    }

    fn binding(&self, step: &str) -> FlowspecResult<Binding> {
        match (&self.value, &self.from) {
            (Some(value), None) => Ok(Binding::Value(value.clone())),
            (None, Some(from)) => Ok(Binding::From(Source::parse(from))),
            (Some(_), Some(_)) => Err(FlowspecError::schema(format!(
                "argument '{}' of step '{}' has both 'value' and 'from'",
                self.name, step
            ))),
            (None, None) => Err(FlowspecError::schema(format!(
                "argument '{}' of step '{}' has neither 'value' nor 'from'",
                self.name, step
            ))),
        }
    }
}

impl Pipeline {
    /// Manifest for the current state, without validation
    pub fn to_manifest(&self) -> Manifest {
        let pipelines = match self.execution {
            Some(_) => None,
            None => Some(self.steps.iter().map(Step::to_manifest).collect()),
        };

        Manifest {
            api_version: self.api_version.clone(),
            metadata: self.metadata.clone(),
            spec: PipelineSpec {
                inputs: IoSpec::from_variables(&self.inputs),
                outputs: IoSpec::from_variables(&self.outputs),
                execution: self.execution.clone(),
                pipelines,
            },
        }
    }

    pub fn to_yaml(&self) -> FlowspecResult<String> {
        self.to_manifest().to_yaml()
    }

    pub fn to_json(&self) -> FlowspecResult<String> {
        self.to_manifest().to_json()
    }

    pub fn from_yaml(yaml: &str) -> FlowspecResult<Self> {
        Self::from_manifest(Manifest::from_yaml(yaml)?)
    }

    /// Load pipeline from a manifest file
    pub fn from_file(path: &Path) -> FlowspecResult<Self> {
        Self::from_manifest(Manifest::from_file(path)?)
    }

    /// Hydrate without operator definitions; step variables are untyped
    pub fn from_manifest(manifest: Manifest) -> FlowspecResult<Self> {
        Self::from_manifest_with(manifest, &OperatorCatalog::new())
    }

    /// Hydrate, typing the steps whose operators the catalog knows
    pub fn from_manifest_with(manifest: Manifest, catalog: &OperatorCatalog) -> FlowspecResult<Self> {
        let Manifest {
            api_version,
            metadata,
            spec,
        } = manifest;

        if spec.execution.is_some() && spec.pipelines.is_some() {
            return Err(FlowspecError::schema(
                "both spec.execution and spec.pipelines are defined",
            ));
        }

        let mut pipeline = Pipeline::builder(metadata.identifier.clone(), metadata.version.clone())
            .api_version(api_version)
            .build();
        pipeline.metadata = metadata;
        pipeline.inputs = spec.inputs.load_variables(IoDirection::Inputs)?;
        pipeline.outputs = spec.outputs.load_variables(IoDirection::Outputs)?;

        let mut steps: Vec<Step> = Vec::new();
        let mut untyped = HashSet::new();
        for entry in spec.pipelines.unwrap_or_default() {
            if steps.iter().any(|s| s.name() == entry.metadata.name) {
                return Err(FlowspecError::NameConflict {
                    scope: format!("pipeline '{}'", pipeline.metadata.identifier),
                    name: entry.metadata.name,
                });
            }
            let (step, typed) = load_step(entry, catalog, pipeline.scope)?;
            if !typed {
                untyped.insert(step.name().to_string());
            }
            steps.push(step);
        }

        synthesize_outputs(&mut steps, &untyped, &pipeline.outputs);

        StepGraph::build(&steps)
            .map_err(|e| match e {
                FlowspecError::UnknownStep { step } => FlowspecError::schema(format!(
                    "dependency '{}' names no step in the pipeline",
                    step
                )),
                other => other,
            })?
            .ensure_acyclic()?;

        pipeline.steps = steps;
        pipeline.execution = spec.execution;

        debug!(
            pipeline = %pipeline.metadata.key(),
            steps = pipeline.steps.len(),
            "Loaded pipeline manifest"
        );
        Ok(pipeline)
    }
}

fn load_step(
    entry: StepManifest,
    catalog: &OperatorCatalog,
    scope: ScopeId,
) -> FlowspecResult<(Step, bool)> {
    let StepManifest { metadata, spec } = entry;
    let operator = metadata.operator_ref()?;
    let owner = Owner::Step(metadata.name.clone());

    let definition = catalog.get(&operator);
    let (inputs, outputs) = match definition {
        Some(def) => (
            instantiate_all(def.inputs(), &owner, IoDirection::Inputs)?,
            instantiate_all(def.outputs(), &owner, IoDirection::Outputs)?,
        ),
        None => untyped_variables(&owner, &spec.arguments)?,
    };

    let mut step = Step::from_parts(metadata.name, operator, inputs, outputs)?;
    step.attach(scope);
    bind_arguments(&mut step, &spec.arguments)?;

    for dependency in &spec.dependencies {
        step.depend_on_name(dependency, Origin::pipeline(scope))?;
    }
    let producers: Vec<String> = step
        .inputs()
        .iter()
        .filter_map(|v| v.source().and_then(Source::producer_step))
        .map(str::to_string)
        .collect();
    for producer in &producers {
        step.depend_on_name(producer, Origin::pipeline(scope))?;
    }

    let modifier = load_modifier(step.name(), &spec)?;
    let modifier_producers: Vec<String> = modifier
        .depends_steps()
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();
    for producer in &modifier_producers {
        step.depend_on_name(producer, Origin::pipeline(scope))?;
    }
    step.replace_modifier(modifier);

    Ok((step, definition.is_some()))
}

/// Inputs inferred from arguments, outputs from count placeholders
fn untyped_variables(
    owner: &Owner,
    arguments: &Arguments,
) -> FlowspecResult<(Vec<Variable>, Vec<Variable>)> {
    let mut inputs: Vec<Variable> = Vec::new();
    let mut outputs: Vec<Variable> = Vec::new();

    let entries = arguments
        .parameters
        .iter()
        .map(|a| (a, VariableCategory::Parameters))
        .chain(arguments.artifacts.iter().map(|a| (a, VariableCategory::Artifacts)));

    for (argument, category) in entries {
        if category == VariableCategory::Artifacts {
            if let Some(count) = argument.placeholder_count() {
                let mut output = Variable::new(
                    &argument.name,
                    IoDirection::Outputs,
                    owner.clone(),
                    VariableKind::Artifact {
                        typ: None,
                        repeated: true,
                    },
                );
                output.set_count(count)?;
                outputs.push(output);
                continue;
            }
        }

        if inputs.iter().any(|v| v.name() == argument.name) {
            return Err(FlowspecError::NameConflict {
                scope: format!("{} inputs", owner),
                name: argument.name.clone(),
            });
        }
        let kind = match category {
            VariableCategory::Parameters => VariableKind::Parameter { typ: None },
            VariableCategory::Artifacts => VariableKind::Artifact {
                typ: None,
                repeated: matches!(argument.value, Some(Value::Array(_))),
            },
        };
        inputs.push(Variable::new(&argument.name, IoDirection::Inputs, owner.clone(), kind));
    }

    Ok((inputs, outputs))
}

fn bind_arguments(step: &mut Step, arguments: &Arguments) -> FlowspecResult<()> {
    let step_name = step.name().to_string();
    let entries = arguments
        .parameters
        .iter()
        .map(|a| (a, VariableCategory::Parameters))
        .chain(arguments.artifacts.iter().map(|a| (a, VariableCategory::Artifacts)));

    for (argument, category) in entries {
        if category == VariableCategory::Artifacts {
            if let Some(count) = argument.placeholder_count() {
                // Inputs take precedence; an input default does not hide its count
                let target = match step.input_mut(&argument.name) {
                    Some(input) if input.is_repeated() && input.count().is_none() => Some(input),
                    _ => step.output_mut(&argument.name),
                };
                let target = target.ok_or_else(|| FlowspecError::UnknownVariable {
                    owner: step_name.clone(),
                    name: argument.name.clone(),
                })?;
                target.set_count(count)?;
                continue;
            }
        }

        let binding = argument.binding(&step_name)?;
        let input = step
            .input_mut(&argument.name)
            .ok_or_else(|| FlowspecError::UnknownInput {
                step: step_name.clone(),
                input: argument.name.clone(),
            })?;
        if input.category() != category {
            return Err(FlowspecError::schema(format!(
                "argument '{}' of step '{}' is listed under {} but declared as {}",
                argument.name,
                step_name,
                category.as_str(),
                input.category().as_str()
            )));
        }
        input.bind_raw(binding);
        step.mark_assigned(&argument.name);
    }
    Ok(())
}

fn load_modifier(step: &str, spec: &StepSpec) -> FlowspecResult<ExecutionModifier> {
    let loops = [
        spec.with_items.is_some(),
        spec.with_sequence.is_some(),
        spec.with_param.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();

    if loops > 1 {
        return Err(FlowspecError::schema(format!(
            "step '{}' declares more than one of withItems, withSequence, withParam",
            step
        )));
    }
    if loops == 1 && spec.when.is_some() {
        return Err(FlowspecError::schema(format!(
            "step '{}' declares both a condition and a loop",
            step
        )));
    }
    if loops == 0 && spec.parallelism.is_some() {
        return Err(FlowspecError::schema(format!(
            "step '{}' sets parallelism without a loop",
            step
        )));
    }

    if let Some(when) = &spec.when {
        return Ok(ExecutionModifier::Condition(Condition::parse(when)));
    }

    let items = if let Some(values) = &spec.with_items {
        LoopItems::Items(values.clone())
    } else if let Some(sequence) = &spec.with_sequence {
        LoopItems::Sequence {
            start: sequence.start,
            end: sequence.end,
        }
    } else if let Some(param) = &spec.with_param {
        let reference = VariableRef::parse(param).ok_or_else(|| {
            FlowspecError::schema(format!(
                "withParam of step '{}' is not a variable reference: {}",
                step, param
            ))
        })?;
        LoopItems::Param {
            reference,
            origin: Origin::default(),
        }
    } else {
        return Ok(ExecutionModifier::None);
    };

    ExecutionModifier::for_each(items, Some(spec.parallelism.unwrap_or(DEFAULT_PARALLELISM)))
}

/// Give untyped producers the outputs other variables read from them
fn synthesize_outputs(steps: &mut [Step], untyped: &HashSet<String>, pipeline_outputs: &[Variable]) {
    let mut references: Vec<VariableRef> = Vec::new();
    for step in steps.iter() {
        references.extend(
            step.inputs()
                .iter()
                .filter_map(|v| v.source().and_then(Source::variable))
                .cloned(),
        );
        references.extend(step.modifier().references().into_iter().map(|(r, _)| r.clone()));
    }
    references.extend(
        pipeline_outputs
            .iter()
            .filter_map(|v| v.source().and_then(Source::variable))
            .cloned(),
    );

    for reference in references {
        if reference.direction != IoDirection::Outputs {
            continue;
        }
        let Some(producer) = reference.step_name() else {
            continue;
        };
        if !untyped.contains(producer) {
            continue;
        }
        let Some(step) = steps.iter_mut().find(|s| s.name() == producer) else {
            continue;
        };
        if step.output_variable(&reference.name).is_some() {
            continue;
        }

        let kind = match reference.category {
            VariableCategory::Parameters => VariableKind::Parameter { typ: None },
            VariableCategory::Artifacts => VariableKind::Artifact {
                typ: None,
                repeated: reference.index.is_some(),
            },
        };
        step.push_output(Variable::new(
            &reference.name,
            IoDirection::Outputs,
            reference.owner.clone(),
            kind,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::modifier::LoopItems;
    use crate::pipeline::operator::OperatorDefinition;
    use crate::pipeline::types::{ArtifactType, LocationType};
    use serde_json::json;

    fn op() -> OperatorDefinition {
        OperatorDefinition::local("op")
            .input(VariableDecl::parameter("x", ParameterType::String))
            .input(
                VariableDecl::artifact("table", ArtifactType::dataset(LocationType::Oss))
                    .description("input table"),
            )
            .output(VariableDecl::parameter("out", ParameterType::String))
            .output(
                VariableDecl::artifact("parts", ArtifactType::dataset(LocationType::Oss))
                    .repeated(),
            )
    }

    fn chain() -> Pipeline {
        let mut pipeline = Pipeline::builder("demo", "v1").provider("acme").build();
        let foo = pipeline
            .add_input(VariableDecl::parameter("foo", ParameterType::String).default_value("bar"))
            .unwrap();

        let mut a = Step::new("A", &op()).unwrap();
        a.assign_inputs([("x", foo)]).unwrap();
        a.set_artifact_count("parts", 2).unwrap();
        pipeline.add_step(a).unwrap();

        let mut b = Step::new("B", &op()).unwrap();
        b.assign_inputs([
            ("x", pipeline.output_of("A", "out").unwrap()),
            ("table", pipeline.output_of("A", "parts").unwrap().at(1).unwrap()),
        ])
        .unwrap();
        pipeline.add_step(b).unwrap();

        let mut c = Step::new("C", &op()).unwrap();
        c.assign_inputs([("x", pipeline.output_of("B", "out").unwrap())])
            .unwrap();
        pipeline.add_step(c).unwrap();

        let gate = pipeline.output_of("C", "out").unwrap().eq("true");
        let d = Step::condition("D", &op(), gate).unwrap();
        pipeline.add_step(d).unwrap();

        let each = Step::for_each("E", &op(), 0i64..10, Some(3)).unwrap();
        pipeline.add_step(each).unwrap();

        let items = LoopItems::param(&pipeline.output_of("A", "out").unwrap()).unwrap();
        pipeline
            .add_step(Step::for_each("F", &op(), items, None).unwrap())
            .unwrap();

        let out = pipeline.output_of("C", "out").unwrap();
        pipeline.add_output("result", &out, Some("final answer")).unwrap();
        pipeline
    }

    #[test]
    fn test_chain_manifest_dependencies() {
        let manifest = chain().to_manifest();
        let steps = manifest.spec.pipelines.unwrap();
        assert!(steps[0].spec.dependencies.is_empty());
        assert_eq!(steps[1].spec.dependencies, vec!["A"]);
        assert_eq!(steps[2].spec.dependencies, vec!["B"]);
        assert_eq!(
            steps[1].spec.arguments.artifacts[0].from.as_deref(),
            Some("{{pipelines.A.outputs.artifacts.parts[1]}}")
        );
        assert_eq!(
            steps[0].spec.arguments.parameters[0].from.as_deref(),
            Some("{{inputs.parameters.foo}}")
        );
    }

    #[test]
    fn test_manifest_field_names() {
        let value = serde_json::to_value(chain().to_manifest()).unwrap();
        assert_eq!(value["apiVersion"], json!("core/v1"));
        assert_eq!(value["metadata"]["identifier"], json!("demo"));
        assert_eq!(value["spec"]["inputs"]["parameters"][0]["value"], json!("bar"));
        assert_eq!(
            value["spec"]["outputs"]["parameters"][0]["from"],
            json!("{{pipelines.C.outputs.parameters.out}}")
        );
        let steps = &value["spec"]["pipelines"];
        assert_eq!(steps[4]["spec"]["withSequence"], json!({"start": 0, "end": 10}));
        assert_eq!(steps[4]["spec"]["parallelism"], json!(3));
        assert_eq!(
            steps[5]["spec"]["withParam"],
            json!("{{pipelines.A.outputs.parameters.out}}")
        );
        assert!(value["spec"].get("execution").is_none());
    }

    #[test]
    fn test_round_trip_untyped() {
        let manifest = chain().to_manifest();
        let loaded = Pipeline::from_manifest(manifest.clone()).unwrap();
        assert_eq!(loaded.to_manifest(), manifest);
        assert!(loaded.validate().is_valid());
    }

    #[test]
    fn test_round_trip_with_catalog() {
        let manifest = chain().to_manifest();
        let catalog = OperatorCatalog::new().with(op());
        let loaded = Pipeline::from_manifest_with(manifest.clone(), &catalog).unwrap();
        assert_eq!(loaded.to_manifest(), manifest);

        let b = loaded.step("B").unwrap();
        assert!(matches!(
            b.input("x").unwrap().kind(),
            VariableKind::Parameter {
                typ: Some(ParameterType::String)
            }
        ));
    }

    #[test]
    fn test_round_trip_counted_input_with_default() {
        let fan_in = OperatorDefinition::local("fan_in").input(
            VariableDecl::artifact("parts", ArtifactType::dataset(LocationType::Oss))
                .repeated()
                .default_value(json!(["oss://a"])),
        );
        let mut step = Step::new("s", &fan_in).unwrap();
        step.set_artifact_count("parts", 2).unwrap();
        let mut pipeline = Pipeline::builder("fan", "v1").build();
        pipeline.add_step(step).unwrap();

        let manifest = pipeline.to_manifest();
        let catalog = OperatorCatalog::new().with(fan_in);
        let loaded = Pipeline::from_manifest_with(manifest.clone(), &catalog).unwrap();
        assert_eq!(loaded.to_manifest(), manifest);

        let parts = loaded.step("s").unwrap().input("parts").unwrap();
        assert_eq!(parts.count(), Some(2));
        assert_eq!(parts.default_value(), Some(&json!(["oss://a"])));
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let pipeline = chain();
        let yaml = pipeline.to_yaml().unwrap();
        let loaded = Pipeline::from_yaml(&yaml).unwrap();
        assert_eq!(loaded.to_manifest(), pipeline.to_manifest());
    }

    #[test]
    fn test_execution_and_pipelines_rejected() {
        let yaml = r#"
apiVersion: core/v1
metadata:
  identifier: leaf
  version: v1
spec:
  execution:
    image: busybox
  pipelines: []
"#;
        assert!(matches!(
            Pipeline::from_yaml(yaml),
            Err(FlowspecError::ManifestSchema { .. })
        ));
    }

    #[test]
    fn test_leaf_pipeline_round_trip() {
        let yaml = r#"
apiVersion: core/v1
metadata:
  identifier: leaf
  provider: acme
  version: v1
spec:
  inputs:
    parameters:
      - name: n
        type: Int
        value: 3
  execution:
    image: busybox
    command: [echo, hi]
"#;
        let manifest = Manifest::from_yaml(yaml).unwrap();
        let pipeline = Pipeline::from_manifest(manifest.clone()).unwrap();
        assert!(pipeline.execution().is_some());
        assert_eq!(pipeline.to_manifest(), manifest);
    }

    #[test]
    fn test_two_loop_sources_rejected() {
        let yaml = r#"
apiVersion: core/v1
metadata: {identifier: p, version: v1}
spec:
  pipelines:
    - metadata: {name: s, guid: abc}
      spec:
        arguments: {}
        withItems: [1, 2]
        withSequence: {start: 0, end: 2}
"#;
        assert!(matches!(
            Pipeline::from_yaml(yaml),
            Err(FlowspecError::ManifestSchema { .. })
        ));
    }

    #[test]
    fn test_step_without_operator_rejected() {
        let yaml = r#"
apiVersion: core/v1
metadata: {identifier: p, version: v1}
spec:
  pipelines:
    - metadata: {name: s}
      spec: {arguments: {}}
"#;
        assert!(matches!(
            Pipeline::from_yaml(yaml),
            Err(FlowspecError::ManifestSchema { .. })
        ));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let yaml = r#"
apiVersion: core/v1
metadata: {identifier: p, version: v1}
spec:
  pipelines:
    - metadata: {name: s, guid: abc}
      spec:
        arguments: {}
        dependencies: [ghost]
"#;
        assert!(matches!(
            Pipeline::from_yaml(yaml),
            Err(FlowspecError::ManifestSchema { .. })
        ));
    }

    #[test]
    fn test_cyclic_manifest_rejected() {
        let yaml = r#"
apiVersion: core/v1
metadata: {identifier: p, version: v1}
spec:
  pipelines:
    - metadata: {name: a, guid: g}
      spec:
        arguments:
          parameters:
            - {name: x, from: "{{pipelines.b.outputs.parameters.y}}"}
    - metadata: {name: b, guid: g}
      spec:
        arguments: {}
        dependencies: [a]
"#;
        match Pipeline::from_yaml(yaml) {
            Err(FlowspecError::CycleDetected { steps }) => assert_eq!(steps, vec!["a", "b"]),
            other => panic!("expected a cycle, got {:?}", other.map(|p| p.steps().len())),
        }
    }

    #[test]
    fn test_untyped_producer_outputs_synthesized() {
        let yaml = r#"
apiVersion: core/v1
metadata: {identifier: p, provider: acme, version: v1}
spec:
  pipelines:
    - metadata: {name: a, identifier: gen, provider: acme, version: v1}
      spec: {arguments: {}}
    - metadata: {name: b, guid: g}
      spec:
        arguments:
          parameters:
            - {name: x, from: "{{pipelines.a.outputs.parameters.y}}"}
        dependencies: [a]
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert!(pipeline.step("a").unwrap().output("y").is_ok());
        assert!(pipeline.validate().is_valid());
    }
}
