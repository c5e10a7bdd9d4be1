// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Pipeline variables
//!
//! Parameters and artifacts declared on a step or pipeline boundary. A
//! variable is bound either to a literal value or to another variable; the
//! other variable is referenced by path, never owned.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::manifest::Argument;
use crate::pipeline::types::{is_template, ArtifactType, ParameterType, ParameterValidator};

/// Identity of one pipeline instance, used to reject cross-pipeline wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of one step instance, kept across clones of that step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(u64);

impl StepId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Pipeline and step instance a handle was taken from, when known
///
/// Handles read back from a manifest carry neither and resolve by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Origin {
    pub scope: Option<ScopeId>,
    pub step: Option<StepId>,
}

impl Origin {
    /// A pipeline's own boundary
    pub fn pipeline(scope: ScopeId) -> Self {
        Self {
            scope: Some(scope),
            step: None,
        }
    }

    /// A step instance, attached to `scope` or still free
    pub fn step(scope: Option<ScopeId>, step: StepId) -> Self {
        Self {
            scope,
            step: Some(step),
        }
    }

    /// Whether this origin names a pipeline other than `scope`
    pub fn is_foreign_to(&self, scope: ScopeId) -> bool {
        self.scope.is_some_and(|own| own != scope)
    }
}

/// Whether a variable is consumed or produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoDirection {
    Inputs,
    Outputs,
}

impl IoDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inputs => "inputs",
            Self::Outputs => "outputs",
        }
    }
}

/// Parameter or artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableCategory {
    Parameters,
    Artifacts,
}

impl VariableCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parameters => "parameters",
            Self::Artifacts => "artifacts",
        }
    }
}

/// The boundary a variable is declared on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The enclosing pipeline itself
    Pipeline,
    /// A step, by name
    Step(String),
}

impl Owner {
    fn prefix(&self) -> Option<String> {
        match self {
            Self::Pipeline => None,
            Self::Step(name) => Some(format!("pipelines.{}", name)),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline => write!(f, "pipeline"),
            Self::Step(name) => write!(f, "step '{}'", name),
        }
    }
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\{\{\s*(?:pipelines\.(?P<step>[^.\s{}]+)\.)?(?P<dir>inputs|outputs)\.(?P<cat>parameters|artifacts)\.(?P<name>[^.\[\]\s{}]+)(?:\[(?P<idx>\d+)\])?\s*\}\}$",
        )
        .expect("reference pattern is valid")
    })
}

/// Path to a variable, the cross-reference key inside a manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableRef {
    pub owner: Owner,
    pub direction: IoDirection,
    pub category: VariableCategory,
    pub name: String,
    /// Element of a repeated artifact
    pub index: Option<usize>,
}

impl VariableRef {
    pub fn new(
        owner: Owner,
        direction: IoDirection,
        category: VariableCategory,
        name: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            direction,
            category,
            name: name.into(),
            index: None,
        }
    }

    /// Dotted path, e.g. `pipelines.train.outputs.artifacts.model`
    pub fn fullname(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        if let Some(prefix) = self.owner.prefix() {
            parts.push(prefix);
        }
        parts.push(self.direction.as_str().to_string());
        parts.push(self.category.as_str().to_string());
        parts.push(self.name.clone());

        let path = parts.join(".");
        match self.index {
            Some(i) => format!("{}[{}]", path, i),
            None => path,
        }
    }

    /// Fullname wrapped in the `{{...}}` reference syntax
    pub fn enclosed(&self) -> String {
        format!("{{{{{}}}}}", self.fullname())
    }

    /// Parse a `{{...}}` reference back into a path
    pub fn parse(text: &str) -> Option<Self> {
        let caps = reference_re().captures(text.trim())?;

        let owner = match caps.name("step") {
            Some(step) => Owner::Step(step.as_str().to_string()),
            None => Owner::Pipeline,
        };
        let direction = match &caps["dir"] {
            "inputs" => IoDirection::Inputs,
            _ => IoDirection::Outputs,
        };
        let category = match &caps["cat"] {
            "parameters" => VariableCategory::Parameters,
            _ => VariableCategory::Artifacts,
        };
        let index = match caps.name("idx") {
            Some(idx) => Some(idx.as_str().parse().ok()?),
            None => None,
        };

        Some(Self {
            owner,
            direction,
            category,
            name: caps["name"].to_string(),
            index,
        })
    }

    /// Name of the producing step, if the owner is a step
    pub fn step_name(&self) -> Option<&str> {
        match &self.owner {
            Owner::Step(name) => Some(name),
            Owner::Pipeline => None,
        }
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fullname())
    }
}

/// Where a bound variable takes its value from at run time
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Another variable in the same manifest
    Variable(VariableRef),
    /// A reference the service resolves on its own, kept verbatim
    Expression(String),
}

impl Source {
    pub fn parse(text: &str) -> Self {
        match VariableRef::parse(text) {
            Some(reference) => Self::Variable(reference),
            None => Self::Expression(text.to_string()),
        }
    }

    /// Text placed in the manifest's `from` field
    pub fn to_reference_string(&self) -> String {
        match self {
            Self::Variable(reference) => reference.enclosed(),
            Self::Expression(text) => text.clone(),
        }
    }

    pub fn variable(&self) -> Option<&VariableRef> {
        match self {
            Self::Variable(reference) => Some(reference),
            Self::Expression(_) => None,
        }
    }

    pub fn producer_step(&self) -> Option<&str> {
        self.variable().and_then(VariableRef::step_name)
    }
}

/// Current binding of a variable; a value and a source exclude each other
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Binding {
    #[default]
    Unassigned,
    Value(Value),
    From(Source),
}

/// Parameter or artifact, with its declared type
#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Parameter {
        typ: Option<ParameterType>,
    },
    Artifact {
        typ: Option<ArtifactType>,
        repeated: bool,
    },
}

impl VariableKind {
    pub fn category(&self) -> VariableCategory {
        match self {
            Self::Parameter { .. } => VariableCategory::Parameters,
            Self::Artifact { .. } => VariableCategory::Artifacts,
        }
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self, Self::Artifact { repeated: true, .. })
    }
}

/// A typed slot on a step or pipeline boundary
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    direction: IoDirection,
    owner: Owner,
    kind: VariableKind,
    description: Option<String>,
    required: bool,
    validator: Option<ParameterValidator>,
    binding: Binding,
    /// Fan-out of a repeated artifact
    count: Option<usize>,
}

impl Variable {
    pub(crate) fn new(
        name: impl Into<String>,
        direction: IoDirection,
        owner: Owner,
        kind: VariableKind,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            owner,
            kind,
            description: None,
            required: false,
            validator: None,
            binding: Binding::Unassigned,
            count: None,
        }
    }

    pub(crate) fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub(crate) fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub(crate) fn with_validator(mut self, validator: Option<ParameterValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> IoDirection {
        self.direction
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    pub fn category(&self) -> VariableCategory {
        self.kind.category()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn validator(&self) -> Option<&ParameterValidator> {
        self.validator.as_ref()
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.binding {
            Binding::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&Source> {
        match &self.binding {
            Binding::From(source) => Some(source),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self.binding, Binding::Unassigned)
    }

    pub fn is_repeated(&self) -> bool {
        self.kind.is_repeated()
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn reference(&self) -> VariableRef {
        VariableRef::new(
            self.owner.clone(),
            self.direction,
            self.category(),
            self.name.clone(),
        )
    }

    pub fn fullname(&self) -> String {
        self.reference().fullname()
    }

    /// Non-owning handle used to bind this variable elsewhere
    pub fn handle(&self, origin: Origin) -> VariableHandle {
        VariableHandle {
            reference: self.reference(),
            kind: self.kind.clone(),
            origin,
        }
    }

    /// Bind to a literal or another variable, replacing any previous binding
    pub fn assign(&mut self, value: AssignValue) -> FlowspecResult<()> {
        match value {
            AssignValue::Literal(literal) => {
                self.check_literal(&literal)?;
                self.binding = Binding::Value(literal);
            }
            AssignValue::Reference(handle) => {
                self.check_source(&handle)?;
                self.binding = Binding::From(Source::Variable(handle.reference));
            }
        }
        Ok(())
    }

    /// Install a binding read from a manifest, without type checks
    pub(crate) fn bind_raw(&mut self, binding: Binding) {
        self.binding = binding;
    }

    pub(crate) fn set_count(&mut self, count: usize) -> FlowspecResult<()> {
        if !self.is_repeated() {
            return Err(FlowspecError::NotRepeated {
                variable: self.fullname(),
            });
        }
        if count == 0 {
            return Err(FlowspecError::invalid_value(
                self.fullname(),
                "artifact count must be at least 1",
            ));
        }
        self.count = Some(count);
        Ok(())
    }

    /// Wire-level argument; `None` when the variable is unbound
    pub fn to_argument(&self) -> Option<Argument> {
        match &self.binding {
            Binding::Unassigned => None,
            Binding::Value(value) => Some(Argument::with_value(&self.name, value.clone())),
            Binding::From(source) => Some(Argument::with_from(
                &self.name,
                source.to_reference_string(),
            )),
        }
    }

    fn check_binding_target(&self, source: &str) -> FlowspecResult<()> {
        match (&self.owner, self.direction) {
            (Owner::Step(_), IoDirection::Outputs) => Err(FlowspecError::invalid_assignment(
                self.fullname(),
                source,
                "step outputs are produced by the operator",
            )),
            _ => Ok(()),
        }
    }

    fn check_literal(&self, value: &Value) -> FlowspecResult<()> {
        self.check_binding_target("<literal>")?;

        if self.owner == Owner::Pipeline && self.direction == IoDirection::Outputs {
            return Err(FlowspecError::invalid_assignment(
                self.fullname(),
                "<literal>",
                "pipeline outputs must come from a step output",
            ));
        }
        if value.is_null() {
            return Err(FlowspecError::invalid_value(self.fullname(), "null is not a value"));
        }
        if is_template(value) {
            return Ok(());
        }

        match &self.kind {
            VariableKind::Parameter { typ } => {
                if let Some(typ) = typ {
                    if !typ.accepts(value) {
                        return Err(FlowspecError::invalid_value(
                            self.fullname(),
                            format!("expected {}, got {}", typ, value),
                        ));
                    }
                }
                if let Some(validator) = &self.validator {
                    validator
                        .check(value)
                        .map_err(|reason| FlowspecError::invalid_value(self.fullname(), reason))?;
                }
            }
            VariableKind::Artifact { repeated, .. } => {
                let is_location = |v: &Value| v.is_string() || v.is_object();
                let valid = if *repeated {
                    value
                        .as_array()
                        .map(|items| items.iter().all(is_location))
                        .unwrap_or(false)
                } else {
                    is_location(value)
                };
                if !valid {
                    let expected = if *repeated {
                        "a list of artifact locations"
                    } else {
                        "an artifact location string or object"
                    };
                    return Err(FlowspecError::invalid_value(
                        self.fullname(),
                        format!("expected {}, got {}", expected, value),
                    ));
                }
            }
        }

        Ok(())
    }

    fn check_source(&self, handle: &VariableHandle) -> FlowspecResult<()> {
        let source = handle.reference.fullname();
        self.check_binding_target(&source)?;

        let reject = |reason: &str| {
            Err(FlowspecError::invalid_assignment(
                self.fullname(),
                source.clone(),
                reason,
            ))
        };

        if self.owner == Owner::Pipeline && self.direction == IoDirection::Inputs {
            return reject("pipeline inputs take literal defaults only");
        }
        if self.category() != handle.reference.category {
            return reject("parameter and artifact categories differ");
        }

        let from_step_output = matches!(handle.reference.owner, Owner::Step(_))
            && handle.reference.direction == IoDirection::Outputs;
        let from_pipeline_input = handle.reference.owner == Owner::Pipeline
            && handle.reference.direction == IoDirection::Inputs;

        match self.owner {
            Owner::Step(_) if !(from_step_output || from_pipeline_input) => {
                return reject("source must be an upstream step output or a pipeline input");
            }
            Owner::Pipeline if !from_step_output => {
                return reject("pipeline outputs must come from a step output");
            }
            _ => {}
        }

        match (&self.kind, &handle.kind) {
            (VariableKind::Parameter { typ: Some(target) }, VariableKind::Parameter { typ: Some(src) }) => {
                if !target.accepts_source(*src) {
                    return reject(&format!("type {} cannot take {}", target, src));
                }
            }
            (
                VariableKind::Artifact { typ, repeated },
                VariableKind::Artifact {
                    typ: src_typ,
                    repeated: src_repeated,
                },
            ) => {
                if let (Some(target), Some(src)) = (typ, src_typ) {
                    if !target.accepts_source(src) {
                        return reject(&format!(
                            "artifact data type {} cannot take {}",
                            target.data_type, src.data_type
                        ));
                    }
                }
                let whole_repeated = *src_repeated && handle.reference.index.is_none();
                if whole_repeated && !repeated {
                    return reject("a repeated artifact only binds to a repeated input");
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Non-owning handle to a declared variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableHandle {
    reference: VariableRef,
    kind: VariableKind,
    origin: Origin,
}

impl VariableHandle {
    pub fn reference(&self) -> &VariableRef {
        &self.reference
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    /// Pipeline the owner belonged to when the handle was taken
    pub fn scope(&self) -> Option<ScopeId> {
        self.origin.scope
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn fullname(&self) -> String {
        self.reference.fullname()
    }

    /// Element `index` of a repeated artifact
    pub fn at(&self, index: usize) -> FlowspecResult<Self> {
        if !self.kind.is_repeated() || self.reference.index.is_some() {
            return Err(FlowspecError::NotRepeated {
                variable: self.fullname(),
            });
        }
        let mut element = self.clone();
        element.reference.index = Some(index);
        Ok(element)
    }
}

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    Literal(Value),
    Reference(VariableHandle),
}

impl AssignValue {
    /// Placeholder for the current item of a loop step
    pub fn loop_item() -> Self {
        Self::Literal(Value::String("{{item}}".into()))
    }

    /// The referenced handle, if this binds to another variable
    pub fn handle(&self) -> Option<&VariableHandle> {
        match self {
            Self::Reference(handle) => Some(handle),
            Self::Literal(_) => None,
        }
    }
}

impl From<VariableHandle> for AssignValue {
    fn from(handle: VariableHandle) -> Self {
        Self::Reference(handle)
    }
}

impl From<&VariableHandle> for AssignValue {
    fn from(handle: &VariableHandle) -> Self {
        Self::Reference(handle.clone())
    }
}

impl From<Value> for AssignValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for AssignValue {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for AssignValue {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl From<i64> for AssignValue {
    fn from(value: i64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<f64> for AssignValue {
    fn from(value: f64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<bool> for AssignValue {
    fn from(value: bool) -> Self {
        Self::Literal(Value::Bool(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{ArtifactType, DataType, LocationType};
    use serde_json::json;

    fn step_input(name: &str, typ: Option<ParameterType>) -> Variable {
        Variable::new(
            name,
            IoDirection::Inputs,
            Owner::Step("train".into()),
            VariableKind::Parameter { typ },
        )
    }

    fn step_output(step: &str, name: &str, typ: Option<ParameterType>) -> Variable {
        Variable::new(
            name,
            IoDirection::Outputs,
            Owner::Step(step.into()),
            VariableKind::Parameter { typ },
        )
    }

    fn artifact(step: &str, direction: IoDirection, name: &str, repeated: bool) -> Variable {
        Variable::new(
            name,
            direction,
            Owner::Step(step.into()),
            VariableKind::Artifact {
                typ: Some(ArtifactType::dataset(LocationType::Oss)),
                repeated,
            },
        )
    }

    #[test]
    fn test_fullname_paths() {
        let var = step_output("stepA", "out", None);
        assert_eq!(var.fullname(), "pipelines.stepA.outputs.parameters.out");

        let pipeline_input = Variable::new(
            "foo",
            IoDirection::Inputs,
            Owner::Pipeline,
            VariableKind::Parameter { typ: None },
        );
        assert_eq!(pipeline_input.fullname(), "inputs.parameters.foo");
        assert_eq!(
            pipeline_input.reference().enclosed(),
            "{{inputs.parameters.foo}}"
        );
    }

    #[test]
    fn test_reference_parse() {
        let parsed = VariableRef::parse("{{pipelines.a.outputs.artifacts.model[2]}}").unwrap();
        assert_eq!(parsed.owner, Owner::Step("a".into()));
        assert_eq!(parsed.category, VariableCategory::Artifacts);
        assert_eq!(parsed.index, Some(2));
        assert_eq!(parsed.enclosed(), "{{pipelines.a.outputs.artifacts.model[2]}}");

        let pipeline = VariableRef::parse("{{inputs.parameters.x}}").unwrap();
        assert_eq!(pipeline.owner, Owner::Pipeline);

        assert!(VariableRef::parse("{{env.resource.compute}}").is_none());
        assert_eq!(
            Source::parse("{{env.resource.compute}}"),
            Source::Expression("{{env.resource.compute}}".into())
        );
    }

    #[test]
    fn test_assign_literal_then_reference_overwrites() {
        let upstream = step_output("prep", "out", Some(ParameterType::String));
        let mut var = step_input("foo", Some(ParameterType::String));

        var.assign("hello".into()).unwrap();
        assert_eq!(var.default_value(), Some(&json!("hello")));
        assert!(var.source().is_none());

        var.assign(upstream.handle(Origin::default()).into()).unwrap();
        assert!(var.default_value().is_none());
        assert_eq!(
            var.source().and_then(Source::producer_step),
            Some("prep")
        );

        var.assign("again".into()).unwrap();
        assert!(var.source().is_none());
        assert_eq!(var.default_value(), Some(&json!("again")));
    }

    #[test]
    fn test_assign_rejects_wrong_literal_type() {
        let mut var = step_input("n", Some(ParameterType::Int));
        let err = var.assign("ten".into()).unwrap_err();
        assert!(matches!(err, FlowspecError::InvalidValue { .. }));
        assert!(!var.is_bound());
    }

    #[test]
    fn test_template_literal_accepted_for_any_type() {
        let mut var = step_input("n", Some(ParameterType::Int));
        var.assign(AssignValue::loop_item()).unwrap();
        assert_eq!(var.default_value(), Some(&json!("{{item}}")));
    }

    #[test]
    fn test_assign_checks_validator() {
        let mut var = step_input("ratio", Some(ParameterType::Double))
            .with_validator(Some(ParameterValidator::range(0.0, 1.0)));
        assert!(var.assign(0.8.into()).is_ok());
        assert!(matches!(
            var.assign(1.5.into()),
            Err(FlowspecError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_assign_rejects_step_input_as_source() {
        let other = step_input("x", None);
        let mut var = step_input("foo", None);
        let err = var.assign(other.handle(Origin::default()).into()).unwrap_err();
        assert!(matches!(err, FlowspecError::InvalidAssignment { .. }));
    }

    #[test]
    fn test_assign_rejects_category_mismatch() {
        let out = artifact("prep", IoDirection::Outputs, "table", false);
        let mut var = step_input("foo", None);
        assert!(matches!(
            var.assign(out.handle(Origin::default()).into()),
            Err(FlowspecError::InvalidAssignment { .. })
        ));
    }

    #[test]
    fn test_assign_rejects_type_mismatch() {
        let out = step_output("prep", "out", Some(ParameterType::Bool));
        let mut var = step_input("foo", Some(ParameterType::Int));
        assert!(var.assign(out.handle(Origin::default()).into()).is_err());
    }

    #[test]
    fn test_step_output_cannot_be_assigned() {
        let mut out = step_output("prep", "out", None);
        assert!(matches!(
            out.assign("x".into()),
            Err(FlowspecError::InvalidAssignment { .. })
        ));
    }

    #[test]
    fn test_repeated_artifact_element_binding() {
        let fan_out = artifact("split", IoDirection::Outputs, "parts", true);
        let mut single = artifact("train", IoDirection::Inputs, "table", false);

        assert!(single.assign(fan_out.handle(Origin::default()).into()).is_err());

        let element = fan_out.handle(Origin::default()).at(1).unwrap();
        single.assign(element.into()).unwrap();
        assert_eq!(
            single.to_argument().unwrap().from.as_deref(),
            Some("{{pipelines.split.outputs.artifacts.parts[1]}}")
        );
    }

    #[test]
    fn test_element_of_plain_artifact_rejected() {
        let plain = artifact("split", IoDirection::Outputs, "table", false);
        assert!(matches!(
            plain.handle(Origin::default()).at(0),
            Err(FlowspecError::NotRepeated { .. })
        ));
    }

    #[test]
    fn test_artifact_data_type_mismatch() {
        let model = Variable::new(
            "model",
            IoDirection::Outputs,
            Owner::Step("train".into()),
            VariableKind::Artifact {
                typ: Some(ArtifactType::new(DataType::Model, None)),
                repeated: false,
            },
        );
        let mut table = artifact("eval", IoDirection::Inputs, "table", false);
        assert!(table.assign(model.handle(Origin::default()).into()).is_err());
    }

    #[test]
    fn test_to_argument_branches() {
        let mut var = step_input("foo", None);
        assert!(var.to_argument().is_none());

        var.assign("bar".into()).unwrap();
        let arg = var.to_argument().unwrap();
        assert_eq!(arg.value, Some(json!("bar")));
        assert!(arg.from.is_none());
    }

    #[test]
    fn test_set_count_requires_repeated() {
        let mut plain = artifact("s", IoDirection::Outputs, "t", false);
        assert!(matches!(
            plain.set_count(2),
            Err(FlowspecError::NotRepeated { .. })
        ));

        let mut repeated = artifact("s", IoDirection::Outputs, "t", true);
        repeated.set_count(3).unwrap();
        assert_eq!(repeated.count(), Some(3));
    }
}
