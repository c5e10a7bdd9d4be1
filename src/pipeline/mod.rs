// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Pipeline model
//!
//! Variables, operators, steps and the pipeline DAG that holds them, plus
//! the manifest form exchanged with the execution service.

mod dag;
mod definition;
mod manifest;
mod modifier;
mod operator;
mod step;
mod types;
mod validation;
mod variable;

pub use dag::StepGraph;
pub use definition::{Pipeline, PipelineBuilder, StepDefaults, DEFAULT_API_VERSION};
pub use manifest::{
    Argument, Arguments, ArtifactDecl, IoSpec, Manifest, ParameterDecl, PipelineMetadata,
    PipelineSpec, SequenceSpec, StepManifest, StepMetadata, StepSpec,
};
pub use modifier::{
    CompareOp, Condition, ConditionExpr, ExecutionModifier, LoopItems, Operand,
    DEFAULT_PARALLELISM,
};
pub use operator::{
    OperatorCatalog, OperatorDefinition, OperatorManifest, OperatorMetadata, OperatorRef,
    OperatorSpec, VariableDecl, DEFAULT_VERSION,
};
pub use step::{Step, StepDependency, MAX_STEP_NAME_LEN};
pub use types::{
    is_template, ArtifactType, DataType, LocationType, ParameterType, ParameterValidator,
};
pub use validation::{PipelineValidator, ValidationResult};
pub use variable::{
    AssignValue, Binding, IoDirection, Origin, Owner, ScopeId, Source, StepId, Variable,
    VariableCategory, VariableHandle, VariableKind, VariableRef,
};
