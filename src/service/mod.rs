// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Execution service boundary
//!
//! The pipeline model never talks to a transport. It consumes these traits
//! to hydrate pipelines and operators and to hand over finished manifests.

mod hash;
mod local;

pub use hash::{hash_string, IdHasher};
pub use local::LocalService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;
use tracing::{debug, info};

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::{
    Manifest, OperatorCatalog, OperatorDefinition, OperatorRef, Pipeline, PipelineMetadata, Step,
};

/// Lifecycle of a submitted run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Created,
    Running,
    Succeeded,
    Failed,
    Terminated,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Terminated)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Terminated => "Terminated",
        };
        write!(f, "{}", s)
    }
}

/// A published pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: String,
    pub metadata: PipelineMetadata,
}

/// What a run executes
#[derive(Debug, Clone)]
pub enum RunTarget {
    PipelineId(String),
    Manifest(Box<Manifest>),
}

/// A submitted run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub name: String,
    pub pipeline_id: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, Value>,
    pub status: RunStatus,
    pub created_at: SystemTime,
}

/// Remote execution service
#[async_trait]
pub trait PipelineService: Send + Sync {
    async fn get_pipeline(
        &self,
        identifier: &str,
        provider: &str,
        version: &str,
    ) -> FlowspecResult<Manifest>;

    async fn get_pipeline_by_id(&self, id: &str) -> FlowspecResult<Manifest>;

    async fn list_pipelines(&self) -> FlowspecResult<Vec<PipelineRecord>>;

    /// Publish a manifest, returning its pipeline id
    async fn create_pipeline(&self, manifest: &Manifest) -> FlowspecResult<String>;

    async fn create_run(
        &self,
        name: &str,
        arguments: BTreeMap<String, Value>,
        target: RunTarget,
    ) -> FlowspecResult<String>;

    async fn get_run(&self, run_id: &str) -> FlowspecResult<RunRecord>;

    async fn list_runs(&self) -> FlowspecResult<Vec<RunRecord>>;

    async fn terminate_run(&self, run_id: &str) -> FlowspecResult<RunRecord>;
}

/// Source of operator definitions
#[async_trait]
pub trait OperatorRegistry: Send + Sync {
    async fn get_operator(
        &self,
        identifier: &str,
        provider: &str,
        version: &str,
    ) -> FlowspecResult<OperatorDefinition>;

    async fn register_operator(&self, definition: &OperatorDefinition) -> FlowspecResult<OperatorRef>;
}

/// Look up the registered operators a manifest's steps use
///
/// Operators the registry does not know are left out; their steps load
/// untyped.
pub async fn resolve_operators(
    manifest: &Manifest,
    registry: &dyn OperatorRegistry,
) -> FlowspecResult<OperatorCatalog> {
    let mut catalog = OperatorCatalog::new();
    let Some(steps) = &manifest.spec.pipelines else {
        return Ok(catalog);
    };

    for step in steps {
        let OperatorRef::Registered {
            identifier,
            provider,
            version,
        } = step.metadata.operator_ref()?
        else {
            continue;
        };

        match registry.get_operator(&identifier, &provider, &version).await {
            Ok(definition) => catalog.insert(definition),
            Err(FlowspecError::OperatorNotFound { key }) => {
                debug!(step = %step.metadata.name, operator = %key, "Operator not registered, loading step untyped");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(catalog)
}

impl Pipeline {
    /// Fetch a published pipeline and type its steps from the registry
    pub async fn load(
        service: &dyn PipelineService,
        registry: &dyn OperatorRegistry,
        identifier: &str,
        provider: &str,
        version: &str,
    ) -> FlowspecResult<Self> {
        let manifest = service.get_pipeline(identifier, provider, version).await?;
        let catalog = resolve_operators(&manifest, registry).await?;
        Self::from_manifest_with(manifest, &catalog)
    }

    pub async fn load_by_id(
        service: &dyn PipelineService,
        registry: &dyn OperatorRegistry,
        id: &str,
    ) -> FlowspecResult<Self> {
        let manifest = service.get_pipeline_by_id(id).await?;
        let catalog = resolve_operators(&manifest, registry).await?;
        Self::from_manifest_with(manifest, &catalog)
    }

    /// Validate and publish, returning the pipeline id
    pub async fn publish(&self, service: &dyn PipelineService) -> FlowspecResult<String> {
        let manifest = self.export()?;
        let id = service.create_pipeline(&manifest).await?;
        info!(pipeline = %self.metadata.key(), id = %id, "Published pipeline");
        Ok(id)
    }

    /// Validate and submit a run; argument names must be pipeline inputs
    pub async fn submit_run(
        &self,
        service: &dyn PipelineService,
        name: &str,
        arguments: BTreeMap<String, Value>,
    ) -> FlowspecResult<String> {
        if let Some(unknown) = arguments
            .keys()
            .find(|k| !self.inputs.iter().any(|v| v.name() == k.as_str()))
        {
            return Err(FlowspecError::UnknownVariable {
                owner: "pipeline".into(),
                name: unknown.clone(),
            });
        }

        let manifest = self.export()?;
        let run_id = service
            .create_run(name, arguments, RunTarget::Manifest(Box::new(manifest)))
            .await?;
        info!(pipeline = %self.metadata.key(), run = %run_id, "Submitted run");
        Ok(run_id)
    }

    /// Step running a registered operator
    pub async fn create_step(
        registry: &dyn OperatorRegistry,
        name: &str,
        identifier: &str,
        provider: &str,
        version: &str,
    ) -> FlowspecResult<Step> {
        let definition = registry.get_operator(identifier, provider, version).await?;
        Step::new(name, &definition)
    }
}
