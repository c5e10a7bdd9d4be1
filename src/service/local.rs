// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Filesystem-backed service
//!
//! Keeps manifests as YAML and run records as JSON under one root
//! directory. Runs are only recorded; nothing is executed.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use super::{
    IdHasher, OperatorRegistry, PipelineRecord, PipelineService, RunRecord, RunStatus, RunTarget,
};
use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::{Manifest, OperatorDefinition, OperatorManifest, OperatorRef, PipelineMetadata};

/// Local pipeline service and operator registry
#[derive(Debug, Clone)]
pub struct LocalService {
    root: PathBuf,
}

fn registry_error(action: &str, path: &Path, e: impl std::fmt::Display) -> FlowspecError {
    FlowspecError::Registry {
        message: format!("Failed to {} '{}': {}", action, path.display(), e),
    }
}

impl LocalService {
    /// Open a service rooted at `root`, creating its directories
    pub fn new(root: PathBuf) -> FlowspecResult<Self> {
        for dir in ["pipelines", "runs", "operators"] {
            let path = root.join(dir);
            std::fs::create_dir_all(&path).map_err(|e| registry_error("create", &path, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pipeline_path(&self, id: &str) -> PathBuf {
        self.root.join("pipelines").join(format!("{}.yaml", id))
    }

    fn run_path(&self, id: &str) -> PathBuf {
        self.root.join("runs").join(format!("{}.json", id))
    }

    fn operator_path(&self, reference: &OperatorRef) -> PathBuf {
        self.root
            .join("operators")
            .join(format!("{}.yaml", IdHasher::operator_id(reference)))
    }

    async fn read_optional(path: &Path) -> FlowspecResult<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FlowspecError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            }),
        }
    }

    async fn write(path: &Path, content: &str) -> FlowspecResult<()> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| FlowspecError::FileWriteError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })
    }

    /// Files in a subdirectory with the given extension, sorted by name
    async fn list_files(&self, dir: &str, extension: &str) -> FlowspecResult<Vec<PathBuf>> {
        let dir = self.root.join(dir);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| registry_error("read", &dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| registry_error("read", &dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn save_run(&self, record: &RunRecord) -> FlowspecResult<()> {
        let json = serde_json::to_string_pretty(record)?;
        Self::write(&self.run_path(&record.id), &json).await
    }
}

#[async_trait]
impl PipelineService for LocalService {
    async fn get_pipeline(
        &self,
        identifier: &str,
        provider: &str,
        version: &str,
    ) -> FlowspecResult<Manifest> {
        let metadata = PipelineMetadata {
            identifier: identifier.to_string(),
            provider: Some(provider.to_string()),
            version: version.to_string(),
        };
        let id = IdHasher::pipeline_id(&metadata);
        match Self::read_optional(&self.pipeline_path(&id)).await? {
            Some(yaml) => Manifest::from_yaml(&yaml),
            None => Err(FlowspecError::PipelineNotFound {
                key: metadata.key(),
            }),
        }
    }

    async fn get_pipeline_by_id(&self, id: &str) -> FlowspecResult<Manifest> {
        match Self::read_optional(&self.pipeline_path(id)).await? {
            Some(yaml) => Manifest::from_yaml(&yaml),
            None => Err(FlowspecError::PipelineNotFound { key: id.to_string() }),
        }
    }

    async fn list_pipelines(&self) -> FlowspecResult<Vec<PipelineRecord>> {
        let mut records = Vec::new();
        for path in self.list_files("pipelines", "yaml").await? {
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(yaml) = Self::read_optional(&path).await? else {
                continue;
            };
            let manifest = Manifest::from_yaml(&yaml)?;
            records.push(PipelineRecord {
                id: id.to_string(),
                metadata: manifest.metadata,
            });
        }
        records.sort_by_key(|r| r.metadata.key());
        Ok(records)
    }

    async fn create_pipeline(&self, manifest: &Manifest) -> FlowspecResult<String> {
        let id = IdHasher::pipeline_id(&manifest.metadata);
        let path = self.pipeline_path(&id);
        let yaml = manifest.to_yaml()?;

        if let Some(existing) = Self::read_optional(&path).await? {
            if super::hash_string(&existing) == super::hash_string(&yaml) {
                debug!(pipeline = %manifest.metadata.key(), id = %id, "Pipeline already published");
                return Ok(id);
            }
            return Err(FlowspecError::NameConflict {
                scope: "published pipelines".into(),
                name: manifest.metadata.key(),
            });
        }

        Self::write(&path, &yaml).await?;
        info!(pipeline = %manifest.metadata.key(), id = %id, "Stored pipeline");
        Ok(id)
    }

    async fn create_run(
        &self,
        name: &str,
        arguments: BTreeMap<String, Value>,
        target: RunTarget,
    ) -> FlowspecResult<String> {
        let pipeline_id = match target {
            RunTarget::PipelineId(id) => {
                self.get_pipeline_by_id(&id).await?;
                id
            }
            RunTarget::Manifest(manifest) => self.create_pipeline(&manifest).await?,
        };

        let record = RunRecord {
            id: IdHasher::run_id(name, &pipeline_id),
            name: name.to_string(),
            pipeline_id,
            arguments,
            status: RunStatus::Created,
            created_at: SystemTime::now(),
        };
        self.save_run(&record).await?;

        info!(run = %record.id, pipeline = %record.pipeline_id, "Created run");
        Ok(record.id)
    }

    async fn get_run(&self, run_id: &str) -> FlowspecResult<RunRecord> {
        match Self::read_optional(&self.run_path(run_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(FlowspecError::RunNotFound {
                run_id: run_id.to_string(),
            }),
        }
    }

    async fn list_runs(&self) -> FlowspecResult<Vec<RunRecord>> {
        let mut runs = Vec::new();
        for path in self.list_files("runs", "json").await? {
            if let Some(json) = Self::read_optional(&path).await? {
                runs.push(serde_json::from_str::<RunRecord>(&json)?);
            }
        }
        runs.sort_by_key(|r| r.created_at);
        Ok(runs)
    }

    async fn terminate_run(&self, run_id: &str) -> FlowspecResult<RunRecord> {
        let mut record = self.get_run(run_id).await?;
        if record.status.is_finished() {
            debug!(run = %run_id, status = %record.status, "Run already finished");
            return Ok(record);
        }

        record.status = RunStatus::Terminated;
        self.save_run(&record).await?;
        info!(run = %run_id, "Terminated run");
        Ok(record)
    }
}

#[async_trait]
impl OperatorRegistry for LocalService {
    async fn get_operator(
        &self,
        identifier: &str,
        provider: &str,
        version: &str,
    ) -> FlowspecResult<OperatorDefinition> {
        let reference = OperatorRef::registered(identifier, provider, version);
        match Self::read_optional(&self.operator_path(&reference)).await? {
            Some(yaml) => {
                let manifest: OperatorManifest = serde_yaml::from_str(&yaml)?;
                OperatorDefinition::from_manifest(manifest)
            }
            None => Err(FlowspecError::OperatorNotFound {
                key: reference.key(),
            }),
        }
    }

    async fn register_operator(&self, definition: &OperatorDefinition) -> FlowspecResult<OperatorRef> {
        let reference = definition.reference();
        if !reference.is_registered() {
            return Err(FlowspecError::Registry {
                message: format!(
                    "operator '{}' has no identifier, provider and version to register under",
                    definition.name()
                ),
            });
        }

        let yaml = serde_yaml::to_string(&definition.to_manifest())?;
        Self::write(&self.operator_path(&reference), &yaml).await?;
        info!(operator = %reference, "Registered operator");
        Ok(reference)
    }
}
