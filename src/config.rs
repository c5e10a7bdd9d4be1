// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Settings file
//!
//! `flowspec.toml` in the working directory, or the file passed with
//! `--config`. Every key is optional.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::{Pipeline, PipelineBuilder, StepDefaults, DEFAULT_API_VERSION};

/// Settings file looked up in the working directory
pub const CONFIG_FILE: &str = "flowspec.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Written to manifests of pipelines built with [`Settings::pipeline_builder`]
    pub api_version: String,
    /// Default provider for new pipelines and registry lookups
    pub provider: Option<String>,
    /// Root of the local service
    pub registry_dir: Option<PathBuf>,
    /// Applied by [`Settings::pipeline_builder`] at step insertion
    pub step_defaults: StepDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            provider: None,
            registry_dir: None,
            step_defaults: StepDefaults::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> FlowspecResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    pub fn from_file(path: &Path) -> FlowspecResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FlowspecError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        debug!(path = %path.display(), "Loaded settings");
        Self::from_toml(&content)
    }

    /// Explicit file if given, else `flowspec.toml` in `dir`, else defaults
    pub fn load(explicit: Option<&Path>, dir: &Path) -> FlowspecResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let discovered = dir.join(CONFIG_FILE);
        if discovered.is_file() {
            Self::from_file(&discovered)
        } else {
            Ok(Self::default())
        }
    }

    pub fn registry_dir(&self) -> PathBuf {
        self.registry_dir.clone().unwrap_or_else(default_registry_dir)
    }

    /// Builder carrying these settings
    ///
    /// Used by programs that build pipelines in code. The CLI commands only
    /// load manifests, which already carry their bindings, so `api_version`
    /// and `[step_defaults]` take effect through this builder alone.
    pub fn pipeline_builder(
        &self,
        identifier: impl Into<String>,
        version: impl Into<String>,
    ) -> PipelineBuilder {
        let mut builder = Pipeline::builder(identifier, version)
            .api_version(self.api_version.clone())
            .step_defaults(self.step_defaults.clone());
        if let Some(provider) = &self.provider {
            builder = builder.provider(provider.clone());
        }
        builder
    }
}

fn default_registry_dir() -> PathBuf {
    ProjectDirs::from("dev", "flowspec", "flowspec")
        .map(|dirs| dirs.data_local_dir().join("registry"))
        .unwrap_or_else(|| PathBuf::from(".flowspec").join("registry"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_absent() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(None, dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_version, "core/v1");
    }

    #[test]
    fn test_parse_full_file() {
        let settings = Settings::from_toml(
            r#"
api_version = "core/v2"
provider = "acme"
registry_dir = "/tmp/registry"

[step_defaults]
threads = 4
region = "eu"
"#,
        )
        .unwrap();

        assert_eq!(settings.provider.as_deref(), Some("acme"));
        assert_eq!(settings.registry_dir(), PathBuf::from("/tmp/registry"));
        assert_eq!(settings.step_defaults.get("threads"), Some(&json!(4)));

        let pipeline = settings.pipeline_builder("p", "v1").build();
        assert_eq!(pipeline.api_version(), "core/v2");
        assert_eq!(pipeline.metadata().provider.as_deref(), Some("acme"));
        assert_eq!(pipeline.step_defaults().len(), 2);
    }

    #[test]
    fn test_discovered_in_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "provider = \"local\"\n").unwrap();
        let settings = Settings::load(None, dir.path()).unwrap();
        assert_eq!(settings.provider.as_deref(), Some("local"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Settings::from_toml("provider = ["),
            Err(FlowspecError::Toml { .. })
        ));
    }
}
