// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Operator references and definitions
//!
//! An operator is the unit of work a step invokes. Registered operators are
//! published under identifier, provider and version; local operators are
//! identified by a guid derived from their declared inputs and outputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::manifest::IoSpec;
use crate::pipeline::types::{ArtifactType, ParameterType, ParameterValidator};
use crate::pipeline::variable::{IoDirection, Owner, Variable, VariableKind};

/// Default version for registered operators and pipelines
pub const DEFAULT_VERSION: &str = "v1";

/// Identity of the work a step runs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperatorRef {
    Registered {
        identifier: String,
        provider: String,
        version: String,
    },
    Unregistered {
        guid: String,
    },
}

impl OperatorRef {
    pub fn registered(
        identifier: impl Into<String>,
        provider: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::Registered {
            identifier: identifier.into(),
            provider: provider.into(),
            version: version.into(),
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }

    /// Lookup key used by catalogs and registries
    pub fn key(&self) -> String {
        match self {
            Self::Registered {
                identifier,
                provider,
                version,
            } => format!("{}/{}@{}", provider, identifier, version),
            Self::Unregistered { guid } => format!("guid:{}", guid),
        }
    }
}

impl fmt::Display for OperatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Declaration of one operator input or output
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub kind: VariableKind,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    pub validator: Option<ParameterValidator>,
}

impl VariableDecl {
    /// Typed parameter
    pub fn parameter(name: impl Into<String>, typ: ParameterType) -> Self {
        Self::with_kind(name, VariableKind::Parameter { typ: Some(typ) })
    }

    /// Parameter accepting any non-null literal
    pub fn any_parameter(name: impl Into<String>) -> Self {
        Self::with_kind(name, VariableKind::Parameter { typ: None })
    }

    pub fn artifact(name: impl Into<String>, typ: ArtifactType) -> Self {
        Self::with_kind(
            name,
            VariableKind::Artifact {
                typ: Some(typ),
                repeated: false,
            },
        )
    }

    pub(crate) fn with_kind(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: false,
            default: None,
            validator: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validator(mut self, validator: ParameterValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Mark an artifact as repeated; no effect on parameters
    pub fn repeated(mut self) -> Self {
        if let VariableKind::Artifact { repeated, .. } = &mut self.kind {
            *repeated = true;
        }
        self
    }

    /// Create the variable this declaration describes
    pub fn instantiate(&self, owner: Owner, direction: IoDirection) -> FlowspecResult<Variable> {
        let mut variable = Variable::new(&self.name, direction, owner, self.kind.clone())
            .with_description(self.description.clone())
            .with_required(self.required && direction == IoDirection::Inputs)
            .with_validator(self.validator.clone());

        if let Some(default) = &self.default {
            if direction == IoDirection::Outputs {
                return Err(FlowspecError::invalid_value(
                    variable.fullname(),
                    "outputs take no default value",
                ));
            }
            variable.assign(default.clone().into())?;
        }

        Ok(variable)
    }
}

/// Instantiate a list of declarations, rejecting duplicate names
pub(crate) fn instantiate_all(
    decls: &[VariableDecl],
    owner: &Owner,
    direction: IoDirection,
) -> FlowspecResult<Vec<Variable>> {
    let mut seen = HashSet::new();
    decls
        .iter()
        .map(|decl| {
            if !seen.insert(decl.name.as_str()) {
                return Err(FlowspecError::NameConflict {
                    scope: format!("{} {}", owner, direction.as_str()),
                    name: decl.name.clone(),
                });
            }
            decl.instantiate(owner.clone(), direction)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum OperatorSource {
    Registered {
        identifier: String,
        provider: String,
        version: String,
    },
    Local,
}

/// An operator's identity plus its declared inputs and outputs
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDefinition {
    source: OperatorSource,
    name: String,
    inputs: Vec<VariableDecl>,
    outputs: Vec<VariableDecl>,
}

impl OperatorDefinition {
    pub fn registered(
        identifier: impl Into<String>,
        provider: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            source: OperatorSource::Registered {
                identifier,
                provider: provider.into(),
                version: version.into(),
            },
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Operator defined in-process, identified by content
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            source: OperatorSource::Local,
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, decl: VariableDecl) -> Self {
        self.inputs.push(decl);
        self
    }

    pub fn output(mut self, decl: VariableDecl) -> Self {
        self.outputs.push(decl);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[VariableDecl] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[VariableDecl] {
        &self.outputs
    }

    pub fn is_registered(&self) -> bool {
        matches!(self.source, OperatorSource::Registered { .. })
    }

    /// Reference stored on steps; local operators hash their declarations
    pub fn reference(&self) -> OperatorRef {
        match &self.source {
            OperatorSource::Registered {
                identifier,
                provider,
                version,
            } => OperatorRef::registered(identifier, provider, version),
            OperatorSource::Local => OperatorRef::Unregistered { guid: self.guid() },
        }
    }

    fn guid(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.name.as_bytes());
        for spec in [IoSpec::from_decls(&self.inputs), IoSpec::from_decls(&self.outputs)] {
            // IoSpec holds only strings, numbers and maps
            if let Ok(json) = serde_json::to_vec(&spec) {
                hasher.update(&json);
            }
        }
        let hex = hasher.finalize().to_hex();
        hex.as_str()[..32].to_string()
    }

    /// Serializable form kept by operator registries
    pub fn to_manifest(&self) -> OperatorManifest {
        let reference = self.reference();
        let (identifier, provider, version, guid) = match reference {
            OperatorRef::Registered {
                identifier,
                provider,
                version,
            } => (Some(identifier), Some(provider), Some(version), None),
            OperatorRef::Unregistered { guid } => (None, None, None, Some(guid)),
        };

        OperatorManifest {
            metadata: OperatorMetadata {
                name: self.name.clone(),
                identifier,
                provider,
                version,
                guid,
            },
            spec: OperatorSpec {
                inputs: IoSpec::from_decls(&self.inputs),
                outputs: IoSpec::from_decls(&self.outputs),
            },
        }
    }

    pub fn from_manifest(manifest: OperatorManifest) -> FlowspecResult<Self> {
        let metadata = manifest.metadata;
        let source = match (metadata.identifier, metadata.provider, metadata.version) {
            (Some(identifier), Some(provider), Some(version)) => OperatorSource::Registered {
                identifier,
                provider,
                version,
            },
            (None, None, None) => OperatorSource::Local,
            _ => {
                return Err(FlowspecError::schema(format!(
                    "operator '{}' must carry identifier, provider and version together",
                    metadata.name
                )))
            }
        };

        let definition = Self {
            source,
            name: metadata.name,
            inputs: manifest.spec.inputs.to_decls(),
            outputs: manifest.spec.outputs.to_decls(),
        };

        if let (Some(expected), OperatorRef::Unregistered { guid }) =
            (metadata.guid, definition.reference())
        {
            if expected != guid {
                return Err(FlowspecError::schema(format!(
                    "operator '{}' guid {} does not match its declarations",
                    definition.name, expected
                )));
            }
        }

        Ok(definition)
    }
}

/// Wire form of an operator definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorManifest {
    pub metadata: OperatorMetadata,
    pub spec: OperatorSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorMetadata {
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

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatorSpec {
    #[serde(default)]
    pub inputs: IoSpec,
    #[serde(default)]
    pub outputs: IoSpec,
}

/// Operator definitions known to a manifest loader, keyed by reference
#[derive(Debug, Clone, Default)]
pub struct OperatorCatalog {
    operators: BTreeMap<String, OperatorDefinition>,
}

impl OperatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: OperatorDefinition) {
        self.operators
            .insert(definition.reference().key(), definition);
    }

    pub fn with(mut self, definition: OperatorDefinition) -> Self {
        self.insert(definition);
        self
    }

    pub fn get(&self, reference: &OperatorRef) -> Option<&OperatorDefinition> {
        self.operators.get(&reference.key())
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
