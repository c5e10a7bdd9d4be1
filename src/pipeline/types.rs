// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Parameter and artifact type system
//!
//! Declared types for pipeline variables, the compatibility rules used when
//! one variable is bound to another, and literal value validators.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    Int,
    Double,
    Bool,
    Map,
    Array,
}

impl ParameterType {
    /// Check whether a literal matches this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Double => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Map => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    /// Check whether a variable of type `source` may feed a variable of this type
    pub fn accepts_source(&self, source: ParameterType) -> bool {
        *self == source || (*self == Self::Double && source == Self::Int)
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::Int => write!(f, "Int"),
            Self::Double => write!(f, "Double"),
            Self::Bool => write!(f, "Bool"),
            Self::Map => write!(f, "Map"),
            Self::Array => write!(f, "Array"),
        }
    }
}

/// Whether a literal is a run-time template such as `{{item}}`
pub fn is_template(value: &Value) -> bool {
    value
        .as_str()
        .map(|s| s.contains("{{") && s.contains("}}"))
        .unwrap_or(false)
}

/// Kind of data an artifact carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    DataSet,
    Model,
    Any,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataSet => write!(f, "DataSet"),
            Self::Model => write!(f, "Model"),
            Self::Any => write!(f, "Any"),
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DataSet" => Ok(Self::DataSet),
            "Model" => Ok(Self::Model),
            "Any" => Ok(Self::Any),
            _ => Err(format!("Unknown artifact data type: {}", s)),
        }
    }
}

/// Where an artifact is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationType {
    #[serde(rename = "OSS")]
    Oss,
    MaxComputeTable,
    MaxComputeVolume,
    MaxComputeOfflineModel,
    Local,
}

/// Declared type of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ArtifactMetadataRepr", into = "ArtifactMetadataRepr")]
pub struct ArtifactType {
    pub data_type: DataType,
    pub location_type: Option<LocationType>,
    pub model_type: Option<String>,
}

impl ArtifactType {
    pub fn new(data_type: DataType, location_type: Option<LocationType>) -> Self {
        Self {
            data_type,
            location_type,
            model_type: None,
        }
    }

    pub fn dataset(location_type: LocationType) -> Self {
        Self::new(DataType::DataSet, Some(location_type))
    }

    pub fn model(location_type: LocationType, model_type: Option<String>) -> Self {
        Self {
            data_type: DataType::Model,
            location_type: Some(location_type),
            model_type,
        }
    }

    /// Check whether an artifact of type `source` may feed one of this type
    pub fn accepts_source(&self, source: &ArtifactType) -> bool {
        self.data_type == DataType::Any
            || source.data_type == DataType::Any
            || self.data_type == source.data_type
    }
}

/// Wire shape: `{type: {<DataType>: {locationType, modelType}}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactMetadataRepr {
    #[serde(rename = "type")]
    typ: BTreeMap<String, LocationRepr>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location_type: Option<LocationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_type: Option<String>,
}

impl TryFrom<ArtifactMetadataRepr> for ArtifactType {
    type Error = String;

    fn try_from(repr: ArtifactMetadataRepr) -> Result<Self, Self::Error> {
        if repr.typ.len() != 1 {
            return Err(format!(
                "artifact metadata must name exactly one data type, found {}",
                repr.typ.len()
            ));
        }
        let (data_type, location) = repr
            .typ
            .into_iter()
            .next()
            .ok_or_else(|| "artifact metadata has no data type".to_string())?;

        Ok(Self {
            data_type: data_type.parse()?,
            location_type: location.location_type,
            model_type: location.model_type,
        })
    }
}

impl From<ArtifactType> for ArtifactMetadataRepr {
    fn from(typ: ArtifactType) -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            typ.data_type.to_string(),
            LocationRepr {
                location_type: typ.location_type,
                model_type: typ.model_type,
            },
        );
        Self { typ: map }
    }
}

/// Constraints on a parameter's literal value (`feasible` in manifests)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValidator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl ParameterValidator {
    /// Inclusive numeric range
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    /// Closed set of allowed values
    pub fn one_of(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            allowed: Some(values.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Upper bound on string length
    pub fn max_length(len: usize) -> Self {
        Self {
            max_length: Some(len),
            ..Self::default()
        }
    }

    /// Check a literal against every configured constraint
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                return Err(format!("{} is not one of the allowed values", value));
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Err(format!("{} is below the minimum {}", n, min));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(format!("{} is above the maximum {}", n, max));
                }
            }
        }

        if let (Some(limit), Some(s)) = (self.max_length, value.as_str()) {
            if s.chars().count() > limit {
                return Err(format!("length {} exceeds {}", s.chars().count(), limit));
            }
        }

        Ok(())
    }
}
