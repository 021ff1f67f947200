//! Pipeline document as decoded from YAML
//!
//! These structs mirror the authored text one-to-one: every "one of" choice
//! is an independent optional field, and enumerated values are kept as
//! strings. Nothing here is validated; [`PipelineConfig::to_pipeline`] runs
//! the validator and produces the typed IR.

use crate::core::Pipeline;
use crate::validation::{FieldError, Validator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading a pipeline document
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level pipeline document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Default agent for every stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    /// Pipeline-wide timeout and retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RootOptionsConfig>,

    /// Environment variables visible to every step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<EnvVarConfig>,

    /// Post-build actions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<PostConfig>,

    /// Top-level stages, in order
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

/// Either a container image or a pod template label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Amount of `unit`s; must be positive
    #[serde(default)]
    pub time: i64,

    /// One of seconds, minutes, hours, days (seconds when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Options allowed at the top of the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootOptionsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,

    #[serde(default)]
    pub retry: i32,
}

/// Options allowed on a stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageOptionsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,

    #[serde(default)]
    pub retry: i32,

    /// Logical workspace shared with nested stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stash: Option<StashConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unstash: Option<UnstashConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StashConfig {
    #[serde(default)]
    pub name: String,

    /// Glob of files to stash
    #[serde(default)]
    pub files: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnstashConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvVarConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostConfig {
    /// success, failure or always
    #[serde(default)]
    pub condition: String,

    #[serde(default)]
    pub actions: Vec<PostActionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostActionConfig {
    pub name: String,

    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Stage as written: exactly one of `steps`, `stages`, `parallel` is expected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<StageOptionsConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<EnvVarConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<PostConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parallel: Vec<StageConfig>,
}

/// Step as written: exactly one of `command`, `step`, `loop` is expected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, alias = "arguments", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Name of a reusable, parameterized step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    /// Parameters for a named `step`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,

    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_: Option<LoopConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    /// Working directory override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopConfig {
    #[serde(default)]
    pub variable: String,

    #[serde(default)]
    pub values: Vec<String>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    /// Load a pipeline document from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a pipeline document from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, DecodeError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check the document without keeping the typed result
    pub fn validate(&self) -> Result<(), FieldError> {
        self.to_pipeline().map(|_| ())
    }

    /// Validate and convert into the typed IR
    pub fn to_pipeline(&self) -> Result<Pipeline, FieldError> {
        Validator::new(self).validate()
    }
}
