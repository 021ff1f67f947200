//! Pipeline compiler
//!
//! Turns a validated [`Pipeline`] into three documents: the graph definition,
//! one task definition per leaf stage, and the structure document.

pub mod graph;
pub mod lowering;
pub mod mangle;
pub mod structure;

pub use graph::{
    ContainerStep, DeclaredResource, GraphDefinition, GraphError, GraphTask, ResourceBinding,
    ResourceKind, TaskDefinition, TaskResource,
};
pub use lowering::{generate, GenerateError};
pub use mangle::{mangle_to_rfc1035_label, numbered_suffix};
pub use structure::{PipelineStructure, StageNode, StructureError, StructureStage};

use crate::core::config::{DecodeError, PipelineConfig};
use crate::core::Pipeline;
use crate::validation::FieldError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Anything that can stop a compilation
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to write generated documents: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize generated documents: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("invalid pipeline: {0}")]
    Validation(#[from] FieldError),

    #[error("failed to generate pipeline: {0}")]
    Generate(#[from] GenerateError),
}

/// Container image behind an agent label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplate {
    pub image: String,
}

impl PodTemplate {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

/// Inputs to generation that are not part of the pipeline document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Repository the pipeline was read from; names the generated graph
    pub source_repo_name: String,
    pub run_id: String,
    pub namespace: String,
    /// Appended to generated names to keep runs apart
    pub suffix: String,
    pub pod_templates: BTreeMap<String, PodTemplate>,
}

impl GenerateOptions {
    pub fn new(source_repo_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            source_repo_name: source_repo_name.into(),
            run_id: run_id.into(),
            namespace: "default".to_string(),
            suffix: String::new(),
            pod_templates: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_pod_templates(mut self, pod_templates: BTreeMap<String, PodTemplate>) -> Self {
        self.pod_templates = pod_templates;
        self
    }

    /// Identifier shared by every generated document
    pub fn pipeline_id(&self) -> String {
        mangle_to_rfc1035_label(&self.source_repo_name, "")
    }
}

/// Everything produced by one successful compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPipeline {
    pub graph: GraphDefinition,
    pub tasks: Vec<TaskDefinition>,
    pub structure: PipelineStructure,
}

impl GeneratedPipeline {
    /// Write `graph.yaml`, `structure.yaml` and one `tasks/<name>.yaml` per
    /// task definition under `dir`
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, CompileError> {
        let tasks_dir = dir.join("tasks");
        std::fs::create_dir_all(&tasks_dir)?;

        let mut written = Vec::with_capacity(self.tasks.len() + 2);

        let graph_path = dir.join("graph.yaml");
        std::fs::write(&graph_path, serde_yaml::to_string(&self.graph)?)?;
        written.push(graph_path);

        for task in &self.tasks {
            let path = tasks_dir.join(format!("{}.yaml", task.name));
            std::fs::write(&path, serde_yaml::to_string(task)?)?;
            written.push(path);
        }

        let structure_path = dir.join("structure.yaml");
        std::fs::write(&structure_path, serde_yaml::to_string(&self.structure)?)?;
        written.push(structure_path);

        info!("Wrote {} documents to {}", written.len(), dir.display());
        Ok(written)
    }
}

/// Validate a decoded document and generate its documents
pub fn compile(
    config: &PipelineConfig,
    options: &GenerateOptions,
) -> Result<GeneratedPipeline, CompileError> {
    let pipeline: Pipeline = config.to_pipeline()?;
    Ok(generate(&pipeline, options)?)
}

/// Read, validate and generate a pipeline file
pub fn compile_file<P: AsRef<Path>>(
    path: P,
    options: &GenerateOptions,
) -> Result<GeneratedPipeline, CompileError> {
    let config = PipelineConfig::from_file(path)?;
    compile(&config, options)
}
