//! CLI command definitions

use crate::compiler::{GenerateOptions, PodTemplate};
use anyhow::{Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Validate a pipeline document
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Print the validated pipeline as JSON
    #[arg(long)]
    pub json: bool,
}

/// Generate graph, task and structure documents
#[derive(Debug, Args, Clone)]
pub struct CompileCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub generate: GenerateArgs,

    /// Output in JSON format instead of YAML
    #[arg(long)]
    pub json: bool,

    /// Write one file per document into this directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Show the stage tree of a pipeline
#[derive(Debug, Args, Clone)]
pub struct StructureCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub generate: GenerateArgs,
}

/// Parameters for generation that do not come from the pipeline document
#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// Name of the source repository
    #[arg(long, default_value = "pipeline")]
    pub repo: String,

    /// Run identifier (random when omitted)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Namespace of the generated documents
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Suffix appended to generated names
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// YAML file mapping agent labels to pod templates
    #[arg(long)]
    pub pod_templates: Option<PathBuf>,

    /// Pod template for one agent label (label=image)
    #[arg(long, value_parser = parse_key_value)]
    pub pod_template: Vec<(String, String)>,
}

impl GenerateArgs {
    pub fn to_options(&self) -> Result<GenerateOptions> {
        let run_id = self
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut templates: BTreeMap<String, PodTemplate> = match &self.pod_templates {
            Some(path) => {
                let content = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read pod templates from {}", path.display())
                })?;
                serde_yaml::from_str(&content).with_context(|| {
                    format!("Failed to parse pod templates in {}", path.display())
                })?
            }
            None => BTreeMap::new(),
        };
        for (label, image) in &self.pod_template {
            templates.insert(label.clone(), PodTemplate::new(image));
        }

        Ok(GenerateOptions::new(&self.repo, run_id)
            .with_namespace(&self.namespace)
            .with_suffix(&self.suffix)
            .with_pod_templates(templates))
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
