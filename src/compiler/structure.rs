//! Structure document
//!
//! The graph definition is flat. This document keeps the authored nesting so
//! a UI can draw stages the way they were written, cross-referenced to the
//! generated task names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("structure refers to unknown stage '{0}'")]
    UnknownStage(String),

    #[error("stage '{0}' is nested inside itself")]
    Cycle(String),
}

/// One record per stage, in depth-first pre-order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureStage {
    /// Stage name as authored
    pub name: String,

    /// Task definition generated for a leaf stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<String>,

    /// 0 for top-level stages
    pub depth: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Preceding sequential sibling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,

    /// Following sequential sibling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// Children run in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,

    /// Children run concurrently
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parallel: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStructure {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,

    /// Graph definition this document describes
    pub pipeline_ref: String,

    pub stages: Vec<StructureStage>,
}

/// A stage rebuilt from the flat records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNode {
    pub name: String,
    pub task_ref: Option<String>,
    /// Whether `children` run concurrently
    pub parallel: bool,
    pub children: Vec<StageNode>,
}

impl StageNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl PipelineStructure {
    pub fn stage(&self, name: &str) -> Option<&StructureStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Rebuild the stage tree
    pub fn to_tree(&self) -> Result<Vec<StageNode>, StructureError> {
        let by_name: BTreeMap<&str, &StructureStage> =
            self.stages.iter().map(|s| (s.name.as_str(), s)).collect();

        self.stages
            .iter()
            .filter(|s| s.parent.is_none())
            .map(|s| build_node(s, &by_name, &mut Vec::new()))
            .collect()
    }
}

/// `ancestors` holds the names on the path from the root to `record`
fn build_node<'s>(
    record: &'s StructureStage,
    by_name: &BTreeMap<&str, &'s StructureStage>,
    ancestors: &mut Vec<&'s str>,
) -> Result<StageNode, StructureError> {
    if ancestors.contains(&record.name.as_str()) {
        return Err(StructureError::Cycle(record.name.clone()));
    }

    let (parallel, names) = if record.parallel.is_empty() {
        (false, &record.stages)
    } else {
        (true, &record.parallel)
    };

    ancestors.push(&record.name);
    let mut children = Vec::with_capacity(names.len());
    for name in names {
        let child = by_name
            .get(name.as_str())
            .copied()
            .ok_or_else(|| StructureError::UnknownStage(name.clone()))?;
        children.push(build_node(child, by_name, ancestors)?);
    }
    ancestors.pop();

    Ok(StageNode {
        name: record.name.clone(),
        task_ref: record.task_ref.clone(),
        parallel,
        children,
    })
}
