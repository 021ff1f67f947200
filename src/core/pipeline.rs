//! Pipeline domain model
//!
//! The typed tree produced by the validator. Every "exactly one of" choice in
//! the source document is an enum here, so code walking a [`Pipeline`] never
//! has to re-check field combinations.

use crate::core::{
    options::{Post, RootOptions, StageOptions},
    step::Step,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a step's container runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    /// Run directly in this container image
    Image(String),
    /// Look up the image in a pod template registered under this label
    Label(String),
}

/// A name/value pair exported into step containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A validated pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Default agent for stages that declare none
    pub agent: Option<Agent>,

    /// Pipeline-wide options
    pub options: RootOptions,

    /// Environment visible to every step
    pub environment: Vec<EnvVar>,

    /// Post-build actions
    pub post: Vec<Post>,

    /// Top-level stages, executed in order
    pub stages: Vec<Stage>,
}

/// A named node of the stage tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Human-readable, globally unique name
    pub name: String,

    /// Overrides the agent inherited from ancestors
    pub agent: Option<Agent>,

    pub options: StageOptions,

    /// Added on top of the ancestors' environment
    pub environment: Vec<EnvVar>,

    pub post: Vec<Post>,

    pub body: StageBody,
}

/// What a stage contains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageBody {
    /// A leaf stage; lowers to exactly one task
    Steps(Vec<Step>),
    /// Children run one after another
    Stages(Vec<Stage>),
    /// Children run concurrently
    Parallel(Vec<Stage>),
}

impl Pipeline {
    /// Number of leaf stages in the whole tree
    pub fn leaf_count(&self) -> usize {
        self.stages.iter().map(Stage::leaf_count).sum()
    }

    /// All stage names in depth-first order, duplicates included
    pub fn stage_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for stage in &self.stages {
            stage.collect_names(&mut names);
        }
        names
    }

    /// Stage names that occur more than once anywhere in the tree, sorted
    pub fn duplicate_stage_names(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for name in self.stage_names() {
            *counts.entry(name).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name)
            .collect()
    }
}

impl Stage {
    /// Nested stages, if this is a group
    pub fn children(&self) -> &[Stage] {
        match &self.body {
            StageBody::Steps(_) => &[],
            StageBody::Stages(stages) | StageBody::Parallel(stages) => stages,
        }
    }

    fn leaf_count(&self) -> usize {
        match &self.body {
            StageBody::Steps(_) => 1,
            StageBody::Stages(stages) | StageBody::Parallel(stages) => {
                stages.iter().map(Stage::leaf_count).sum()
            }
        }
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        names.push(&self.name);
        for child in self.children() {
            child.collect_names(names);
        }
    }
}
