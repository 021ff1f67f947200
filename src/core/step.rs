//! Step domain model

use crate::core::pipeline::Agent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single entry of a stage's step list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: StepAction,

    /// Overrides the stage agent for this step (and any looped steps)
    pub agent: Option<Agent>,

    /// Working directory override
    pub dir: Option<String>,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// Run a literal command in the step's container
    Command { command: String, args: Vec<String> },

    /// A reusable step referenced by name
    Named {
        name: String,
        options: BTreeMap<String, String>,
    },

    /// Repeat nested steps once per value
    Loop(Loop),
}

/// Repeats `steps` with `variable` bound to each of `values` in turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub variable: String,
    pub values: Vec<String>,
    pub steps: Vec<Step>,
}

impl Step {
    pub fn new(action: StepAction) -> Self {
        Self {
            action,
            agent: None,
            dir: None,
        }
    }

    /// Number of container steps this expands to once loops are unrolled
    pub fn expanded_len(&self) -> usize {
        match &self.action {
            StepAction::Command { .. } | StepAction::Named { .. } => 1,
            StepAction::Loop(lp) => {
                lp.values.len() * lp.steps.iter().map(Step::expanded_len).sum::<usize>()
            }
        }
    }
}
