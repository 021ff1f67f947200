//! Graph definition and task definition documents

use crate::core::EnvVar;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Name of the marker resource that only carries ordering
pub const ORDERING_RESOURCE: &str = "temp-ordering-resource";

/// Slot name under which every task binds the workspace
pub const WORKSPACE_SLOT: &str = "workspace";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("task '{task}' consumes output of unknown task '{from}'")]
    UnknownProducer { task: String, from: String },

    #[error("task graph contains a cycle through '{0}'")]
    Cycle(String),
}

/// Type tag of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Shared source checkout
    Workspace,
    /// Carries no payload
    Marker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredResource {
    pub name: String,
    pub kind: ResourceKind,
}

/// A task's use of a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBinding {
    /// Slot name inside the task
    pub name: String,

    /// Declared resource bound to the slot
    pub resource: String,

    /// Tasks whose output this input consumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<String>,
}

/// One entry of the graph definition's task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphTask {
    pub name: String,

    /// Name of the [`TaskDefinition`] this entry runs
    pub task_ref: String,

    pub inputs: Vec<ResourceBinding>,
    pub outputs: Vec<ResourceBinding>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// The executable graph: every task and the resources threading them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    pub resources: Vec<DeclaredResource>,
    pub tasks: Vec<GraphTask>,
}

impl GraphDefinition {
    pub fn task(&self, name: &str) -> Option<&GraphTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// `(producer, consumer)` pairs implied by the `from` references, in task
    /// order and without repeats
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = Vec::new();
        for task in &self.tasks {
            for input in &task.inputs {
                for from in &input.from {
                    let edge = (from.clone(), task.name.clone());
                    if !edges.contains(&edge) {
                        edges.push(edge);
                    }
                }
            }
        }
        edges
    }

    /// Names of the tasks that must finish before `name` starts
    pub fn predecessors(&self, name: &str) -> Vec<String> {
        self.edges()
            .into_iter()
            .filter(|(_, to)| to == name)
            .map(|(from, _)| from)
            .collect()
    }

    /// Task names in an order that respects every edge
    pub fn execution_order(&self) -> Result<Vec<String>, GraphError> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();

        for task in &self.tasks {
            nodes.insert(&task.name, graph.add_node(&task.name));
        }

        for task in &self.tasks {
            let to = nodes[task.name.as_str()];
            for input in &task.inputs {
                for from in &input.from {
                    let Some(&from_idx) = nodes.get(from.as_str()) else {
                        return Err(GraphError::UnknownProducer {
                            task: task.name.clone(),
                            from: from.clone(),
                        });
                    };
                    graph.update_edge(from_idx, to, ());
                }
            }
        }

        toposort(&graph, None)
            .map(|order| order.into_iter().map(|idx| graph[idx].to_string()).collect())
            .map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].to_string()))
    }
}

/// A declared input or output slot of a task definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResource {
    pub name: String,
    pub kind: ResourceKind,

    /// Mount point, set only where the workspace is first checked out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
}

/// A single container run by a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStep {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    pub working_dir: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// Generated for every leaf stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub inputs: Vec<TaskResource>,
    pub outputs: Vec<TaskResource>,
    pub steps: Vec<ContainerStep>,
}
