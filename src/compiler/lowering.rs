//! Lowering of the stage tree into tasks
//!
//! A single recursive descent over the stages. Each leaf stage becomes one
//! task. Ordering between tasks is expressed through two resources that every
//! task consumes and produces: the workspace, and a marker resource with no
//! payload. An input's `from` list names the tasks it runs after.

use crate::compiler::graph::{
    ContainerStep, DeclaredResource, GraphDefinition, GraphTask, ResourceBinding, ResourceKind,
    TaskDefinition, TaskResource, ORDERING_RESOURCE, WORKSPACE_SLOT,
};
use crate::compiler::mangle::{mangle_to_rfc1035_label, numbered_suffix};
use crate::compiler::structure::{PipelineStructure, StructureStage};
use crate::compiler::{GenerateOptions, GeneratedPipeline};
use crate::core::{Agent, EnvVar, Pipeline, Stage, StageBody, Step, StepAction};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace};

/// Working directory of a step without a `dir`
pub const DEFAULT_WORKING_DIR: &str = "/workspace/workspace";

/// Mount point of the workspace in the first task
const WORKSPACE_TARGET_PATH: &str = "workspace";

/// Logical workspace of stages that do not name one
const DEFAULT_WORKSPACE: &str = "default";

/// Features the document accepts but generation does not handle
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("syntactic sugar steps not yet supported")]
    SyntacticSugarStep,

    #[error("post on stages not yet supported")]
    StagePost,

    #[error("Retry at top level not yet supported")]
    RootRetry,

    #[error("Timeout on stage not yet supported")]
    StageTimeout,

    #[error("no pod template found for agent label '{0}'")]
    UnknownPodTemplate(String),

    #[error("no agent specified for stage '{0}' or for its parent(s)")]
    NoAgent(String),
}

/// Inherited from ancestors, extended on the way down
#[derive(Debug, Clone)]
struct Scope<'p> {
    agent: Option<&'p Agent>,
    workspace: &'p str,
    env: BTreeMap<String, String>,
    depth: u32,
    parent: Option<&'p str>,
}

impl<'p> Scope<'p> {
    fn root(pipeline: &'p Pipeline) -> Self {
        Self {
            agent: pipeline.agent.as_ref(),
            workspace: DEFAULT_WORKSPACE,
            env: collect_env(BTreeMap::new(), &pipeline.environment),
            depth: 0,
            parent: None,
        }
    }

    /// Scope seen by the children and steps of `stage`
    fn enter(&self, stage: &'p Stage) -> Self {
        Self {
            agent: stage.agent.as_ref().or(self.agent),
            workspace: stage
                .options
                .workspace
                .as_deref()
                .unwrap_or(self.workspace),
            env: collect_env(self.env.clone(), &stage.environment),
            depth: self.depth + 1,
            parent: Some(&stage.name),
        }
    }
}

fn collect_env(mut env: BTreeMap<String, String>, vars: &[EnvVar]) -> BTreeMap<String, String> {
    for var in vars {
        env.insert(var.name.clone(), var.value.clone());
    }
    env
}

/// Tasks the next task must run after
#[derive(Debug, Clone, Default)]
struct Predecessors {
    /// Producers of the marker resource; several after a parallel group
    ordering: Vec<String>,
    /// Last task to use each logical workspace
    workspaces: BTreeMap<String, String>,
}

/// Sequential neighbours of a stage
#[derive(Debug, Clone, Copy, Default)]
struct Siblings<'p> {
    previous: Option<&'p str>,
    next: Option<&'p str>,
}

struct Lowering<'p> {
    options: &'p GenerateOptions,
    pipeline_id: String,
    labels: BTreeMap<String, String>,
    next_task: usize,
    graph_tasks: Vec<GraphTask>,
    task_definitions: Vec<TaskDefinition>,
    structure: Vec<StructureStage>,
}

/// Generate the graph, task and structure documents for a validated pipeline
pub fn generate(
    pipeline: &Pipeline,
    options: &GenerateOptions,
) -> Result<GeneratedPipeline, GenerateError> {
    if pipeline.options.retry > 0 {
        return Err(GenerateError::RootRetry);
    }
    if !pipeline.post.is_empty() {
        debug!("Pipeline post actions have no generated form, skipping");
    }

    let pipeline_id = options.pipeline_id();
    let mut labels = BTreeMap::new();
    labels.insert("pipeline".to_string(), pipeline_id.clone());
    labels.insert("run".to_string(), options.run_id.clone());

    debug!(
        "Generating pipeline '{}' ({} leaf stages)",
        pipeline_id,
        pipeline.leaf_count()
    );

    let mut lowering = Lowering {
        options,
        pipeline_id,
        labels,
        next_task: 0,
        graph_tasks: Vec::new(),
        task_definitions: Vec::new(),
        structure: Vec::new(),
    };

    lowering.lower_sequence(&pipeline.stages, &Scope::root(pipeline), Predecessors::default())?;

    Ok(lowering.finish(pipeline))
}

impl<'p> Lowering<'p> {
    fn finish(self, pipeline: &Pipeline) -> GeneratedPipeline {
        let graph = GraphDefinition {
            name: self.pipeline_id.clone(),
            namespace: self.options.namespace.clone(),
            labels: self.labels.clone(),
            timeout_seconds: pipeline.options.timeout.map(|t| t.as_seconds()),
            resources: vec![
                DeclaredResource {
                    name: self.pipeline_id.clone(),
                    kind: ResourceKind::Workspace,
                },
                DeclaredResource {
                    name: ORDERING_RESOURCE.to_string(),
                    kind: ResourceKind::Marker,
                },
            ],
            tasks: self.graph_tasks,
        };

        let structure = PipelineStructure {
            name: self.pipeline_id.clone(),
            namespace: self.options.namespace.clone(),
            labels: self.labels,
            pipeline_ref: self.pipeline_id,
            stages: self.structure,
        };

        GeneratedPipeline {
            graph,
            tasks: self.task_definitions,
            structure,
        }
    }

    /// Children run one after another, each after the previous one's task(s)
    fn lower_sequence(
        &mut self,
        stages: &'p [Stage],
        scope: &Scope<'p>,
        mut preds: Predecessors,
    ) -> Result<Predecessors, GenerateError> {
        for (i, stage) in stages.iter().enumerate() {
            let siblings = Siblings {
                previous: i.checked_sub(1).map(|p| stages[p].name.as_str()),
                next: stages.get(i + 1).map(|s| s.name.as_str()),
            };
            preds = self.lower_stage(stage, scope, preds, siblings)?;
        }
        Ok(preds)
    }

    /// Children all start from `preds`; whatever follows waits for every one
    fn lower_parallel(
        &mut self,
        stages: &'p [Stage],
        scope: &Scope<'p>,
        preds: Predecessors,
    ) -> Result<Predecessors, GenerateError> {
        let mut ordering = Vec::new();
        for stage in stages {
            let out = self.lower_stage(stage, scope, preds.clone(), Siblings::default())?;
            for task in out.ordering {
                if !ordering.contains(&task) {
                    ordering.push(task);
                }
            }
        }

        Ok(Predecessors {
            ordering,
            workspaces: preds.workspaces,
        })
    }

    fn lower_stage(
        &mut self,
        stage: &'p Stage,
        scope: &Scope<'p>,
        preds: Predecessors,
        siblings: Siblings<'p>,
    ) -> Result<Predecessors, GenerateError> {
        if !stage.post.is_empty() {
            return Err(GenerateError::StagePost);
        }
        if stage.options.timeout.is_some() {
            return Err(GenerateError::StageTimeout);
        }
        if stage.options.stash.is_some() || stage.options.unstash.is_some() {
            debug!(
                "Stage '{}': stash/unstash have no generated form, skipping",
                stage.name
            );
        }

        let mut record = StructureStage {
            name: stage.name.clone(),
            task_ref: None,
            depth: scope.depth,
            parent: scope.parent.map(str::to_string),
            previous: siblings.previous.map(str::to_string),
            next: siblings.next.map(str::to_string),
            stages: vec![],
            parallel: vec![],
        };
        let inner = scope.enter(stage);

        match &stage.body {
            StageBody::Steps(steps) => {
                let record_index = self.structure.len();
                self.structure.push(record);
                let (task_ref, preds) = self.lower_leaf(stage, steps, &inner, preds)?;
                self.structure[record_index].task_ref = Some(task_ref);
                Ok(preds)
            }
            StageBody::Stages(children) => {
                record.stages = children.iter().map(|c| c.name.clone()).collect();
                self.structure.push(record);
                self.lower_sequence(children, &inner, preds)
            }
            StageBody::Parallel(children) => {
                record.parallel = children.iter().map(|c| c.name.clone()).collect();
                self.structure.push(record);
                self.lower_parallel(children, &inner, preds)
            }
        }
    }

    /// Emit the task for a leaf stage, returning its definition name and the
    /// predecessors for whatever comes next
    fn lower_leaf(
        &mut self,
        stage: &Stage,
        steps: &[Step],
        scope: &Scope<'p>,
        mut preds: Predecessors,
    ) -> Result<(String, Predecessors), GenerateError> {
        self.next_task += 1;
        let first = self.next_task == 1;
        let task_suffix = numbered_suffix(&self.options.suffix, self.next_task);

        let name = mangle_to_rfc1035_label(&stage.name, &task_suffix);
        let definition_name = mangle_to_rfc1035_label(
            &format!("{}-{}", self.pipeline_id, stage.name),
            &task_suffix,
        );

        let mut container_steps =
            Vec::with_capacity(steps.iter().map(Step::expanded_len).sum());
        self.expand_steps(
            &stage.name,
            steps,
            scope.agent,
            None,
            &scope.env,
            &mut container_steps,
        )?;

        let workspace_from: Vec<String> = preds
            .workspaces
            .get(scope.workspace)
            .cloned()
            .into_iter()
            .collect();
        debug!(
            "Task '{}' for stage '{}': {} steps, after {:?}",
            name,
            stage.name,
            container_steps.len(),
            preds.ordering
        );

        self.graph_tasks.push(GraphTask {
            name: name.clone(),
            task_ref: definition_name.clone(),
            inputs: vec![
                ResourceBinding {
                    name: WORKSPACE_SLOT.to_string(),
                    resource: self.pipeline_id.clone(),
                    from: workspace_from,
                },
                ResourceBinding {
                    name: ORDERING_RESOURCE.to_string(),
                    resource: ORDERING_RESOURCE.to_string(),
                    from: preds.ordering,
                },
            ],
            outputs: vec![
                ResourceBinding {
                    name: WORKSPACE_SLOT.to_string(),
                    resource: self.pipeline_id.clone(),
                    from: vec![],
                },
                ResourceBinding {
                    name: ORDERING_RESOURCE.to_string(),
                    resource: ORDERING_RESOURCE.to_string(),
                    from: vec![],
                },
            ],
            retries: stage.options.retry,
        });

        self.task_definitions.push(TaskDefinition {
            name: definition_name.clone(),
            namespace: self.options.namespace.clone(),
            labels: self.labels.clone(),
            inputs: vec![
                TaskResource {
                    name: WORKSPACE_SLOT.to_string(),
                    kind: ResourceKind::Workspace,
                    target_path: first.then(|| WORKSPACE_TARGET_PATH.to_string()),
                },
                TaskResource {
                    name: ORDERING_RESOURCE.to_string(),
                    kind: ResourceKind::Marker,
                    target_path: None,
                },
            ],
            outputs: vec![
                TaskResource {
                    name: WORKSPACE_SLOT.to_string(),
                    kind: ResourceKind::Workspace,
                    target_path: None,
                },
                TaskResource {
                    name: ORDERING_RESOURCE.to_string(),
                    kind: ResourceKind::Marker,
                    target_path: None,
                },
            ],
            steps: container_steps,
        });

        preds.ordering = vec![name.clone()];
        preds.workspaces.insert(scope.workspace.to_string(), name);

        Ok((definition_name, preds))
    }

    /// Append one container step per command, unrolling loops in value order
    fn expand_steps(
        &self,
        stage_name: &str,
        steps: &[Step],
        agent: Option<&Agent>,
        dir: Option<&str>,
        env: &BTreeMap<String, String>,
        out: &mut Vec<ContainerStep>,
    ) -> Result<(), GenerateError> {
        for step in steps {
            let agent = step.agent.as_ref().or(agent);
            let dir = step.dir.as_deref().or(dir);

            match &step.action {
                StepAction::Command { command, args } => {
                    let image = self.resolve_image(stage_name, agent)?;
                    let container = ContainerStep {
                        name: format!("step{}", out.len() + 1),
                        image,
                        command: vec![command.clone()],
                        args: args.clone(),
                        working_dir: working_dir(dir),
                        env: env
                            .iter()
                            .map(|(name, value)| EnvVar::new(name, value))
                            .collect(),
                    };
                    trace!("{}: {} {:?}", container.name, command, args);
                    out.push(container);
                }
                StepAction::Named { .. } => return Err(GenerateError::SyntacticSugarStep),
                StepAction::Loop(lp) => {
                    for value in &lp.values {
                        let mut bound = env.clone();
                        bound.insert(lp.variable.clone(), value.clone());
                        self.expand_steps(stage_name, &lp.steps, agent, dir, &bound, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_image(
        &self,
        stage_name: &str,
        agent: Option<&Agent>,
    ) -> Result<String, GenerateError> {
        match agent {
            Some(Agent::Image(image)) => Ok(image.clone()),
            Some(Agent::Label(label)) => self
                .options
                .pod_templates
                .get(label)
                .map(|template| template.image.clone())
                .ok_or_else(|| GenerateError::UnknownPodTemplate(label.clone())),
            None => Err(GenerateError::NoAgent(stage_name.to_string())),
        }
    }
}

fn working_dir(dir: Option<&str>) -> String {
    match dir {
        None => DEFAULT_WORKING_DIR.to_string(),
        Some(dir) if dir.starts_with('/') => dir.to_string(),
        Some(dir) => format!("{}/{}", DEFAULT_WORKING_DIR, dir),
    }
}
