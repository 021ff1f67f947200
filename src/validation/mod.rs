//! Pipeline validation
//!
//! The validator walks a decoded [`PipelineConfig`] depth-first and builds the
//! typed [`Pipeline`] as it goes. The first structural problem stops the walk
//! and is returned with its location. Duplicate stage names are checked in a
//! second pass over the finished tree and reported once, in aggregate.

pub mod error;

pub use error::{FieldError, FieldPath, FieldResultExt, PathSegment};

use crate::core::config::{
    AgentConfig, EnvVarConfig, LoopConfig, PipelineConfig, PostConfig, RootOptionsConfig,
    StageConfig, StageOptionsConfig, StashConfig, StepConfig, TimeoutConfig, UnstashConfig,
};
use crate::core::{
    Agent, EnvVar, Loop, Pipeline, Post, PostAction, PostCondition, RootOptions, Stage,
    StageBody, StageOptions, Stash, Step, StepAction, Timeout, TimeoutUnit, Unstash,
};
use std::collections::BTreeMap;

const STAGE_BRANCHES: [&str; 3] = ["steps", "stages", "parallel"];
const STEP_KINDS: [&str; 3] = ["command", "step", "loop"];

/// Check a decoded pipeline, returning the first problem found
pub fn validate(config: &PipelineConfig) -> Result<(), FieldError> {
    Validator::new(config).validate().map(|_| ())
}

/// Validator for pipeline documents
pub struct Validator<'a> {
    config: &'a PipelineConfig,
}

/// The one populated branch of a stage
enum Branch<'a> {
    Steps(&'a [StepConfig]),
    Stages(&'a [StageConfig]),
    Parallel(&'a [StageConfig]),
}

/// The one populated kind of a step
enum Kind<'a> {
    Command(&'a str),
    Named(&'a str),
    Loop(&'a LoopConfig),
}

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Validate the whole document and build the typed pipeline
    pub fn validate(&self) -> Result<Pipeline, FieldError> {
        let config = self.config;

        let agent = parse_agent(config.agent.as_ref()).via_field("agent")?;
        let options = parse_root_options(config.options.as_ref()).via_field("options")?;
        let environment = parse_environment(&config.environment)?;
        let post = parse_post(&config.post)?;
        let stages = parse_stage_list(&config.stages, "stages", agent.is_some())?;

        let pipeline = Pipeline {
            agent,
            options,
            environment,
            post,
            stages,
        };

        check_unique_stage_names(&pipeline)?;

        Ok(pipeline)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// `'a', 'b'` sorted by the quoted form
fn quoted_list<'n>(names: impl IntoIterator<Item = &'n str>) -> String {
    let mut quoted: Vec<String> = names.into_iter().map(|n| format!("'{}'", n)).collect();
    quoted.sort();
    quoted.join(", ")
}

fn parse_agent(agent: Option<&AgentConfig>) -> Result<Option<Agent>, FieldError> {
    let Some(agent) = agent else {
        return Ok(None);
    };

    match (non_empty(agent.image.as_deref()), non_empty(agent.label.as_deref())) {
        (Some(_), Some(_)) => Err(FieldError::multiple_one_of(&["label", "image"])),
        (Some(image), None) => Ok(Some(Agent::Image(image.to_string()))),
        (None, Some(label)) => Ok(Some(Agent::Label(label.to_string()))),
        (None, None) => Ok(None),
    }
}

fn parse_timeout(timeout: Option<&TimeoutConfig>) -> Result<Option<Timeout>, FieldError> {
    let Some(timeout) = timeout else {
        return Ok(None);
    };

    if timeout.time <= 0 {
        return Err(FieldError::new("Timeout must be greater than zero", &["time"]));
    }

    let unit = match non_empty(timeout.unit.as_deref()) {
        None => TimeoutUnit::Seconds,
        Some(unit) => unit.parse().map_err(|_| {
            let valid: Vec<&str> = TimeoutUnit::ALL.iter().map(|u| u.as_str()).collect();
            FieldError::new(
                format!(
                    "{} is not a valid time unit. Valid time units are {}",
                    unit,
                    valid.join(", ")
                ),
                &["unit"],
            )
        })?,
    };

    Ok(Some(Timeout {
        time: timeout.time.unsigned_abs(),
        unit,
    }))
}

fn parse_retry(retry: i32) -> Result<u32, FieldError> {
    u32::try_from(retry)
        .map_err(|_| FieldError::new("Retry count cannot be negative", &["retry"]))
}

fn parse_root_options(options: Option<&RootOptionsConfig>) -> Result<RootOptions, FieldError> {
    let Some(options) = options else {
        return Ok(RootOptions::default());
    };

    Ok(RootOptions {
        timeout: parse_timeout(options.timeout.as_ref()).via_field("timeout")?,
        retry: parse_retry(options.retry)?,
    })
}

fn parse_stash(stash: Option<&StashConfig>) -> Result<Option<Stash>, FieldError> {
    let Some(stash) = stash else {
        return Ok(None);
    };
    if stash.name.is_empty() {
        return Err(FieldError::new("The stash name must be provided", &["name"]));
    }
    if stash.files.is_empty() {
        return Err(FieldError::new("files to stash must be provided", &["files"]));
    }
    Ok(Some(Stash {
        name: stash.name.clone(),
        files: stash.files.clone(),
    }))
}

fn parse_unstash(unstash: Option<&UnstashConfig>) -> Result<Option<Unstash>, FieldError> {
    let Some(unstash) = unstash else {
        return Ok(None);
    };
    if unstash.name.is_empty() {
        return Err(FieldError::new("The unstash name must be provided", &["name"]));
    }
    Ok(Some(Unstash {
        name: unstash.name.clone(),
        dir: non_empty(unstash.dir.as_deref()).map(str::to_string),
    }))
}

fn parse_stage_options(options: Option<&StageOptionsConfig>) -> Result<StageOptions, FieldError> {
    let Some(options) = options else {
        return Ok(StageOptions::default());
    };

    Ok(StageOptions {
        timeout: parse_timeout(options.timeout.as_ref()).via_field("timeout")?,
        retry: parse_retry(options.retry)?,
        workspace: non_empty(options.workspace.as_deref()).map(str::to_string),
        stash: parse_stash(options.stash.as_ref()).via_field("stash")?,
        unstash: parse_unstash(options.unstash.as_ref()).via_field("unstash")?,
    })
}

fn parse_environment(environment: &[EnvVarConfig]) -> Result<Vec<EnvVar>, FieldError> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut vars = Vec::with_capacity(environment.len());

    for (i, var) in environment.iter().enumerate() {
        if var.name.is_empty() {
            return Err(FieldError::missing_field("name").via_field_index("environment", i));
        }
        *counts.entry(var.name.as_str()).or_default() += 1;
        vars.push(EnvVar::new(&var.name, &var.value));
    }

    let duplicates: Vec<&str> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name)
        .collect();
    if !duplicates.is_empty() {
        return Err(
            FieldError::new("Environment variable names must be unique", &["environment"])
                .with_details(format!(
                    "The following environment variable names are used more than once: {}",
                    quoted_list(duplicates)
                )),
        );
    }

    Ok(vars)
}

fn parse_post(post: &[PostConfig]) -> Result<Vec<Post>, FieldError> {
    post.iter()
        .enumerate()
        .map(|(i, p)| parse_post_entry(p).via_field_index("post", i))
        .collect()
}

fn parse_post_entry(post: &PostConfig) -> Result<Post, FieldError> {
    let condition: PostCondition = post.condition.parse().map_err(|_| {
        let valid: Vec<&str> = PostCondition::ALL.iter().map(|c| c.as_str()).collect();
        FieldError::new(
            format!(
                "{} is not a valid post condition. Valid conditions are {}",
                post.condition,
                valid.join(", ")
            ),
            &["condition"],
        )
    })?;

    let mut actions = Vec::with_capacity(post.actions.len());
    for (i, action) in post.actions.iter().enumerate() {
        if action.name.is_empty() {
            return Err(FieldError::missing_field("name").via_field_index("actions", i));
        }
        actions.push(PostAction {
            name: action.name.clone(),
            options: action.options.clone(),
        });
    }

    Ok(Post { condition, actions })
}

/// Validate a list of sibling stages held under `field`
fn parse_stage_list(
    stages: &[StageConfig],
    field: &str,
    agent_available: bool,
) -> Result<Vec<Stage>, FieldError> {
    if stages.is_empty() {
        return Err(FieldError::missing_field(field));
    }

    stages
        .iter()
        .enumerate()
        .map(|(i, stage)| parse_stage(stage, agent_available).via_field_index(field, i))
        .collect()
}

fn stage_branch(stage: &StageConfig) -> Result<Branch<'_>, FieldError> {
    match (
        stage.steps.is_empty(),
        stage.stages.is_empty(),
        stage.parallel.is_empty(),
    ) {
        (false, true, true) => Ok(Branch::Steps(&stage.steps)),
        (true, false, true) => Ok(Branch::Stages(&stage.stages)),
        (true, true, false) => Ok(Branch::Parallel(&stage.parallel)),
        (true, true, true) => Err(FieldError::missing_one_of(&STAGE_BRANCHES)),
        _ => Err(FieldError::multiple_one_of(&STAGE_BRANCHES)),
    }
}

fn parse_stage(stage: &StageConfig, parent_agent_available: bool) -> Result<Stage, FieldError> {
    let branch = stage_branch(stage)?;

    if !stage.name.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(FieldError::new(
            "Stage name must contain at least one ASCII letter",
            &["name"],
        ));
    }

    let agent = parse_agent(stage.agent.as_ref()).via_field("agent")?;
    let agent_available = parent_agent_available || agent.is_some();
    if matches!(branch, Branch::Steps(_)) && !agent_available {
        return Err(FieldError::new(
            "No agent specified for stage or for its parent(s)",
            &["agent"],
        ));
    }

    let options = parse_stage_options(stage.options.as_ref()).via_field("options")?;
    let environment = parse_environment(&stage.environment)?;
    let post = parse_post(&stage.post)?;

    let body = match branch {
        Branch::Steps(steps) => StageBody::Steps(parse_step_list(steps)?),
        Branch::Stages(stages) => {
            StageBody::Stages(parse_stage_list(stages, "stages", agent_available)?)
        }
        Branch::Parallel(stages) => {
            StageBody::Parallel(parse_stage_list(stages, "parallel", agent_available)?)
        }
    };

    Ok(Stage {
        name: stage.name.clone(),
        agent,
        options,
        environment,
        post,
        body,
    })
}

fn parse_step_list(steps: &[StepConfig]) -> Result<Vec<Step>, FieldError> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| parse_step(step).via_field_index("steps", i))
        .collect()
}

fn step_kind(step: &StepConfig) -> Result<Kind<'_>, FieldError> {
    // `loop: {}` counts as absent
    let lp = step.loop_.as_ref().filter(|l| **l != LoopConfig::default());

    match (
        non_empty(step.command.as_deref()),
        non_empty(step.step.as_deref()),
        lp,
    ) {
        (Some(command), None, None) => Ok(Kind::Command(command)),
        (None, Some(name), None) => Ok(Kind::Named(name)),
        (None, None, Some(lp)) => Ok(Kind::Loop(lp)),
        (None, None, None) => Err(FieldError::missing_one_of(&STEP_KINDS)),
        _ => Err(FieldError::multiple_one_of(&STEP_KINDS)),
    }
}

fn parse_step(step: &StepConfig) -> Result<Step, FieldError> {
    let kind = step_kind(step)?;

    if matches!(kind, Kind::Command(_) | Kind::Loop(_)) && !step.options.is_empty() {
        return Err(FieldError::new(
            "Cannot set options for a command or a loop",
            &["options"],
        ));
    }
    if matches!(kind, Kind::Named(_) | Kind::Loop(_)) && !step.args.is_empty() {
        return Err(FieldError::new(
            "Cannot set command-line arguments for a step or a loop",
            &["args"],
        ));
    }

    let action = match kind {
        Kind::Command(command) => StepAction::Command {
            command: command.to_string(),
            args: step.args.clone(),
        },
        Kind::Named(name) => StepAction::Named {
            name: name.to_string(),
            options: step.options.clone(),
        },
        Kind::Loop(lp) => StepAction::Loop(parse_loop(lp).via_field("loop")?),
    };

    Ok(Step {
        action,
        agent: parse_agent(step.agent.as_ref()).via_field("agent")?,
        dir: non_empty(step.dir.as_deref()).map(str::to_string),
    })
}

fn parse_loop(lp: &LoopConfig) -> Result<Loop, FieldError> {
    if lp.variable.is_empty() {
        return Err(FieldError::missing_field("variable"));
    }
    if lp.steps.is_empty() {
        return Err(FieldError::missing_field("steps"));
    }
    if lp.values.is_empty() {
        return Err(FieldError::missing_field("values"));
    }

    Ok(Loop {
        variable: lp.variable.clone(),
        values: lp.values.clone(),
        steps: parse_step_list(&lp.steps)?,
    })
}

fn check_unique_stage_names(pipeline: &Pipeline) -> Result<(), FieldError> {
    let duplicates = pipeline.duplicate_stage_names();
    if duplicates.is_empty() {
        return Ok(());
    }

    Err(FieldError::new("Stage names must be unique", &[]).with_details(format!(
        "The following stage names are used more than once: {}",
        quoted_list(duplicates)
    )))
}
