//! Test utility functions for pipeline-syntax

#![allow(dead_code)]

use pipeline_syntax::compiler::{
    generate, GenerateError, GenerateOptions, GeneratedPipeline, GraphTask, TaskDefinition,
};
use pipeline_syntax::core::config::PipelineConfig;
use pipeline_syntax::core::Pipeline;
use pipeline_syntax::validation::FieldError;

/// Options used by most scenarios: repository `repo`, run `run-1`
pub fn options() -> GenerateOptions {
    GenerateOptions::new("repo", "run-1")
}

/// Decode and validate, panicking on any error
pub fn parse(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .expect("pipeline YAML should decode")
        .to_pipeline()
        .unwrap_or_else(|e| panic!("pipeline should be valid, got: {}", e))
}

/// Decode, validate and generate with [`options`]
pub fn compile_yaml(yaml: &str) -> GeneratedPipeline {
    compile_yaml_with(yaml, &options())
}

pub fn compile_yaml_with(yaml: &str, options: &GenerateOptions) -> GeneratedPipeline {
    generate(&parse(yaml), options).unwrap_or_else(|e| panic!("generation failed: {}", e))
}

/// The validation error for a document expected to be invalid
pub fn validation_error(yaml: &str) -> FieldError {
    PipelineConfig::from_yaml(yaml)
        .expect("pipeline YAML should decode")
        .to_pipeline()
        .expect_err("pipeline should be invalid")
}

/// The generation error for a valid document that cannot be generated
pub fn generate_error(yaml: &str) -> GenerateError {
    generate(&parse(yaml), &options()).expect_err("generation should fail")
}

pub fn graph_task<'a>(generated: &'a GeneratedPipeline, name: &str) -> &'a GraphTask {
    generated
        .graph
        .task(name)
        .unwrap_or_else(|| panic!("no graph task named {}", name))
}

pub fn task_definition<'a>(generated: &'a GeneratedPipeline, name: &str) -> &'a TaskDefinition {
    generated
        .tasks
        .iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| panic!("no task definition named {}", name))
}

/// `from` list of the input bound to `slot`
pub fn input_from<'a>(task: &'a GraphTask, slot: &str) -> Vec<&'a str> {
    task.inputs
        .iter()
        .find(|i| i.name == slot)
        .unwrap_or_else(|| panic!("task {} has no input {}", task.name, slot))
        .from
        .iter()
        .map(String::as_str)
        .collect()
}

/// Environment of a container step as `NAME=value` strings
pub fn env_pairs(task: &TaskDefinition, step: usize) -> Vec<String> {
    task.steps[step]
        .env
        .iter()
        .map(|e| format!("{}={}", e.name, e.value))
        .collect()
}
