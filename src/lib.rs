//! pipeline-syntax - compiles declarative stage/step pipelines into task graphs

pub mod cli;
pub mod compiler;
pub mod core;
pub mod validation;

// Re-export commonly used types
pub use compiler::{compile, compile_file, generate, CompileError, GenerateError, GenerateOptions};
pub use compiler::{GeneratedPipeline, GraphDefinition, PipelineStructure, PodTemplate, TaskDefinition};
pub use core::config::PipelineConfig;
pub use core::{Pipeline, Stage, StageBody, Step, StepAction};
pub use validation::{validate, FieldError};
