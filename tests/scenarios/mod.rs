//! Scenario-based tests for pipeline-syntax

mod determinism;
mod environment_and_loops;
mod validation_failures;
