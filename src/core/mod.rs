//! Core domain models for pipelines
//!
//! This module defines the decoded pipeline document and the typed
//! intermediate representation that the compiler lowers into task graphs.

pub mod config;
pub mod options;
pub mod pipeline;
pub mod step;

pub use options::*;
pub use pipeline::*;
pub use step::*;
