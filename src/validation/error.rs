//! Located validation errors
//!
//! A [`FieldError`] keeps its location as structured path segments. Segments
//! are prepended while the validator unwinds (`via_field`, `via_field_index`)
//! and only turned into text when the error is displayed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a path into the pipeline document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    /// `name`
    Field(String),
    /// `name[index]`
    Index(String, usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::Index(name, index) => write!(f, "{}[{}]", name, index),
        }
    }
}

/// Location of one offending field, outermost segment first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPath(pub Vec<PathSegment>);

impl FieldPath {
    pub fn field(name: impl Into<String>) -> Self {
        FieldPath(vec![PathSegment::Field(name.into())])
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    fn prepend(&mut self, segment: PathSegment) {
        self.0.insert(0, segment);
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// A validation failure with the field(s) it applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Human-readable description
    pub message: String,

    /// Every field the message applies to; empty for whole-document errors
    pub paths: Vec<FieldPath>,

    /// Extra information, such as the list of duplicated names
    pub details: Option<String>,
}

impl FieldError {
    pub fn new(message: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            message: message.into(),
            paths: fields.iter().map(|f| FieldPath::field(*f)).collect(),
            details: None,
        }
    }

    /// A required field is absent or empty
    pub fn missing_field(field: &str) -> Self {
        Self::new("missing field(s)", &[field])
    }

    /// None of a set of mutually exclusive fields is set
    pub fn missing_one_of(fields: &[&str]) -> Self {
        Self::new("expected exactly one, got neither", fields)
    }

    /// More than one of a set of mutually exclusive fields is set
    pub fn multiple_one_of(fields: &[&str]) -> Self {
        Self::new("expected exactly one, got both", fields)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Nest this error under `field`
    pub fn via_field(mut self, field: &str) -> Self {
        for path in &mut self.paths {
            path.prepend(PathSegment::Field(field.to_string()));
        }
        self
    }

    /// Nest this error under element `index` of the list `field`
    pub fn via_field_index(mut self, field: &str, index: usize) -> Self {
        for path in &mut self.paths {
            path.prepend(PathSegment::Index(field.to_string(), index));
        }
        self
    }

    /// Paths rendered as dotted strings, e.g. `stages[0].steps[1].loop.variable`
    pub fn rendered_paths(&self) -> Vec<String> {
        self.paths.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.paths.is_empty() {
            write!(f, ": {}", self.rendered_paths().join(", "))?;
        }
        if let Some(details) = &self.details {
            write!(f, "\n{}", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

/// `via_field` helpers for validator results
pub trait FieldResultExt {
    fn via_field(self, field: &str) -> Self;
    fn via_field_index(self, field: &str, index: usize) -> Self;
}

impl<T> FieldResultExt for Result<T, FieldError> {
    fn via_field(self, field: &str) -> Self {
        self.map_err(|e| e.via_field(field))
    }

    fn via_field_index(self, field: &str, index: usize) -> Self {
        self.map_err(|e| e.via_field_index(field, index))
    }
}
