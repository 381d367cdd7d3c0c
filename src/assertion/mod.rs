//! Assertions and their predicates
//!
//! An [`Assertion`] pairs a [`ResourceSelector`] with a [`Predicate`] over the
//! descriptor the provider returns for it. Assertions are plain data, usually
//! built from an assertions file (see [`file`]).

pub mod file;

use crate::client::{ResourceDescriptor, ResourceSelector};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A predicate could not be evaluated against a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateFault {
    #[error("attribute '{0}' missing from resource")]
    MissingAttribute(String),

    #[error("{0}")]
    Other(String),
}

/// Verdict of a predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub passed: bool,
    pub detail: Option<String>,
}

impl Outcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            detail: None,
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

pub type CustomPredicate =
    Arc<dyn Fn(&ResourceDescriptor) -> Result<Outcome, PredicateFault> + Send + Sync>;

/// Expectation about a fetched resource
#[derive(Clone)]
pub enum Predicate {
    /// Passes for any descriptor; the fetch itself is the check
    Exists,
    StateEquals(String),
    AttributeEquals { name: String, value: String },
    AttributeContains { name: String, needle: String },
    /// Every inner predicate must pass; the first failure is reported
    All(Vec<Predicate>),
    Custom(CustomPredicate),
}

impl Predicate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ResourceDescriptor) -> Result<Outcome, PredicateFault> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn evaluate(&self, descriptor: &ResourceDescriptor) -> Result<Outcome, PredicateFault> {
        match self {
            Self::Exists => Ok(Outcome::pass()),
            Self::StateEquals(expected) => {
                if descriptor.state == *expected {
                    Ok(Outcome::pass())
                } else {
                    Ok(Outcome::fail(format!(
                        "expected state '{}', found '{}'",
                        expected, descriptor.state
                    )))
                }
            }
            Self::AttributeEquals { name, value } => {
                let actual = required_attribute(descriptor, name)?;
                if actual == value {
                    Ok(Outcome::pass())
                } else {
                    Ok(Outcome::fail(format!(
                        "expected {name} = '{value}', found '{actual}'"
                    )))
                }
            }
            Self::AttributeContains { name, needle } => {
                let actual = required_attribute(descriptor, name)?;
                if actual.contains(needle.as_str()) {
                    Ok(Outcome::pass())
                } else {
                    Ok(Outcome::fail(format!(
                        "expected {name} to contain '{needle}', found '{actual}'"
                    )))
                }
            }
            Self::All(predicates) => {
                for predicate in predicates {
                    let outcome = predicate.evaluate(descriptor)?;
                    if !outcome.passed {
                        return Ok(outcome);
                    }
                }
                Ok(Outcome::pass())
            }
            Self::Custom(f) => f(descriptor),
        }
    }
}

fn required_attribute<'a>(
    descriptor: &'a ResourceDescriptor,
    name: &str,
) -> Result<&'a str, PredicateFault> {
    descriptor
        .attribute(name)
        .ok_or_else(|| PredicateFault::MissingAttribute(name.to_string()))
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => write!(f, "Exists"),
            Self::StateEquals(s) => f.debug_tuple("StateEquals").field(s).finish(),
            Self::AttributeEquals { name, value } => f
                .debug_struct("AttributeEquals")
                .field("name", name)
                .field("value", value)
                .finish(),
            Self::AttributeContains { name, needle } => f
                .debug_struct("AttributeContains")
                .field("name", name)
                .field("needle", needle)
                .finish(),
            Self::All(inner) => f.debug_tuple("All").field(inner).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// One declared expectation
#[derive(Debug, Clone)]
pub struct Assertion {
    pub selector: ResourceSelector,
    pub predicate: Predicate,
    pub description: String,
}

impl Assertion {
    pub fn new(
        description: impl Into<String>,
        selector: ResourceSelector,
        predicate: Predicate,
    ) -> Self {
        Self {
            selector,
            predicate,
            description: description.into(),
        }
    }
}

/// Outcome of evaluating one assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionResult {
    pub description: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AssertionResult {
    pub fn from_outcome(description: &str, outcome: Outcome) -> Self {
        Self {
            description: description.to_string(),
            passed: outcome.passed,
            detail: outcome.detail,
        }
    }

    pub fn failed(description: &str, detail: impl Into<String>) -> Self {
        Self::from_outcome(description, Outcome::fail(detail))
    }
}
