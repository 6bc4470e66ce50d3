//! Error types for model evaluation and state space exploration
//!
//! Two layers of failure exist:
//!
//! - [`Fault`]: raised by model callables (guards, rule bodies, start states,
//!   invariants, assumptions) while evaluating one candidate. Faults are
//!   caught at the per-candidate checkpoint inside the driver; the candidate is
//!   discarded (or, for assumptions, silently abandoned) and the search goes on.
//! - [`CheckError`]: run-level failures that end [`crate::ModelChecker::run`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fault raised while evaluating a model callable against one state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// 64-bit arithmetic over- or underflow (only with overflow checks on)
    #[error("integer overflow in {op}")]
    Overflow { op: &'static str },

    /// A value or array index outside its type's declared bounds
    #[error("{message}")]
    Range { message: String },

    /// Division or modulus by zero
    #[error("{op} by zero")]
    DivisionByZero { op: &'static str },

    /// An assumption failed; the current derivation is infeasible
    #[error("assumption {name:?} failed")]
    Assumption { name: String },

    /// An explicit error raised by the model itself
    #[error("{message}")]
    Model { message: String },
}

impl Fault {
    pub fn range(message: impl Into<String>) -> Self {
        Fault::Range {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Fault::Model {
            message: message.into(),
        }
    }

    pub fn assumption(name: impl Into<String>) -> Self {
        Fault::Assumption { name: name.into() }
    }

    /// Assumption failures abandon a candidate without being reported.
    #[inline]
    pub fn is_assumption(&self) -> bool {
        matches!(self, Fault::Assumption { .. })
    }

    /// The reporting category of this fault, or `None` for assumptions.
    pub fn kind(&self) -> Option<FaultKind> {
        match self {
            Fault::Overflow { .. } => Some(FaultKind::Overflow),
            Fault::Range { .. } => Some(FaultKind::Range),
            Fault::DivisionByZero { .. } => Some(FaultKind::DivisionByZero),
            Fault::Model { .. } => Some(FaultKind::Model),
            Fault::Assumption { .. } => None,
        }
    }
}

/// Category of a user-visible fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Overflow,
    Range,
    DivisionByZero,
    Model,
    Invariant,
    Deadlock,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::Overflow => "overflow",
            FaultKind::Range => "range error",
            FaultKind::DivisionByZero => "division by zero",
            FaultKind::Model => "model error",
            FaultKind::Invariant => "invariant violation",
            FaultKind::Deadlock => "deadlock",
        };
        f.write_str(s)
    }
}

/// A fault as it was reported during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub kind: FaultKind,
    pub message: String,
    /// The start state, rule or property being evaluated, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(c) => write!(f, "{} (in {})", self.message, c),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors in a model's variable declarations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("variable {0:?} declared more than once")]
    DuplicateVariable(String),

    #[error("empty range [{min}, {max}]")]
    EmptyRange { min: i64, max: i64 },

    #[error("enum has no members")]
    EmptyEnum,

    #[error("enum member {0:?} declared more than once")]
    DuplicateMember(String),

    #[error("record field {0:?} declared more than once")]
    DuplicateField(String),

    #[error("array index must be a boolean, range or enum type")]
    NonScalarIndex,

    #[error("type is too wide to be represented")]
    TooWide,

    #[error("too many variables (limit is {limit})")]
    TooManyVariables { limit: usize },

    #[error("symmetric array has {found} elements but the domain has {expected}")]
    SymmetryMismatch { expected: usize, found: usize },

    #[error("only range and enum fields can hold a symmetric ordinal")]
    NotAnOrdinal,
}

/// Run-level errors
#[derive(Debug, Error)]
pub enum CheckError {
    /// The model declares no start state, so there is nothing to explore
    #[error("model has no start state")]
    NoStartState,

    #[error("invalid layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A broken invariant of the engine itself
    #[error("internal failure: {0}")]
    Internal(String),

    #[error("worker thread {thread} panicked")]
    WorkerPanicked { thread: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckError {
    pub fn internal(message: impl Into<String>) -> Self {
        CheckError::Internal(message.into())
    }
}
