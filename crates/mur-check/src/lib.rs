//! mur-check - concurrent explicit-state model checking
//!
//! This crate is the exploration engine of a Murphi-style model checker. A
//! front end lowers a model into a [`Layout`] of typed variables and tables of
//! closures (start states, guarded rules, invariants, assumptions); the
//! engine enumerates every reachable state and reports invariant violations,
//! runtime faults and deadlocks with a counterexample trace.
//!
//! # Features
//!
//! - Bit-packed states with typed views over them
//! - Checked range arithmetic and optional 64-bit overflow detection
//! - Multithreaded search over a sharded work queue
//! - Symmetry reduction through a pluggable canonicaliser
//! - Counterexample reconstruction by replay
//!
//! # Example
//!
//! ```rust,ignore
//! use mur_check::{CheckerConfig, Layout, ModelBuilder, ModelChecker, TypeDesc};
//!
//! let layout = Layout::new([("x", TypeDesc::boolean())])?;
//! let x = layout.view("x").unwrap().into_bool()?;
//! let model = ModelBuilder::new(layout)
//!     .startstate("init", move |_, s| { x.set(s, false); Ok(()) })
//!     .rule("flip", |_, _| Ok(true), move |_, s| { x.set(s, !x.get(s)); Ok(()) })
//!     .build()?;
//! let result = ModelChecker::new(&model, CheckerConfig::default())?.run()?;
//! assert_eq!(result.states, 2);
//! ```

pub mod bits;
pub mod check;
pub mod config;
pub mod error;
pub mod layout;
pub mod model;
pub mod queue;
pub mod report;
pub mod state;
pub mod symmetry;
pub mod trace;
pub mod types;
pub mod value;
pub mod view;
pub mod visited;

pub use bits::{BitBlock, BitBuffer};
pub use check::{CheckResult, ModelChecker};
pub use config::{CheckerConfig, ConfigError, TraceMode};
pub use error::{CheckError, Fault, FaultKind, FaultRecord, LayoutError};
pub use layout::{Layout, VarIndex, Variable};
pub use model::{Model, ModelBuilder, Property, Rule, StartState};
pub use queue::WorkQueue;
pub use report::{Reporter, SharedBuffer};
pub use state::{State, StateAllocator};
pub use symmetry::{Canonicalize, PermutationSymmetry};
pub use trace::{Replayer, Step};
pub use types::{ArrayType, EnumType, RangeType, RecordType, TypeDesc};
pub use value::{ArithOp, CmpOp, EvalCtx, RangeValue, Value};
pub use view::{ArrayView, BoolView, EnumView, RangeView, RecordView, View};
pub use visited::{Insertion, VisitedSet};
