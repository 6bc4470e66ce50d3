//! Model description consumed by the checker
//!
//! A model is a [`Layout`] plus ordered tables of named closures:
//!
//! - start states: write an initial state into a zeroed buffer
//! - rules: a guard over the current state and a body that mutates a copy
//! - invariants: predicates every reachable state must satisfy
//! - assumptions: predicates whose failure makes a derivation infeasible
//!
//! Every closure reports problems only through [`Fault`]. Tables are frozen by
//! [`ModelBuilder::build`] and shared read-only by all workers.
//!
//! Quantified declarations (`ruleset i : 0..3 do ... end`) are flattened into
//! one rule per value, named `"name, i:3"`.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::error::{CheckError, Fault};
use crate::layout::Layout;
use crate::state::State;
use crate::symmetry::Canonicalize;
use crate::value::EvalCtx;

/// Predicate over a state
pub type PredicateFn = Box<dyn Fn(&EvalCtx, &State) -> Result<bool, Fault> + Send + Sync>;

/// In-place state update
pub type ActionFn = Box<dyn Fn(&EvalCtx, &mut State) -> Result<(), Fault> + Send + Sync>;

pub struct StartState {
    name: String,
    body: ActionFn,
}

impl StartState {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn init(&self, ctx: &EvalCtx, state: &mut State) -> Result<(), Fault> {
        (self.body)(ctx, state)
    }
}

pub struct Rule {
    name: String,
    guard: PredicateFn,
    body: ActionFn,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn enabled(&self, ctx: &EvalCtx, state: &State) -> Result<bool, Fault> {
        (self.guard)(ctx, state)
    }

    #[inline]
    pub fn fire(&self, ctx: &EvalCtx, state: &mut State) -> Result<(), Fault> {
        (self.body)(ctx, state)
    }
}

/// A named invariant or assumption
pub struct Property {
    name: String,
    check: PredicateFn,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn holds(&self, ctx: &EvalCtx, state: &State) -> Result<bool, Fault> {
        (self.check)(ctx, state)
    }
}

/// A frozen model
pub struct Model {
    layout: Layout,
    start_states: Vec<StartState>,
    rules: Vec<Rule>,
    invariants: Vec<Property>,
    assumptions: Vec<Property>,
    canonicalizer: Option<Box<dyn Canonicalize>>,
}

impl Model {
    pub fn builder(layout: Layout) -> ModelBuilder {
        ModelBuilder::new(layout)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn start_states(&self) -> &[StartState] {
        &self.start_states
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn invariants(&self) -> &[Property] {
        &self.invariants
    }

    pub fn assumptions(&self) -> &[Property] {
        &self.assumptions
    }

    pub fn canonicalizer(&self) -> Option<&dyn Canonicalize> {
        self.canonicalizer.as_deref()
    }

    /// Check every assumption against `state`.
    ///
    /// The first failing assumption is returned as [`Fault::Assumption`].
    pub fn check_assumptions(&self, ctx: &EvalCtx, state: &State) -> Result<(), Fault> {
        for a in &self.assumptions {
            if !a.holds(ctx, state)? {
                return Err(Fault::assumption(a.name()));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("variables", &self.layout.len())
            .field("state_bits", &self.layout.size_bits())
            .field("start_states", &self.start_states.len())
            .field("rules", &self.rules.len())
            .field("invariants", &self.invariants.len())
            .field("assumptions", &self.assumptions.len())
            .field("symmetry", &self.canonicalizer.is_some())
            .finish()
    }
}

fn quantified_name(name: &str, var: &str, value: i64) -> String {
    format!("{}, {}:{}", name, var, value)
}

/// Incremental construction of a [`Model`]
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    pub fn new(layout: Layout) -> Self {
        ModelBuilder {
            model: Model {
                layout,
                start_states: Vec::new(),
                rules: Vec::new(),
                invariants: Vec::new(),
                assumptions: Vec::new(),
                canonicalizer: None,
            },
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.model.layout
    }

    pub fn startstate<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&EvalCtx, &mut State) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.model.start_states.push(StartState {
            name: name.into(),
            body: Box::new(body),
        });
        self
    }

    /// One start state per value of `var` in `domain`.
    pub fn startstate_set<F>(
        mut self,
        name: &str,
        var: &str,
        domain: RangeInclusive<i64>,
        body: F,
    ) -> Self
    where
        F: Fn(&EvalCtx, &mut State, i64) -> Result<(), Fault> + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        for v in domain {
            let body = Arc::clone(&body);
            self.model.start_states.push(StartState {
                name: quantified_name(name, var, v),
                body: Box::new(move |ctx: &EvalCtx, s: &mut State| body(ctx, s, v)),
            });
        }
        self
    }

    pub fn rule<G, B>(mut self, name: impl Into<String>, guard: G, body: B) -> Self
    where
        G: Fn(&EvalCtx, &State) -> Result<bool, Fault> + Send + Sync + 'static,
        B: Fn(&EvalCtx, &mut State) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.model.rules.push(Rule {
            name: name.into(),
            guard: Box::new(guard),
            body: Box::new(body),
        });
        self
    }

    /// One rule per value of `var` in `domain`, in ascending order.
    pub fn ruleset<G, B>(
        mut self,
        name: &str,
        var: &str,
        domain: RangeInclusive<i64>,
        guard: G,
        body: B,
    ) -> Self
    where
        G: Fn(&EvalCtx, &State, i64) -> Result<bool, Fault> + Send + Sync + 'static,
        B: Fn(&EvalCtx, &mut State, i64) -> Result<(), Fault> + Send + Sync + 'static,
    {
        let guard = Arc::new(guard);
        let body = Arc::new(body);
        for v in domain {
            let g = Arc::clone(&guard);
            let b = Arc::clone(&body);
            self.model.rules.push(Rule {
                name: quantified_name(name, var, v),
                guard: Box::new(move |ctx: &EvalCtx, s: &State| g(ctx, s, v)),
                body: Box::new(move |ctx: &EvalCtx, s: &mut State| b(ctx, s, v)),
            });
        }
        self
    }

    pub fn invariant<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&EvalCtx, &State) -> Result<bool, Fault> + Send + Sync + 'static,
    {
        self.model.invariants.push(Property {
            name: name.into(),
            check: Box::new(check),
        });
        self
    }

    pub fn assumption<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&EvalCtx, &State) -> Result<bool, Fault> + Send + Sync + 'static,
    {
        self.model.assumptions.push(Property {
            name: name.into(),
            check: Box::new(check),
        });
        self
    }

    /// Canonicaliser applied when the run enables symmetry reduction.
    pub fn symmetry<C: Canonicalize + 'static>(mut self, canonicalizer: C) -> Self {
        self.model.canonicalizer = Some(Box::new(canonicalizer));
        self
    }

    pub fn build(self) -> Result<Model, CheckError> {
        if self.model.start_states.is_empty() {
            return Err(CheckError::NoStartState);
        }
        Ok(self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateAllocator;
    use crate::types::TypeDesc;

    fn layout() -> Layout {
        Layout::new([("n", TypeDesc::range(0, 3).unwrap())]).unwrap()
    }

    #[test]
    fn test_build_requires_start_state() {
        let err = ModelBuilder::new(layout())
            .rule("r", |_, _| Ok(true), |_, _| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(err, CheckError::NoStartState));
    }

    #[test]
    fn test_ruleset_flattens_in_order() {
        let n = layout().view("n").unwrap().into_range().unwrap();
        let model = ModelBuilder::new(layout())
            .startstate("init", |_, _| Ok(()))
            .ruleset(
                "set",
                "i",
                1..=3,
                move |_, s, i| n.lt(s, i),
                move |_, s, i| n.set(s, i),
            )
            .build()
            .unwrap();
        let names: Vec<_> = model.rules().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["set, i:1", "set, i:2", "set, i:3"]);

        let ctx = EvalCtx::default();
        let mut alloc = StateAllocator::new(model.layout().size_bytes());
        let mut s = State::zeroed(&mut alloc);
        assert!(model.rules()[2].enabled(&ctx, &s).unwrap());
        model.rules()[2].fire(&ctx, &mut s).unwrap();
        assert_eq!(n.get(&s), 3);
        assert!(!model.rules()[2].enabled(&ctx, &s).unwrap());
    }

    #[test]
    fn test_startstate_set_names() {
        let model = ModelBuilder::new(layout())
            .startstate_set("init", "v", 0..=1, |_, _, _| Ok(()))
            .build()
            .unwrap();
        let names: Vec<_> = model.start_states().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["init, v:0", "init, v:1"]);
    }

    #[test]
    fn test_check_assumptions_names_failure() {
        let model = ModelBuilder::new(layout())
            .startstate("init", |_, _| Ok(()))
            .assumption("always", |_, _| Ok(true))
            .assumption("never", |_, _| Ok(false))
            .build()
            .unwrap();
        let mut alloc = StateAllocator::new(1);
        let s = State::zeroed(&mut alloc);
        assert_eq!(
            model.check_assumptions(&EvalCtx::default(), &s),
            Err(Fault::assumption("never"))
        );
        assert!(format!("{:?}", model).contains("assumptions: 2"));
    }
}
