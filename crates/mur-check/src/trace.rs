//! Counterexample reconstruction
//!
//! Every discovered state links to the state it was derived from, so the path
//! to an offending state is recovered by walking those links back to a start
//! state. The links carry no record of *which* rule produced each step; that
//! is recovered by replay: each start state (or each enabled rule from the
//! previous step) is re-run and its output compared against the recorded
//! state.
//!
//! Recorded states may be in canonical form (states taken from the visited
//! set) or raw (a candidate caught by an invariant before canonicalisation),
//! so a replayed state matches if either its raw or canonical bytes agree.

use std::sync::Arc;

use crate::bits::BitBlock;
use crate::config::TraceMode;
use crate::error::CheckError;
use crate::layout::Layout;
use crate::model::Model;
use crate::state::{State, StateAllocator};
use crate::symmetry::Canonicalize;
use crate::value::EvalCtx;

/// One step of a counterexample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// `Startstate NAME` or `Rule NAME`
    pub label: String,
    /// Every scalar leaf of the state as `(path, value)`
    pub leaves: Vec<(String, String)>,
}

/// Replays a model to label the steps of recorded paths
pub struct Replayer<'a> {
    model: &'a Model,
    ctx: EvalCtx,
    canonicalizer: Option<&'a dyn Canonicalize>,
}

impl<'a> Replayer<'a> {
    pub fn new(model: &'a Model, ctx: EvalCtx, canonicalizer: Option<&'a dyn Canonicalize>) -> Self {
        Replayer {
            model,
            ctx,
            canonicalizer,
        }
    }

    fn matches(&self, mut candidate: State, recorded: &State) -> bool {
        if candidate == *recorded {
            return true;
        }
        match self.canonicalizer {
            Some(c) => {
                c.canonicalize(&mut candidate);
                candidate == *recorded
            }
            None => false,
        }
    }

    fn start_label(&self, recorded: &State, alloc: &mut StateAllocator) -> Option<String> {
        for start in self.model.start_states() {
            let mut s = State::zeroed(alloc);
            if start.init(&self.ctx, &mut s).is_err() {
                continue;
            }
            if self.matches(s, recorded) {
                return Some(format!("Startstate {}", start.name()));
            }
        }
        None
    }

    fn rule_label(
        &self,
        from: &Arc<State>,
        recorded: &State,
        alloc: &mut StateAllocator,
    ) -> Option<String> {
        for rule in self.model.rules() {
            if !matches!(rule.enabled(&self.ctx, from), Ok(true)) {
                continue;
            }
            let mut s = State::duplicate(from, alloc);
            if rule.fire(&self.ctx, &mut s).is_err() {
                continue;
            }
            if self.matches(s, recorded) {
                return Some(format!("Rule {}", rule.name()));
            }
        }
        None
    }

    /// The labelled path from a start state to `target`, inclusive.
    ///
    /// Fails if some recorded step cannot be reproduced, which means the
    /// model's callables are not deterministic.
    pub fn reconstruct(&self, target: &State) -> Result<Vec<Step>, CheckError> {
        let mut path: Vec<&Arc<State>> = Vec::new();
        let mut cur = target.previous();
        while let Some(p) = cur {
            path.push(p);
            cur = p.previous();
        }
        path.reverse();

        let layout = self.model.layout();
        let mut alloc = StateAllocator::new(layout.size_bytes());
        let mut steps = Vec::with_capacity(path.len() + 1);

        let first: &State = path.first().map(|s| &***s).unwrap_or(target);
        let label = self
            .start_label(first, &mut alloc)
            .ok_or_else(|| CheckError::internal("no start state found to produce a discovered state"))?;
        steps.push(Step {
            label,
            leaves: layout.leaves(first),
        });

        for (i, from) in path.iter().enumerate() {
            let to: &State = match path.get(i + 1) {
                Some(next) => next,
                None => target,
            };
            let label = self
                .rule_label(from, to, &mut alloc)
                .ok_or_else(|| CheckError::internal("no rule found to link two discovered states"))?;
            steps.push(Step {
                label,
                leaves: layout.leaves(to),
            });
        }
        Ok(steps)
    }
}

/// Render `steps` as report lines.
///
/// In diff mode the first step is printed in full and later steps show only
/// the leaves that changed.
pub fn render(steps: &[Step], mode: TraceMode) -> Vec<String> {
    let mut out = Vec::new();
    let mut previous: Option<&Step> = None;
    for step in steps {
        out.push(format!("\t{} fired.", step.label));
        for (i, (path, value)) in step.leaves.iter().enumerate() {
            let unchanged = mode == TraceMode::Diff
                && previous.map_or(false, |p| p.leaves.get(i).map(|(_, v)| v) == Some(value));
            if !unchanged {
                out.push(format!("{} = {}", path, value));
            }
        }
        out.push("----------".to_string());
        previous = Some(step);
    }
    out
}

/// Render a single state, every leaf.
pub fn render_state<B: BitBlock + ?Sized>(layout: &Layout, state: &B) -> Vec<String> {
    layout
        .leaves(state)
        .into_iter()
        .map(|(path, value)| format!("{} = {}", path, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuilder;
    use crate::types::TypeDesc;

    fn counter_model() -> Model {
        let layout = Layout::new([
            ("n", TypeDesc::range(0, 3).unwrap()),
            ("flag", TypeDesc::boolean()),
        ])
        .unwrap();
        let n = layout.view("n").unwrap().into_range().unwrap();
        let flag = layout.view("flag").unwrap().into_bool().unwrap();
        ModelBuilder::new(layout)
            .startstate("zero", |_, _| Ok(()))
            .rule(
                "inc",
                move |_, s| n.lt(s, 3),
                move |ctx, s| {
                    let v = n.add(ctx, s, 1)?;
                    n.set(s, v)
                },
            )
            .rule("raise", move |_, s| Ok(!flag.get(s)), move |_, s| {
                flag.set(s, true);
                Ok(())
            })
            .build()
            .unwrap()
    }

    fn walk(model: &Model, rules: &[usize]) -> State {
        let ctx = EvalCtx::default();
        let mut alloc = StateAllocator::new(model.layout().size_bytes());
        let mut s = State::zeroed(&mut alloc);
        model.start_states()[0].init(&ctx, &mut s).unwrap();
        for &r in rules {
            let prev = Arc::new(s);
            s = State::duplicate(&prev, &mut alloc);
            model.rules()[r].fire(&ctx, &mut s).unwrap();
        }
        s
    }

    #[test]
    fn test_reconstruct_labels_each_step() {
        let model = counter_model();
        let target = walk(&model, &[0, 1, 0]);
        let replay = Replayer::new(&model, EvalCtx::default(), None);
        let steps = replay.reconstruct(&target).unwrap();
        let labels: Vec<_> = steps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Startstate zero", "Rule inc", "Rule raise", "Rule inc"]
        );
        assert_eq!(
            steps[3].leaves,
            vec![
                ("n".to_string(), "2".to_string()),
                ("flag".to_string(), "true".to_string())
            ]
        );
    }

    #[test]
    fn test_start_state_alone() {
        let model = counter_model();
        let target = walk(&model, &[]);
        let steps = Replayer::new(&model, EvalCtx::default(), None)
            .reconstruct(&target)
            .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].label, "Startstate zero");
    }

    #[test]
    fn test_unlinkable_state_is_internal_error() {
        let model = counter_model();
        let mut target = walk(&model, &[0]);
        // n jumps from 0 to 3: no rule does that
        model
            .layout()
            .view("n")
            .unwrap()
            .into_range()
            .unwrap()
            .set(&mut target, 3)
            .unwrap();
        let err = Replayer::new(&model, EvalCtx::default(), None)
            .reconstruct(&target)
            .unwrap_err();
        assert!(matches!(err, CheckError::Internal(ref m) if m.contains("no rule found")));
    }

    #[test]
    fn test_render_diff_and_full() {
        let steps = vec![
            Step {
                label: "Startstate zero".into(),
                leaves: vec![("n".into(), "0".into()), ("flag".into(), "false".into())],
            },
            Step {
                label: "Rule inc".into(),
                leaves: vec![("n".into(), "1".into()), ("flag".into(), "false".into())],
            },
        ];
        let diff = render(&steps, TraceMode::Diff);
        assert_eq!(
            diff,
            vec![
                "\tStartstate zero fired.",
                "n = 0",
                "flag = false",
                "----------",
                "\tRule inc fired.",
                "n = 1",
                "----------",
            ]
        );
        let full = render(&steps, TraceMode::Full);
        assert_eq!(full.len(), diff.len() + 1);
        assert!(full.contains(&"flag = false".to_string()));
    }
}
