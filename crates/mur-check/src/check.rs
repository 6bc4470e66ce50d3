//! Multithreaded state space exploration
//!
//! The driver seeds the work queue with the model's start states, then runs a
//! fixed pool of workers. Each worker repeatedly takes a state from the queue,
//! fires every enabled rule against a copy of it, and keeps each successor
//! that passes its checks and has not been seen before.
//!
//! # Scale-out
//!
//! Thread 0 starts exploring immediately. The other workers park on a gate
//! until the frontier is deep enough to share (more than
//! `warmup_threshold` queued states), so small models never pay for thread
//! wake-ups. The gate opens at most once. It is also opened when thread 0
//! exits or the run aborts, so no worker stays parked.
//!
//! # Termination
//!
//! A worker exits when a pop finds every shard empty. A worker only pushes
//! to the queue while it is alive and pops again afterwards, so the last
//! worker to exit has seen the queue truly empty.
//!
//! The run also stops early once `max_errors` faults have been reported. The
//! shared error counter is checked once per loop iteration.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{CheckerConfig, TraceMode};
use crate::error::{CheckError, Fault, FaultKind, FaultRecord};
use crate::model::{Model, Rule};
use crate::queue::WorkQueue;
use crate::report::Reporter;
use crate::state::{State, StateAllocator};
use crate::symmetry::Canonicalize;
use crate::trace::{self, Replayer};
use crate::value::EvalCtx;
use crate::visited::{Insertion, VisitedSet};

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Distinct states discovered
    pub states: usize,
    pub rules_fired: u64,
    /// Faults reported (never more than `max_errors`)
    pub errors: usize,
    pub faults: Vec<FaultRecord>,
    pub elapsed: Duration,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.errors == 0
    }

    /// Process exit status for a command-line front end.
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    pub fn fault_kinds(&self) -> BTreeSet<FaultKind> {
        self.faults.iter().map(|f| f.kind).collect()
    }
}

/// Explores a model's reachable states
pub struct ModelChecker<'m> {
    model: &'m Model,
    config: CheckerConfig,
    reporter: Reporter,
}

impl<'m> ModelChecker<'m> {
    pub fn new(model: &'m Model, config: CheckerConfig) -> Result<Self, CheckError> {
        config.validate()?;
        Ok(ModelChecker {
            model,
            config,
            reporter: Reporter::stdout(),
        })
    }

    /// Send all run output to `reporter` instead of stdout.
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Explore every reachable state, or until the error budget is spent.
    pub fn run(&self) -> Result<CheckResult, CheckError> {
        let threads = self.config.effective_threads();
        let canonicalizer = if self.config.symmetry_reduction {
            let c = self.model.canonicalizer();
            if c.is_none() {
                warn!("symmetry reduction enabled but the model has no canonicaliser");
            }
            c
        } else {
            None
        };

        info!(
            threads,
            state_bits = self.model.layout().size_bits(),
            start_states = self.model.start_states().len(),
            rules = self.model.rules().len(),
            symmetry = canonicalizer.is_some(),
            "starting exploration"
        );

        let rc = RunContext {
            model: self.model,
            config: &self.config,
            reporter: &self.reporter,
            ctx: EvalCtx::new(self.config.overflow_checks),
            canonicalizer,
            threads,
            queue: WorkQueue::new(threads),
            visited: VisitedSet::new(),
            error_count: AtomicUsize::new(0),
            rules_fired: AtomicU64::new(0),
            gate: Gate::new(),
            aborted: AtomicBool::new(false),
            faults: Mutex::new(Vec::new()),
            start: Instant::now(),
        };

        rc.seed()?;
        if !rc.should_stop() {
            rc.explore()?;
        }

        let elapsed = rc.start.elapsed();
        let faults = rc.faults.into_inner();
        let result = CheckResult {
            states: rc.visited.len(),
            rules_fired: rc.rules_fired.load(Ordering::Relaxed),
            errors: faults.len(),
            faults,
            elapsed,
        };
        info!(
            states = result.states,
            rules_fired = result.rules_fired,
            errors = result.errors,
            elapsed_ms = elapsed.as_millis() as u64,
            "exploration finished"
        );

        self.reporter.summary(&result);
        self.reporter.flush()?;
        Ok(result)
    }
}

/// One-shot barrier releasing parked workers
struct Gate {
    open: Mutex<bool>,
    cvar: Condvar,
}

impl Gate {
    fn new() -> Self {
        Gate {
            open: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Returns false if the gate was already open.
    fn open(&self) -> bool {
        let mut open = self.open.lock();
        if *open {
            return false;
        }
        *open = true;
        self.cvar.notify_all();
        true
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cvar.wait(&mut open);
        }
    }
}

/// Opens the gate on drop, including when unwinding.
struct OpenOnDrop<'a>(&'a Gate);

impl Drop for OpenOnDrop<'_> {
    fn drop(&mut self) {
        self.0.open();
    }
}

/// Result of checking every invariant against one state
enum Verdict {
    Holds,
    Violated(FaultRecord),
    /// An assumption failed while evaluating an invariant
    Infeasible,
}

/// Shared state of one run, borrowed by every worker
struct RunContext<'a> {
    model: &'a Model,
    config: &'a CheckerConfig,
    reporter: &'a Reporter,
    ctx: EvalCtx,
    canonicalizer: Option<&'a dyn Canonicalize>,
    threads: usize,
    queue: WorkQueue,
    visited: VisitedSet,
    error_count: AtomicUsize,
    rules_fired: AtomicU64,
    gate: Gate,
    aborted: AtomicBool,
    faults: Mutex<Vec<FaultRecord>>,
    start: Instant,
}

impl<'a> RunContext<'a> {
    #[inline]
    fn error_limit_reached(&self) -> bool {
        self.error_count.load(Ordering::Acquire) >= self.config.max_errors
    }

    #[inline]
    fn should_stop(&self) -> bool {
        self.error_limit_reached() || self.aborted.load(Ordering::Acquire)
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.gate.open();
    }

    fn check_invariants(&self, state: &State) -> Verdict {
        for inv in self.model.invariants() {
            match inv.holds(&self.ctx, state) {
                Ok(true) => {}
                Ok(false) => {
                    return Verdict::Violated(FaultRecord {
                        kind: FaultKind::Invariant,
                        message: format!("invariant {:?} failed", inv.name()),
                        context: None,
                    })
                }
                Err(fault) => match fault.kind() {
                    Some(kind) => {
                        return Verdict::Violated(FaultRecord {
                            kind,
                            message: fault.to_string(),
                            context: Some(format!("invariant {}", inv.name())),
                        })
                    }
                    None => return Verdict::Infeasible,
                },
            }
        }
        Verdict::Holds
    }

    /// Report a fault raised by a model callable. Assumptions are dropped.
    fn report_fault(
        &self,
        fault: Fault,
        context: String,
        state: &State,
        traceable: bool,
    ) -> Result<(), CheckError> {
        match fault.kind() {
            Some(kind) => self.report(
                FaultRecord {
                    kind,
                    message: fault.to_string(),
                    context: Some(context),
                },
                state,
                traceable,
            ),
            None => Ok(()),
        }
    }

    /// Count a fault and print it unless the error budget is already spent.
    fn report(&self, record: FaultRecord, state: &State, traceable: bool) -> Result<(), CheckError> {
        let prior = self.error_count.fetch_add(1, Ordering::AcqRel);
        if prior >= self.config.max_errors {
            return Ok(());
        }
        warn!(kind = %record.kind, message = %record.message, "fault found");

        let mode = self.config.counterexample_trace;
        let trace = if traceable && mode != TraceMode::Off {
            let steps = Replayer::new(self.model, self.ctx, self.canonicalizer).reconstruct(state)?;
            Some(trace::render(&steps, mode))
        } else {
            None
        };
        let dump = match trace {
            Some(_) => Vec::new(),
            None => trace::render_state(self.model.layout(), state),
        };
        self.reporter.fault(&record, trace.as_deref(), &dump);
        self.faults.lock().push(record);
        Ok(())
    }

    fn discovered(&self, size: usize) {
        if size % self.config.progress_interval == 0 {
            self.reporter.progress(
                size,
                self.start.elapsed(),
                self.rules_fired.load(Ordering::Relaxed),
                self.queue.len(),
            );
        }
    }

    /// Initialise, check and enqueue every start state, round-robin.
    fn seed(&self) -> Result<(), CheckError> {
        let mut alloc = StateAllocator::new(self.model.layout().size_bytes());
        let mut next_shard = 0;
        for start in self.model.start_states() {
            if self.error_limit_reached() {
                break;
            }
            let mut s = State::zeroed(&mut alloc);
            let init = start
                .init(&self.ctx, &mut s)
                .and_then(|()| self.model.check_assumptions(&self.ctx, &s));
            if let Err(fault) = init {
                self.report_fault(fault, format!("startstate {}", start.name()), &s, false)?;
                alloc.free(s);
                continue;
            }

            match self.check_invariants(&s) {
                Verdict::Holds => {}
                Verdict::Infeasible => {
                    alloc.free(s);
                    continue;
                }
                Verdict::Violated(record) => {
                    self.report(record, &s, true)?;
                    if self.error_limit_reached() {
                        alloc.free(s);
                        break;
                    }
                }
            }

            if let Some(c) = self.canonicalizer {
                c.canonicalize(&mut s);
            }
            match self.visited.insert(s) {
                (size, Insertion::New(stored)) => {
                    self.queue.push(stored, next_shard % self.queue.shard_count());
                    next_shard += 1;
                    self.discovered(size);
                }
                (_, Insertion::Seen(s)) => alloc.free(s),
            }
        }
        debug!(queued = self.queue.len(), "start states seeded");
        Ok(())
    }

    fn explore(&self) -> Result<(), CheckError> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = (1..self.threads)
                .map(|id| {
                    scope.spawn(move || {
                        self.gate.wait();
                        Worker::new(id, self).run()
                    })
                })
                .collect();

            let main = {
                let _release = OpenOnDrop(&self.gate);
                Worker::new(0, self).run()
            };

            let mut first_err = main.err();
            for (i, handle) in handles.into_iter().enumerate() {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(CheckError::WorkerPanicked { thread: i + 1 }));
                if let Err(e) = result {
                    first_err.get_or_insert(e);
                }
            }
            match first_err {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Warmup,
    Running,
    Done,
    Aborted,
}

struct Worker<'r, 'a> {
    id: usize,
    rc: &'r RunContext<'a>,
    alloc: StateAllocator,
    /// Shard to try first when popping
    preferred: usize,
    phase: Phase,
}

impl<'r, 'a> Worker<'r, 'a> {
    fn new(id: usize, rc: &'r RunContext<'a>) -> Self {
        Worker {
            id,
            rc,
            alloc: StateAllocator::new(rc.model.layout().size_bytes()),
            preferred: id,
            phase: if id == 0 { Phase::Running } else { Phase::Warmup },
        }
    }

    fn run(mut self) -> Result<(), CheckError> {
        if self.phase == Phase::Warmup {
            debug!(thread = self.id, "worker released");
            self.phase = Phase::Running;
        }
        let result = self.explore();
        self.phase = match result {
            Ok(()) => Phase::Done,
            Err(_) => {
                self.rc.abort();
                Phase::Aborted
            }
        };
        debug!(thread = self.id, phase = ?self.phase, stats = ?self.alloc.stats(), "worker exiting");
        result
    }

    fn explore(&mut self) -> Result<(), CheckError> {
        loop {
            if self.rc.should_stop() {
                return Ok(());
            }
            let Some(s) = self.rc.queue.pop(&mut self.preferred) else {
                return Ok(());
            };
            self.expand(&s)?;
            if self.id == 0 {
                self.maybe_release();
            }
        }
    }

    fn maybe_release(&self) {
        let rc = self.rc;
        if rc.threads > 1 && !rc.gate.is_open() {
            let queued = rc.queue.len();
            if queued > rc.config.warmup_threshold && rc.gate.open() {
                debug!(queued, threads = rc.threads, "releasing workers");
            }
        }
    }

    /// Fire every enabled rule against `s`.
    fn expand(&mut self, s: &Arc<State>) -> Result<(), CheckError> {
        let rc = self.rc;
        let mut deadlock = true;
        for rule in rc.model.rules() {
            match rule.enabled(&rc.ctx, s) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(fault) => {
                    rc.report_fault(fault, rule_context(rule), s, true)?;
                    if rc.error_limit_reached() {
                        return Ok(());
                    }
                    continue;
                }
            }
            deadlock = false;

            let mut n = State::duplicate(s, &mut self.alloc);
            let fired = rule.fire(&rc.ctx, &mut n).and_then(|()| {
                rc.rules_fired.fetch_add(1, Ordering::Relaxed);
                rc.model.check_assumptions(&rc.ctx, s)
            });
            if let Err(fault) = fired {
                self.alloc.free(n);
                rc.report_fault(fault, rule_context(rule), s, true)?;
                if rc.error_limit_reached() {
                    return Ok(());
                }
                continue;
            }

            match rc.check_invariants(&n) {
                Verdict::Holds => {}
                Verdict::Infeasible => {
                    self.alloc.free(n);
                    continue;
                }
                Verdict::Violated(record) => {
                    rc.report(record, &n, true)?;
                    if rc.error_limit_reached() {
                        self.alloc.free(n);
                        return Ok(());
                    }
                }
            }

            if let Some(c) = rc.canonicalizer {
                c.canonicalize(&mut n);
            }
            match rc.visited.insert(n) {
                (size, Insertion::New(stored)) => {
                    rc.queue.push(stored, self.id);
                    rc.discovered(size);
                }
                (_, Insertion::Seen(n)) => self.alloc.free(n),
            }
        }

        if deadlock && rc.config.deadlock_detection {
            rc.report(
                FaultRecord {
                    kind: FaultKind::Deadlock,
                    message: "deadlock".to_string(),
                    context: None,
                },
                s,
                true,
            )?;
        }
        Ok(())
    }
}

fn rule_context(rule: &Rule) -> String {
    format!("rule {}", rule.name())
}
