//! Deduplicating set of discovered states
//!
//! States are keyed by their raw bytes (after canonicalisation when symmetry
//! reduction is on). One coarse lock guards the whole table: insertion is the
//! point where workers agree on which copy of a state is kept, so it is the
//! natural place to serialise.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::state::State;

/// Outcome of [`VisitedSet::insert`]
#[derive(Debug)]
pub enum Insertion {
    /// The state was new; this is the stored representative.
    New(Arc<State>),
    /// An equal state was already present; the candidate is handed back.
    Seen(State),
}

impl Insertion {
    #[inline]
    pub fn is_new(&self) -> bool {
        matches!(self, Insertion::New(_))
    }
}

#[derive(Default)]
pub struct VisitedSet {
    states: Mutex<FxHashSet<Arc<State>>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        VisitedSet {
            states: Mutex::new(FxHashSet::with_capacity_and_hasher(
                capacity,
                Default::default(),
            )),
        }
    }

    /// Insert `state` unless an equal one is present.
    ///
    /// Returns the set size after the call along with the outcome.
    pub fn insert(&self, state: State) -> (usize, Insertion) {
        let mut set = self.states.lock();
        if set.contains(&state) {
            return (set.len(), Insertion::Seen(state));
        }
        let stored = Arc::new(state);
        set.insert(Arc::clone(&stored));
        (set.len(), Insertion::New(stored))
    }

    pub fn contains(&self, state: &State) -> bool {
        self.states.lock().contains(state)
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for VisitedSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitedSet")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(bytes: &[u8]) -> State {
        State::from_buffer(bytes.to_vec().into_boxed_slice())
    }

    #[test]
    fn test_insert_exactly_once() {
        let set = VisitedSet::new();
        let (n, first) = set.insert(state(&[1, 2]));
        assert_eq!(n, 1);
        assert!(first.is_new());

        let (n, second) = set.insert(state(&[1, 2]));
        assert_eq!(n, 1);
        match second {
            Insertion::Seen(s) => assert_eq!(s.as_bytes(), &[1, 2]),
            Insertion::New(_) => panic!("duplicate accepted"),
        }

        let (n, third) = set.insert(state(&[2, 1]));
        assert_eq!(n, 2);
        assert!(third.is_new());
        assert!(set.contains(&state(&[2, 1])));
    }

    #[test]
    fn test_stored_representative_is_shared() {
        let set = VisitedSet::with_capacity(4);
        let stored = match set.insert(state(&[9])).1 {
            Insertion::New(s) => s,
            Insertion::Seen(_) => unreachable!(),
        };
        assert_eq!(Arc::strong_count(&stored), 2);
    }

    #[test]
    fn test_concurrent_inserts_accept_each_pattern_once() {
        let set = VisitedSet::new();
        let accepted = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                let set = &set;
                let accepted = &accepted;
                s.spawn(move || {
                    for i in 0..=255u8 {
                        if set.insert(state(&[i])).1.is_new() {
                            accepted.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        assert_eq!(set.len(), 256);
        assert_eq!(accepted.into_inner(), 256);
    }
}
