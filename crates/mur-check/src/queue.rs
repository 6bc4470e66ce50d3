//! Sharded work queue of states awaiting expansion
//!
//! One FIFO shard per worker thread, each behind its own lock. Workers push to
//! their own shard and pop from it first, falling back to the other shards
//! when it runs dry. With a single worker there is one shard and every lock
//! is uncontended.
//!
//! `pop` scans each shard exactly once. A push that races with the scan may
//! be missed, so an empty result only means the queue looked empty at some
//! point during the call.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::state::State;

pub struct WorkQueue {
    shards: Box<[Mutex<VecDeque<Arc<State>>>]>,
}

impl WorkQueue {
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        WorkQueue {
            shards: (0..shards).map(|_| Mutex::new(VecDeque::new())).collect(),
        }
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Append `state` to shard `shard`, returning that shard's new length.
    pub fn push(&self, state: Arc<State>, shard: usize) -> usize {
        debug_assert!(shard < self.shards.len());
        let mut q = self.shards[shard].lock();
        q.push_back(state);
        q.len()
    }

    /// Take the front of the first non-empty shard, starting at `*preferred`.
    ///
    /// On success `*preferred` is updated to the shard that yielded the state.
    pub fn pop(&self, preferred: &mut usize) -> Option<Arc<State>> {
        let n = self.shards.len();
        let start = *preferred % n;
        for i in 0..n {
            let shard = (start + i) % n;
            if let Some(s) = self.shards[shard].lock().pop_front() {
                *preferred = shard;
                return Some(s);
            }
        }
        None
    }

    /// Total number of queued states. Approximate while workers are active.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("shards", &self.shards.len())
            .field("len", &self.len())
            .finish()
    }
}
