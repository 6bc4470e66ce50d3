//! Model states and their buffer allocator
//!
//! A [`State`] is a packed bit buffer (see [`crate::bits`]) plus an optional
//! link to the state it was derived from. Two states are equal exactly when
//! their bytes are equal; the predecessor link plays no part in equality or
//! hashing.
//!
//! # Lifecycle
//!
//! A candidate state is owned by the worker that built it. It then either
//! moves into the visited set as an `Arc<State>` (and from there is shared
//! with the queue and with any successors' predecessor links), or is handed
//! back to the thread's [`StateAllocator`] so its buffer is reused by the next
//! candidate.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::bits::BitBlock;

/// A packed model state
pub struct State {
    data: Box<[u8]>,
    previous: Option<Arc<State>>,
}

impl State {
    /// Wrap an existing buffer as a start state (no predecessor).
    pub fn from_buffer(data: Box<[u8]>) -> Self {
        State {
            data,
            previous: None,
        }
    }

    /// A zero-filled start state.
    pub fn zeroed(alloc: &mut StateAllocator) -> Self {
        State::from_buffer(alloc.alloc_zeroed())
    }

    /// Copy `origin` into a fresh buffer, linking back to it.
    pub fn duplicate(origin: &Arc<State>, alloc: &mut StateAllocator) -> Self {
        let mut data = alloc.alloc();
        data.copy_from_slice(&origin.data);
        State {
            data,
            previous: Some(Arc::clone(origin)),
        }
    }

    /// The state this one was derived from, if any.
    #[inline]
    pub fn previous(&self) -> Option<&Arc<State>> {
        self.previous.as_ref()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of states on the path from a start state to this one, inclusive.
    pub fn depth(&self) -> usize {
        let mut n = 1;
        let mut cur = self.previous.as_deref();
        while let Some(s) = cur {
            n += 1;
            cur = s.previous.as_deref();
        }
        n
    }

    /// Release the buffer, dropping the predecessor link.
    pub(crate) fn into_buffer(mut self) -> Box<[u8]> {
        std::mem::take(&mut self.data)
    }
}

impl BitBlock for State {
    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl PartialEq for State {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for State {}

impl Hash for State {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State(")?;
        for b in self.data.iter() {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl Drop for State {
    // Unlink the predecessor chain iteratively. A long path of uniquely owned
    // predecessors would otherwise be dropped recursively.
    fn drop(&mut self) {
        let mut next = self.previous.take();
        while let Some(prev) = next {
            match Arc::try_unwrap(prev) {
                Ok(mut s) => next = s.previous.take(),
                Err(_) => break,
            }
        }
    }
}

/// Allocation counters for one [`StateAllocator`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Buffers obtained from the global allocator
    pub fresh: u64,
    /// Buffers served from the recycle slot
    pub reused: u64,
}

/// Per-thread state buffer allocator with a one-slot recycle cache.
///
/// The expansion loop allocates a candidate, evaluates it, and then either
/// keeps it or frees it before allocating the next one. Caching a single freed
/// buffer therefore absorbs every discarded candidate.
#[derive(Debug)]
pub struct StateAllocator {
    size_bytes: usize,
    cached: Option<Box<[u8]>>,
    stats: AllocStats,
}

impl StateAllocator {
    pub fn new(size_bytes: usize) -> Self {
        StateAllocator {
            size_bytes,
            cached: None,
            stats: AllocStats::default(),
        }
    }

    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// A buffer of the state size. Recycled buffers keep their old contents.
    #[inline]
    pub fn alloc(&mut self) -> Box<[u8]> {
        match self.cached.take() {
            Some(buf) => {
                self.stats.reused += 1;
                buf
            }
            None => {
                self.stats.fresh += 1;
                vec![0u8; self.size_bytes].into_boxed_slice()
            }
        }
    }

    /// A zero-filled buffer of the state size.
    pub fn alloc_zeroed(&mut self) -> Box<[u8]> {
        let mut buf = self.alloc();
        buf.fill(0);
        buf
    }

    /// Return a rejected candidate's buffer for reuse.
    ///
    /// At most one buffer may be cached: every `free` must be preceded by an
    /// `alloc` since the previous `free`.
    #[inline]
    pub fn free(&mut self, state: State) {
        debug_assert!(
            self.cached.is_none(),
            "state freed while another is already cached"
        );
        let buf = state.into_buffer();
        debug_assert_eq!(buf.len(), self.size_bytes);
        self.cached = Some(buf);
    }

    pub fn stats(&self) -> AllocStats {
        self.stats
    }
}
