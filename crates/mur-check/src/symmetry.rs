//! Symmetry reduction
//!
//! When a model contains a set of interchangeable component identities
//! (process ids, node names), states that differ only by a relabelling of
//! those identities behave identically. A canonicaliser rewrites each state to
//! one fixed representative of its equivalence class before it is inserted
//! into the visited set, so the whole class is explored once.
//!
//! Any [`Canonicalize`] implementation must be idempotent: canonicalising a
//! canonical state leaves it unchanged.

use crate::bits::{read_bits, write_bits, BitBlock};
use crate::error::LayoutError;
use crate::state::State;
use crate::view::{ArrayView, View};

/// Rewrites a state, in place, to its equivalence class representative
pub trait Canonicalize: Send + Sync {
    fn canonicalize(&self, state: &mut State);
}

impl<F> Canonicalize for F
where
    F: Fn(&mut State) + Send + Sync,
{
    #[inline]
    fn canonicalize(&self, state: &mut State) {
        self(state)
    }
}

/// Exhaustive canonicaliser for one interchangeable index domain
///
/// The domain is the ordinals `0..size`. Two kinds of state fields depend on
/// it:
///
/// - arrays indexed by the domain, whose elements move with a relabelling
/// - scalar fields holding a domain ordinal, whose value is relabelled
///
/// Every permutation of the domain is applied and the lexicographically
/// smallest resulting byte pattern is kept. The cost is `size!` rewrites per
/// state, which is practical for the small domains symmetric models use.
///
/// Scalar fields whose stored ordinal is `size` or more (for instance a
/// "none" sentinel) are left alone.
#[derive(Debug, Clone, Default)]
pub struct PermutationSymmetry {
    size: usize,
    /// (offset, element width) of each domain-indexed array
    arrays: Vec<(usize, usize)>,
    /// (offset, width) of each field holding a domain ordinal
    members: Vec<(usize, usize)>,
}

impl PermutationSymmetry {
    pub fn new(size: usize) -> Self {
        PermutationSymmetry {
            size,
            arrays: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permute the elements of `array` along with the domain.
    pub fn permute_array(mut self, array: &ArrayView) -> Result<Self, LayoutError> {
        if array.len() != self.size {
            return Err(LayoutError::SymmetryMismatch {
                expected: self.size,
                found: array.len(),
            });
        }
        self.arrays
            .push((array.offset(), array.ty().element().width()));
        Ok(self)
    }

    /// Relabel the ordinal stored in the scalar field `field`.
    ///
    /// For range fields the ordinal is the stored distance from the minimum.
    pub fn rename(mut self, field: &View) -> Result<Self, LayoutError> {
        match field {
            View::Range(_) | View::Enum(_) => {
                self.members.push((field.offset(), field.width()));
                Ok(self)
            }
            _ => Err(LayoutError::NotAnOrdinal),
        }
    }

    fn apply(&self, perm: &[usize], original: &[u8], renamed: &mut [u8], out: &mut [u8]) {
        renamed.copy_from_slice(original);
        for &(offset, width) in &self.members {
            let v = read_bits(original, offset, width) as usize;
            if v < self.size {
                write_bits(renamed, offset, width, perm[v] as u64);
            }
        }
        out.copy_from_slice(renamed);
        for &(offset, elem_width) in &self.arrays {
            for (from, &to) in perm.iter().enumerate() {
                copy_bits(
                    renamed,
                    offset + from * elem_width,
                    out,
                    offset + to * elem_width,
                    elem_width,
                );
            }
        }
    }
}

fn copy_bits(src: &[u8], src_off: usize, dst: &mut [u8], dst_off: usize, width: usize) {
    let mut done = 0;
    while done < width {
        let w = (width - done).min(64);
        let v = read_bits(src, src_off + done, w);
        write_bits(dst, dst_off + done, w, v);
        done += w;
    }
}

impl Canonicalize for PermutationSymmetry {
    fn canonicalize(&self, state: &mut State) {
        if self.size < 2 || (self.arrays.is_empty() && self.members.is_empty()) {
            return;
        }
        let original = state.as_bytes().to_vec();
        let mut best = original.clone();
        let mut renamed = original.clone();
        let mut candidate = original.clone();

        // Heap's algorithm, iterative form
        let n = self.size;
        let mut perm: Vec<usize> = (0..n).collect();
        let mut c = vec![0usize; n];
        let mut i = 1;
        while i < n {
            if c[i] < i {
                if i % 2 == 0 {
                    perm.swap(0, i);
                } else {
                    perm.swap(c[i], i);
                }
                self.apply(&perm, &original, &mut renamed, &mut candidate);
                if candidate < best {
                    best.copy_from_slice(&candidate);
                }
                c[i] += 1;
                i = 1;
            } else {
                c[i] = 0;
                i += 1;
            }
        }

        state.bytes_mut().copy_from_slice(&best);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::state::StateAllocator;
    use crate::types::TypeDesc;

    const N: i64 = 3;

    /// `owner` names a process; `pc[p]` is each process's program counter.
    fn layout() -> Layout {
        Layout::new([
            ("owner", TypeDesc::range(0, N).unwrap()),
            (
                "pc",
                TypeDesc::array(TypeDesc::range(0, N - 1).unwrap(), TypeDesc::range(0, 5).unwrap())
                    .unwrap(),
            ),
        ])
        .unwrap()
    }

    fn symmetry(layout: &Layout) -> PermutationSymmetry {
        let pc = layout.view("pc").unwrap().into_array().unwrap();
        PermutationSymmetry::new(N as usize)
            .permute_array(&pc)
            .unwrap()
            .rename(&layout.view("owner").unwrap())
            .unwrap()
    }

    fn make(layout: &Layout, owner: i64, pcs: [i64; 3]) -> State {
        let mut alloc = StateAllocator::new(layout.size_bytes());
        let mut s = State::zeroed(&mut alloc);
        layout
            .view("owner")
            .unwrap()
            .into_range()
            .unwrap()
            .set(&mut s, owner)
            .unwrap();
        let pc = layout.view("pc").unwrap().into_array().unwrap();
        for (i, v) in pcs.iter().enumerate() {
            pc.element(i).into_range().unwrap().set(&mut s, *v).unwrap();
        }
        s
    }

    #[test]
    fn test_relabelled_states_collapse() {
        let layout = layout();
        let sym = symmetry(&layout);
        // Process 0 owns and is at pc 4, versus the same with process 2
        let mut a = make(&layout, 0, [4, 1, 0]);
        let mut b = make(&layout, 2, [0, 1, 4]);
        assert_ne!(a, b);
        sym.canonicalize(&mut a);
        sym.canonicalize(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_asymmetric_states_stay_distinct() {
        let layout = layout();
        let sym = symmetry(&layout);
        let mut a = make(&layout, 0, [4, 1, 0]);
        let mut b = make(&layout, 0, [1, 4, 0]);
        sym.canonicalize(&mut a);
        sym.canonicalize(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sentinel_not_renamed() {
        let layout = layout();
        let sym = symmetry(&layout);
        let mut s = make(&layout, N, [2, 2, 2]);
        sym.canonicalize(&mut s);
        let owner = layout.view("owner").unwrap().into_range().unwrap();
        assert_eq!(owner.get(&s), N);
    }

    #[test]
    fn test_idempotent() {
        let layout = layout();
        let sym = symmetry(&layout);
        let mut s = make(&layout, 1, [3, 5, 0]);
        sym.canonicalize(&mut s);
        let once = s.as_bytes().to_vec();
        sym.canonicalize(&mut s);
        assert_eq!(s.as_bytes(), &once[..]);
    }

    #[test]
    fn test_closure_canonicalizer() {
        let clear_low_bit = |s: &mut State| s.write(0, 1, 0);
        let mut alloc = StateAllocator::new(1);
        let mut s = State::zeroed(&mut alloc);
        s.write(0, 8, 0xFF);
        clear_low_bit.canonicalize(&mut s);
        assert_eq!(s.as_bytes(), &[0xFE]);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let layout = layout();
        let pc = layout.view("pc").unwrap().into_array().unwrap();
        assert!(matches!(
            PermutationSymmetry::new(4).permute_array(&pc),
            Err(LayoutError::SymmetryMismatch {
                expected: 4,
                found: 3
            })
        ));
    }
}
