//! Variable layout for packed states
//!
//! A model declares a fixed, ordered list of state variables. Building a
//! [`Layout`] assigns each one a numeric index and a bit offset: variables are
//! packed back to back in declaration order with no padding, so the state
//! size is exactly the sum of the declared widths.
//!
//! Index and offset lookups by name are O(1); rule closures are expected to
//! resolve views once, at model construction, and reuse them.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bits::{bytes_for_bits, BitBlock};
use crate::error::LayoutError;
use crate::types::TypeDesc;
use crate::view::View;

/// A variable index for O(1) access
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarIndex(pub u16);

impl VarIndex {
    #[inline(always)]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A declared state variable and its position in the packed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: Arc<str>,
    pub ty: TypeDesc,
    pub offset: usize,
}

impl Variable {
    pub fn view(&self) -> View {
        View::new(&self.ty, self.offset)
    }
}

/// Ordered variable declarations with assigned bit offsets
#[derive(Debug, Clone)]
pub struct Layout {
    vars: Vec<Variable>,
    indices: FxHashMap<Arc<str>, VarIndex>,
    size_bits: usize,
}

impl Layout {
    /// Assign offsets to `decls` in order.
    pub fn new<S: Into<Arc<str>>>(
        decls: impl IntoIterator<Item = (S, TypeDesc)>,
    ) -> Result<Self, LayoutError> {
        let mut vars = Vec::new();
        let mut indices = FxHashMap::default();
        let mut offset = 0usize;
        for (name, ty) in decls {
            let name: Arc<str> = name.into();
            if indices.contains_key(&name) {
                return Err(LayoutError::DuplicateVariable(name.to_string()));
            }
            let idx = u16::try_from(vars.len()).map_err(|_| LayoutError::TooManyVariables {
                limit: u16::MAX as usize + 1,
            })?;
            let width = ty.width();
            indices.insert(name.clone(), VarIndex(idx));
            vars.push(Variable { name, ty, offset });
            offset = offset.checked_add(width).ok_or(LayoutError::TooWide)?;
        }
        Ok(Layout {
            vars,
            indices,
            size_bits: offset,
        })
    }

    /// Total state width in bits.
    #[inline]
    pub fn size_bits(&self) -> usize {
        self.size_bits
    }

    /// State buffer length in bytes.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        bytes_for_bits(self.size_bits)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<VarIndex> {
        self.indices.get(name).copied()
    }

    #[inline]
    pub fn var(&self, idx: VarIndex) -> &Variable {
        &self.vars[idx.as_usize()]
    }

    #[inline]
    pub fn name(&self, idx: VarIndex) -> &str {
        &self.vars[idx.as_usize()].name
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// View of the variable called `name`.
    pub fn view(&self, name: &str) -> Option<View> {
        self.get(name).map(|idx| self.var(idx).view())
    }

    /// Every scalar leaf of `block` as `(path, value)`, in declaration order.
    pub fn leaves<B: BitBlock + ?Sized>(&self, block: &B) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for var in &self.vars {
            var.view().leaves(block, &var.name, &mut out);
        }
        out
    }
}
