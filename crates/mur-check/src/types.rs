//! Type descriptors for packed state variables
//!
//! A descriptor knows two structural properties of its value space:
//!
//! - `width`: number of bits one value occupies in a packed buffer
//! - `count`: number of distinct values (cardinality)
//!
//! Scalars (Boolean, Range, Enum) encode to an unsigned ordinal in
//! `0..count`. Composites (Array, Record) are laid out element by element with
//! no padding.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::LayoutError;

/// Bits needed to distinguish `n` ordinals, i.e. ceil(log2(n)).
#[inline]
fn ordinal_width(n: u64) -> usize {
    if n < 2 {
        0
    } else {
        (64 - (n - 1).leading_zeros()) as usize
    }
}

/// Bounded integer type `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeType {
    min: i64,
    max: i64,
}

impl RangeType {
    pub fn new(min: i64, max: i64) -> Result<Self, LayoutError> {
        if min > max {
            return Err(LayoutError::EmptyRange { min, max });
        }
        Ok(RangeType { min, max })
    }

    #[inline]
    pub fn min(&self) -> i64 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> i64 {
        self.max
    }

    /// `max - min` as an unsigned quantity (never overflows).
    #[inline]
    fn span(&self) -> u64 {
        self.max.wrapping_sub(self.min) as u64
    }

    #[inline]
    pub fn width(&self) -> usize {
        let span = self.span();
        if span == 0 {
            0
        } else {
            (64 - span.leading_zeros()) as usize
        }
    }

    /// Cardinality, saturating at `u64::MAX` for the full i64 range.
    #[inline]
    pub fn count(&self) -> u64 {
        self.span().saturating_add(1)
    }

    #[inline]
    pub fn contains(&self, v: i64) -> bool {
        self.min <= v && v <= self.max
    }

    /// Encode an in-range value as its distance from `min`.
    #[inline]
    pub fn encode(&self, v: i64) -> u64 {
        debug_assert!(self.contains(v));
        v.wrapping_sub(self.min) as u64
    }

    #[inline]
    pub fn decode(&self, bits: u64) -> i64 {
        self.min.wrapping_add(bits as i64)
    }
}

/// Enumerated type with named members
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    members: Arc<[Arc<str>]>,
}

impl EnumType {
    pub fn new<S: Into<Arc<str>>>(members: impl IntoIterator<Item = S>) -> Result<Self, LayoutError> {
        let members: Vec<Arc<str>> = members.into_iter().map(Into::into).collect();
        if members.is_empty() {
            return Err(LayoutError::EmptyEnum);
        }
        let mut seen = FxHashSet::default();
        for m in &members {
            if !seen.insert(m.clone()) {
                return Err(LayoutError::DuplicateMember(m.to_string()));
            }
        }
        Ok(EnumType {
            members: members.into(),
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        ordinal_width(self.count())
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.members.len() as u64
    }

    pub fn members(&self) -> &[Arc<str>] {
        &self.members
    }

    pub fn ordinal(&self, member: &str) -> Option<u64> {
        self.members
            .iter()
            .position(|m| &**m == member)
            .map(|i| i as u64)
    }

    pub fn member(&self, ordinal: u64) -> Option<&str> {
        self.members.get(ordinal as usize).map(|m| &**m)
    }
}

/// Fixed-size array indexed by a scalar type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    index: TypeDesc,
    element: TypeDesc,
    width: usize,
}

impl ArrayType {
    pub fn new(index: TypeDesc, element: TypeDesc) -> Result<Self, LayoutError> {
        if !index.is_scalar() {
            return Err(LayoutError::NonScalarIndex);
        }
        let len = usize::try_from(index.count()).map_err(|_| LayoutError::TooWide)?;
        let width = len
            .checked_mul(element.width())
            .ok_or(LayoutError::TooWide)?;
        Ok(ArrayType {
            index,
            element,
            width,
        })
    }

    pub fn index(&self) -> &TypeDesc {
        &self.index
    }

    pub fn element(&self) -> &TypeDesc {
        &self.element
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.count() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn count(&self) -> u64 {
        let base = self.element.count();
        let mut acc: u64 = 1;
        for _ in 0..self.len() {
            acc = acc.saturating_mul(base);
            if acc == u64::MAX {
                break;
            }
        }
        acc
    }

    /// Bit offset of element `i` relative to the array's start.
    #[inline]
    pub fn element_offset(&self, i: usize) -> usize {
        i * self.element.width()
    }
}

/// A named record field with its offset relative to the record start
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: Arc<str>,
    pub ty: TypeDesc,
    pub offset: usize,
}

/// Record with named, ordered fields
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    fields: Vec<Field>,
    width: usize,
}

impl RecordType {
    pub fn new<S: Into<Arc<str>>>(
        fields: impl IntoIterator<Item = (S, TypeDesc)>,
    ) -> Result<Self, LayoutError> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        let mut offset = 0usize;
        for (name, ty) in fields {
            let name: Arc<str> = name.into();
            if !seen.insert(name.clone()) {
                return Err(LayoutError::DuplicateField(name.to_string()));
            }
            let w = ty.width();
            out.push(Field { name, ty, offset });
            offset = offset.checked_add(w).ok_or(LayoutError::TooWide)?;
        }
        Ok(RecordType {
            fields: out,
            width: offset,
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| &*f.name == name)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn count(&self) -> u64 {
        self.fields
            .iter()
            .fold(1u64, |acc, f| acc.saturating_mul(f.ty.count()))
    }
}

/// Type of a state variable
///
/// Cloning is cheap: composite descriptors are reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Boolean,
    Range(RangeType),
    Enum(EnumType),
    Array(Arc<ArrayType>),
    Record(Arc<RecordType>),
}

impl TypeDesc {
    pub fn boolean() -> Self {
        TypeDesc::Boolean
    }

    pub fn range(min: i64, max: i64) -> Result<Self, LayoutError> {
        RangeType::new(min, max).map(TypeDesc::Range)
    }

    pub fn enumeration<S: Into<Arc<str>>>(
        members: impl IntoIterator<Item = S>,
    ) -> Result<Self, LayoutError> {
        EnumType::new(members).map(TypeDesc::Enum)
    }

    pub fn array(index: TypeDesc, element: TypeDesc) -> Result<Self, LayoutError> {
        ArrayType::new(index, element).map(|a| TypeDesc::Array(Arc::new(a)))
    }

    pub fn record<S: Into<Arc<str>>>(
        fields: impl IntoIterator<Item = (S, TypeDesc)>,
    ) -> Result<Self, LayoutError> {
        RecordType::new(fields).map(|r| TypeDesc::Record(Arc::new(r)))
    }

    pub fn width(&self) -> usize {
        match self {
            TypeDesc::Boolean => 1,
            TypeDesc::Range(r) => r.width(),
            TypeDesc::Enum(e) => e.width(),
            TypeDesc::Array(a) => a.width(),
            TypeDesc::Record(r) => r.width(),
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            TypeDesc::Boolean => 2,
            TypeDesc::Range(r) => r.count(),
            TypeDesc::Enum(e) => e.count(),
            TypeDesc::Array(a) => a.count(),
            TypeDesc::Record(r) => r.count(),
        }
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(self, TypeDesc::Boolean | TypeDesc::Range(_) | TypeDesc::Enum(_))
    }

    /// Ordinal position of a scalar index value, used for array indexing.
    ///
    /// Returns `None` when `v` lies outside the type's domain.
    pub fn ordinal_of(&self, v: i64) -> Option<usize> {
        match self {
            TypeDesc::Boolean => (0..=1).contains(&v).then_some(v as usize),
            TypeDesc::Range(r) => r.contains(v).then(|| r.encode(v) as usize),
            TypeDesc::Enum(e) => (v >= 0 && (v as u64) < e.count()).then_some(v as usize),
            TypeDesc::Array(_) | TypeDesc::Record(_) => None,
        }
    }

    /// Inverse of [`TypeDesc::ordinal_of`].
    pub fn value_at(&self, ordinal: usize) -> i64 {
        match self {
            TypeDesc::Range(r) => r.decode(ordinal as u64),
            _ => ordinal as i64,
        }
    }

    /// Render a scalar index value for element paths like `a[3]` or `a[red]`.
    pub fn index_label(&self, ordinal: usize) -> String {
        match self {
            TypeDesc::Boolean => (ordinal != 0).to_string(),
            TypeDesc::Enum(e) => e
                .member(ordinal as u64)
                .map(str::to_string)
                .unwrap_or_else(|| ordinal.to_string()),
            _ => self.value_at(ordinal).to_string(),
        }
    }
}
