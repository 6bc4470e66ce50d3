//! Typed views over packed bit blocks
//!
//! A view is a (type descriptor, bit offset) pair. It holds no reference to
//! any buffer: the block is passed to every accessor, so one view built at
//! model construction time can be captured by rule closures and used against
//! every state the checker hands them.
//!
//! Scalar views are `Copy`. Composite views share their descriptor through an
//! `Arc`, so cloning them never copies type structure.
//!
//! ```ignore
//! let x = layout.view("x")?.into_range()?;
//! let v = x.add(ctx, state, 1)?;
//! x.set(state, v)?;
//! ```

use std::sync::Arc;

use crate::bits::{BitBlock, BitBuffer};
use crate::error::Fault;
use crate::types::{ArrayType, EnumType, RangeType, RecordType, TypeDesc};
use crate::value::{
    bounded_arith, bounded_arith_rev, bounded_cmp, bounded_cmp_rev, ArithOp, CmpOp, EvalCtx, Value,
};

/// View of a Boolean variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolView {
    offset: usize,
}

impl BoolView {
    pub fn new(offset: usize) -> Self {
        BoolView { offset }
    }

    #[inline]
    pub fn get<B: BitBlock + ?Sized>(&self, b: &B) -> bool {
        b.read(self.offset, 1) != 0
    }

    #[inline]
    pub fn set<B: BitBlock + ?Sized>(&self, b: &mut B, v: bool) {
        b.write(self.offset, 1, v as u64);
    }
}

/// View of a bounded integer variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeView {
    offset: usize,
    ty: RangeType,
}

impl RangeView {
    pub fn new(offset: usize, ty: RangeType) -> Self {
        RangeView { offset, ty }
    }

    #[inline]
    pub fn ty(&self) -> RangeType {
        self.ty
    }

    #[inline]
    pub fn get<B: BitBlock + ?Sized>(&self, b: &B) -> i64 {
        self.ty.decode(b.read(self.offset, self.ty.width()))
    }

    /// Store `v`, which must lie within the declared bounds.
    #[inline]
    pub fn set<B: BitBlock + ?Sized>(&self, b: &mut B, v: i64) -> Result<(), Fault> {
        if !self.ty.contains(v) {
            return Err(Fault::range(format!("{} is out of range", v)));
        }
        b.write(self.offset, self.ty.width(), self.ty.encode(v));
        Ok(())
    }

    /// Current value with the stored bits validated against the bounds.
    ///
    /// Bit patterns beyond `max` are representable when the count is not a
    /// power of two; a buffer corrupted by the model surfaces here.
    #[inline]
    fn operand<B: BitBlock + ?Sized>(&self, b: &B) -> Result<i64, Fault> {
        let v = self.get(b);
        if self.ty.contains(v) {
            Ok(v)
        } else {
            Err(Fault::range(format!("{} is out of range", v)))
        }
    }

    pub fn arith<B: BitBlock + ?Sized>(
        &self,
        ctx: &EvalCtx,
        b: &B,
        op: ArithOp,
        rhs: i64,
    ) -> Result<i64, Fault> {
        bounded_arith(ctx, self.ty, op, self.operand(b)?, rhs)
    }

    pub fn cmp<B: BitBlock + ?Sized>(&self, b: &B, op: CmpOp, rhs: i64) -> Result<bool, Fault> {
        bounded_cmp(self.ty, op, self.operand(b)?, rhs)
    }

    pub fn add<B: BitBlock + ?Sized>(&self, ctx: &EvalCtx, b: &B, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, b, ArithOp::Add, rhs)
    }

    pub fn sub<B: BitBlock + ?Sized>(&self, ctx: &EvalCtx, b: &B, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, b, ArithOp::Sub, rhs)
    }

    pub fn mul<B: BitBlock + ?Sized>(&self, ctx: &EvalCtx, b: &B, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, b, ArithOp::Mul, rhs)
    }

    pub fn div<B: BitBlock + ?Sized>(&self, ctx: &EvalCtx, b: &B, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, b, ArithOp::Div, rhs)
    }

    pub fn rem<B: BitBlock + ?Sized>(&self, ctx: &EvalCtx, b: &B, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, b, ArithOp::Rem, rhs)
    }

    pub fn lt<B: BitBlock + ?Sized>(&self, b: &B, rhs: i64) -> Result<bool, Fault> {
        self.cmp(b, CmpOp::Lt, rhs)
    }

    pub fn le<B: BitBlock + ?Sized>(&self, b: &B, rhs: i64) -> Result<bool, Fault> {
        self.cmp(b, CmpOp::Le, rhs)
    }

    pub fn equals<B: BitBlock + ?Sized>(&self, b: &B, rhs: i64) -> Result<bool, Fault> {
        self.cmp(b, CmpOp::Eq, rhs)
    }

    pub fn not_equals<B: BitBlock + ?Sized>(&self, b: &B, rhs: i64) -> Result<bool, Fault> {
        self.cmp(b, CmpOp::Ne, rhs)
    }

    pub fn ge<B: BitBlock + ?Sized>(&self, b: &B, rhs: i64) -> Result<bool, Fault> {
        self.cmp(b, CmpOp::Ge, rhs)
    }

    pub fn gt<B: BitBlock + ?Sized>(&self, b: &B, rhs: i64) -> Result<bool, Fault> {
        self.cmp(b, CmpOp::Gt, rhs)
    }

    /// `lhs op v` where `lhs` is a free integer and `v` the stored value.
    ///
    /// `lhs` and the result must lie within the declared bounds.
    pub fn rarith<B: BitBlock + ?Sized>(
        &self,
        ctx: &EvalCtx,
        b: &B,
        op: ArithOp,
        lhs: i64,
    ) -> Result<i64, Fault> {
        bounded_arith_rev(ctx, self.ty, op, lhs, self.operand(b)?)
    }

    /// `lhs op v` where `lhs` is a free integer within the bounds.
    pub fn rcmp<B: BitBlock + ?Sized>(&self, b: &B, op: CmpOp, lhs: i64) -> Result<bool, Fault> {
        bounded_cmp_rev(self.ty, op, lhs, self.operand(b)?)
    }

    pub fn rsub<B: BitBlock + ?Sized>(&self, ctx: &EvalCtx, b: &B, lhs: i64) -> Result<i64, Fault> {
        self.rarith(ctx, b, ArithOp::Sub, lhs)
    }

    pub fn rdiv<B: BitBlock + ?Sized>(&self, ctx: &EvalCtx, b: &B, lhs: i64) -> Result<i64, Fault> {
        self.rarith(ctx, b, ArithOp::Div, lhs)
    }

    pub fn rrem<B: BitBlock + ?Sized>(&self, ctx: &EvalCtx, b: &B, lhs: i64) -> Result<i64, Fault> {
        self.rarith(ctx, b, ArithOp::Rem, lhs)
    }
}

/// View of an enum variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumView {
    offset: usize,
    ty: EnumType,
}

impl EnumView {
    pub fn new(offset: usize, ty: EnumType) -> Self {
        EnumView { offset, ty }
    }

    pub fn ty(&self) -> &EnumType {
        &self.ty
    }

    /// Ordinal of the current member.
    #[inline]
    pub fn get<B: BitBlock + ?Sized>(&self, b: &B) -> u64 {
        b.read(self.offset, self.ty.width())
    }

    #[inline]
    pub fn set<B: BitBlock + ?Sized>(&self, b: &mut B, ordinal: u64) -> Result<(), Fault> {
        if ordinal >= self.ty.count() {
            return Err(Fault::range(format!("{} is out of range", ordinal)));
        }
        b.write(self.offset, self.ty.width(), ordinal);
        Ok(())
    }

    /// Whether the current member is `member`. Unknown names are a model fault.
    pub fn is<B: BitBlock + ?Sized>(&self, b: &B, member: &str) -> Result<bool, Fault> {
        let ordinal = self.ordinal(member)?;
        Ok(self.get(b) == ordinal)
    }

    pub fn set_member<B: BitBlock + ?Sized>(&self, b: &mut B, member: &str) -> Result<(), Fault> {
        let ordinal = self.ordinal(member)?;
        self.set(b, ordinal)
    }

    fn ordinal(&self, member: &str) -> Result<u64, Fault> {
        self.ty
            .ordinal(member)
            .ok_or_else(|| Fault::model(format!("unknown enum member {:?}", member)))
    }
}

/// View of an array variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayView {
    offset: usize,
    ty: Arc<ArrayType>,
}

impl ArrayView {
    pub fn new(offset: usize, ty: Arc<ArrayType>) -> Self {
        ArrayView { offset, ty }
    }

    pub fn ty(&self) -> &ArrayType {
        &self.ty
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ty.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ty.is_empty()
    }

    /// Element at index value `index` (a Range value, enum ordinal, or 0/1).
    pub fn at(&self, index: i64) -> Result<View, Fault> {
        let ordinal = self.ty.index().ordinal_of(index).ok_or_else(|| {
            Fault::range(format!("out of range access to array element {}", index))
        })?;
        Ok(self.element(ordinal))
    }

    /// Element at zero-based position `ordinal`.
    pub fn element(&self, ordinal: usize) -> View {
        debug_assert!(ordinal < self.len());
        View::new(
            self.ty.element(),
            self.offset + self.ty.element_offset(ordinal),
        )
    }

    pub fn elements(&self) -> impl Iterator<Item = View> + '_ {
        (0..self.len()).map(move |i| self.element(i))
    }
}

/// View of a record variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView {
    offset: usize,
    ty: Arc<RecordType>,
}

impl RecordView {
    pub fn new(offset: usize, ty: Arc<RecordType>) -> Self {
        RecordView { offset, ty }
    }

    pub fn ty(&self) -> &RecordType {
        &self.ty
    }

    pub fn field(&self, name: &str) -> Result<View, Fault> {
        let field = self
            .ty
            .field(name)
            .ok_or_else(|| Fault::model(format!("record has no field {:?}", name)))?;
        Ok(View::new(&field.ty, self.offset + field.offset))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, View)> + '_ {
        self.ty
            .fields()
            .iter()
            .map(move |f| (&*f.name, View::new(&f.ty, self.offset + f.offset)))
    }
}

/// A typed view of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Boolean(BoolView),
    Range(RangeView),
    Enum(EnumView),
    Array(ArrayView),
    Record(RecordView),
}

impl View {
    pub fn new(ty: &TypeDesc, offset: usize) -> View {
        match ty {
            TypeDesc::Boolean => View::Boolean(BoolView::new(offset)),
            TypeDesc::Range(r) => View::Range(RangeView::new(offset, *r)),
            TypeDesc::Enum(e) => View::Enum(EnumView::new(offset, e.clone())),
            TypeDesc::Array(a) => View::Array(ArrayView::new(offset, a.clone())),
            TypeDesc::Record(r) => View::Record(RecordView::new(offset, r.clone())),
        }
    }

    /// A zeroed buffer holding exactly one value of `ty`, and a view of it.
    pub fn standalone(ty: &TypeDesc) -> (View, BitBuffer) {
        (View::new(ty, 0), BitBuffer::new(ty.width()))
    }

    pub fn offset(&self) -> usize {
        match self {
            View::Boolean(v) => v.offset,
            View::Range(v) => v.offset,
            View::Enum(v) => v.offset,
            View::Array(v) => v.offset,
            View::Record(v) => v.offset,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            View::Boolean(_) => 1,
            View::Range(v) => v.ty.width(),
            View::Enum(v) => v.ty.width(),
            View::Array(v) => v.ty.width(),
            View::Record(v) => v.ty.width(),
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            View::Boolean(_) => 2,
            View::Range(v) => v.ty.count(),
            View::Enum(v) => v.ty.count(),
            View::Array(v) => v.ty.count(),
            View::Record(v) => v.ty.count(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            View::Boolean(_) => "boolean",
            View::Range(_) => "range",
            View::Enum(_) => "enum",
            View::Array(_) => "array",
            View::Record(_) => "record",
        }
    }

    fn mismatch(&self, wanted: &str) -> Fault {
        Fault::model(format!("expected {} but found {}", wanted, self.kind_name()))
    }

    pub fn into_bool(self) -> Result<BoolView, Fault> {
        match self {
            View::Boolean(v) => Ok(v),
            other => Err(other.mismatch("boolean")),
        }
    }

    pub fn into_range(self) -> Result<RangeView, Fault> {
        match self {
            View::Range(v) => Ok(v),
            other => Err(other.mismatch("range")),
        }
    }

    pub fn into_enum(self) -> Result<EnumView, Fault> {
        match self {
            View::Enum(v) => Ok(v),
            other => Err(other.mismatch("enum")),
        }
    }

    pub fn into_array(self) -> Result<ArrayView, Fault> {
        match self {
            View::Array(v) => Ok(v),
            other => Err(other.mismatch("array")),
        }
    }

    pub fn into_record(self) -> Result<RecordView, Fault> {
        match self {
            View::Record(v) => Ok(v),
            other => Err(other.mismatch("record")),
        }
    }

    /// Decode the viewed value.
    pub fn get<B: BitBlock + ?Sized>(&self, b: &B) -> Value {
        match self {
            View::Boolean(v) => Value::Boolean(v.get(b)),
            View::Range(v) => Value::Range(v.get(b)),
            View::Enum(v) => Value::Enum(v.get(b)),
            View::Array(v) => Value::Array(v.elements().map(|e| e.get(b)).collect()),
            View::Record(v) => Value::Record(v.fields().map(|(_, f)| f.get(b)).collect()),
        }
    }

    /// Encode `value` into the viewed field.
    ///
    /// Composite values are written element by element; on a fault some
    /// elements may already have been written.
    pub fn set<B: BitBlock + ?Sized>(&self, b: &mut B, value: &Value) -> Result<(), Fault> {
        match (self, value) {
            (View::Boolean(v), Value::Boolean(x)) => {
                v.set(b, *x);
                Ok(())
            }
            (View::Range(v), Value::Range(x)) => v.set(b, *x),
            (View::Enum(v), Value::Enum(x)) => v.set(b, *x),
            (View::Array(v), Value::Array(xs)) => {
                if xs.len() != v.len() {
                    return Err(Fault::model(format!(
                        "array of {} elements assigned {} values",
                        v.len(),
                        xs.len()
                    )));
                }
                for (e, x) in v.elements().zip(xs) {
                    e.set(b, x)?;
                }
                Ok(())
            }
            (View::Record(v), Value::Record(xs)) => {
                if xs.len() != v.ty.fields().len() {
                    return Err(Fault::model(format!(
                        "record of {} fields assigned {} values",
                        v.ty.fields().len(),
                        xs.len()
                    )));
                }
                for ((_, f), x) in v.fields().zip(xs) {
                    f.set(b, x)?;
                }
                Ok(())
            }
            (view, value) => Err(view.mismatch(value.kind_name())),
        }
    }

    /// Copy the viewed field from `src` into the same field of `dst`.
    pub fn copy<S, D>(&self, src: &S, dst: &mut D)
    where
        S: BitBlock + ?Sized,
        D: BitBlock + ?Sized,
    {
        let mut remaining = self.width();
        let mut offset = self.offset();
        while remaining > 0 {
            let w = remaining.min(64);
            dst.write(offset, w, src.read(offset, w));
            offset += w;
            remaining -= w;
        }
    }

    /// Render a scalar value, or `None` for composites.
    pub fn render_scalar<B: BitBlock + ?Sized>(&self, b: &B) -> Option<String> {
        Some(match self {
            View::Boolean(v) => v.get(b).to_string(),
            View::Range(v) => v.get(b).to_string(),
            View::Enum(v) => {
                let ordinal = v.get(b);
                v.ty
                    .member(ordinal)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("<invalid {}>", ordinal))
            }
            View::Array(_) | View::Record(_) => return None,
        })
    }

    /// Flatten into `(path, rendered value)` pairs, one per scalar leaf.
    ///
    /// Paths follow the modelling-language syntax: `a[2].f`.
    pub fn leaves<B: BitBlock + ?Sized>(&self, b: &B, path: &str, out: &mut Vec<(String, String)>) {
        match self {
            View::Array(v) => {
                for (i, e) in v.elements().enumerate() {
                    let p = format!("{}[{}]", path, v.ty.index().index_label(i));
                    e.leaves(b, &p, out);
                }
            }
            View::Record(v) => {
                for (name, f) in v.fields() {
                    let p = format!("{}.{}", path, name);
                    f.leaves(b, &p, out);
                }
            }
            scalar => {
                if let Some(s) = scalar.render_scalar(b) {
                    out.push((path.to_string(), s));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EvalCtx {
        EvalCtx::default()
    }

    #[test]
    fn test_bool_view() {
        let mut buf = BitBuffer::new(3);
        let v = BoolView::new(2);
        assert!(!v.get(&buf));
        v.set(&mut buf, true);
        assert!(v.get(&buf));
        assert_eq!(buf.bytes(), &[0b100]);
    }

    #[test]
    fn test_range_view_offsets_from_min() {
        let ty = RangeType::new(-4, 3).unwrap();
        let v = RangeView::new(1, ty);
        let mut buf = BitBuffer::new(4);
        // Zeroed storage decodes to the minimum
        assert_eq!(v.get(&buf), -4);
        v.set(&mut buf, 2).unwrap();
        assert_eq!(v.get(&buf), 2);
        assert_eq!(buf.read(1, 3), 6);
        assert_eq!(v.set(&mut buf, 4), Err(Fault::range("4 is out of range")));
        assert_eq!(v.get(&buf), 2);
    }

    #[test]
    fn test_range_view_arithmetic() {
        let ty = RangeType::new(0, 7).unwrap();
        let v = RangeView::new(0, ty);
        let mut buf = BitBuffer::new(3);
        v.set(&mut buf, 6).unwrap();
        assert_eq!(v.add(&ctx(), &buf, 1), Ok(7));
        assert_eq!(
            v.add(&ctx(), &buf, 2),
            Err(Fault::range("result of addition is out of range"))
        );
        assert_eq!(v.div(&ctx(), &buf, 4), Ok(1));
        assert_eq!(
            v.div(&ctx(), &buf, 0),
            Err(Fault::DivisionByZero { op: "division" })
        );
        assert_eq!(v.gt(&buf, 5), Ok(true));
        assert_eq!(v.le(&buf, 8), Err(Fault::range("8 is out of range in <=")));
    }

    #[test]
    fn test_range_view_free_operand_on_left() {
        let ty = RangeType::new(0, 7).unwrap();
        let v = RangeView::new(0, ty);
        let mut buf = BitBuffer::new(3);
        v.set(&mut buf, 2).unwrap();

        // 5 - x
        assert_eq!(v.rsub(&ctx(), &buf, 5), Ok(3));
        assert_eq!(
            v.rsub(&ctx(), &buf, 1),
            Err(Fault::range("result of subtraction is out of range"))
        );
        assert_eq!(
            v.rsub(&ctx(), &buf, 9),
            Err(Fault::range("9 is out of range in subtraction"))
        );
        assert_eq!(
            v.rsub(&ctx(), &buf, -1),
            Err(Fault::range("-1 is out of range in subtraction"))
        );

        assert_eq!(v.rdiv(&ctx(), &buf, 7), Ok(3));
        assert_eq!(v.rrem(&ctx(), &buf, 7), Ok(1));
        assert_eq!(v.rarith(&ctx(), &buf, ArithOp::Add, 5), Ok(7));
        assert_eq!(
            v.rarith(&ctx(), &buf, ArithOp::Mul, 4),
            Err(Fault::range("result of multiplication is out of range"))
        );

        v.set(&mut buf, 0).unwrap();
        assert_eq!(
            v.rdiv(&ctx(), &buf, 6),
            Err(Fault::DivisionByZero { op: "division" })
        );
        assert_eq!(
            v.rrem(&ctx(), &buf, 6),
            Err(Fault::DivisionByZero { op: "modulus" })
        );
    }

    #[test]
    fn test_range_view_compare_free_operand_on_left() {
        let ty = RangeType::new(-3, 3).unwrap();
        let v = RangeView::new(0, ty);
        let mut buf = BitBuffer::new(ty.width());
        v.set(&mut buf, 1).unwrap();

        // lhs op x
        assert_eq!(v.rcmp(&buf, CmpOp::Lt, 0), Ok(true));
        assert_eq!(v.rcmp(&buf, CmpOp::Lt, 1), Ok(false));
        assert_eq!(v.rcmp(&buf, CmpOp::Le, 1), Ok(true));
        assert_eq!(v.rcmp(&buf, CmpOp::Eq, 1), Ok(true));
        assert_eq!(v.rcmp(&buf, CmpOp::Ne, 1), Ok(false));
        assert_eq!(v.rcmp(&buf, CmpOp::Ge, -2), Ok(false));
        assert_eq!(v.rcmp(&buf, CmpOp::Gt, 2), Ok(true));
        assert_eq!(
            v.rcmp(&buf, CmpOp::Gt, 4),
            Err(Fault::range("4 is out of range in >"))
        );
    }

    #[test]
    fn test_out_of_range_bits_fault_on_use() {
        // [0, 4] needs 3 bits, so patterns 5..=7 are representable
        let ty = RangeType::new(0, 4).unwrap();
        let v = RangeView::new(0, ty);
        let mut buf = BitBuffer::new(3);
        buf.write(0, 3, 6);
        assert_eq!(v.equals(&buf, 1), Err(Fault::range("6 is out of range")));
    }

    #[test]
    fn test_enum_view() {
        let ty = EnumType::new(["idle", "busy", "done"]).unwrap();
        let v = EnumView::new(0, ty);
        let mut buf = BitBuffer::new(2);
        assert!(v.is(&buf, "idle").unwrap());
        v.set_member(&mut buf, "done").unwrap();
        assert_eq!(v.get(&buf), 2);
        assert!(v.set(&mut buf, 3).is_err());
        assert!(v.is(&buf, "nope").is_err());
        assert_eq!(View::Enum(v).render_scalar(&buf).as_deref(), Some("done"));
    }

    #[test]
    fn test_array_indexing() {
        let ty = TypeDesc::array(TypeDesc::range(1, 3).unwrap(), TypeDesc::range(0, 3).unwrap())
            .unwrap();
        let (view, mut buf) = View::standalone(&ty);
        let arr = view.into_array().unwrap();
        arr.at(2).unwrap().into_range().unwrap().set(&mut buf, 3).unwrap();
        assert_eq!(buf.read(2, 2), 3);
        assert_eq!(
            arr.at(4),
            Err(Fault::range("out of range access to array element 4"))
        );
        assert_eq!(
            View::Array(arr.clone()).get(&buf),
            Value::Array(vec![Value::Range(0), Value::Range(3), Value::Range(0)])
        );
    }

    #[test]
    fn test_record_set_and_leaves() {
        let ty = TypeDesc::record([
            ("ok", TypeDesc::boolean()),
            (
                "xs",
                TypeDesc::array(TypeDesc::boolean(), TypeDesc::range(5, 6).unwrap()).unwrap(),
            ),
        ])
        .unwrap();
        let (view, mut buf) = View::standalone(&ty);
        let value = Value::Record(vec![
            Value::Boolean(true),
            Value::Array(vec![Value::Range(6), Value::Range(5)]),
        ]);
        view.set(&mut buf, &value).unwrap();
        assert_eq!(view.get(&buf), value);

        let mut leaves = Vec::new();
        view.leaves(&buf, "r", &mut leaves);
        let expected = [("r.ok", "true"), ("r.xs[false]", "6"), ("r.xs[true]", "5")];
        assert_eq!(leaves.len(), expected.len());
        for ((p, v), (ep, ev)) in leaves.iter().zip(expected) {
            assert_eq!(p, ep);
            assert_eq!(v, ev);
        }
    }

    #[test]
    fn test_set_kind_mismatch() {
        let (view, mut buf) = View::standalone(&TypeDesc::boolean());
        assert!(matches!(
            view.set(&mut buf, &Value::Range(1)),
            Err(Fault::Model { .. })
        ));
    }

    #[test]
    fn test_copy_field_between_blocks() {
        let ty = TypeDesc::array(TypeDesc::range(0, 9).unwrap(), TypeDesc::range(0, 255).unwrap())
            .unwrap();
        let view = View::new(&ty, 5);
        let mut src = BitBuffer::new(5 + ty.width());
        let mut dst = BitBuffer::new(5 + ty.width());
        for (i, e) in view.clone().into_array().unwrap().elements().enumerate() {
            e.into_range().unwrap().set(&mut src, i as i64 * 25).unwrap();
        }
        view.copy(&src, &mut dst);
        assert_eq!(view.get(&src), view.get(&dst));
        assert_eq!(dst.read(0, 5), 0);
    }
}
