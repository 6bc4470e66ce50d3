//! Free-standing values and checked integer arithmetic
//!
//! [`Value`] is the decoded form of anything a typed view can hold. It is what
//! [`crate::View::get`] returns and what [`crate::View::set`] accepts, and is
//! also how composite values are compared or copied between states.
//!
//! [`EvalCtx`] carries the per-run arithmetic policy into model callables.
//! All 64-bit arithmetic a model performs goes through it so that overflow
//! behaviour follows the run's `overflow_checks` option.

use std::fmt;

use crate::error::Fault;
use crate::types::RangeType;

/// A decoded value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Boolean(bool),
    Range(i64),
    /// Enum member ordinal
    Enum(u64),
    /// Elements in index order
    Array(Vec<Value>),
    /// Field values in declaration order
    Record(Vec<Value>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Range(_) => "range",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Range(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Range(v)
    }
}

/// Arithmetic policy for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalCtx {
    overflow_checks: bool,
}

impl Default for EvalCtx {
    fn default() -> Self {
        EvalCtx {
            overflow_checks: true,
        }
    }
}

impl EvalCtx {
    pub fn new(overflow_checks: bool) -> Self {
        EvalCtx { overflow_checks }
    }

    #[inline]
    pub fn overflow_checks(&self) -> bool {
        self.overflow_checks
    }

    #[inline]
    fn checked(
        &self,
        op: &'static str,
        checked: Option<i64>,
        wrapped: impl FnOnce() -> i64,
    ) -> Result<i64, Fault> {
        if self.overflow_checks {
            checked.ok_or(Fault::Overflow { op })
        } else {
            Ok(wrapped())
        }
    }

    #[inline]
    pub fn add(&self, a: i64, b: i64) -> Result<i64, Fault> {
        self.checked("addition", a.checked_add(b), || a.wrapping_add(b))
    }

    #[inline]
    pub fn sub(&self, a: i64, b: i64) -> Result<i64, Fault> {
        self.checked("subtraction", a.checked_sub(b), || a.wrapping_sub(b))
    }

    #[inline]
    pub fn mul(&self, a: i64, b: i64) -> Result<i64, Fault> {
        self.checked("multiplication", a.checked_mul(b), || a.wrapping_mul(b))
    }

    /// Truncating division. Division by zero faults regardless of policy.
    #[inline]
    pub fn div(&self, a: i64, b: i64) -> Result<i64, Fault> {
        if b == 0 {
            return Err(Fault::DivisionByZero { op: "division" });
        }
        self.checked("division", a.checked_div(b), || a.wrapping_div(b))
    }

    /// Remainder with the sign of the dividend. Modulus by zero always faults.
    #[inline]
    pub fn rem(&self, a: i64, b: i64) -> Result<i64, Fault> {
        if b == 0 {
            return Err(Fault::DivisionByZero { op: "modulus" });
        }
        self.checked("modulus", a.checked_rem(b), || a.wrapping_rem(b))
    }

    #[inline]
    pub fn neg(&self, a: i64) -> Result<i64, Fault> {
        self.checked("negation", a.checked_neg(), || a.wrapping_neg())
    }
}

/// Binary operators on bounded integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "addition",
            ArithOp::Sub => "subtraction",
            ArithOp::Mul => "multiplication",
            ArithOp::Div => "division",
            ArithOp::Rem => "mod",
        }
    }

    #[inline]
    fn apply(self, ctx: &EvalCtx, a: i64, b: i64) -> Result<i64, Fault> {
        match self {
            ArithOp::Add => ctx.add(a, b),
            ArithOp::Sub => ctx.sub(a, b),
            ArithOp::Mul => ctx.mul(a, b),
            ArithOp::Div => ctx.div(a, b),
            ArithOp::Rem => ctx.rem(a, b),
        }
    }
}

/// Comparison operators on bounded integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
        }
    }

    #[inline]
    fn apply(self, a: i64, b: i64) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Ge => a >= b,
            CmpOp::Gt => a > b,
        }
    }
}

#[inline]
fn check_free(ty: RangeType, v: i64, op: &str) -> Result<(), Fault> {
    if ty.contains(v) {
        Ok(())
    } else {
        Err(Fault::range(format!("{} is out of range in {}", v, op)))
    }
}

#[inline]
fn check_result(ty: RangeType, v: i64, op: ArithOp) -> Result<i64, Fault> {
    if ty.contains(v) {
        Ok(v)
    } else {
        Err(Fault::range(format!("result of {} is out of range", op.name())))
    }
}

/// `lhs op rhs` where `lhs` is a value of `ty` and `rhs` a free integer.
///
/// The free operand and the result must both lie in `ty`.
pub(crate) fn bounded_arith(
    ctx: &EvalCtx,
    ty: RangeType,
    op: ArithOp,
    lhs: i64,
    rhs: i64,
) -> Result<i64, Fault> {
    check_free(ty, rhs, op.name())?;
    check_result(ty, op.apply(ctx, lhs, rhs)?, op)
}

/// `lhs op rhs` where `lhs` is a free integer and `rhs` a value of `ty`.
///
/// Same bounds as [`bounded_arith`], with the free operand on the left.
pub(crate) fn bounded_arith_rev(
    ctx: &EvalCtx,
    ty: RangeType,
    op: ArithOp,
    lhs: i64,
    rhs: i64,
) -> Result<i64, Fault> {
    check_free(ty, lhs, op.name())?;
    check_result(ty, op.apply(ctx, lhs, rhs)?, op)
}

/// Compare a value of `ty` against a free integer, which must lie in `ty`.
pub(crate) fn bounded_cmp(ty: RangeType, op: CmpOp, lhs: i64, rhs: i64) -> Result<bool, Fault> {
    check_free(ty, rhs, op.symbol())?;
    Ok(op.apply(lhs, rhs))
}

/// Compare a free integer `lhs`, which must lie in `ty`, against a value of `ty`.
pub(crate) fn bounded_cmp_rev(
    ty: RangeType,
    op: CmpOp,
    lhs: i64,
    rhs: i64,
) -> Result<bool, Fault> {
    check_free(ty, lhs, op.symbol())?;
    Ok(op.apply(lhs, rhs))
}

/// A bounded integer not stored in any state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeValue {
    ty: RangeType,
    value: i64,
}

impl RangeValue {
    /// A new value initialised to the type's minimum.
    pub fn new(ty: RangeType) -> Self {
        RangeValue {
            ty,
            value: ty.min(),
        }
    }

    pub fn with_value(ty: RangeType, value: i64) -> Result<Self, Fault> {
        let mut v = RangeValue::new(ty);
        v.set(value)?;
        Ok(v)
    }

    #[inline]
    pub fn ty(&self) -> RangeType {
        self.ty
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value
    }

    pub fn set(&mut self, value: i64) -> Result<(), Fault> {
        if !self.ty.contains(value) {
            return Err(Fault::range(format!("{} is out of range", value)));
        }
        self.value = value;
        Ok(())
    }

    pub fn arith(&self, ctx: &EvalCtx, op: ArithOp, rhs: i64) -> Result<i64, Fault> {
        bounded_arith(ctx, self.ty, op, self.value, rhs)
    }

    pub fn cmp(&self, op: CmpOp, rhs: i64) -> Result<bool, Fault> {
        bounded_cmp(self.ty, op, self.value, rhs)
    }

    pub fn add(&self, ctx: &EvalCtx, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, ArithOp::Add, rhs)
    }

    pub fn sub(&self, ctx: &EvalCtx, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, ArithOp::Sub, rhs)
    }

    pub fn mul(&self, ctx: &EvalCtx, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, ArithOp::Mul, rhs)
    }

    pub fn div(&self, ctx: &EvalCtx, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, ArithOp::Div, rhs)
    }

    pub fn rem(&self, ctx: &EvalCtx, rhs: i64) -> Result<i64, Fault> {
        self.arith(ctx, ArithOp::Rem, rhs)
    }

    /// `lhs op self` with a free integer on the left.
    pub fn rarith(&self, ctx: &EvalCtx, op: ArithOp, lhs: i64) -> Result<i64, Fault> {
        bounded_arith_rev(ctx, self.ty, op, lhs, self.value)
    }

    /// `lhs op self` with a free integer on the left.
    pub fn rcmp(&self, op: CmpOp, lhs: i64) -> Result<bool, Fault> {
        bounded_cmp_rev(self.ty, op, lhs, self.value)
    }
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_checked() {
        let ctx = EvalCtx::new(true);
        assert_eq!(
            ctx.add(i64::MAX, 1),
            Err(Fault::Overflow { op: "addition" })
        );
        assert_eq!(
            ctx.sub(i64::MIN, 1),
            Err(Fault::Overflow { op: "subtraction" })
        );
        assert_eq!(
            ctx.mul(i64::MAX, 2),
            Err(Fault::Overflow { op: "multiplication" })
        );
        assert_eq!(ctx.div(i64::MIN, -1), Err(Fault::Overflow { op: "division" }));
        assert_eq!(ctx.rem(i64::MIN, -1), Err(Fault::Overflow { op: "modulus" }));
        assert_eq!(ctx.neg(i64::MIN), Err(Fault::Overflow { op: "negation" }));
        assert_eq!(ctx.add(40, 2), Ok(42));
    }

    #[test]
    fn test_overflow_wraps_when_disabled() {
        let ctx = EvalCtx::new(false);
        assert_eq!(ctx.add(i64::MAX, 1), Ok(i64::MIN));
        assert_eq!(ctx.neg(i64::MIN), Ok(i64::MIN));
        assert_eq!(ctx.div(i64::MIN, -1), Ok(i64::MIN));
        assert_eq!(ctx.rem(i64::MIN, -1), Ok(0));
    }

    #[test]
    fn test_division_by_zero_always_faults() {
        for checks in [true, false] {
            let ctx = EvalCtx::new(checks);
            assert_eq!(
                ctx.div(1, 0),
                Err(Fault::DivisionByZero { op: "division" })
            );
            assert_eq!(ctx.rem(1, 0), Err(Fault::DivisionByZero { op: "modulus" }));
        }
    }

    #[test]
    fn test_rem_follows_dividend_sign() {
        let ctx = EvalCtx::default();
        assert_eq!(ctx.rem(-7, 3), Ok(-1));
        assert_eq!(ctx.div(-7, 2), Ok(-3));
    }

    #[test]
    fn test_range_value_bounds() {
        let ty = RangeType::new(0, 10).unwrap();
        let ctx = EvalCtx::default();
        let mut v = RangeValue::new(ty);
        assert_eq!(v.get(), 0);
        v.set(9).unwrap();
        assert_eq!(v.add(&ctx, 1), Ok(10));
        assert_eq!(
            v.add(&ctx, 2),
            Err(Fault::range("result of addition is out of range"))
        );
        assert_eq!(
            v.add(&ctx, 11),
            Err(Fault::range("11 is out of range in addition"))
        );
        assert_eq!(v.cmp(CmpOp::Lt, 10), Ok(true));
        assert_eq!(v.cmp(CmpOp::Ge, -1), Err(Fault::range("-1 is out of range in >=")));
        assert!(v.set(11).is_err());
        assert_eq!(v.get(), 9);
        assert_eq!(v.rem(&ctx, 0), Err(Fault::DivisionByZero { op: "modulus" }));
    }

    #[test]
    fn test_range_value_free_operand_on_left() {
        let ty = RangeType::new(0, 10).unwrap();
        let ctx = EvalCtx::default();
        let v = RangeValue::with_value(ty, 4).unwrap();
        assert_eq!(v.rarith(&ctx, ArithOp::Sub, 10), Ok(6));
        assert_eq!(v.rarith(&ctx, ArithOp::Rem, 10), Ok(2));
        assert_eq!(
            v.rarith(&ctx, ArithOp::Sub, 3),
            Err(Fault::range("result of subtraction is out of range"))
        );
        assert_eq!(
            v.rarith(&ctx, ArithOp::Div, 12),
            Err(Fault::range("12 is out of range in division"))
        );
        assert_eq!(v.rcmp(CmpOp::Gt, 5), Ok(true));
        assert_eq!(v.rcmp(CmpOp::Le, 3), Ok(true));
        assert_eq!(v.rcmp(CmpOp::Lt, -1), Err(Fault::range("-1 is out of range in <")));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(-3i64).as_int(), Some(-3));
        assert_eq!(Value::Enum(1).as_int(), None);
        assert_eq!(Value::Range(0).as_bool(), None);
        assert_eq!(Value::Array(vec![]).kind_name(), "array");
    }
}
