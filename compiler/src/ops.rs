// ops.rs — Unary and binary operators
//
// Operator tags used by expression nodes, their operand suitability rules,
// and the range analysis that proves comparisons against bounded-int types
// always true or always false.
//
// Preconditions: none (pure functions).
// Postconditions: none.
// Failure modes: none.
// Side effects: none.

use crate::type_rules::{
    types_for_arithmetic_op, types_for_bitwise_op, types_for_comparison_op,
    types_for_equality_op, types_for_logical_op, BinaryOperatorTypes,
};
use crate::types::Type;
use crate::value::Value;

// ── Unary operators ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    LogicalNot,
    BitwiseNot,
}

impl UnaryOp {
    /// Whether the operand type works with this operator.
    pub fn is_type_suitable(self, operand: &Type) -> bool {
        if !operand.is_primitive_or_vector() {
            return false;
        }

        match self {
            UnaryOp::Negate => operand.is_integer() || operand.is_floating_point(),
            UnaryOp::LogicalNot => operand.is_bool(),
            UnaryOp::BitwiseNot => operand.is_integer(),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitwiseNot => "~",
        }
    }
}

// ── Binary operators ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LogicalAnd,
    LogicalOr,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LeftShift,
    RightShift,
    RightShiftUnsigned,
}

impl BinaryOp {
    /// Comparisons, including equality.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equals
                | BinaryOp::NotEquals
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitwiseAnd
                | BinaryOp::BitwiseOr
                | BinaryOp::BitwiseXor
                | BinaryOp::LeftShift
                | BinaryOp::RightShift
                | BinaryOp::RightShiftUnsigned
        )
    }

    /// Operand and result types for this operator, or None when the operand
    /// types are unsuitable.
    pub fn get_types(self, a: &Type, b: &Type) -> Option<BinaryOperatorTypes> {
        match self {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => types_for_arithmetic_op(a, b),

            BinaryOp::BitwiseAnd
            | BinaryOp::BitwiseOr
            | BinaryOp::BitwiseXor
            | BinaryOp::LeftShift
            | BinaryOp::RightShift
            | BinaryOp::RightShiftUnsigned => types_for_bitwise_op(a, b),

            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => types_for_logical_op(a, b),

            BinaryOp::Equals | BinaryOp::NotEquals => types_for_equality_op(a, b),

            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => types_for_comparison_op(a, b),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::BitwiseXor => "^",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::RightShiftUnsigned => ">>>",
        }
    }
}

// ── Comparison range analysis ────────────────────────────────────────────

/// Outcome of comparing a constant against every value a bounded-int type
/// can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOutcome {
    AlwaysTrue,
    AlwaysFalse,
    Unknown,
}

/// Analyse `constant OP x` where `x` ranges over the bounded type's domain
/// `[0, limit)`.
pub fn compare_constant_with_bounded_type(
    op: BinaryOp,
    constant: &Value,
    bounded: &Type,
) -> ComparisonOutcome {
    match (constant.get_as_i64(), bounded.bounded_int_limit()) {
        (Some(c), Some(limit)) if constant.ty().is_integer() || constant.ty().is_bounded_int() => {
            compare_constant_with_range(op, c, 0, limit - 1)
        }
        _ => ComparisonOutcome::Unknown,
    }
}

/// Analyse `x OP constant` where `x` ranges over the bounded type's domain.
pub fn compare_bounded_type_with_constant(
    op: BinaryOp,
    bounded: &Type,
    constant: &Value,
) -> ComparisonOutcome {
    let flipped = match op {
        BinaryOp::LessThan => BinaryOp::GreaterThan,
        BinaryOp::LessThanOrEqual => BinaryOp::GreaterThanOrEqual,
        BinaryOp::GreaterThan => BinaryOp::LessThan,
        BinaryOp::GreaterThanOrEqual => BinaryOp::LessThanOrEqual,
        other => other,
    };
    compare_constant_with_bounded_type(flipped, constant, bounded)
}

/// Compare `c OP x` for all `x` in `[lo, hi]`.
fn compare_constant_with_range(op: BinaryOp, c: i64, lo: i64, hi: i64) -> ComparisonOutcome {
    use ComparisonOutcome::*;

    match op {
        BinaryOp::LessThan => {
            if c < lo {
                AlwaysTrue
            } else if c >= hi {
                AlwaysFalse
            } else {
                Unknown
            }
        }
        BinaryOp::LessThanOrEqual => {
            if c <= lo {
                AlwaysTrue
            } else if c > hi {
                AlwaysFalse
            } else {
                Unknown
            }
        }
        BinaryOp::GreaterThan => {
            if c > hi {
                AlwaysTrue
            } else if c <= lo {
                AlwaysFalse
            } else {
                Unknown
            }
        }
        BinaryOp::GreaterThanOrEqual => {
            if c >= hi {
                AlwaysTrue
            } else if c < lo {
                AlwaysFalse
            } else {
                Unknown
            }
        }
        BinaryOp::Equals => {
            if c < lo || c > hi {
                AlwaysFalse
            } else if lo == hi && c == lo {
                AlwaysTrue
            } else {
                Unknown
            }
        }
        BinaryOp::NotEquals => {
            if c < lo || c > hi {
                AlwaysTrue
            } else if lo == hi && c == lo {
                AlwaysFalse
            } else {
                Unknown
            }
        }
        _ => Unknown,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;

    #[test]
    fn unary_suitability() {
        assert!(UnaryOp::Negate.is_type_suitable(&Type::float32()));
        assert!(UnaryOp::Negate.is_type_suitable(&Type::vector(Primitive::Int32, 4)));
        assert!(!UnaryOp::Negate.is_type_suitable(&Type::bool_type()));
        assert!(!UnaryOp::Negate.is_type_suitable(&Type::string_literal()));

        assert!(UnaryOp::LogicalNot.is_type_suitable(&Type::bool_type()));
        assert!(!UnaryOp::LogicalNot.is_type_suitable(&Type::int32()));

        assert!(UnaryOp::BitwiseNot.is_type_suitable(&Type::int64()));
        assert!(!UnaryOp::BitwiseNot.is_type_suitable(&Type::float32()));
    }

    #[test]
    fn operator_classification() {
        assert!(BinaryOp::LessThan.is_comparison());
        assert!(BinaryOp::Equals.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
        assert!(BinaryOp::LogicalAnd.is_logical());
        assert!(BinaryOp::LeftShift.is_bitwise());
    }

    #[test]
    fn comparison_against_wrap10_range() {
        let bounded = Type::wrapped_int(10); // domain [0, 9]

        // -1 < x for all x in [0, 9]
        assert_eq!(
            compare_constant_with_bounded_type(
                BinaryOp::LessThan,
                &Value::from_i32(-1),
                &bounded
            ),
            ComparisonOutcome::AlwaysTrue
        );
        // 9 < x never holds
        assert_eq!(
            compare_constant_with_bounded_type(BinaryOp::LessThan, &Value::from_i32(9), &bounded),
            ComparisonOutcome::AlwaysFalse
        );
        // 5 < x depends on x
        assert_eq!(
            compare_constant_with_bounded_type(BinaryOp::LessThan, &Value::from_i32(5), &bounded),
            ComparisonOutcome::Unknown
        );
        // 12 == x never holds
        assert_eq!(
            compare_constant_with_bounded_type(BinaryOp::Equals, &Value::from_i32(12), &bounded),
            ComparisonOutcome::AlwaysFalse
        );
        // 12 != x always holds
        assert_eq!(
            compare_constant_with_bounded_type(
                BinaryOp::NotEquals,
                &Value::from_i32(12),
                &bounded
            ),
            ComparisonOutcome::AlwaysTrue
        );
    }

    #[test]
    fn comparison_with_constant_on_the_right() {
        let bounded = Type::wrapped_int(10);

        // x < 10 always holds for x in [0, 9]
        assert_eq!(
            compare_bounded_type_with_constant(
                BinaryOp::LessThan,
                &bounded,
                &Value::from_i32(10)
            ),
            ComparisonOutcome::AlwaysTrue
        );
        // x >= 10 never holds
        assert_eq!(
            compare_bounded_type_with_constant(
                BinaryOp::GreaterThanOrEqual,
                &bounded,
                &Value::from_i32(10)
            ),
            ComparisonOutcome::AlwaysFalse
        );
        // x < 5 depends on x
        assert_eq!(
            compare_bounded_type_with_constant(BinaryOp::LessThan, &bounded, &Value::from_i32(5)),
            ComparisonOutcome::Unknown
        );
    }

    #[test]
    fn single_value_domain_equality() {
        let bounded = Type::wrapped_int(1); // domain {0}
        assert_eq!(
            compare_constant_with_bounded_type(BinaryOp::Equals, &Value::from_i32(0), &bounded),
            ComparisonOutcome::AlwaysTrue
        );
        assert_eq!(
            compare_constant_with_bounded_type(BinaryOp::NotEquals, &Value::from_i32(0), &bounded),
            ComparisonOutcome::AlwaysFalse
        );
    }

    #[test]
    fn non_constant_side_yields_unknown() {
        assert_eq!(
            compare_constant_with_bounded_type(
                BinaryOp::LessThan,
                &Value::from_f32(1.5),
                &Type::wrapped_int(10)
            ),
            ComparisonOutcome::Unknown
        );
        assert_eq!(
            compare_constant_with_bounded_type(
                BinaryOp::LessThan,
                &Value::from_i32(1),
                &Type::int32()
            ),
            ComparisonOutcome::Unknown
        );
    }
}
