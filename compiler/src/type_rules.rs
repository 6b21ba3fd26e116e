// type_rules.rs — Casting and operator rules
//
// The castability oracle consulted by the value box and the sanity checks:
// which conversions are silent (implicit), which need an explicit cast, and
// which operand/result types a binary operator produces.
//
// Preconditions: none (pure functions over type descriptors).
// Postconditions: none.
// Failure modes: none; impossible requests yield CastType::NotPossible or None.
// Side effects: none.

use crate::types::{Primitive, Type, TypeEqualityOptions};
use crate::value::Value;

// ── Cast classification ──────────────────────────────────────────────────

/// The lattice of conversions between two types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    NotPossible,
    Identity,
    PrimitiveNumericLossless,
    PrimitiveNumericReduction,
    ArrayElementLossless,
    ArrayElementReduction,
    ValueToArray,
    SingleElementVectorToScalar,
    FixedSizeArrayToDynamicArray,
    WrapValue,
    ClampValue,
}

/// Classify a primitive-to-primitive conversion.
pub fn cast_type_primitive(dest: Primitive, source: Primitive) -> CastType {
    if dest == source {
        return CastType::Identity;
    }

    if dest.is_void() || source.is_void() {
        return CastType::NotPossible;
    }

    if dest.is_integer32() && source.is_integer64() {
        return CastType::PrimitiveNumericReduction;
    }

    if dest.is_integer() {
        return if source.is_floating_point() {
            CastType::PrimitiveNumericReduction
        } else {
            CastType::PrimitiveNumericLossless
        };
    }

    if dest.is_float32() {
        return CastType::PrimitiveNumericReduction;
    }

    if dest.is_float64() {
        return if source.is_bool() {
            CastType::PrimitiveNumericReduction
        } else {
            CastType::PrimitiveNumericLossless
        };
    }

    if dest.is_bool() {
        return CastType::PrimitiveNumericReduction;
    }

    CastType::NotPossible
}

/// Classify a conversion between two arbitrary types.
pub fn cast_type(dest: &Type, source: &Type) -> CastType {
    if dest.is_identical(source) {
        return CastType::Identity;
    }

    if dest.is_void() || source.is_void() {
        return CastType::NotPossible;
    }

    if (dest.is_primitive() || dest.is_vector_of_size1())
        && source.is_primitive()
        && !dest.is_reference()
    {
        if let (Some(d), Some(s)) = (dest.primitive_type(), source.primitive_type()) {
            return cast_type_primitive(d, s);
        }
    }

    if source.is_equal(
        dest,
        TypeEqualityOptions {
            ignore_const: true,
            ..Default::default()
        },
    ) && !(dest.is_reference() || source.is_reference())
    {
        return CastType::Identity;
    }

    if dest.is_array() {
        return cast_type_to_array(dest, source);
    }

    if dest.is_vector() {
        return cast_type_to_vector(dest, source);
    }

    if dest.is_struct() || source.is_struct() {
        return CastType::NotPossible;
    }

    if dest.is_bounded_int() {
        return cast_type_to_bounded_int(dest, source);
    }

    if source.is_bounded_int() {
        return cast_type(dest, &Type::int32());
    }

    if dest.is_string_literal() && source.is_string_literal() {
        return CastType::Identity;
    }

    if dest.is_primitive() && source.is_vector_of_size1() {
        let layout_equal = dest.is_equal(
            source,
            TypeEqualityOptions {
                ignore_const: true,
                ignore_vector_size1: true,
                ..Default::default()
            },
        );
        let element_silent = match (dest.primitive_type(), source.primitive_type()) {
            (Some(d), Some(s)) => can_silently_cast_primitive(d, s),
            _ => false,
        };
        if layout_equal || element_silent {
            return CastType::SingleElementVectorToScalar;
        }
    }

    CastType::NotPossible
}

fn cast_type_to_array(dest: &Type, source: &Type) -> CastType {
    let dest_element = match dest.element_type() {
        Some(t) => t,
        None => return CastType::NotPossible,
    };

    if dest.is_unsized_array() && source.is_fixed_size_array() {
        if let Some(source_element) = source.element_type() {
            if source_element.is_identical(&dest_element) {
                return CastType::FixedSizeArrayToDynamicArray;
            }
        }
    }

    if source.is_primitive() || source.is_vector_of_size1() {
        if let Some(p) = source.primitive_type() {
            if cast_type(&dest_element, &Type::primitive(p)) != CastType::NotPossible {
                return CastType::ValueToArray;
            }
        }
    }

    if source.is_fixed_size_array()
        && source.array_or_vector_size() == dest.array_or_vector_size()
    {
        if let Some(source_element) = source.element_type() {
            return match cast_type(&dest_element, &source_element) {
                CastType::PrimitiveNumericReduction => CastType::ArrayElementReduction,
                CastType::PrimitiveNumericLossless
                | CastType::SingleElementVectorToScalar
                | CastType::ValueToArray => CastType::ArrayElementLossless,
                CastType::Identity => CastType::Identity,
                _ => CastType::NotPossible,
            };
        }
    }

    CastType::NotPossible
}

fn cast_type_to_vector(dest: &Type, source: &Type) -> CastType {
    let dest_element = match dest.primitive_type() {
        Some(p) => p,
        None => return CastType::NotPossible,
    };

    if source.is_primitive() || source.is_vector_of_size1() {
        if let Some(p) = source.primitive_type() {
            if cast_type_primitive(dest_element, p) != CastType::NotPossible {
                return CastType::ValueToArray;
            }
        }
    }

    if source.is_vector() && source.array_or_vector_size() == dest.array_or_vector_size() {
        if let Some(p) = source.primitive_type() {
            return match cast_type_primitive(dest_element, p) {
                CastType::Identity => CastType::Identity,
                CastType::PrimitiveNumericReduction => CastType::ArrayElementReduction,
                CastType::PrimitiveNumericLossless => CastType::ArrayElementLossless,
                _ => CastType::NotPossible,
            };
        }
    }

    CastType::NotPossible
}

fn cast_type_to_bounded_int(dest: &Type, source: &Type) -> CastType {
    let dest_limit = dest.bounded_int_limit().unwrap_or(0);

    if let Some(source_limit) = source.bounded_int_limit() {
        if dest_limit >= source_limit {
            return CastType::Identity;
        }
    }

    let source_is_numeric =
        source.is_bounded_int() || source.is_primitive_integer() || source.is_primitive_float();

    if dest.is_wrapped() && source_is_numeric {
        return CastType::WrapValue;
    }

    if dest.is_clamped() && source_is_numeric {
        return CastType::ClampValue;
    }

    CastType::NotPossible
}

// ── Castability predicates ───────────────────────────────────────────────

pub fn can_cast_to(dest: &Type, source: &Type) -> bool {
    cast_type(dest, source) != CastType::NotPossible
}

pub fn is_silent_cast(cast: CastType) -> bool {
    matches!(
        cast,
        CastType::Identity
            | CastType::PrimitiveNumericLossless
            | CastType::ArrayElementLossless
            | CastType::ValueToArray
            | CastType::SingleElementVectorToScalar
            | CastType::FixedSizeArrayToDynamicArray
    )
}

pub fn can_silently_cast_primitive(dest: Primitive, source: Primitive) -> bool {
    is_silent_cast(cast_type_primitive(dest, source))
}

pub fn can_silently_cast(dest: &Type, source: &Type) -> bool {
    is_silent_cast(cast_type(dest, source))
}

/// Value-aware silent cast: a literal constant may be silently cast as long
/// as its value survives the conversion unchanged.
pub fn can_silently_cast_value(dest: &Type, value: &Value) -> bool {
    let source = value.ty();

    if dest.is_unsized_array() {
        return false;
    }

    if can_silently_cast(dest, source) {
        return true;
    }

    if dest.is_bounded_int() && (source.is_integer() || source.is_bounded_int()) {
        if let (Some(limit), Some(v)) = (dest.bounded_int_limit(), value.get_as_i64()) {
            return v >= 0 && v < limit;
        }
        return false;
    }

    if dest.is_float32() {
        if source.is_float64() {
            if let Some(v) = value.get_as_f64() {
                return (v as f32) as f64 == v;
            }
        }
        if source.is_integer() {
            if let (Some(f), Some(i)) = (value.get_as_f32(), value.get_as_i32()) {
                return f == i as f32;
            }
        }
    }

    if dest.is_integer() {
        if source.is_float64() {
            if let (Some(i), Some(v)) = (value.get_as_i32(), value.get_as_f64()) {
                return i as f64 == v;
            }
        }
        if source.is_float32() {
            if let (Some(i), Some(f)) = (value.get_as_i32(), value.get_as_f32()) {
                return i as f32 == f;
            }
        }
    }

    false
}

// ── Binary operator types ────────────────────────────────────────────────

/// The result type and the type both operands must be coerced to for a
/// binary operator.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOperatorTypes {
    pub result_type: Type,
    pub operand_type: Type,
}

impl BinaryOperatorTypes {
    fn uniform(t: Type) -> Self {
        BinaryOperatorTypes {
            result_type: t.clone(),
            operand_type: t,
        }
    }
}

pub fn is_type_suitable_for_binary_op(t: &Type) -> bool {
    !(t.is_struct() || t.is_array() || t.is_string_literal())
}

fn are_types_suitable_for_binary_op(a: &Type, b: &Type) -> bool {
    is_type_suitable_for_binary_op(a) && is_type_suitable_for_binary_op(b)
}

pub fn types_for_arithmetic_op(a: &Type, b: &Type) -> Option<BinaryOperatorTypes> {
    if a.is_reference() {
        return types_for_arithmetic_op(&a.clone().without_reference(), b);
    }
    if b.is_reference() {
        return types_for_arithmetic_op(a, &b.clone().without_reference());
    }

    if !are_types_suitable_for_binary_op(a, b) {
        return None;
    }

    if a.is_identical(b) {
        return Some(BinaryOperatorTypes::uniform(a.clone()));
    }

    // A bounded int only pairs with a primitive integer, and keeps its bound.
    if a.is_bounded_int() {
        return b
            .is_primitive_integer()
            .then(|| BinaryOperatorTypes::uniform(a.clone()));
    }
    if b.is_bounded_int() {
        return a
            .is_primitive_integer()
            .then(|| BinaryOperatorTypes::uniform(b.clone()));
    }

    if can_silently_cast(a, b) {
        return Some(BinaryOperatorTypes::uniform(a.clone()));
    }
    if can_silently_cast(b, a) {
        return Some(BinaryOperatorTypes::uniform(b.clone()));
    }

    // Ints promote silently to float operands.
    if a.is_primitive_float() && b.is_integer() {
        return Some(BinaryOperatorTypes::uniform(a.clone()));
    }
    if b.is_primitive_float() && a.is_integer() {
        return Some(BinaryOperatorTypes::uniform(b.clone()));
    }

    None
}

pub fn types_for_logical_op(a: &Type, b: &Type) -> Option<BinaryOperatorTypes> {
    if are_types_suitable_for_binary_op(a, b) && a.vector_size() == b.vector_size() {
        return Some(BinaryOperatorTypes::uniform(Type::bool_type()));
    }
    None
}

pub fn types_for_equality_op(a: &Type, b: &Type) -> Option<BinaryOperatorTypes> {
    // String literals support == and != but are unordered.
    if a.is_string_literal() && b.is_string_literal() {
        return Some(BinaryOperatorTypes {
            result_type: Type::bool_type(),
            operand_type: a.clone(),
        });
    }

    types_for_comparison_op(a, b)
}

pub fn types_for_comparison_op(a: &Type, b: &Type) -> Option<BinaryOperatorTypes> {
    if a.is_bounded_int() {
        return types_for_comparison_op(&Type::int32(), b);
    }
    if b.is_bounded_int() {
        return types_for_comparison_op(a, &Type::int32());
    }

    let operand_type = types_for_arithmetic_op(a, b)?.operand_type;

    if a.vector_size() != b.vector_size() {
        return None;
    }

    let result_type = if a.is_vector() || b.is_vector() {
        Type::vector(Primitive::Bool, a.vector_size() as u32)
    } else {
        Type::bool_type()
    };

    Some(BinaryOperatorTypes {
        result_type,
        operand_type,
    })
}

fn is_type_suitable_for_bitwise_op(t: &Type) -> bool {
    t.is_integer() && is_type_suitable_for_binary_op(t)
}

pub fn types_for_bitwise_op(a: &Type, b: &Type) -> Option<BinaryOperatorTypes> {
    if a.is_reference() {
        return types_for_bitwise_op(&a.clone().without_reference(), b);
    }
    if b.is_reference() {
        return types_for_bitwise_op(a, &b.clone().without_reference());
    }

    if a.is_bounded_int() {
        return types_for_bitwise_op(&Type::int32(), &b.clone().without_reference());
    }
    if b.is_bounded_int() {
        return types_for_bitwise_op(&a.clone().without_reference(), &Type::int32());
    }

    if is_type_suitable_for_bitwise_op(a)
        && is_type_suitable_for_bitwise_op(b)
        && a.vector_size() == b.vector_size()
        && a.is_vector() == b.is_vector()
    {
        let int_type = if a.is_integer64() || b.is_integer64() {
            Primitive::Int64
        } else {
            Primitive::Int32
        };

        let t = if a.is_vector() {
            Type::vector(int_type, a.vector_size() as u32)
        } else {
            Type::primitive(int_type)
        };

        return Some(BinaryOperatorTypes::uniform(t));
    }

    None
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_widening_is_silent() {
        assert!(can_silently_cast(&Type::int64(), &Type::int32()));
        assert!(can_silently_cast(&Type::float64(), &Type::float32()));
        assert!(can_silently_cast(&Type::float64(), &Type::int64()));
        assert!(can_silently_cast(&Type::int32(), &Type::bool_type()));
    }

    #[test]
    fn primitive_narrowing_needs_explicit_cast() {
        assert!(!can_silently_cast(&Type::int32(), &Type::int64()));
        assert!(can_cast_to(&Type::int32(), &Type::int64()));

        assert!(!can_silently_cast(&Type::float32(), &Type::float64()));
        assert!(can_cast_to(&Type::float32(), &Type::float64()));

        assert!(!can_silently_cast(&Type::int32(), &Type::float32()));
        assert!(can_cast_to(&Type::int32(), &Type::float32()));
    }

    #[test]
    fn void_casts_nowhere() {
        assert!(!can_cast_to(&Type::void(), &Type::int32()));
        assert!(!can_cast_to(&Type::int32(), &Type::void()));
    }

    #[test]
    fn vector_of_size1_and_scalar_interconvert() {
        let vec1 = Type::vector(Primitive::Float32, 1);
        assert_eq!(
            cast_type(&Type::float32(), &vec1),
            CastType::SingleElementVectorToScalar
        );
        assert_eq!(cast_type(&vec1, &Type::float32()), CastType::Identity);
    }

    #[test]
    fn scalar_broadcasts_into_sequences() {
        assert_eq!(
            cast_type(&Type::vector(Primitive::Float32, 4), &Type::float32()),
            CastType::ValueToArray
        );
        assert_eq!(
            cast_type(&Type::float32().array_of(4), &Type::int32()),
            CastType::ValueToArray
        );
    }

    #[test]
    fn array_casts_are_elementwise_and_size_checked() {
        let i32x4 = Type::int32().array_of(4);
        let i64x4 = Type::int64().array_of(4);
        let i64x3 = Type::int64().array_of(3);

        assert_eq!(cast_type(&i64x4, &i32x4), CastType::ArrayElementLossless);
        assert_eq!(cast_type(&i32x4, &i64x4), CastType::ArrayElementReduction);
        assert_eq!(cast_type(&i64x3, &i32x4), CastType::NotPossible);
    }

    #[test]
    fn fixed_array_to_unsized_needs_identical_elements() {
        let fixed = Type::float32().array_of(4);
        let unsized_f32 = Type::float32().unsized_array_of();
        let unsized_f64 = Type::float64().unsized_array_of();

        assert_eq!(
            cast_type(&unsized_f32, &fixed),
            CastType::FixedSizeArrayToDynamicArray
        );
        assert_eq!(cast_type(&unsized_f64, &fixed), CastType::NotPossible);
    }

    #[test]
    fn bounded_int_casts() {
        // Widening the bound is an identity.
        assert_eq!(
            cast_type(&Type::wrapped_int(16), &Type::wrapped_int(8)),
            CastType::Identity
        );
        // Narrowing wraps or clamps.
        assert_eq!(
            cast_type(&Type::wrapped_int(4), &Type::wrapped_int(8)),
            CastType::WrapValue
        );
        assert_eq!(
            cast_type(&Type::clamped_int(4), &Type::int32()),
            CastType::ClampValue
        );
        // A bounded source reads as an int32.
        assert_eq!(
            cast_type(&Type::int64(), &Type::wrapped_int(8)),
            CastType::PrimitiveNumericLossless
        );
    }

    #[test]
    fn structs_never_cast() {
        let mut s = crate::types::Structure::new("S");
        s.add_member(Type::int32(), "x");
        let s = Type::structure(std::rc::Rc::new(s));

        assert!(!can_cast_to(&s, &Type::int32()));
        assert!(!can_cast_to(&Type::int32(), &s));
    }

    #[test]
    fn constant_values_relax_silent_casts() {
        // 7 fits in wrap<10>, 15 does not.
        assert!(can_silently_cast_value(
            &Type::wrapped_int(10),
            &Value::from_i32(7)
        ));
        assert!(!can_silently_cast_value(
            &Type::wrapped_int(10),
            &Value::from_i32(15)
        ));

        // 1.5 survives float64 → float32, 0.1 does not.
        assert!(can_silently_cast_value(
            &Type::float32(),
            &Value::from_f64(1.5)
        ));
        assert!(!can_silently_cast_value(
            &Type::float32(),
            &Value::from_f64(0.1)
        ));

        // 3.0 survives float → int, 3.5 does not.
        assert!(can_silently_cast_value(
            &Type::int32(),
            &Value::from_f64(3.0)
        ));
        assert!(!can_silently_cast_value(
            &Type::int32(),
            &Value::from_f64(3.5)
        ));
    }

    #[test]
    fn arithmetic_operand_types() {
        let t = types_for_arithmetic_op(&Type::int32(), &Type::int64()).unwrap();
        assert_eq!(t.result_type, Type::int64());

        let t = types_for_arithmetic_op(&Type::float32(), &Type::int64()).unwrap();
        assert_eq!(t.result_type, Type::float32());

        let t = types_for_arithmetic_op(&Type::wrapped_int(8), &Type::int32()).unwrap();
        assert_eq!(t.result_type, Type::wrapped_int(8));

        assert!(types_for_arithmetic_op(&Type::wrapped_int(8), &Type::float32()).is_none());
        assert!(types_for_arithmetic_op(&Type::string_literal(), &Type::int32()).is_none());
    }

    #[test]
    fn comparison_result_types() {
        let t = types_for_comparison_op(&Type::int32(), &Type::int64()).unwrap();
        assert_eq!(t.result_type, Type::bool_type());

        let v4 = Type::vector(Primitive::Float32, 4);
        let t = types_for_comparison_op(&v4, &v4).unwrap();
        assert_eq!(t.result_type, Type::vector(Primitive::Bool, 4));

        let t = types_for_comparison_op(&Type::wrapped_int(8), &Type::int32()).unwrap();
        assert_eq!(t.operand_type, Type::int32());
    }

    #[test]
    fn equality_on_strings_is_allowed() {
        let t = types_for_equality_op(&Type::string_literal(), &Type::string_literal()).unwrap();
        assert_eq!(t.result_type, Type::bool_type());
        assert!(types_for_comparison_op(&Type::string_literal(), &Type::string_literal()).is_none());
    }

    #[test]
    fn bitwise_promotes_to_widest_int() {
        let t = types_for_bitwise_op(&Type::int32(), &Type::int64()).unwrap();
        assert_eq!(t.result_type, Type::int64());

        let t = types_for_bitwise_op(&Type::wrapped_int(8), &Type::int32()).unwrap();
        assert_eq!(t.result_type, Type::int32());

        assert!(types_for_bitwise_op(&Type::float32(), &Type::int32()).is_none());
    }
}
