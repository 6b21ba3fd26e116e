// types.rs — Type descriptors for the Chime semantic model
//
// Describes kinds, sizes, layout, equality, and modifier flags of Chime
// types: primitives, bounded integers, vectors, arrays, string-literal
// handles, and named structures.
//
// Preconditions: none (value-like types, cheap to copy).
// Postconditions: none.
// Failure modes: constructors debug-assert their documented invariants;
//                queries return Option where the request may not apply.
// Side effects: none.

use std::fmt;
use std::rc::Rc;

// ── Limits ───────────────────────────────────────────────────────────────

/// Ceiling on the packed byte size of any single type. Exceeding it is the
/// "type too big" diagnostic.
pub const MAX_PACKED_OBJECT_SIZE: usize = 16 * 1024 * 1024;

/// Largest legal vector lane count.
pub const MAX_VECTOR_SIZE: i64 = 256;

/// Largest legal fixed array size.
pub const MAX_ARRAY_SIZE: i64 = i32::MAX as i64;

/// Largest legal bounded-integer limit (the value domain is `[0, limit)`,
/// stored packed as an int32).
pub const MAX_BOUNDED_INT_LIMIT: i64 = i32::MAX as i64;

// ── Primitive scalars ────────────────────────────────────────────────────

/// The primitive scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl Primitive {
    pub fn is_void(self) -> bool {
        self == Primitive::Void
    }

    pub fn is_bool(self) -> bool {
        self == Primitive::Bool
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Primitive::Int32 | Primitive::Int64)
    }

    pub fn is_integer32(self) -> bool {
        self == Primitive::Int32
    }

    pub fn is_integer64(self) -> bool {
        self == Primitive::Int64
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, Primitive::Float32 | Primitive::Float64)
    }

    pub fn is_float32(self) -> bool {
        self == Primitive::Float32
    }

    pub fn is_float64(self) -> bool {
        self == Primitive::Float64
    }

    pub fn can_be_vector_element(self) -> bool {
        self.is_integer() || self.is_floating_point() || self.is_bool()
    }

    pub fn packed_size_in_bytes(self) -> usize {
        match self {
            Primitive::Void => 1,
            Primitive::Bool => 1,
            Primitive::Int32 => 4,
            Primitive::Int64 => 8,
            Primitive::Float32 => 4,
            Primitive::Float64 => 8,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
        }
    }

    /// Compressed form used in function signature ids.
    pub fn short_description(self) -> &'static str {
        match self {
            Primitive::Void => "v",
            Primitive::Bool => "b",
            Primitive::Int32 => "i32",
            Primitive::Int64 => "i64",
            Primitive::Float32 => "f32",
            Primitive::Float64 => "f64",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// ── Structures ───────────────────────────────────────────────────────────

/// A member of a named record type.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub ty: Type,
}

/// A named record type with ordered members. Shared between the type
/// descriptors that reference it via `Rc`; two struct types are identical
/// only when they share the same `Structure` instance.
#[derive(Debug, Default)]
pub struct Structure {
    name: String,
    members: Vec<Member>,
}

impl Structure {
    pub fn new(name: impl Into<String>) -> Self {
        Structure {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_member(&mut self, ty: Type, name: impl Into<String>) {
        self.members.push(Member {
            name: name.into(),
            ty,
        });
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_type(&self, index: usize) -> &Type {
        &self.members[index].ty
    }

    pub fn member_name(&self, index: usize) -> &str {
        &self.members[index].name
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    pub fn member_with_name(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn packed_size_in_bytes(&self) -> usize {
        self.members
            .iter()
            .map(|m| m.ty.packed_size_in_bytes())
            .sum()
    }
}

// ── Type ─────────────────────────────────────────────────────────────────

/// Overflow policy of a bounded integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsPolicy {
    Wrap,
    Clamp,
}

#[derive(Debug, Clone)]
enum TypeKind {
    Primitive(Primitive),
    Vector { element: Primitive, size: u32 },
    /// `size == None` marks an unsized array, backed by a constant-table
    /// handle at the value level.
    Array { element: Box<Type>, size: Option<u32> },
    BoundedInt { policy: BoundsPolicy, limit: i64 },
    Struct(Rc<Structure>),
    StringLiteral,
}

/// Options for structural type equality. All call sites state their policy
/// explicitly; the default compares every difference.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeEqualityOptions {
    /// Treat a 1-lane vector and its scalar element type as equal.
    pub ignore_vector_size1: bool,
    /// Compare distinct structures member-wise instead of by identity.
    pub duck_type_structures: bool,
    /// Treat a string-literal handle and a primitive int32 as equal.
    pub treat_string_as_int32: bool,
    pub ignore_const: bool,
    pub ignore_references: bool,
}

impl TypeEqualityOptions {
    /// Same packed layout: lane-1 vectors match scalars, structures are
    /// compared member-wise.
    pub fn identical_layout() -> Self {
        TypeEqualityOptions {
            ignore_vector_size1: true,
            duck_type_structures: true,
            ..Default::default()
        }
    }
}

/// A self-describing type: a kind tag plus the two orthogonal modifier
/// flags `const` and `reference`.
#[derive(Debug, Clone)]
pub struct Type {
    kind: TypeKind,
    is_const: bool,
    is_ref: bool,
}

impl Type {
    // ── Constructors ────────────────────────────────────────────────────

    fn of(kind: TypeKind) -> Type {
        Type {
            kind,
            is_const: false,
            is_ref: false,
        }
    }

    pub fn primitive(p: Primitive) -> Type {
        Type::of(TypeKind::Primitive(p))
    }

    pub fn void() -> Type {
        Type::primitive(Primitive::Void)
    }

    pub fn bool_type() -> Type {
        Type::primitive(Primitive::Bool)
    }

    pub fn int32() -> Type {
        Type::primitive(Primitive::Int32)
    }

    pub fn int64() -> Type {
        Type::primitive(Primitive::Int64)
    }

    pub fn float32() -> Type {
        Type::primitive(Primitive::Float32)
    }

    pub fn float64() -> Type {
        Type::primitive(Primitive::Float64)
    }

    pub fn is_legal_vector_size(size: i64) -> bool {
        size > 0 && size <= MAX_VECTOR_SIZE
    }

    pub fn vector(element: Primitive, size: u32) -> Type {
        debug_assert!(element.can_be_vector_element());
        debug_assert!(Type::is_legal_vector_size(size as i64));
        Type::of(TypeKind::Vector { element, size })
    }

    pub fn can_be_safely_cast_to_array_size(size: i64) -> bool {
        size > 0 && size < MAX_ARRAY_SIZE
    }

    /// Build a fixed array whose elements have this type. Nested arrays are
    /// representable here so the sanity checks can reject them with a
    /// proper diagnostic.
    pub fn array_of(self, size: u32) -> Type {
        Type::of(TypeKind::Array {
            element: Box::new(self),
            size: Some(size),
        })
    }

    /// Build an unsized array whose elements have this type.
    pub fn unsized_array_of(self) -> Type {
        Type::of(TypeKind::Array {
            element: Box::new(self),
            size: None,
        })
    }

    pub fn is_legal_bounded_int_limit(limit: i64) -> bool {
        limit > 0 && limit <= MAX_BOUNDED_INT_LIMIT
    }

    pub fn wrapped_int(limit: i64) -> Type {
        debug_assert!(Type::is_legal_bounded_int_limit(limit));
        Type::of(TypeKind::BoundedInt {
            policy: BoundsPolicy::Wrap,
            limit,
        })
    }

    pub fn clamped_int(limit: i64) -> Type {
        debug_assert!(Type::is_legal_bounded_int_limit(limit));
        Type::of(TypeKind::BoundedInt {
            policy: BoundsPolicy::Clamp,
            limit,
        })
    }

    pub fn structure(s: Rc<Structure>) -> Type {
        Type::of(TypeKind::Struct(s))
    }

    pub fn string_literal() -> Type {
        Type::of(TypeKind::StringLiteral)
    }

    // ── Modifier flags ──────────────────────────────────────────────────

    pub fn is_const(&self) -> bool {
        self.is_const
    }

    pub fn is_reference(&self) -> bool {
        self.is_ref
    }

    pub fn is_non_const_reference(&self) -> bool {
        self.is_ref && !self.is_const
    }

    pub fn with_const(mut self) -> Type {
        self.is_const = true;
        self
    }

    pub fn without_const(mut self) -> Type {
        self.is_const = false;
        self
    }

    pub fn with_reference(mut self) -> Type {
        self.is_ref = true;
        self
    }

    pub fn without_reference(mut self) -> Type {
        self.is_ref = false;
        self
    }

    pub fn with_const_and_ref_flags(mut self, is_const: bool, is_ref: bool) -> Type {
        self.is_const = is_const;
        self.is_ref = is_ref;
        self
    }

    // ── Kind queries ────────────────────────────────────────────────────

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(Primitive::Void))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.kind, TypeKind::Vector { .. })
    }

    pub fn is_vector_of_size1(&self) -> bool {
        matches!(self.kind, TypeKind::Vector { size: 1, .. })
    }

    pub fn is_primitive_or_vector(&self) -> bool {
        self.is_primitive() || self.is_vector()
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn is_unsized_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { size: None, .. })
    }

    pub fn is_fixed_size_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { size: Some(_), .. })
    }

    pub fn is_array_or_vector(&self) -> bool {
        self.is_array() || self.is_vector()
    }

    pub fn is_fixed_size_aggregate(&self) -> bool {
        self.is_fixed_size_array() || self.is_vector() || self.is_struct()
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct(_))
    }

    pub fn is_string_literal(&self) -> bool {
        matches!(self.kind, TypeKind::StringLiteral)
    }

    pub fn is_bounded_int(&self) -> bool {
        matches!(self.kind, TypeKind::BoundedInt { .. })
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::BoundedInt {
                policy: BoundsPolicy::Wrap,
                ..
            }
        )
    }

    pub fn is_clamped(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::BoundedInt {
                policy: BoundsPolicy::Clamp,
                ..
            }
        )
    }

    /// The underlying scalar primitive, seen through vectors, arrays, and
    /// bounded ints (which are stored as int32).
    pub fn scalar_primitive(&self) -> Option<Primitive> {
        match &self.kind {
            TypeKind::Primitive(p) => Some(*p),
            TypeKind::Vector { element, .. } => Some(*element),
            TypeKind::Array { element, .. } => element.scalar_primitive(),
            TypeKind::BoundedInt { .. } => Some(Primitive::Int32),
            TypeKind::Struct(_) | TypeKind::StringLiteral => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.scalar_primitive().is_some_and(|p| p.is_integer())
    }

    pub fn is_integer32(&self) -> bool {
        self.scalar_primitive().is_some_and(|p| p.is_integer32())
    }

    pub fn is_integer64(&self) -> bool {
        self.scalar_primitive().is_some_and(|p| p.is_integer64())
    }

    pub fn is_floating_point(&self) -> bool {
        self.scalar_primitive()
            .is_some_and(|p| p.is_floating_point())
    }

    pub fn is_float32(&self) -> bool {
        self.scalar_primitive().is_some_and(|p| p.is_float32())
    }

    pub fn is_float64(&self) -> bool {
        self.scalar_primitive().is_some_and(|p| p.is_float64())
    }

    pub fn is_bool(&self) -> bool {
        self.scalar_primitive().is_some_and(|p| p.is_bool())
    }

    pub fn is_primitive_integer(&self) -> bool {
        self.is_primitive() && self.is_integer()
    }

    pub fn is_primitive_float(&self) -> bool {
        self.is_primitive() && self.is_floating_point()
    }

    pub fn is_primitive_bool(&self) -> bool {
        self.is_primitive() && self.is_bool()
    }

    pub fn is_scalar(&self) -> bool {
        self.is_primitive_or_vector() && (self.is_integer() || self.is_floating_point())
    }

    pub fn can_be_vector_element_type(&self) -> bool {
        match self.kind {
            TypeKind::Primitive(p) => p.can_be_vector_element(),
            _ => false,
        }
    }

    pub fn can_be_array_element_type(&self) -> bool {
        !(self.is_array() || self.is_reference() || self.is_const() || self.is_void())
    }

    // ── Component access ────────────────────────────────────────────────

    /// The primitive kind of a primitive or vector type.
    pub fn primitive_type(&self) -> Option<Primitive> {
        match &self.kind {
            TypeKind::Primitive(p) => Some(*p),
            TypeKind::Vector { element, .. } => Some(*element),
            TypeKind::BoundedInt { .. } => Some(Primitive::Int32),
            _ => None,
        }
    }

    /// Element type of an array or vector.
    pub fn element_type(&self) -> Option<Type> {
        match &self.kind {
            TypeKind::Array { element, .. } => Some((**element).clone()),
            TypeKind::Vector { element, .. } => Some(Type::primitive(*element)),
            _ => None,
        }
    }

    pub fn struct_ref(&self) -> Option<&Rc<Structure>> {
        match &self.kind {
            TypeKind::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Lane count for vectors; 1 for primitives.
    pub fn vector_size(&self) -> u64 {
        match self.kind {
            TypeKind::Vector { size, .. } => size as u64,
            _ => 1,
        }
    }

    /// Element count of a vector or fixed array. `None` for unsized arrays
    /// and non-sequences.
    pub fn array_or_vector_size(&self) -> Option<u64> {
        match self.kind {
            TypeKind::Vector { size, .. } => Some(size as u64),
            TypeKind::Array { size, .. } => size.map(|s| s as u64),
            _ => None,
        }
    }

    /// Element count of a fixed-size aggregate (struct members count as
    /// elements).
    pub fn num_aggregate_elements(&self) -> Option<u64> {
        match &self.kind {
            TypeKind::Struct(s) => Some(s.num_members() as u64),
            _ => self.array_or_vector_size(),
        }
    }

    pub fn bounded_int_limit(&self) -> Option<i64> {
        match self.kind {
            TypeKind::BoundedInt { limit, .. } => Some(limit),
            _ => None,
        }
    }

    pub fn bounds_policy(&self) -> Option<BoundsPolicy> {
        match self.kind {
            TypeKind::BoundedInt { policy, .. } => Some(policy),
            _ => None,
        }
    }

    /// Copy of an array or vector type with a different element count.
    pub fn with_new_array_size(&self, new_size: u32) -> Type {
        let mut t = self.clone();
        match &mut t.kind {
            TypeKind::Array { size, .. } => *size = Some(new_size),
            TypeKind::Vector { size, .. } => *size = new_size,
            _ => debug_assert!(false, "with_new_array_size on a non-sequence type"),
        }
        t
    }

    /// Whether a struct type transitively contains the given structure.
    pub fn uses_struct(&self, target: &Rc<Structure>) -> bool {
        match &self.kind {
            TypeKind::Struct(s) => {
                Rc::ptr_eq(s, target)
                    || s.members().iter().any(|m| m.ty.uses_struct(target))
            }
            TypeKind::Array { element, .. } => element.uses_struct(target),
            _ => false,
        }
    }

    // ── Index and range helpers ─────────────────────────────────────────

    /// Convert a possibly negative index into the `[0, size]` domain, with
    /// negative values counting back from the end.
    pub fn convert_index_to_valid_range(&self, index: i64) -> i64 {
        if index < 0 {
            self.array_or_vector_size().map_or(index, |s| s as i64 + index)
        } else {
            index
        }
    }

    pub fn is_valid_array_or_vector_index(&self, index: i64) -> bool {
        match self.array_or_vector_size() {
            Some(size) => {
                let i = self.convert_index_to_valid_range(index);
                i >= 0 && (i as u64) < size
            }
            None => false,
        }
    }

    /// Validate a half-open slice range.
    pub fn is_valid_array_or_vector_range(&self, start: i64, end: i64) -> bool {
        match self.array_or_vector_size() {
            Some(size) => {
                let s = self.convert_index_to_valid_range(start);
                let e = self.convert_index_to_valid_range(end);
                s >= 0 && s <= e && (e as u64) <= size
            }
            None => false,
        }
    }

    // ── Equality ────────────────────────────────────────────────────────

    pub fn is_equal(&self, other: &Type, options: TypeEqualityOptions) -> bool {
        if options.treat_string_as_int32 {
            let string_vs_int32 = |a: &Type, b: &Type| {
                a.is_string_literal() && b.is_primitive() && b.is_integer32()
            };
            if string_vs_int32(self, other) || string_vs_int32(other, self) {
                return true;
            }
        }

        if !options.ignore_references && self.is_ref != other.is_ref {
            return false;
        }

        if !options.ignore_const && self.is_const != other.is_const {
            return false;
        }

        match (&self.kind, &other.kind) {
            (TypeKind::Primitive(a), TypeKind::Primitive(b)) => a == b,

            (
                TypeKind::Vector {
                    element: e1,
                    size: s1,
                },
                TypeKind::Vector {
                    element: e2,
                    size: s2,
                },
            ) => e1 == e2 && s1 == s2,

            (TypeKind::Vector { element, size: 1 }, TypeKind::Primitive(p))
            | (TypeKind::Primitive(p), TypeKind::Vector { element, size: 1 })
                if options.ignore_vector_size1 =>
            {
                element == p
            }

            (
                TypeKind::Array {
                    element: a,
                    size: sa,
                },
                TypeKind::Array {
                    element: b,
                    size: sb,
                },
            ) => sa == sb && a.is_equal(b, options),

            (
                TypeKind::BoundedInt {
                    policy: p1,
                    limit: l1,
                },
                TypeKind::BoundedInt {
                    policy: p2,
                    limit: l2,
                },
            ) => p1 == p2 && l1 == l2,

            (TypeKind::Struct(s1), TypeKind::Struct(s2)) => {
                if Rc::ptr_eq(s1, s2) {
                    return true;
                }
                if !options.duck_type_structures {
                    return false;
                }
                s1.num_members() == s2.num_members()
                    && s1
                        .members()
                        .iter()
                        .zip(s2.members())
                        .all(|(m1, m2)| m1.ty.is_equal(&m2.ty, options))
            }

            (TypeKind::StringLiteral, TypeKind::StringLiteral) => true,

            _ => false,
        }
    }

    /// Strict equality: every difference counts.
    pub fn is_identical(&self, other: &Type) -> bool {
        self.is_equal(other, TypeEqualityOptions::default())
    }

    /// Same packed byte layout (lane-1 vectors match scalars, structures are
    /// duck-typed).
    pub fn has_identical_layout(&self, other: &Type) -> bool {
        self.is_equal(other, TypeEqualityOptions::identical_layout())
    }

    pub fn is_present_in(&self, types: &[Type]) -> bool {
        types.iter().any(|t| self.is_identical(t))
    }

    // ── Packed layout ───────────────────────────────────────────────────

    pub fn packed_size_in_bytes(&self) -> usize {
        match &self.kind {
            TypeKind::Primitive(p) => p.packed_size_in_bytes(),
            TypeKind::Vector { element, size } => {
                element.packed_size_in_bytes() * *size as usize
            }
            TypeKind::Array {
                element,
                size: Some(n),
            } => element.packed_size_in_bytes() * *n as usize,
            // An unsized array holds a constant-table handle slot.
            TypeKind::Array { size: None, .. } => 8,
            TypeKind::BoundedInt { .. } => 4,
            TypeKind::Struct(s) => s.packed_size_in_bytes(),
            // A string literal holds a dictionary handle.
            TypeKind::StringLiteral => 4,
        }
    }

    pub fn is_packed_size_too_big(&self) -> bool {
        self.packed_size_in_bytes() > MAX_PACKED_OBJECT_SIZE
    }

    // ── Descriptions ────────────────────────────────────────────────────

    pub fn description(&self) -> String {
        if self.is_const {
            return format!("const {}", self.clone().without_const().description());
        }

        if self.is_ref {
            return format!("{}&", self.clone().without_reference().description());
        }

        match &self.kind {
            TypeKind::Primitive(p) => p.description().to_string(),
            TypeKind::Vector { element, size } => format!("{}<{}>", element.description(), size),
            TypeKind::Array {
                element,
                size: Some(n),
            } => format!("{}[{}]", element.description(), n),
            TypeKind::Array {
                element,
                size: None,
            } => format!("{}[]", element.description()),
            TypeKind::BoundedInt {
                policy: BoundsPolicy::Wrap,
                limit,
            } => format!("wrap<{}>", limit),
            TypeKind::BoundedInt {
                policy: BoundsPolicy::Clamp,
                limit,
            } => format!("clamp<{}>", limit),
            TypeKind::Struct(s) => s.name().to_string(),
            TypeKind::StringLiteral => "string".to_string(),
        }
    }

    /// Compressed form safe for embedding in identifiers, used by function
    /// signature ids.
    pub fn short_identifier_description(&self) -> String {
        if self.is_const {
            return format!(
                "const_{}",
                self.clone().without_const().short_identifier_description()
            );
        }

        if self.is_ref {
            return format!(
                "ref_{}",
                self.clone()
                    .without_reference()
                    .short_identifier_description()
            );
        }

        match &self.kind {
            TypeKind::Primitive(p) => p.short_description().to_string(),
            TypeKind::Vector { element, size } => {
                format!("vec_{}_{}", size, element.short_description())
            }
            TypeKind::Array {
                element,
                size: Some(n),
            } => format!("arr_{}_{}", n, element.short_identifier_description()),
            TypeKind::Array {
                element,
                size: None,
            } => format!("slice_{}", element.short_identifier_description()),
            TypeKind::BoundedInt {
                policy: BoundsPolicy::Wrap,
                limit,
            } => format!("wrap_{}", limit),
            TypeKind::BoundedInt {
                policy: BoundsPolicy::Clamp,
                limit,
            } => format!("clamp_{}", limit),
            TypeKind::Struct(s) => format!("struct_{}", s.name()),
            TypeKind::StringLiteral => "string".to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.is_identical(other)
    }
}

/// Render a list of types as `(a, b, c)`, as used in cast diagnostics.
pub fn description_of_type_list(types: &[Type]) -> String {
    let inner: Vec<String> = types.iter().map(|t| t.description()).collect();
    format!("({})", inner.join(", "))
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn xy_struct() -> Rc<Structure> {
        let mut s = Structure::new("Point");
        s.add_member(Type::float32(), "x");
        s.add_member(Type::float32(), "y");
        Rc::new(s)
    }

    #[test]
    fn primitive_packed_sizes() {
        assert_eq!(Type::bool_type().packed_size_in_bytes(), 1);
        assert_eq!(Type::int32().packed_size_in_bytes(), 4);
        assert_eq!(Type::int64().packed_size_in_bytes(), 8);
        assert_eq!(Type::float32().packed_size_in_bytes(), 4);
        assert_eq!(Type::float64().packed_size_in_bytes(), 8);
    }

    #[test]
    fn aggregate_packed_sizes() {
        assert_eq!(Type::vector(Primitive::Float32, 4).packed_size_in_bytes(), 16);
        assert_eq!(Type::int32().array_of(10).packed_size_in_bytes(), 40);
        assert_eq!(Type::structure(xy_struct()).packed_size_in_bytes(), 8);
        assert_eq!(Type::int32().unsized_array_of().packed_size_in_bytes(), 8);
        assert_eq!(Type::string_literal().packed_size_in_bytes(), 4);
        assert_eq!(Type::wrapped_int(10).packed_size_in_bytes(), 4);
    }

    #[test]
    fn vector_of_size1_equality_is_opt_in() {
        let vec1 = Type::vector(Primitive::Float32, 1);
        let scalar = Type::float32();

        assert!(!vec1.is_identical(&scalar));
        assert!(vec1.is_equal(
            &scalar,
            TypeEqualityOptions {
                ignore_vector_size1: true,
                ..Default::default()
            }
        ));
    }

    #[test]
    fn const_and_reference_affect_identity() {
        let t = Type::int32();
        assert!(!t.is_identical(&Type::int32().with_const()));
        assert!(!t.is_identical(&Type::int32().with_reference()));
        assert!(t.is_equal(
            &Type::int32().with_const(),
            TypeEqualityOptions {
                ignore_const: true,
                ..Default::default()
            }
        ));
    }

    #[test]
    fn struct_identity_is_by_instance() {
        let a = Type::structure(xy_struct());
        let b = Type::structure(xy_struct());

        assert!(!a.is_identical(&b));
        assert!(a.is_equal(
            &b,
            TypeEqualityOptions {
                duck_type_structures: true,
                ..Default::default()
            }
        ));
    }

    #[test]
    fn string_as_int32_equality() {
        let opts = TypeEqualityOptions {
            treat_string_as_int32: true,
            ..Default::default()
        };
        assert!(Type::string_literal().is_equal(&Type::int32(), opts));
        assert!(Type::int32().is_equal(&Type::string_literal(), opts));
        assert!(!Type::string_literal().is_equal(&Type::int64(), opts));
    }

    #[test]
    fn wrap_and_clamp_are_distinct() {
        assert!(!Type::wrapped_int(8).is_identical(&Type::clamped_int(8)));
        assert!(!Type::wrapped_int(8).is_identical(&Type::wrapped_int(9)));
        assert!(Type::wrapped_int(8).is_identical(&Type::wrapped_int(8)));
    }

    #[test]
    fn scalar_primitive_sees_through_sequences() {
        assert!(Type::vector(Primitive::Int32, 4).is_integer());
        assert!(Type::float32().array_of(3).is_floating_point());
        assert!(Type::wrapped_int(16).is_integer32());
        assert!(!Type::structure(xy_struct()).is_integer());
    }

    #[test]
    fn descriptions() {
        assert_eq!(Type::float32().description(), "float32");
        assert_eq!(Type::vector(Primitive::Float32, 2).description(), "float32<2>");
        assert_eq!(Type::int32().array_of(3).description(), "int32[3]");
        assert_eq!(Type::int32().unsized_array_of().description(), "int32[]");
        assert_eq!(Type::wrapped_int(10).description(), "wrap<10>");
        assert_eq!(Type::clamped_int(10).description(), "clamp<10>");
        assert_eq!(Type::int32().with_const().description(), "const int32");
        assert_eq!(Type::float64().with_reference().description(), "float64&");
        assert_eq!(Type::structure(xy_struct()).description(), "Point");
    }

    #[test]
    fn short_identifier_descriptions() {
        assert_eq!(Type::float32().short_identifier_description(), "f32");
        assert_eq!(
            Type::vector(Primitive::Int64, 4).short_identifier_description(),
            "vec_4_i64"
        );
        assert_eq!(
            Type::float32().array_of(8).short_identifier_description(),
            "arr_8_f32"
        );
        assert_eq!(
            Type::float32().unsized_array_of().short_identifier_description(),
            "slice_f32"
        );
    }

    #[test]
    fn slice_range_validation() {
        let t = Type::float32().array_of(4);
        assert!(t.is_valid_array_or_vector_range(0, 4));
        assert!(t.is_valid_array_or_vector_range(1, 3));
        assert!(t.is_valid_array_or_vector_range(2, 2));
        assert!(!t.is_valid_array_or_vector_range(3, 2));
        assert!(!t.is_valid_array_or_vector_range(0, 5));
        // Negative indices count back from the end.
        assert!(t.is_valid_array_or_vector_range(-2, 4));
        assert_eq!(t.convert_index_to_valid_range(-1), 3);
    }

    #[test]
    fn uses_struct_is_transitive() {
        let inner = xy_struct();
        let mut outer = Structure::new("Line");
        outer.add_member(Type::structure(inner.clone()), "a");
        outer.add_member(Type::structure(inner.clone()), "b");
        let outer = Rc::new(outer);

        assert!(Type::structure(outer.clone()).uses_struct(&inner));
        assert!(Type::structure(outer.clone())
            .array_of(2)
            .uses_struct(&inner));
        assert!(!Type::structure(inner).uses_struct(&outer));
    }

    #[test]
    fn packed_size_ceiling() {
        let big = Type::float64().array_of(3 * 1024 * 1024);
        assert!(big.is_packed_size_too_big());
        assert!(!Type::float64().array_of(1024).is_packed_size_too_big());
    }
}
