// value.rs — Boxed runtime values with packed byte storage
//
// A Value owns a type descriptor plus a packed little-endian byte buffer of
// exactly the type's packed size. Supports structured read/write, coercion
// driven by the destination type, aggregate initialisation, negation,
// slicing, sub-element access, and printing through a visitor protocol.
//
// Preconditions: buffers always match their type's packed size.
// Postconditions: operations preserve that invariant.
// Failure modes: requests that cannot apply to the value's type return
//                None/false; internal contract violations panic with an
//                "internal:" message.
// Side effects: none.

use crate::strings::{ConstantHandle, StringDictionary, StringHandle};
use crate::type_rules;
use crate::types::{BoundsPolicy, Structure, Type};
use std::rc::Rc;

// ── Packed scalar access ─────────────────────────────────────────────────

fn read_i32(data: &[u8]) -> i32 {
    i32::from_le_bytes(data[..4].try_into().expect("internal: short i32 slot"))
}

fn read_i64(data: &[u8]) -> i64 {
    i64::from_le_bytes(data[..8].try_into().expect("internal: short i64 slot"))
}

fn read_f32(data: &[u8]) -> f32 {
    f32::from_le_bytes(data[..4].try_into().expect("internal: short f32 slot"))
}

fn read_f64(data: &[u8]) -> f64 {
    f64::from_le_bytes(data[..8].try_into().expect("internal: short f64 slot"))
}

fn read_u32(data: &[u8]) -> u32 {
    u32::from_le_bytes(data[..4].try_into().expect("internal: short u32 slot"))
}

fn read_u64(data: &[u8]) -> u64 {
    u64::from_le_bytes(data[..8].try_into().expect("internal: short u64 slot"))
}

fn is_all_zero(data: &[u8]) -> bool {
    data.iter().all(|&b| b == 0)
}

/// Read a scalar slot as i64. Legal for primitives, bounded ints, and
/// 1-lane vectors.
fn slot_as_i64(ty: &Type, data: &[u8]) -> Option<i64> {
    if ty.is_bounded_int() {
        return Some(read_i32(data) as i64);
    }
    if ty.is_vector_of_size1() {
        return slot_as_i64(&ty.element_type()?, data);
    }
    if !ty.is_primitive() {
        return None;
    }
    if ty.is_integer32() {
        Some(read_i32(data) as i64)
    } else if ty.is_integer64() {
        Some(read_i64(data))
    } else if ty.is_bool() {
        Some(if data[0] != 0 { 1 } else { 0 })
    } else if ty.is_floating_point() {
        slot_as_f64(ty, data).map(|f| f as i64)
    } else {
        None
    }
}

/// Read a scalar slot as f64. Legal for primitives, bounded ints, and
/// 1-lane vectors.
fn slot_as_f64(ty: &Type, data: &[u8]) -> Option<f64> {
    if ty.is_bounded_int() {
        return Some(read_i32(data) as f64);
    }
    if ty.is_vector_of_size1() {
        return slot_as_f64(&ty.element_type()?, data);
    }
    if !ty.is_primitive() {
        return None;
    }
    if ty.is_float32() {
        Some(read_f32(data) as f64)
    } else if ty.is_float64() {
        Some(read_f64(data))
    } else if ty.is_bool() {
        Some(if data[0] != 0 { 1.0 } else { 0.0 })
    } else if ty.is_integer() {
        slot_as_i64(ty, data).map(|i| i as f64)
    } else {
        None
    }
}

fn slot_as_bool(ty: &Type, data: &[u8]) -> Option<bool> {
    if ty.is_vector_of_size1() {
        return slot_as_bool(&ty.element_type()?, data);
    }
    if ty.is_bool() && ty.is_primitive() {
        return Some(data[0] != 0);
    }
    if ty.is_integer() || ty.is_bounded_int() {
        return slot_as_i64(ty, data).map(|i| i != 0);
    }
    if ty.is_floating_point() && ty.is_primitive() {
        return slot_as_f64(ty, data).map(|f| f != 0.0);
    }
    None
}

/// Apply the bounded type's overflow policy to a raw integer.
pub fn wrap_or_clamp_to_legal_value(ty: &Type, value: i64) -> i64 {
    let limit = ty
        .bounded_int_limit()
        .expect("internal: wrap/clamp needs a bounded type");

    match ty.bounds_policy() {
        Some(BoundsPolicy::Wrap) => {
            let v = value % limit;
            if v < 0 {
                v + limit
            } else {
                v
            }
        }
        Some(BoundsPolicy::Clamp) => value.clamp(0, limit - 1),
        None => value,
    }
}

// ── Aggregate walking ────────────────────────────────────────────────────

/// Call `f` once per element of an array or vector with the element type
/// and the element's byte range.
fn for_each_element(ty: &Type, mut f: impl FnMut(&Type, usize, usize)) {
    let element = match ty.element_type() {
        Some(e) => e,
        None => return,
    };
    let count = ty.array_or_vector_size().unwrap_or(0) as usize;
    let size = element.packed_size_in_bytes();

    for i in 0..count {
        f(&element, i * size, (i + 1) * size);
    }
}

/// Call `f` once per member of a struct with the member type and byte range.
fn for_each_member(s: &Rc<Structure>, mut f: impl FnMut(&Type, usize, usize)) {
    let mut offset = 0;
    for m in s.members() {
        let size = m.ty.packed_size_in_bytes();
        f(&m.ty, offset, offset + size);
        offset += size;
    }
}

// ── Destination-driven coercion ──────────────────────────────────────────

fn set_from(ty: &Type, data: &mut [u8], src_ty: &Type, src: &[u8]) {
    if is_all_zero(src) {
        data.fill(0);
        return;
    }

    if ty.is_primitive() {
        if ty.is_integer32() {
            let v = if src_ty.is_floating_point() {
                slot_as_f64(src_ty, src).expect("internal: numeric source required") as i32
            } else {
                slot_as_i64(src_ty, src).expect("internal: numeric source required") as i32
            };
            data[..4].copy_from_slice(&v.to_le_bytes());
        } else if ty.is_integer64() {
            let v = if src_ty.is_floating_point() {
                slot_as_f64(src_ty, src).expect("internal: numeric source required") as i64
            } else {
                slot_as_i64(src_ty, src).expect("internal: numeric source required")
            };
            data[..8].copy_from_slice(&v.to_le_bytes());
        } else if ty.is_float32() {
            let v = slot_as_f64(src_ty, src).expect("internal: numeric source required") as f32;
            data[..4].copy_from_slice(&v.to_le_bytes());
        } else if ty.is_float64() {
            let v = slot_as_f64(src_ty, src).expect("internal: numeric source required");
            data[..8].copy_from_slice(&v.to_le_bytes());
        } else if ty.is_bool() {
            data[0] = slot_as_bool(src_ty, src)
                .map(|b| b as u8)
                .expect("internal: scalar source required");
        }
        return;
    }

    if ty.is_bounded_int() {
        let raw = slot_as_i64(src_ty, src).expect("internal: numeric source required");
        let v = wrap_or_clamp_to_legal_value(ty, raw) as i32;
        data[..4].copy_from_slice(&v.to_le_bytes());
        return;
    }

    if ty.is_unsized_array() {
        data[..8].copy_from_slice(&src[..8]);
        return;
    }

    if ty.is_string_literal() {
        data[..4].copy_from_slice(&src[..4]);
        return;
    }

    if ty.is_array_or_vector() {
        if src_ty.is_primitive() || src_ty.is_vector_of_size1() {
            // Broadcast the scalar into every element.
            for_each_element(ty, |element, start, end| {
                set_from(element, &mut data[start..end], src_ty, src);
            });
            return;
        }

        debug_assert_eq!(
            ty.array_or_vector_size(),
            src_ty.array_or_vector_size(),
            "internal: element count mismatch in coercion"
        );
        let src_element = src_ty
            .element_type()
            .expect("internal: sequence source required");
        let src_size = src_element.packed_size_in_bytes();

        let mut index = 0;
        for_each_element(ty, |element, start, end| {
            let s = index * src_size;
            set_from(element, &mut data[start..end], &src_element, &src[s..s + src_size]);
            index += 1;
        });
        return;
    }

    if let Some(s) = ty.struct_ref().cloned() {
        let src_struct = src_ty
            .struct_ref()
            .cloned()
            .expect("internal: struct source required");
        debug_assert_eq!(
            s.num_members(),
            src_struct.num_members(),
            "internal: member count mismatch in coercion"
        );

        let mut src_ranges = Vec::with_capacity(src_struct.num_members());
        for_each_member(&src_struct, |ty, start, end| {
            src_ranges.push((ty.clone(), start, end));
        });

        let mut index = 0;
        for_each_member(&s, |member, start, end| {
            let (src_member, s0, s1) = &src_ranges[index];
            set_from(member, &mut data[start..end], src_member, &src[*s0..*s1]);
            index += 1;
        });
    }
}

fn negate_in_place(ty: &Type, data: &mut [u8]) {
    if ty.is_array_or_vector() {
        let element = ty.element_type().expect("internal: sequence expected");
        for_each_element(ty, |_, start, end| {
            negate_in_place(&element, &mut data[start..end]);
        });
        return;
    }

    debug_assert!(ty.is_primitive(), "internal: negate needs a numeric type");
    if ty.is_integer32() {
        let v = read_i32(data).wrapping_neg();
        data[..4].copy_from_slice(&v.to_le_bytes());
    } else if ty.is_integer64() {
        let v = read_i64(data).wrapping_neg();
        data[..8].copy_from_slice(&v.to_le_bytes());
    } else if ty.is_float32() {
        let v = -read_f32(data);
        data[..4].copy_from_slice(&v.to_le_bytes());
    } else if ty.is_float64() {
        let v = -read_f64(data);
        data[..8].copy_from_slice(&v.to_le_bytes());
    }
}

// ── Sub-element paths ────────────────────────────────────────────────────

/// A sequence of struct-member and array-index steps addressing a
/// sub-object of an aggregate value.
#[derive(Debug, Clone, Default)]
pub struct SubElementPath {
    indexes: Vec<usize>,
}

impl SubElementPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_index(index: usize) -> Self {
        SubElementPath {
            indexes: vec![index],
        }
    }

    pub fn with(mut self, index: usize) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn path(&self) -> &[usize] {
        &self.indexes
    }

    /// Resolve the path against a parent type, producing the targeted type
    /// and its byte offset inside the parent's packed buffer.
    pub fn element_of(&self, parent: &Type) -> Option<(Type, usize)> {
        let mut ty = parent.clone();
        let mut offset = 0;

        for &index in &self.indexes {
            if ty.is_array_or_vector() {
                if ty.is_unsized_array() || !ty.is_valid_array_or_vector_index(index as i64) {
                    return None;
                }
                let element = ty.element_type()?;
                offset += element.packed_size_in_bytes() * index;
                ty = element;
                continue;
            }

            if let Some(s) = ty.struct_ref() {
                if index >= s.num_members() {
                    return None;
                }
                for i in 0..index {
                    offset += s.member_type(i).packed_size_in_bytes();
                }
                let member = s.member_type(index).clone();
                ty = member;
                continue;
            }

            return None;
        }

        Some((ty, offset))
    }
}

// ── Value ────────────────────────────────────────────────────────────────

/// A typed constant: a type descriptor plus an owned packed byte buffer.
#[derive(Debug, Clone)]
pub struct Value {
    ty: Type,
    data: Vec<u8>,
}

impl Value {
    // ── Constructors ────────────────────────────────────────────────────

    /// A value of the given type with an all-zero buffer.
    pub fn zero(ty: Type) -> Value {
        debug_assert!(!ty.is_void(), "internal: void is not storable");
        let size = ty.packed_size_in_bytes();
        Value {
            ty,
            data: vec![0; size],
        }
    }

    /// Reconstruct a value from its packed bytes.
    pub fn from_raw_data(ty: Type, data: &[u8]) -> Value {
        assert_eq!(
            data.len(),
            ty.packed_size_in_bytes(),
            "internal: raw data size must match the packed type size"
        );
        Value {
            ty,
            data: data.to_vec(),
        }
    }

    pub fn from_i32(v: i32) -> Value {
        Value {
            ty: Type::int32(),
            data: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_i64(v: i64) -> Value {
        Value {
            ty: Type::int64(),
            data: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_f32(v: f32) -> Value {
        Value {
            ty: Type::float32(),
            data: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_f64(v: f64) -> Value {
        Value {
            ty: Type::float64(),
            data: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_bool(v: bool) -> Value {
        Value {
            ty: Type::bool_type(),
            data: vec![v as u8],
        }
    }

    pub fn string_literal(handle: StringHandle) -> Value {
        Value {
            ty: Type::string_literal(),
            data: handle.0.to_le_bytes().to_vec(),
        }
    }

    /// An unsized-array value backed by a constant-table handle.
    pub fn unsized_array(element_type: Type, handle: ConstantHandle) -> Value {
        debug_assert!(!element_type.is_unsized_array());
        Value {
            ty: element_type.unsized_array_of(),
            data: (handle.0 as u64).to_le_bytes().to_vec(),
        }
    }

    /// Build an array or vector value from element values.
    pub fn array_or_vector(ty: Type, elements: &[Value]) -> Value {
        let mut v = Value::zero(ty);
        v.set_from_values(elements);
        v
    }

    /// Build a struct value from member values.
    pub fn structure(s: Rc<Structure>, members: &[Value]) -> Value {
        let mut v = Value::zero(Type::structure(s));
        v.set_from_values(members);
        v
    }

    // ── Basic access ────────────────────────────────────────────────────

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn packed_data(&self) -> &[u8] {
        &self.data
    }

    pub fn packed_size(&self) -> usize {
        self.data.len()
    }

    pub fn is_zero(&self) -> bool {
        is_all_zero(&self.data)
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn get_as_i64(&self) -> Option<i64> {
        slot_as_i64(&self.ty, &self.data)
    }

    pub fn get_as_i32(&self) -> Option<i32> {
        self.get_as_i64().map(|v| v as i32)
    }

    pub fn get_as_f64(&self) -> Option<f64> {
        slot_as_f64(&self.ty, &self.data)
    }

    pub fn get_as_f32(&self) -> Option<f32> {
        self.get_as_f64().map(|v| v as f32)
    }

    pub fn get_as_bool(&self) -> Option<bool> {
        slot_as_bool(&self.ty, &self.data)
    }

    pub fn string_handle(&self) -> Option<StringHandle> {
        if self.ty.is_string_literal() {
            Some(StringHandle(read_u32(&self.data)))
        } else {
            None
        }
    }

    pub fn unsized_array_handle(&self) -> Option<ConstantHandle> {
        if self.ty.is_unsized_array() {
            Some(ConstantHandle(read_u64(&self.data) as u32))
        } else {
            None
        }
    }

    // ── Coercion and aggregate initialisation ───────────────────────────

    /// Overwrite this value with `other`, coerced per this value's type.
    pub fn set_from_value(&mut self, other: &Value) {
        set_from(&self.ty, &mut self.data, &other.ty, &other.data);
    }

    /// Aggregate initialisation. A single element broadcasts into arrays
    /// and vectors; otherwise the element count must match the target.
    pub fn set_from_values(&mut self, values: &[Value]) {
        if values.is_empty() {
            self.clear();
            return;
        }

        if self.ty.is_array_or_vector() && !self.ty.is_unsized_array() {
            if values.len() == 1 {
                let src = &values[0];
                for_each_element(&self.ty.clone(), |element, start, end| {
                    set_from(element, &mut self.data[start..end], &src.ty, &src.data);
                });
                return;
            }

            assert_eq!(
                Some(values.len() as u64),
                self.ty.array_or_vector_size(),
                "internal: element count must match the aggregate"
            );
            let mut index = 0;
            for_each_element(&self.ty.clone(), |element, start, end| {
                let src = &values[index];
                set_from(element, &mut self.data[start..end], &src.ty, &src.data);
                index += 1;
            });
            return;
        }

        if let Some(s) = self.ty.struct_ref().cloned() {
            assert_eq!(
                values.len(),
                s.num_members(),
                "internal: member count must match the struct"
            );
            let mut index = 0;
            for_each_member(&s, |member, start, end| {
                let src = &values[index];
                set_from(member, &mut self.data[start..end], &src.ty, &src.data);
                index += 1;
            });
            return;
        }

        assert_eq!(values.len(), 1, "internal: scalar target takes one value");
        self.set_from_value(&values[0]);
    }

    // ── Negation ────────────────────────────────────────────────────────

    pub fn can_negate(&self) -> bool {
        self.ty.is_floating_point() || self.ty.is_integer()
    }

    pub fn negate(&mut self) {
        debug_assert!(self.can_negate());
        negate_in_place(&self.ty.clone(), &mut self.data);
    }

    pub fn negated(&self) -> Value {
        let mut v = self.clone();
        v.negate();
        v
    }

    // ── Slices and sub-elements ─────────────────────────────────────────

    /// Copy out the half-open element range `[start, end)` of an array or
    /// vector.
    pub fn slice(&self, start: usize, end: usize) -> Option<Value> {
        if !self.ty.is_array_or_vector() || self.ty.is_unsized_array() {
            return None;
        }
        if !self
            .ty
            .is_valid_array_or_vector_range(start as i64, end as i64)
        {
            return None;
        }

        let element_size = self.ty.element_type()?.packed_size_in_bytes();
        let new_type = self.ty.with_new_array_size((end - start) as u32);

        Some(Value::from_raw_data(
            new_type,
            &self.data[element_size * start..element_size * end],
        ))
    }

    /// Walk struct-member / array-index steps and copy out the targeted
    /// sub-object.
    pub fn sub_element(&self, path: &SubElementPath) -> Option<Value> {
        let (ty, offset) = path.element_of(&self.ty)?;
        let size = ty.packed_size_in_bytes();
        Some(Value::from_raw_data(ty, &self.data[offset..offset + size]))
    }

    /// Overwrite the sub-object addressed by `path`. The new value must have
    /// an identical layout. Returns false when the path does not resolve.
    pub fn modify_sub_element_in_place(&mut self, path: &SubElementPath, new_value: &Value) -> bool {
        match path.element_of(&self.ty) {
            Some((ty, offset)) => {
                debug_assert!(ty.has_identical_layout(&new_value.ty));
                let size = new_value.data.len();
                self.data[offset..offset + size].copy_from_slice(&new_value.data);
                true
            }
            None => false,
        }
    }

    // ── Reinterpretation and casting ────────────────────────────────────

    /// Reinterpret the packed bytes with a layout-identical type.
    pub fn clone_with_equivalent_type(&self, new_type: Type) -> Value {
        debug_assert!(new_type.has_identical_layout(&self.ty));
        Value {
            ty: new_type,
            data: self.data.clone(),
        }
    }

    /// Shrink an array value's element count in place; used when an unsized
    /// array literal is resolved to a concrete size.
    pub fn modify_array_size_in_place(&mut self, new_size: u32) {
        debug_assert!(self.ty.is_array());
        let new_type = self.ty.with_new_array_size(new_size);
        let new_len = new_type.packed_size_in_bytes();
        assert!(
            new_len <= self.data.len(),
            "internal: cannot grow an array value in place"
        );
        self.data.truncate(new_len);
        self.ty = new_type;
    }

    /// Convert to the destination type if the cast oracle allows it; the
    /// conversion mirrors `set_from_value` semantics.
    pub fn try_cast_to_type(&self, dest: &Type) -> Option<Value> {
        if dest.is_identical(&self.ty) {
            return Some(self.clone());
        }

        if !type_rules::can_cast_to(dest, &self.ty) {
            return None;
        }

        // An unsized-array destination only accepts a source that is already
        // the same unsized array modulo const: the handle is copied, never
        // synthesised.
        if dest.is_unsized_array() && !dest.clone().without_const().is_identical(&self.ty) {
            return None;
        }

        let mut v = Value::zero(dest.clone());
        v.set_from_value(self);
        Some(v)
    }

    // ── Printing ────────────────────────────────────────────────────────

    pub fn print(&self, printer: &mut dyn ValuePrinter) {
        print_packed(&self.ty, &self.data, printer);
    }

    /// Literal-syntax rendering without a string dictionary.
    pub fn description(&self) -> String {
        let mut p = DefaultPrinter::new();
        self.print(&mut p);
        p.output
    }

    /// Literal-syntax rendering; string-literal handles are decoded through
    /// the dictionary.
    pub fn description_with_dictionary(&self, dictionary: &StringDictionary) -> String {
        let mut p = DefaultPrinter::with_dictionary(dictionary);
        self.print(&mut p);
        p.output
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ty.is_identical(&other.ty) && self.data == other.data
    }
}

// ── Printer protocol ─────────────────────────────────────────────────────

/// Visitor interface driven by the value walker. The default hook bodies
/// emit Chime literal syntax; implementations override what they need.
pub trait ValuePrinter {
    fn print(&mut self, text: &str);

    fn dictionary(&self) -> Option<&StringDictionary> {
        None
    }

    fn print_zero_initialiser(&mut self, _ty: &Type) {
        self.print("{}");
    }

    fn print_bool(&mut self, b: bool) {
        self.print(if b { "true" } else { "false" });
    }

    fn print_int32(&mut self, v: i32) {
        self.print(&v.to_string());
    }

    fn print_int64(&mut self, v: i64) {
        self.print(&format!("{v}L"));
    }

    fn print_float32(&mut self, v: f32) {
        if v == 0.0 {
            return self.print("0");
        }
        if v.is_nan() {
            return self.print("_nan32");
        }
        if v.is_infinite() {
            return self.print(if v > 0.0 { "_inf32" } else { "_ninf32" });
        }
        self.print(&format!("{v}f"));
    }

    fn print_float64(&mut self, v: f64) {
        if v == 0.0 {
            return self.print("0");
        }
        if v.is_nan() {
            return self.print("_nan64");
        }
        if v.is_infinite() {
            return self.print(if v > 0.0 { "_inf64" } else { "_ninf64" });
        }
        self.print(&format!("{v}"));
    }

    fn print_string_literal(&mut self, handle: StringHandle) {
        let text = self
            .dictionary()
            .and_then(|d| d.lookup(handle))
            .map(|s| format!("\"{s}\""));
        match text {
            Some(t) => self.print(&t),
            None => self.print(&handle.0.to_string()),
        }
    }

    fn print_unsized_array_content(&mut self, _ty: &Type, handle: ConstantHandle) {
        self.print(&format!("0x{:x}", handle.0));
    }

    fn begin_struct_members(&mut self, _ty: &Type) {
        self.print("{ ");
    }

    fn print_struct_member_separator(&mut self) {
        self.print(", ");
    }

    fn end_struct_members(&mut self) {
        self.print(" }");
    }

    fn begin_array_members(&mut self, _ty: &Type) {
        self.print("{ ");
    }

    fn print_array_member_separator(&mut self) {
        self.print(", ");
    }

    fn end_array_members(&mut self) {
        self.print(" }");
    }

    fn begin_vector_members(&mut self, _ty: &Type) {
        self.print("{ ");
    }

    fn print_vector_member_separator(&mut self) {
        self.print(", ");
    }

    fn end_vector_members(&mut self) {
        self.print(" }");
    }
}

fn print_packed(ty: &Type, data: &[u8], p: &mut dyn ValuePrinter) {
    if ty.is_primitive() {
        if ty.is_integer32() {
            return p.print_int32(read_i32(data));
        }
        if ty.is_integer64() {
            return p.print_int64(read_i64(data));
        }
        if ty.is_bool() {
            return p.print_bool(data[0] != 0);
        }
        if ty.is_float32() {
            return p.print_float32(read_f32(data));
        }
        if ty.is_float64() {
            return p.print_float64(read_f64(data));
        }
    }

    if ty.is_bounded_int() {
        return p.print_int32(read_i32(data));
    }

    if ty.is_string_literal() {
        return p.print_string_literal(StringHandle(read_u32(data)));
    }

    if ty.is_unsized_array() {
        return p.print_unsized_array_content(ty, ConstantHandle(read_u64(data) as u32));
    }

    // Zero-filled aggregates render as the zero initialiser.
    if !is_all_zero(data) {
        if ty.is_vector() {
            p.begin_vector_members(ty);
            let mut first = true;
            for_each_element(ty, |element, start, end| {
                if !first {
                    p.print_vector_member_separator();
                }
                first = false;
                print_packed(element, &data[start..end], p);
            });
            return p.end_vector_members();
        }

        if ty.is_array() {
            p.begin_array_members(ty);
            let mut first = true;
            for_each_element(ty, |element, start, end| {
                if !first {
                    p.print_array_member_separator();
                }
                first = false;
                print_packed(element, &data[start..end], p);
            });
            return p.end_array_members();
        }

        if let Some(s) = ty.struct_ref() {
            if !s.is_empty() {
                p.begin_struct_members(ty);
                let mut first = true;
                for_each_member(s, |member, start, end| {
                    if !first {
                        p.print_struct_member_separator();
                    }
                    first = false;
                    print_packed(member, &data[start..end], p);
                });
                return p.end_struct_members();
            }
        }
    }

    p.print_zero_initialiser(ty);
}

/// Default printer: collects the literal syntax into a string.
#[derive(Default)]
pub struct DefaultPrinter<'a> {
    pub output: String,
    dictionary: Option<&'a StringDictionary>,
}

impl<'a> DefaultPrinter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dictionary(dictionary: &'a StringDictionary) -> Self {
        DefaultPrinter {
            output: String::new(),
            dictionary: Some(dictionary),
        }
    }
}

impl ValuePrinter for DefaultPrinter<'_> {
    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn dictionary(&self) -> Option<&StringDictionary> {
        self.dictionary
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
