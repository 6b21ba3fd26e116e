// strings.rs — String dictionary and constant table
//
// Compilation-unit-scoped stores that back string-literal and unsized-array
// values with stable opaque handles. Handles are dense integers, valid for
// the lifetime of the compilation unit.
//
// Preconditions: none.
// Postconditions: a handle handed out once stays valid and keeps resolving
//                 to the same content.
// Failure modes: lookups with foreign handles return None.
// Side effects: none.

use indexmap::IndexSet;

use crate::value::Value;

// ── Handles ──────────────────────────────────────────────────────────────

/// Handle into the string dictionary. Packed into string-literal values as
/// a little-endian u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringHandle(pub u32);

/// Handle into the constant table. Packed into unsized-array values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstantHandle(pub u32);

// ── String dictionary ────────────────────────────────────────────────────

/// Interns strings and hands out dense handles. Interning the same string
/// twice returns the same handle.
#[derive(Debug, Default)]
pub struct StringDictionary {
    strings: IndexSet<String>,
}

impl StringDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: impl Into<String>) -> StringHandle {
        let (index, _) = self.strings.insert_full(s.into());
        StringHandle(index as u32)
    }

    pub fn lookup(&self, handle: StringHandle) -> Option<&str> {
        self.strings.get_index(handle.0 as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

// ── Constant table ───────────────────────────────────────────────────────

/// Owns the values that back unsized-array literals. Identical values share
/// a handle.
#[derive(Debug, Default)]
pub struct ConstantTable {
    items: Vec<Value>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, value: Value) -> ConstantHandle {
        if let Some(index) = self.items.iter().position(|v| *v == value) {
            return ConstantHandle(index as u32);
        }
        self.items.push(value);
        ConstantHandle((self.items.len() - 1) as u32)
    }

    pub fn value_for_handle(&self, handle: ConstantHandle) -> Option<&Value> {
        self.items.get(handle.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
