//! The `Type` data model (§3.1) and its interning cache.
//!
//! Types are interned: two equal shapes share one `TypeId`, so pointer
//! (here, index) equality implies semantic equality. Grounded on the
//! teacher's `ir::types` interning pattern, adapted from a fixed lattice of
//! SSA value types to this front end's full C-like type algebra (structs,
//! unions, arrays, function types).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// An interned handle to a [`Type`]. Cheap to copy and compare.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::I8 => 8,
            IntWidth::I16 => 16,
            IntWidth::I32 => 32,
            IntWidth::I64 => 64,
        }
    }

    pub fn bytes(self) -> u64 {
        u64::from(self.bits() / 8)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn bytes(self) -> u64 {
        match self {
            FloatWidth::F32 => 4,
            FloatWidth::F64 => 8,
        }
    }
}

/// A struct/union field: its type and byte offset from the start of the
/// aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub offset: u64,
}

/// The shape of a type, independent of its `const`/`unsigned` qualifiers,
/// which are tracked alongside the shape in [`TypeData`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Int(IntWidth),
    Float(FloatWidth),
    /// The varargs marker `...` in a function signature; never a real value
    /// type, only ever appears as the trailing entry of `Function::params`.
    Varargs,
    Pointer(TypeId),
    Array(TypeId, Option<u64>),
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
        variadic: bool,
    },
    Struct {
        name: Option<String>,
        fields: Vec<Field>,
    },
    Union {
        name: Option<String>,
        fields: Vec<Field>,
    },
}

/// A fully described type: shape plus qualifiers plus the derived layout
/// facts (size/alignment) the rest of the pipeline reads constantly.
#[derive(Clone, Debug)]
pub struct TypeData {
    pub kind: TypeKind,
    pub is_const: bool,
    pub is_unsigned: bool,
    pub size: u64,
    pub alignment: u64,
    pub name: Option<String>,
    hash: u64,
}

impl TypeData {
    pub fn is_float(&self) -> bool {
        matches!(self.kind, TypeKind::Float(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self.kind, TypeKind::Int(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, TypeKind::Struct { .. } | TypeKind::Union { .. })
    }

    pub fn content_hash(&self) -> u64 {
        self.hash
    }
}

fn hash_of(kind: &TypeKind, is_const: bool, is_unsigned: bool) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    kind.hash(&mut hasher);
    is_const.hash(&mut hasher);
    is_unsigned.hash(&mut hasher);
    hasher.finish()
}

/// The interning cache: the single owner of every [`TypeData`] created
/// during a compilation. Lives on [`crate::context::Context`] and is
/// consumed by pointer (here, by [`TypeId`]) everywhere else — the back
/// end never mutates it.
#[derive(Default)]
pub struct TypeCache {
    types: Vec<TypeData>,
    by_shape: HashMap<(u64, TypeKind, bool, bool), TypeId>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.types[id.0 as usize]
    }

    /// Intern a primitive/derived shape, computing size and alignment.
    pub fn intern(&mut self, kind: TypeKind, is_const: bool, is_unsigned: bool) -> TypeId {
        let hash = hash_of(&kind, is_const, is_unsigned);
        let key = (hash, kind.clone(), is_const, is_unsigned);
        if let Some(&id) = self.by_shape.get(&key) {
            return id;
        }

        let (size, alignment, name) = self.layout_of(&kind);
        let data = TypeData {
            kind: kind.clone(),
            is_const,
            is_unsigned,
            size,
            alignment,
            name,
            hash,
        };
        let id = TypeId(self.types.len() as u32);
        self.types.push(data);
        self.by_shape.insert(key, id);
        id
    }

    fn layout_of(&self, kind: &TypeKind) -> (u64, u64, Option<String>) {
        match kind {
            TypeKind::Void => (0, 1, None),
            TypeKind::Varargs => (0, 1, None),
            TypeKind::Int(w) => (w.bytes(), w.bytes(), None),
            TypeKind::Float(w) => (w.bytes(), w.bytes(), None),
            TypeKind::Pointer(_) => (8, 8, None),
            TypeKind::Array(base, count) => {
                let base_data = self.get(*base);
                let n = count.unwrap_or(0);
                (base_data.size * n, base_data.alignment, None)
            }
            TypeKind::Function { .. } => (8, 8, None),
            TypeKind::Struct { name, fields } | TypeKind::Union { name, fields } => {
                let is_union = matches!(kind, TypeKind::Union { .. });
                let (size, align) = self.aggregate_layout(fields, is_union);
                (size, align, name.clone())
            }
        }
    }

    fn aggregate_layout(&self, fields: &[Field], is_union: bool) -> (u64, u64) {
        let mut align = 1u64;
        let mut size = 0u64;
        for f in fields {
            let fd = self.get(f.ty);
            align = align.max(fd.alignment);
            if is_union {
                size = size.max(fd.size);
            } else {
                size = size.max(f.offset + fd.size);
            }
        }
        if align == 0 {
            align = 1;
        }
        let size = align_to(size, align);
        (size, align)
    }

    /// Compute field offsets for a new struct/union given field types in
    /// declaration order, applying natural alignment and trailing padding —
    /// used by the type checker (§4.9) before calling [`Self::intern`].
    pub fn layout_fields(&self, field_types: &[(String, TypeId)], is_union: bool) -> Vec<Field> {
        let mut offset = 0u64;
        let mut fields = Vec::with_capacity(field_types.len());
        for (name, ty) in field_types {
            let fd = self.get(*ty);
            let off = if is_union {
                0
            } else {
                let aligned = align_to(offset, fd.alignment);
                offset = aligned + fd.size;
                aligned
            };
            fields.push(Field {
                name: name.clone(),
                ty: *ty,
                offset: off,
            });
        }
        fields
    }

    pub fn int(&mut self, width: IntWidth, is_unsigned: bool) -> TypeId {
        self.intern(TypeKind::Int(width), false, is_unsigned)
    }

    pub fn float(&mut self, width: FloatWidth) -> TypeId {
        self.intern(TypeKind::Float(width), false, false)
    }

    pub fn void(&mut self) -> TypeId {
        self.intern(TypeKind::Void, false, false)
    }

    pub fn pointer(&mut self, base: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(base), false, true)
    }
}

pub fn align_to(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    (value + alignment - 1) / alignment * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_shapes_intern_to_same_id() {
        let mut cache = TypeCache::new();
        let a = cache.int(IntWidth::I32, false);
        let b = cache.int(IntWidth::I32, false);
        assert_eq!(a, b);
        let c = cache.int(IntWidth::I32, true);
        assert_ne!(a, c);
    }

    #[test]
    fn struct_layout_matches_natural_alignment() {
        // struct { char a; long b; char c; } -> size 24 on SysV/Win64 (§8).
        let mut cache = TypeCache::new();
        let i8 = cache.int(IntWidth::I8, false);
        let i64_ = cache.int(IntWidth::I64, false);
        let fields = cache.layout_fields(
            &[
                ("a".into(), i8),
                ("b".into(), i64_),
                ("c".into(), i8),
            ],
            false,
        );
        let id = cache.intern(
            TypeKind::Struct {
                name: None,
                fields,
            },
            false,
            false,
        );
        assert_eq!(cache.get(id).size, 24);
        assert_eq!(cache.get(id).alignment, 8);
    }
}
