// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema collaborator surface.
//!
//! The codecs never own type knowledge. Everything they need to interpret a
//! payload comes through [`TypeSchema`]: layout resolution, blank instance
//! construction and the flattened per-type accessor tables. [`SchemaSet`] is
//! the in-memory implementation suitable for tools and tests; a game runtime
//! can put its own reflection data behind the same trait.

pub mod layout;
pub mod set;

use std::fmt;
use std::sync::Arc;

use crate::core::Guid;
use crate::graph::{PointerRef, StructValue, TypeRef, Value};

pub use layout::{
    EnumMember, FieldKind, FieldLayout, FieldSlot, FieldTable, LayoutKind, TypeLayout,
};
pub use set::{SchemaSet, TypeLayoutBuilder};

pub(crate) use layout::type_signature;

/// The ways a type can be referenced across the codec surface.
///
/// File payloads mostly carry name hashes, shared descriptor tables carry
/// guids and schema authors use names; resolution accepts all three.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeId {
    Name(Arc<str>),
    NameHash(u32),
    Guid(Guid),
}

impl TypeId {
    pub fn name(name: &str) -> Self {
        TypeId::Name(Arc::from(name))
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeId::Name(name) => f.write_str(name),
            TypeId::NameHash(hash) => write!(f, "hash:{hash:#010x}"),
            TypeId::Guid(guid) => write!(f, "guid:{guid}"),
        }
    }
}

impl From<&TypeLayout> for TypeId {
    fn from(layout: &TypeLayout) -> Self {
        layout.type_id()
    }
}

/// Type knowledge provider for both codec variants.
pub trait TypeSchema {
    /// Look up a layout by name, name hash or guid.
    fn resolve(&self, id: &TypeId) -> Option<Arc<TypeLayout>>;

    /// Flattened accessor table for a class or struct, inherited fields
    /// included.
    fn field_table(&self, id: &TypeId) -> Option<Arc<FieldTable>>;

    /// Build a blank instance with every slot at its default value.
    ///
    /// Returns `None` for unknown types, for enums and for types whose field
    /// defaults cannot be constructed because a nested type is missing.
    fn instantiate(&self, id: &TypeId) -> Option<StructValue>;

    /// Whether the type encodes as its wrapped scalar instead of a struct.
    fn is_primitive_wrapper(&self, id: &TypeId) -> bool {
        self.resolve(id)
            .is_some_and(|layout| layout.kind == LayoutKind::PrimitiveWrapper)
    }
}

/// Default value for a field kind, resolving nested types through `schema`.
///
/// `None` means a required nested type is unknown; callers treat that the
/// same as an unresolvable instance type.
pub fn default_value(kind: &FieldKind, schema: &dyn TypeSchema) -> Option<Value> {
    Some(match kind {
        FieldKind::Bool => Value::Bool(false),
        FieldKind::Int8 => Value::I8(0),
        FieldKind::UInt8 => Value::U8(0),
        FieldKind::Int16 => Value::I16(0),
        FieldKind::UInt16 => Value::U16(0),
        FieldKind::Int32 => Value::I32(0),
        FieldKind::UInt32 => Value::U32(0),
        FieldKind::Int64 => Value::I64(0),
        FieldKind::UInt64 => Value::U64(0),
        FieldKind::Float32 => Value::F32(0.0),
        FieldKind::Float64 => Value::F64(0.0),
        FieldKind::Guid => Value::Guid(Guid::zero()),
        FieldKind::Sha1 => Value::Sha1([0; 20]),
        FieldKind::ResourceRef => Value::ResourceRef(0),
        FieldKind::String => Value::String(String::new()),
        FieldKind::CString => Value::CString(String::new()),
        FieldKind::FileRef => Value::FileRef(String::new()),
        FieldKind::TypeRef | FieldKind::Delegate => Value::TypeRef(TypeRef::Null),
        FieldKind::BoxedValue => Value::BoxedValue(None),
        FieldKind::Pointer(_) => Value::Pointer(PointerRef::Null),
        FieldKind::Array(_) => Value::Array(Vec::new()),
        FieldKind::Enum(id) => {
            let layout = schema.resolve(id)?;
            match layout.members.first() {
                Some(member) => Value::Enum(member.value, member.name.to_string()),
                None => Value::Enum(0, String::new()),
            }
        }
        FieldKind::Struct(id) => {
            if schema.is_primitive_wrapper(id) {
                let layout = schema.resolve(id)?;
                let wrapped = layout.wrapped_kind()?.clone();
                return default_value(&wrapped, schema);
            }
            Value::Struct(schema.instantiate(id)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_id_display() {
        assert_eq!(TypeId::name("SoldierEntityData").to_string(), "SoldierEntityData");
        assert_eq!(TypeId::NameHash(0xDEAD_BEEF).to_string(), "hash:0xdeadbeef");
    }

    #[test]
    fn test_default_value_scalars() {
        let schema = SchemaSet::new();
        assert_eq!(
            default_value(&FieldKind::UInt32, &schema),
            Some(Value::U32(0))
        );
        assert_eq!(
            default_value(&FieldKind::Pointer(TypeId::name("Asset")), &schema),
            Some(Value::Pointer(PointerRef::Null))
        );
        assert_eq!(
            default_value(&FieldKind::Array(Box::new(FieldKind::Int32)), &schema),
            Some(Value::Array(Vec::new()))
        );
    }

    #[test]
    fn test_default_value_missing_nested_type() {
        let schema = SchemaSet::new();
        assert!(default_value(&FieldKind::Struct(TypeId::name("Vec3")), &schema).is_none());
        assert!(default_value(&FieldKind::Enum(TypeId::name("Color")), &schema).is_none());
    }
}
