// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tagged runtime values carried by decoded object graphs.

use crate::core::Guid;
use crate::descriptor::TypeCode;
use crate::schema::{FieldKind, TypeId};

/// One field value: a tagged variant per encodable kind.
///
/// Struct fields live in flattened accessor-table slot order, so a value
/// tree mirrors the wire image without any per-field name lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Guid(Guid),
    Sha1([u8; 20]),
    ResourceRef(u64),
    /// Fixed 32-byte inline string.
    String(String),
    /// String-table string.
    CString(String),
    /// String-table asset path.
    FileRef(String),
    /// Enum value plus member name; the name is empty when the schema does
    /// not know the member.
    Enum(i32, String),
    Struct(StructValue),
    Array(Vec<Value>),
    Pointer(PointerRef),
    TypeRef(TypeRef),
    /// `None` is the null boxed value, distinct from a boxed empty array.
    BoxedValue(Option<Box<BoxedValue>>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            Value::Enum(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            Value::ResourceRef(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Guid> {
        match self {
            Value::Guid(v) => Some(*v),
            _ => None,
        }
    }

    /// String content of any of the three string-like kinds.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::CString(s) | Value::FileRef(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerRef> {
        match self {
            Value::Pointer(v) => Some(v),
            _ => None,
        }
    }

    /// Variant name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::I8(_) => "Int8",
            Value::U8(_) => "UInt8",
            Value::I16(_) => "Int16",
            Value::U16(_) => "UInt16",
            Value::I32(_) => "Int32",
            Value::U32(_) => "UInt32",
            Value::I64(_) => "Int64",
            Value::U64(_) => "UInt64",
            Value::F32(_) => "Float32",
            Value::F64(_) => "Float64",
            Value::Guid(_) => "Guid",
            Value::Sha1(_) => "Sha1",
            Value::ResourceRef(_) => "ResourceRef",
            Value::String(_) => "String",
            Value::CString(_) => "CString",
            Value::FileRef(_) => "FileRef",
            Value::Enum(..) => "Enum",
            Value::Struct(_) => "Struct",
            Value::Array(_) => "Array",
            Value::Pointer(_) => "Pointer",
            Value::TypeRef(_) => "TypeRef",
            Value::BoxedValue(_) => "BoxedValue",
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Guid => Guid,
    PointerRef => Pointer,
    Vec<Value> => Array,
}

/// An instantiated class or struct: type id plus one value per accessor
/// table slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_id: TypeId,
    pub fields: Vec<Value>,
}

impl StructValue {
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            fields: Vec::new(),
        }
    }

    pub fn field(&self, slot: usize) -> Option<&Value> {
        self.fields.get(slot)
    }

    pub fn field_mut(&mut self, slot: usize) -> Option<&mut Value> {
        self.fields.get_mut(slot)
    }
}

/// A typed out-of-line payload (`BoxedValueRef` field contents).
#[derive(Debug, Clone, PartialEq)]
pub struct BoxedValue {
    /// Declared payload kind; an empty `Array` keeps its element kind here.
    pub kind: FieldKind,
    pub value: Value,
}

impl BoxedValue {
    pub fn new(kind: FieldKind, value: Value) -> Self {
        Self { kind, value }
    }
}

/// Where a class-pointer field points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerRef {
    Null,
    /// Arena index into [`ObjectGraph::instances`](crate::graph::ObjectGraph).
    Internal(u32),
    External(ImportRef),
}

/// A reference to an instance in another partition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImportRef {
    pub file_guid: Guid,
    pub instance_guid: Guid,
}

impl ImportRef {
    pub fn new(file_guid: Guid, instance_guid: Guid) -> Self {
        Self {
            file_guid,
            instance_guid,
        }
    }
}

/// A `TypeRef`/`Delegate` field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Null,
    Primitive(TypeCode),
    /// A named type carried as its name hash.
    Named(u32),
}

/// Depth-first walk over a value and everything nested inside it.
///
/// Visits the value itself, then struct fields in slot order, array elements
/// in order, and boxed payloads. Drives reference recounting and the
/// writers' import/string collection passes, so the order is part of the
/// on-disk layout contract.
pub(crate) fn walk_value(value: &Value, visit: &mut impl FnMut(&Value)) {
    visit(value);
    match value {
        Value::Struct(inner) => {
            for field in &inner.fields {
                walk_value(field, visit);
            }
        }
        Value::Array(elems) => {
            for elem in elems {
                walk_value(elem, visit);
            }
        }
        Value::BoxedValue(Some(boxed)) => walk_value(&boxed.value, visit),
        _ => {}
    }
}
