// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type layout metadata supplied by the schema collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{name_hash, Guid};
use crate::schema::TypeId;

/// What a named type is at the layout level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// Reference type: instances carry an object header and are addressed
    /// through pointers.
    Class,
    /// Value type embedded directly in its owner's image.
    Struct,
    /// 32-bit enumeration with named members.
    Enum,
    /// A named type the engine treats as a bare scalar; fields of this type
    /// encode as the wrapped primitive, never as a nested struct.
    PrimitiveWrapper,
}

/// Field value categories a layout can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Guid,
    Sha1,
    ResourceRef,
    /// Fixed 32-byte inline string slot.
    String,
    /// String-table reference.
    CString,
    /// String-table reference holding an asset path.
    FileRef,
    TypeRef,
    Delegate,
    BoxedValue,
    Enum(TypeId),
    Struct(TypeId),
    /// Class pointer; the id names the declared pointee base class.
    Pointer(TypeId),
    Array(Box<FieldKind>),
}

/// One declared field of a class or struct.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub name: Arc<str>,
    pub name_hash: u32,
    pub kind: FieldKind,
}

impl FieldLayout {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: Arc::from(name),
            name_hash: name_hash(name),
            kind,
        }
    }
}

/// One named enum member.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: Arc<str>,
    pub value: i32,
}

impl EnumMember {
    pub fn new(name: &str, value: i32) -> Self {
        Self {
            name: Arc::from(name),
            value,
        }
    }
}

/// A complete named type as the schema knows it.
///
/// `fields` holds only the type's own declared fields; inherited fields live
/// on the super types and are flattened by [`FieldTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct TypeLayout {
    pub name: Arc<str>,
    pub name_hash: u32,
    pub guid: Guid,
    pub signature: u32,
    pub kind: LayoutKind,
    pub super_type: Option<TypeId>,
    pub fields: Vec<FieldLayout>,
    pub members: Vec<EnumMember>,
}

impl TypeLayout {
    pub fn type_id(&self) -> TypeId {
        TypeId::Name(self.name.clone())
    }

    pub fn member_by_value(&self, value: i32) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.value == value)
    }

    pub fn member_by_name(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| &*m.name == name)
    }

    /// The wrapped scalar kind of a primitive wrapper.
    pub fn wrapped_kind(&self) -> Option<&FieldKind> {
        match self.kind {
            LayoutKind::PrimitiveWrapper => self.fields.first().map(|f| &f.kind),
            _ => None,
        }
    }
}

/// Signature used by the RIFF fixup table: the last 4 bytes of the type guid.
pub(crate) fn type_signature(guid: &Guid) -> u32 {
    let bytes = guid.as_bytes();
    u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]])
}

/// One addressable slot of an instantiated object.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    pub name: Arc<str>,
    pub name_hash: u32,
    pub kind: FieldKind,
}

/// Flattened per-type accessor table: every field of a type including
/// inherited ones, base-most first, with stable slot indices.
///
/// Built once per type when the schema is populated. The codecs match file
/// fields to slots by name hash through this table; there is no runtime
/// reflection anywhere.
#[derive(Debug)]
pub struct FieldTable {
    slots: Vec<FieldSlot>,
    by_hash: HashMap<u32, usize>,
}

impl FieldTable {
    /// Flatten an inheritance chain ordered base-most first.
    pub fn build(chain_base_first: &[&TypeLayout]) -> Self {
        let mut slots = Vec::new();
        let mut by_hash = HashMap::new();
        for layout in chain_base_first {
            for field in &layout.fields {
                by_hash.entry(field.name_hash).or_insert(slots.len());
                slots.push(FieldSlot {
                    name: field.name.clone(),
                    name_hash: field.name_hash,
                    kind: field.kind.clone(),
                });
            }
        }
        Self { slots, by_hash }
    }

    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_by_hash(&self, hash: u32) -> Option<(usize, &FieldSlot)> {
        let index = *self.by_hash.get(&hash)?;
        Some((index, &self.slots[index]))
    }

    pub fn slot_by_name(&self, name: &str) -> Option<(usize, &FieldSlot)> {
        self.slot_by_hash(name_hash(name))
    }
}
