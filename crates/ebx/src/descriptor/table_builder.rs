// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer-side descriptor table construction.
//!
//! Builds one descriptor per distinct type a graph touches: object classes,
//! nested structs, enums, primitive element types, array types and boxed
//! payload types. Field offsets describe the engine's 64-bit image and are
//! the single layout truth both writers encode against.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use crate::core::{align_up, name_hash, Guid};
use crate::descriptor::flags::{TypeCategory, TypeCode, TypeFlags};
use crate::descriptor::shared::SharedTypeDescriptors;
use crate::descriptor::wire::{FieldDescriptor, TypeDescriptor};
use crate::error::{Error, Result};
use crate::graph::{walk_value, Instance, ObjectGraph, Value};
use crate::schema::{type_signature, FieldKind, LayoutKind, TypeId, TypeLayout, TypeSchema};

/// A finished descriptor table: wire records plus the name/guid/signature
/// side data the sections and fixup tables are written from.
#[derive(Debug, Default)]
pub(crate) struct TypeTable {
    pub(crate) types: Vec<TypeDescriptor>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) names: Vec<Arc<str>>,
    pub(crate) guids: Vec<Guid>,
    pub(crate) signatures: Vec<u32>,
    pub(crate) by_hash: HashMap<u32, u16>,
}

impl TypeTable {
    pub(crate) fn len(&self) -> usize {
        self.types.len()
    }

    pub(crate) fn index_of(&self, hash: u32) -> Option<u16> {
        self.by_hash.get(&hash).copied()
    }
}

pub(crate) struct TypeTableBuilder<'a> {
    schema: &'a dyn TypeSchema,
    shared: Option<&'a SharedTypeDescriptors>,
    types: Vec<TypeDescriptor>,
    field_lists: Vec<Vec<FieldDescriptor>>,
    names: Vec<Arc<str>>,
    guids: Vec<Guid>,
    signatures: Vec<u32>,
    by_hash: HashMap<u32, u16>,
    stubs: Vec<bool>,
}

impl<'a> TypeTableBuilder<'a> {
    pub fn new(schema: &'a dyn TypeSchema) -> Self {
        Self {
            schema,
            shared: None,
            types: Vec::new(),
            field_lists: Vec::new(),
            names: Vec::new(),
            guids: Vec::new(),
            signatures: Vec::new(),
            by_hash: HashMap::new(),
            stubs: Vec::new(),
        }
    }

    /// Types present in `shared` (keyed by guid) become 16-byte key stubs
    /// instead of full local entries.
    pub fn with_shared(schema: &'a dyn TypeSchema, shared: &'a SharedTypeDescriptors) -> Self {
        let mut builder = Self::new(schema);
        builder.shared = Some(shared);
        builder
    }

    /// Add everything one instance needs: its own type plus any boxed
    /// payload types found in its values.
    pub fn add_instance_types(&mut self, instance: &Instance) -> Result<u16> {
        let index = self.add_type(instance.type_id())?;
        let mut boxed_kinds = Vec::new();
        for field in &instance.value.fields {
            walk_value(field, &mut |v| {
                if let Value::BoxedValue(Some(boxed)) = v {
                    boxed_kinds.push(boxed.kind.clone());
                }
            });
        }
        for kind in &boxed_kinds {
            self.add_field_kind(kind)?;
        }
        Ok(index)
    }

    pub fn add_graph(&mut self, graph: &ObjectGraph) -> Result<()> {
        for instance in graph.instances() {
            self.add_instance_types(instance)?;
        }
        Ok(())
    }

    pub fn add_type(&mut self, id: &TypeId) -> Result<u16> {
        let layout = self
            .schema
            .resolve(id)
            .ok_or_else(|| Error::missing_type(id))?;
        if let Some(&index) = self.by_hash.get(&layout.name_hash) {
            return Ok(index);
        }
        self.build_layout(&layout)
    }

    /// Descriptor index used as a field's type ref.
    pub fn add_field_kind(&mut self, kind: &FieldKind) -> Result<u16> {
        match kind {
            FieldKind::Bool => Ok(self.primitive(TypeCode::Boolean, "Boolean")),
            FieldKind::Int8 => Ok(self.primitive(TypeCode::Int8, "Int8")),
            FieldKind::UInt8 => Ok(self.primitive(TypeCode::UInt8, "UInt8")),
            FieldKind::Int16 => Ok(self.primitive(TypeCode::Int16, "Int16")),
            FieldKind::UInt16 => Ok(self.primitive(TypeCode::UInt16, "UInt16")),
            FieldKind::Int32 => Ok(self.primitive(TypeCode::Int32, "Int32")),
            FieldKind::UInt32 => Ok(self.primitive(TypeCode::UInt32, "UInt32")),
            FieldKind::Int64 => Ok(self.primitive(TypeCode::Int64, "Int64")),
            FieldKind::UInt64 => Ok(self.primitive(TypeCode::UInt64, "UInt64")),
            FieldKind::Float32 => Ok(self.primitive(TypeCode::Float32, "Float32")),
            FieldKind::Float64 => Ok(self.primitive(TypeCode::Float64, "Float64")),
            FieldKind::Guid => Ok(self.primitive(TypeCode::Guid, "Guid")),
            FieldKind::Sha1 => Ok(self.primitive(TypeCode::Sha1, "Sha1")),
            FieldKind::ResourceRef => Ok(self.primitive(TypeCode::ResourceRef, "ResourceRef")),
            FieldKind::String => Ok(self.primitive(TypeCode::String, "String")),
            FieldKind::CString => Ok(self.primitive(TypeCode::CString, "CString")),
            FieldKind::FileRef => Ok(self.primitive(TypeCode::FileRef, "FileRef")),
            FieldKind::TypeRef => Ok(self.primitive(TypeCode::TypeRef, "TypeRef")),
            FieldKind::Delegate => Ok(self.primitive(TypeCode::Delegate, "Delegate")),
            FieldKind::BoxedValue => {
                Ok(self.primitive(TypeCode::BoxedValueRef, "BoxedValueRef"))
            }
            FieldKind::Enum(id) | FieldKind::Struct(id) | FieldKind::Pointer(id) => {
                self.add_type(id)
            }
            FieldKind::Array(elem) => self.array_of(elem),
        }
    }

    /// On-wire flags for a field of this kind.
    pub fn field_flags(&self, kind: &FieldKind) -> Result<TypeFlags> {
        kind_flags(self.schema, kind)
    }

    pub fn finish(mut self) -> TypeTable {
        let mut fields = Vec::new();
        for i in 0..self.types.len() {
            // stub entries are raw key bytes, never patched
            if self.stubs[i] {
                continue;
            }
            self.types[i].field_start = fields.len() as u32;
            fields.append(&mut mem::take(&mut self.field_lists[i]));
        }
        TypeTable {
            types: self.types,
            fields,
            names: self.names,
            guids: self.guids,
            signatures: self.signatures,
            by_hash: self.by_hash,
        }
    }

    fn reserve(&mut self, name: Arc<str>, guid: Guid, signature: u32, stub: bool) -> u16 {
        let index = self.types.len() as u16;
        self.types.push(TypeDescriptor {
            name_hash: 0,
            field_start: 0,
            field_count: 0,
            alignment: 0,
            flags: TypeFlags::default(),
            size: 0,
            reserved: 0,
        });
        self.field_lists.push(Vec::new());
        self.by_hash.insert(name_hash(&name), index);
        self.names.push(name);
        self.guids.push(guid);
        self.signatures.push(signature);
        self.stubs.push(stub);
        index
    }

    /// Stub entry when the shared table already holds this guid.
    fn try_stub(&mut self, name: &Arc<str>, guid: Guid, signature: u32) -> Option<u16> {
        let shared = self.shared?;
        shared.lookup(&guid)?;
        let index = self.reserve(name.clone(), guid, signature, true);
        self.types[index as usize] = TypeDescriptor::from_shared_key(guid);
        Some(index)
    }

    fn build_layout(&mut self, layout: &TypeLayout) -> Result<u16> {
        if let Some(index) = self.try_stub(&layout.name, layout.guid, layout.signature) {
            return Ok(index);
        }
        match layout.kind {
            LayoutKind::Class => self.build_record(layout, true),
            LayoutKind::Struct => self.build_record(layout, false),
            LayoutKind::Enum => self.build_enum(layout),
            LayoutKind::PrimitiveWrapper => self.build_wrapper(layout),
        }
    }

    fn build_record(&mut self, layout: &TypeLayout, is_class: bool) -> Result<u16> {
        let index = self.reserve(layout.name.clone(), layout.guid, layout.signature, false);
        let mut fields = Vec::new();
        let mut cursor: u32 = if is_class { 8 } else { 0 };
        let mut max_align: u8 = if is_class { 4 } else { 1 };

        if is_class {
            if let Some(super_id) = layout.super_type.clone() {
                let base_index = self.add_type(&super_id)?;
                let base = self.resolved_desc(base_index)?;
                // The synthetic base field sits at 8 unless the base grew
                // past the object header, in which case the engine copies
                // the base's own first field offset.
                let dollar_offset = if base.size > 8 {
                    self.first_field_offset(base_index)?.unwrap_or(8)
                } else {
                    8
                };
                fields.push(FieldDescriptor {
                    name_hash: name_hash("$"),
                    flags: TypeFlags::new(TypeCode::Void, TypeCategory::None),
                    type_ref: base_index,
                    data_offset: dollar_offset,
                    secondary_offset: 0,
                });
                cursor = base.size as u32;
                max_align = max_align.max(base.alignment);
            }
        }

        for field in &layout.fields {
            let type_ref = self.add_field_kind(&field.kind)?;
            let flags = self.field_flags(&field.kind)?;
            let (size, align) = self.slot_of(&field.kind, type_ref)?;
            cursor = align_up(cursor as usize, align as usize) as u32;
            fields.push(FieldDescriptor {
                name_hash: field.name_hash,
                flags,
                type_ref,
                data_offset: cursor,
                secondary_offset: 0,
            });
            cursor += size as u32;
            max_align = max_align.max(align);
        }

        let size = align_up(cursor as usize, max_align as usize);
        if size > u16::MAX as usize {
            return Err(Error::invalid_graph(format!(
                "type {} image is {size} bytes, over the 64 KiB descriptor limit",
                layout.name
            )));
        }
        if fields.len() > u8::MAX as usize {
            return Err(Error::invalid_graph(format!(
                "type {} declares {} fields, over the 255 descriptor limit",
                layout.name,
                fields.len()
            )));
        }

        let code = if is_class { TypeCode::Class } else { TypeCode::Struct };
        self.types[index as usize] = TypeDescriptor {
            name_hash: layout.name_hash,
            field_start: 0,
            field_count: fields.len() as u8,
            alignment: max_align,
            flags: TypeFlags::new(code, TypeCategory::Scalar),
            size: size as u16,
            reserved: 0,
        };
        self.field_lists[index as usize] = fields;
        Ok(index)
    }

    fn build_enum(&mut self, layout: &TypeLayout) -> Result<u16> {
        if layout.members.len() > u8::MAX as usize {
            return Err(Error::invalid_graph(format!(
                "enum {} declares {} members, over the 255 descriptor limit",
                layout.name,
                layout.members.len()
            )));
        }
        let index = self.reserve(layout.name.clone(), layout.guid, layout.signature, false);
        let fields = layout
            .members
            .iter()
            .map(|member| FieldDescriptor {
                name_hash: name_hash(&member.name),
                flags: TypeFlags::new(TypeCode::Enum, TypeCategory::Scalar),
                type_ref: index,
                data_offset: member.value as u32,
                secondary_offset: 0,
            })
            .collect();
        self.types[index as usize] = TypeDescriptor {
            name_hash: layout.name_hash,
            field_start: 0,
            field_count: layout.members.len() as u8,
            alignment: 4,
            flags: TypeFlags::new(TypeCode::Enum, TypeCategory::Scalar),
            size: 4,
            reserved: 0,
        };
        self.field_lists[index as usize] = fields;
        Ok(index)
    }

    fn build_wrapper(&mut self, layout: &TypeLayout) -> Result<u16> {
        let wrapped = layout.wrapped_kind().cloned().ok_or_else(|| {
            Error::invalid_graph(format!(
                "primitive wrapper {} declares no wrapped field",
                layout.name
            ))
        })?;
        let flags = self.field_flags(&wrapped)?;
        let code = flags.code().ok_or_else(|| {
            Error::unsupported(flags.bits(), format!("wrapper {}", layout.name))
        })?;
        let (size, align) = code.fixed_slot().ok_or_else(|| {
            Error::invalid_graph(format!(
                "primitive wrapper {} wraps a non-scalar kind",
                layout.name
            ))
        })?;
        let index = self.reserve(layout.name.clone(), layout.guid, layout.signature, false);
        self.types[index as usize] = TypeDescriptor {
            name_hash: layout.name_hash,
            field_start: 0,
            field_count: 0,
            alignment: align,
            flags,
            size,
            reserved: 0,
        };
        Ok(index)
    }

    fn primitive(&mut self, code: TypeCode, name: &str) -> u16 {
        let hash = name_hash(name);
        if let Some(&index) = self.by_hash.get(&hash) {
            return index;
        }
        let name: Arc<str> = Arc::from(name);
        let guid = Guid::from_name(&name);
        let signature = type_signature(&guid);
        if let Some(index) = self.try_stub(&name, guid, signature) {
            return index;
        }
        let (size, align) = code.fixed_slot().unwrap_or((0, 0));
        let index = self.reserve(name, guid, signature, false);
        self.types[index as usize] = TypeDescriptor {
            name_hash: hash,
            field_start: 0,
            field_count: 0,
            alignment: align,
            flags: TypeFlags::new(code, TypeCategory::Scalar),
            size,
            reserved: 0,
        };
        index
    }

    fn array_of(&mut self, elem: &FieldKind) -> Result<u16> {
        let array_name = kind_wire_name(self.schema, &FieldKind::Array(Box::new(elem.clone())))?;
        let hash = name_hash(&array_name);
        if let Some(&index) = self.by_hash.get(&hash) {
            return Ok(index);
        }

        let elem_ref = self.add_field_kind(elem)?;
        let elem_flags = self.field_flags(elem)?;
        let name: Arc<str> = Arc::from(array_name.as_str());
        let guid = Guid::from_name(&name);
        let signature = type_signature(&guid);
        if let Some(index) = self.try_stub(&name, guid, signature) {
            return Ok(index);
        }

        let index = self.reserve(name, guid, signature, false);
        self.types[index as usize] = TypeDescriptor {
            name_hash: hash,
            field_start: 0,
            field_count: 1,
            alignment: 8,
            flags: TypeFlags::new(TypeCode::Array, TypeCategory::Array),
            size: 8,
            reserved: 0,
        };
        self.field_lists[index as usize] = vec![FieldDescriptor {
            name_hash: name_hash("member"),
            flags: elem_flags,
            type_ref: elem_ref,
            data_offset: 0,
            secondary_offset: 0,
        }];
        Ok(index)
    }

    /// In-image slot of a field of this kind; struct kinds read the nested
    /// descriptor built for `type_ref`.
    fn slot_of(&self, kind: &FieldKind, type_ref: u16) -> Result<(u16, u8)> {
        match kind {
            FieldKind::Struct(id) => {
                let desc = self.resolved_desc(type_ref)?;
                if desc.flags.code() == Some(TypeCode::Void) {
                    return Err(Error::invalid_graph(format!(
                        "value type {id} embeds itself"
                    )));
                }
                Ok((desc.size, desc.alignment))
            }
            FieldKind::Enum(_) => Ok((4, 4)),
            FieldKind::Pointer(_) => Ok((8, 8)),
            FieldKind::Array(_) => Ok((8, 8)),
            other => {
                let flags = self.field_flags(other)?;
                let code = flags
                    .code()
                    .ok_or_else(|| Error::unsupported(flags.bits(), "field slot"))?;
                code.fixed_slot()
                    .ok_or_else(|| Error::unsupported(flags.bits(), "field slot"))
            }
        }
    }

    /// Descriptor bytes with stubs followed into the shared table.
    fn resolved_desc(&self, index: u16) -> Result<TypeDescriptor> {
        let i = index as usize;
        if !self.stubs[i] {
            return Ok(self.types[i]);
        }
        let shared = self
            .shared
            .ok_or_else(|| Error::corrupt(0, "stub descriptor without a shared table"))?;
        let shared_index = shared.lookup(&self.guids[i]).ok_or_else(|| {
            Error::corrupt(0, format!("shared table lost key {}", self.guids[i]))
        })?;
        shared
            .type_at(shared_index)
            .copied()
            .ok_or_else(|| Error::corrupt(0, "shared table index out of range"))
    }

    fn first_field_offset(&self, index: u16) -> Result<Option<u32>> {
        let i = index as usize;
        if !self.stubs[i] {
            return Ok(self.field_lists[i].first().map(|fd| fd.data_offset));
        }
        let shared = self
            .shared
            .ok_or_else(|| Error::corrupt(0, "stub descriptor without a shared table"))?;
        let shared_index = shared.lookup(&self.guids[i]).ok_or_else(|| {
            Error::corrupt(0, format!("shared table lost key {}", self.guids[i]))
        })?;
        Ok(shared
            .fields_of(shared_index)
            .and_then(|fields| fields.first())
            .map(|fd| fd.data_offset))
    }
}

/// On-wire flags for a field of this kind. Primitive wrappers travel as their
/// wrapped scalar.
pub(crate) fn kind_flags(schema: &dyn TypeSchema, kind: &FieldKind) -> Result<TypeFlags> {
    let code = match kind {
        FieldKind::Bool => TypeCode::Boolean,
        FieldKind::Int8 => TypeCode::Int8,
        FieldKind::UInt8 => TypeCode::UInt8,
        FieldKind::Int16 => TypeCode::Int16,
        FieldKind::UInt16 => TypeCode::UInt16,
        FieldKind::Int32 => TypeCode::Int32,
        FieldKind::UInt32 => TypeCode::UInt32,
        FieldKind::Int64 => TypeCode::Int64,
        FieldKind::UInt64 => TypeCode::UInt64,
        FieldKind::Float32 => TypeCode::Float32,
        FieldKind::Float64 => TypeCode::Float64,
        FieldKind::Guid => TypeCode::Guid,
        FieldKind::Sha1 => TypeCode::Sha1,
        FieldKind::ResourceRef => TypeCode::ResourceRef,
        FieldKind::String => TypeCode::String,
        FieldKind::CString => TypeCode::CString,
        FieldKind::FileRef => TypeCode::FileRef,
        FieldKind::TypeRef => TypeCode::TypeRef,
        FieldKind::Delegate => TypeCode::Delegate,
        FieldKind::BoxedValue => TypeCode::BoxedValueRef,
        FieldKind::Enum(_) => TypeCode::Enum,
        FieldKind::Pointer(_) => TypeCode::Class,
        FieldKind::Array(_) => return Ok(TypeFlags::new(TypeCode::Array, TypeCategory::Array)),
        FieldKind::Struct(id) => {
            if schema.is_primitive_wrapper(id) {
                let layout = schema.resolve(id).ok_or_else(|| Error::missing_type(id))?;
                let wrapped = layout.wrapped_kind().cloned().ok_or_else(|| {
                    Error::invalid_graph(format!(
                        "primitive wrapper {} declares no wrapped field",
                        layout.name
                    ))
                })?;
                return kind_flags(schema, &wrapped);
            }
            TypeCode::Struct
        }
    };
    Ok(TypeFlags::new(code, TypeCategory::Scalar))
}

/// Canonical type-table name for a field kind. Array names compose from the
/// element so value-element and pointer-element arrays stay distinct.
pub(crate) fn kind_wire_name(schema: &dyn TypeSchema, kind: &FieldKind) -> Result<String> {
    Ok(match kind {
        FieldKind::Bool => "Boolean".to_string(),
        FieldKind::Int8 => "Int8".to_string(),
        FieldKind::UInt8 => "UInt8".to_string(),
        FieldKind::Int16 => "Int16".to_string(),
        FieldKind::UInt16 => "UInt16".to_string(),
        FieldKind::Int32 => "Int32".to_string(),
        FieldKind::UInt32 => "UInt32".to_string(),
        FieldKind::Int64 => "Int64".to_string(),
        FieldKind::UInt64 => "UInt64".to_string(),
        FieldKind::Float32 => "Float32".to_string(),
        FieldKind::Float64 => "Float64".to_string(),
        FieldKind::Guid => "Guid".to_string(),
        FieldKind::Sha1 => "Sha1".to_string(),
        FieldKind::ResourceRef => "ResourceRef".to_string(),
        FieldKind::String => "String".to_string(),
        FieldKind::CString => "CString".to_string(),
        FieldKind::FileRef => "FileRef".to_string(),
        FieldKind::TypeRef => "TypeRef".to_string(),
        FieldKind::Delegate => "Delegate".to_string(),
        FieldKind::BoxedValue => "BoxedValueRef".to_string(),
        FieldKind::Enum(id) | FieldKind::Struct(id) | FieldKind::Pointer(id) => {
            let layout = schema.resolve(id).ok_or_else(|| Error::missing_type(id))?;
            layout.name.to_string()
        }
        FieldKind::Array(elem) => {
            if matches!(**elem, FieldKind::Array(_)) {
                return Err(Error::unsupported(
                    TypeFlags::new(TypeCode::Array, TypeCategory::Array).bits(),
                    "nested array element",
                ));
            }
            let elem_name = kind_wire_name(schema, elem)?;
            match **elem {
                FieldKind::Pointer(_) => format!("{elem_name}Ptr-Array"),
                _ => format!("{elem_name}-Array"),
            }
        }
    })
}
