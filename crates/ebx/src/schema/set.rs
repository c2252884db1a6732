// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory [`TypeSchema`] implementation backed by hash maps.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{name_hash, Guid};
use crate::error::{Error, Result};
use crate::graph::StructValue;
use crate::schema::layout::{
    type_signature, EnumMember, FieldKind, FieldLayout, FieldTable, LayoutKind, TypeLayout,
};
use crate::schema::{default_value, TypeId, TypeSchema};

/// A set of type layouts with lookup by name, name hash and guid.
///
/// Accessor tables are flattened once at insertion time, so super types must
/// be inserted before the types that extend them.
#[derive(Debug, Default)]
pub struct SchemaSet {
    types: Vec<Arc<TypeLayout>>,
    tables: Vec<Arc<FieldTable>>,
    by_name: HashMap<Arc<str>, usize>,
    by_hash: HashMap<u32, usize>,
    by_guid: HashMap<Guid, usize>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layout, flattening its inheritance chain into an accessor table.
    ///
    /// Fails with [`Error::MissingType`] when a super type has not been
    /// inserted yet. Re-inserting a name replaces the previous layout.
    pub fn insert(&mut self, layout: TypeLayout) -> Result<Arc<TypeLayout>> {
        let mut chain: Vec<Arc<TypeLayout>> = Vec::new();
        let mut super_id = layout.super_type.clone();
        while let Some(id) = super_id {
            let ancestor = self
                .resolve(&id)
                .ok_or_else(|| Error::missing_type(&id))?;
            super_id = ancestor.super_type.clone();
            chain.push(ancestor);
        }
        chain.reverse();

        let layout = Arc::new(layout);
        let mut chain_refs: Vec<&TypeLayout> = chain.iter().map(Arc::as_ref).collect();
        chain_refs.push(&layout);
        let table = Arc::new(FieldTable::build(&chain_refs));

        let index = self.types.len();
        self.by_name.insert(layout.name.clone(), index);
        self.by_hash.insert(layout.name_hash, index);
        self.by_guid.insert(layout.guid, index);
        self.types.push(layout.clone());
        self.tables.push(table);
        Ok(layout)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn index(&self, id: &TypeId) -> Option<usize> {
        match id {
            TypeId::Name(name) => self.by_name.get(name).copied(),
            TypeId::NameHash(hash) => self.by_hash.get(hash).copied(),
            TypeId::Guid(guid) => self.by_guid.get(guid).copied(),
        }
    }
}

impl TypeSchema for SchemaSet {
    fn resolve(&self, id: &TypeId) -> Option<Arc<TypeLayout>> {
        self.index(id).map(|i| self.types[i].clone())
    }

    fn field_table(&self, id: &TypeId) -> Option<Arc<FieldTable>> {
        self.index(id).map(|i| self.tables[i].clone())
    }

    fn instantiate(&self, id: &TypeId) -> Option<StructValue> {
        let index = self.index(id)?;
        let layout = &self.types[index];
        match layout.kind {
            LayoutKind::Class | LayoutKind::Struct => {}
            LayoutKind::Enum | LayoutKind::PrimitiveWrapper => return None,
        }
        let table = &self.tables[index];
        let mut fields = Vec::with_capacity(table.len());
        for slot in table.slots() {
            fields.push(default_value(&slot.kind, self)?);
        }
        Some(StructValue {
            type_id: TypeId::Name(layout.name.clone()),
            fields,
        })
    }
}

/// Builder for [`TypeLayout`] values.
///
/// The guid defaults to the MD5 of the type name and the signature to the
/// last 4 bytes of the guid, matching how pipeline-generated reflection data
/// derives both.
pub struct TypeLayoutBuilder {
    name: Arc<str>,
    kind: LayoutKind,
    super_type: Option<TypeId>,
    fields: Vec<FieldLayout>,
    members: Vec<EnumMember>,
    guid: Option<Guid>,
    signature: Option<u32>,
}

impl TypeLayoutBuilder {
    fn new(name: &str, kind: LayoutKind) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            super_type: None,
            fields: Vec::new(),
            members: Vec::new(),
            guid: None,
            signature: None,
        }
    }

    pub fn class(name: &str) -> Self {
        Self::new(name, LayoutKind::Class)
    }

    pub fn structure(name: &str) -> Self {
        Self::new(name, LayoutKind::Struct)
    }

    pub fn enumeration(name: &str) -> Self {
        Self::new(name, LayoutKind::Enum)
    }

    pub fn wrapper(name: &str, wrapped: FieldKind) -> Self {
        let mut builder = Self::new(name, LayoutKind::PrimitiveWrapper);
        builder.fields.push(FieldLayout::new("value", wrapped));
        builder
    }

    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_type = Some(TypeId::name(super_name));
        self
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldLayout::new(name, kind));
        self
    }

    pub fn member(mut self, name: &str, value: i32) -> Self {
        self.members.push(EnumMember::new(name, value));
        self
    }

    pub fn with_guid(mut self, guid: Guid) -> Self {
        self.guid = Some(guid);
        self
    }

    pub fn with_signature(mut self, signature: u32) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn build(self) -> TypeLayout {
        let guid = self.guid.unwrap_or_else(|| Guid::from_name(&self.name));
        let signature = self.signature.unwrap_or_else(|| type_signature(&guid));
        TypeLayout {
            name_hash: name_hash(&self.name),
            name: self.name,
            guid,
            signature,
            kind: self.kind,
            super_type: self.super_type,
            fields: self.fields,
            members: self.members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Value;

    fn soldier_schema() -> SchemaSet {
        let mut schema = SchemaSet::new();
        schema
            .insert(
                TypeLayoutBuilder::structure("Vec3")
                    .field("x", FieldKind::Float32)
                    .field("y", FieldKind::Float32)
                    .field("z", FieldKind::Float32)
                    .build(),
            )
            .expect("Vec3 should insert");
        schema
            .insert(
                TypeLayoutBuilder::class("Asset")
                    .field("name", FieldKind::CString)
                    .build(),
            )
            .expect("Asset should insert");
        schema
            .insert(
                TypeLayoutBuilder::class("SoldierEntityData")
                    .extends("Asset")
                    .field("position", FieldKind::Struct(TypeId::name("Vec3")))
                    .field("health", FieldKind::Int32)
                    .build(),
            )
            .expect("SoldierEntityData should insert");
        schema
    }

    #[test]
    fn test_resolve_by_all_id_forms() {
        let schema = soldier_schema();
        let by_name = schema.resolve(&TypeId::name("Vec3")).expect("by name");
        let by_hash = schema
            .resolve(&TypeId::NameHash(name_hash("Vec3")))
            .expect("by hash");
        let by_guid = schema
            .resolve(&TypeId::Guid(Guid::from_name("Vec3")))
            .expect("by guid");
        assert_eq!(by_name.name, by_hash.name);
        assert_eq!(by_name.guid, by_guid.guid);
        assert!(schema.resolve(&TypeId::name("Nope")).is_none());
    }

    #[test]
    fn test_insert_requires_super_first() {
        let mut schema = SchemaSet::new();
        let err = schema
            .insert(TypeLayoutBuilder::class("Derived").extends("Base").build())
            .expect_err("missing super should fail");
        assert!(matches!(err, Error::MissingType { .. }));
    }

    #[test]
    fn test_instantiate_fills_inherited_defaults() {
        let schema = soldier_schema();
        let soldier = schema
            .instantiate(&TypeId::name("SoldierEntityData"))
            .expect("instantiate");
        assert_eq!(soldier.fields.len(), 3);
        assert_eq!(soldier.fields[0], Value::CString(String::new()));
        match &soldier.fields[1] {
            Value::Struct(v) => assert_eq!(v.fields.len(), 3),
            other => panic!("expected nested struct, got {other:?}"),
        }
        assert_eq!(soldier.fields[2], Value::I32(0));
    }

    #[test]
    fn test_instantiate_rejects_enums_and_wrappers() {
        let mut schema = SchemaSet::new();
        schema
            .insert(
                TypeLayoutBuilder::enumeration("Color")
                    .member("Red", 0)
                    .build(),
            )
            .expect("Color should insert");
        schema
            .insert(TypeLayoutBuilder::wrapper("Boolean", FieldKind::Bool).build())
            .expect("Boolean should insert");
        assert!(schema.instantiate(&TypeId::name("Color")).is_none());
        assert!(schema.instantiate(&TypeId::name("Boolean")).is_none());
    }

    #[test]
    fn test_wrapper_field_defaults_to_wrapped_scalar() {
        let mut schema = SchemaSet::new();
        schema
            .insert(TypeLayoutBuilder::wrapper("Boolean", FieldKind::Bool).build())
            .expect("Boolean should insert");
        schema
            .insert(
                TypeLayoutBuilder::structure("Flags")
                    .field("enabled", FieldKind::Struct(TypeId::name("Boolean")))
                    .build(),
            )
            .expect("Flags should insert");
        let flags = schema.instantiate(&TypeId::name("Flags")).expect("instantiate");
        assert_eq!(flags.fields[0], Value::Bool(false));
    }

    #[test]
    fn test_builder_derives_guid_and_signature() {
        let layout = TypeLayoutBuilder::class("Asset").build();
        assert_eq!(layout.guid, Guid::from_name("Asset"));
        assert_eq!(layout.signature, type_signature(&layout.guid));

        let pinned = TypeLayoutBuilder::class("Asset")
            .with_signature(0x1234_5678)
            .build();
        assert_eq!(pinned.signature, 0x1234_5678);
    }

    #[test]
    fn test_enum_default_uses_first_member() {
        let mut schema = SchemaSet::new();
        schema
            .insert(
                TypeLayoutBuilder::enumeration("Team")
                    .member("Neutral", 3)
                    .member("Axis", 1)
                    .build(),
            )
            .expect("Team should insert");
        schema
            .insert(
                TypeLayoutBuilder::structure("Loadout")
                    .field("team", FieldKind::Enum(TypeId::name("Team")))
                    .build(),
            )
            .expect("Loadout should insert");
        let loadout = schema.instantiate(&TypeId::name("Loadout")).expect("instantiate");
        assert_eq!(loadout.fields[0], Value::Enum(3, "Neutral".to_string()));
    }
}
