// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Index resolution over local descriptor tables plus an optional shared
//! table.
//!
//! Three reference forms exist on wire, all funneled through here:
//! full local entries, 16-byte key stubs into the shared table, and the
//! legacy empty-field-pool form whose field refs index the shared field pool
//! absolutely while field type refs stay shared-relative deltas.

use crate::descriptor::shared::SharedTypeDescriptors;
use crate::descriptor::wire::{FieldDescriptor, TypeDescriptor};
use crate::error::{Error, Result};
use crate::schema::TypeId;

/// A type descriptor with the resolution context later lookups need.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedType<'a> {
    pub desc: &'a TypeDescriptor,
    /// Position in the shared table when the descriptor resolves through it.
    pub shared_index: Option<usize>,
    /// Field type refs of this type are shared-relative deltas.
    pub shared_fields: bool,
}

pub(crate) struct DescriptorResolver<'a> {
    types: &'a [TypeDescriptor],
    fields: &'a [FieldDescriptor],
    shared: Option<&'a SharedTypeDescriptors>,
}

impl<'a> DescriptorResolver<'a> {
    pub fn new(
        types: &'a [TypeDescriptor],
        fields: &'a [FieldDescriptor],
        shared: Option<&'a SharedTypeDescriptors>,
    ) -> Self {
        Self {
            types,
            fields,
            shared,
        }
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    fn shared(&self) -> Result<&'a SharedTypeDescriptors> {
        self.shared.ok_or_else(|| {
            Error::corrupt(0, "descriptor references a shared table but none was supplied")
        })
    }

    /// Resolve a local type-table index, following key stubs into the shared
    /// table.
    pub fn resolve_type(&self, index: usize) -> Result<ResolvedType<'a>> {
        let desc = self.types.get(index).ok_or_else(|| {
            Error::corrupt(
                0,
                format!(
                    "type descriptor index {index} out of range (table has {})",
                    self.types.len()
                ),
            )
        })?;

        if desc.is_shared_key() {
            let shared = self.shared()?;
            let key = desc.shared_key();
            let shared_index = shared.lookup(&key).ok_or_else(|| {
                Error::corrupt(0, format!("shared table has no descriptor for key {key}"))
            })?;
            let desc = shared.type_at(shared_index).ok_or_else(|| {
                Error::corrupt(0, format!("shared type index {shared_index} out of range"))
            })?;
            return Ok(ResolvedType {
                desc,
                shared_index: Some(shared_index),
                shared_fields: true,
            });
        }

        // Full local entry. With an empty local field pool its fields (and
        // their delta type refs) resolve through the shared table.
        if self.fields.is_empty() && desc.field_count > 0 {
            let shared = self.shared()?;
            let shared_index =
                shared.lookup_by_name_hash(desc.name_hash).ok_or_else(|| {
                    Error::corrupt(
                        0,
                        format!(
                            "shared table has no descriptor named {:#010x} \
                             required by a field-less local entry",
                            desc.name_hash
                        ),
                    )
                })?;
            return Ok(ResolvedType {
                desc,
                shared_index: Some(shared_index),
                shared_fields: true,
            });
        }

        Ok(ResolvedType {
            desc,
            shared_index: None,
            shared_fields: false,
        })
    }

    /// Resolve a shared-table index directly (RIFF instance types, EBXX
    /// entries).
    pub fn resolve_shared(&self, index: usize) -> Result<ResolvedType<'a>> {
        let shared = self.shared()?;
        let desc = shared.type_at(index).ok_or_else(|| {
            Error::corrupt(
                0,
                format!(
                    "shared type index {index} out of range (table has {})",
                    shared.len()
                ),
            )
        })?;
        Ok(ResolvedType {
            desc,
            shared_index: Some(index),
            shared_fields: true,
        })
    }

    /// Resolve a shared descriptor by type name hash. Boxed value words carry
    /// only the hash, so a miss means the shared table predates the payload
    /// type rather than a corrupt file.
    pub fn resolve_shared_named(&self, name_hash: u32) -> Result<ResolvedType<'a>> {
        let shared = self.shared()?;
        let index = shared
            .lookup_by_name_hash(name_hash)
            .ok_or_else(|| Error::missing_type(TypeId::NameHash(name_hash)))?;
        self.resolve_shared(index)
    }

    /// Resolve the type a field refers to, honoring delta encoding when the
    /// owning type lives in the shared table.
    pub fn resolve_type_from_field(
        &self,
        field: &FieldDescriptor,
        owner: &ResolvedType<'a>,
    ) -> Result<ResolvedType<'a>> {
        if owner.shared_fields {
            let base = owner.shared_index.ok_or_else(|| {
                Error::corrupt(0, "shared-field type without a shared index")
            })? as i64;
            let target = base + (field.type_ref as i16) as i64;
            if target < 0 {
                return Err(Error::corrupt(
                    0,
                    format!("field type delta {} escapes the shared table", field.type_ref as i16),
                ));
            }
            return self.resolve_shared(target as usize);
        }
        self.resolve_type(field.type_ref as usize)
    }

    /// Resolve a field-table index; an empty local pool means the index is
    /// absolute into the shared pool.
    pub fn resolve_field(&self, index: usize) -> Result<&'a FieldDescriptor> {
        if self.fields.is_empty() {
            let shared = self.shared()?;
            return shared.field_at(index).ok_or_else(|| {
                Error::corrupt(
                    0,
                    format!(
                        "shared field index {index} out of range (pool has {})",
                        shared.field_count()
                    ),
                )
            });
        }
        self.fields.get(index).ok_or_else(|| {
            Error::corrupt(
                0,
                format!(
                    "field descriptor index {index} out of range (table has {})",
                    self.fields.len()
                ),
            )
        })
    }

    /// The declared field block of a resolved type.
    pub fn fields_of(&self, rt: &ResolvedType<'a>) -> Result<&'a [FieldDescriptor]> {
        let start = rt.desc.field_start as usize;
        let count = rt.desc.field_count as usize;
        let slice = if rt.shared_fields {
            self.shared()?.field_range(start, count)
        } else {
            start.checked_add(count).and_then(|end| self.fields.get(start..end))
        };
        slice.ok_or_else(|| {
            Error::corrupt(
                0,
                format!(
                    "type {:#010x} declares fields {start}..{} out of range",
                    rt.desc.name_hash,
                    start + count
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Guid;
    use crate::descriptor::flags::{TypeCategory, TypeCode, TypeFlags};

    fn scalar_type(name_hash: u32, code: TypeCode, size: u16) -> TypeDescriptor {
        TypeDescriptor {
            name_hash,
            field_start: 0,
            field_count: 0,
            alignment: 4,
            flags: TypeFlags::new(code, TypeCategory::Scalar),
            size,
            reserved: 0,
        }
    }

    fn field(code: TypeCode, type_ref: u16, data_offset: u32) -> FieldDescriptor {
        FieldDescriptor {
            name_hash: 0x100 + data_offset,
            flags: TypeFlags::new(code, TypeCategory::Scalar),
            type_ref,
            data_offset,
            secondary_offset: 0,
        }
    }

    fn shared_with_vec2() -> SharedTypeDescriptors {
        let mut shared = SharedTypeDescriptors::new();
        shared.register(
            Guid::from_name("Float32"),
            1,
            scalar_type(0xF32, TypeCode::Float32, 4),
            Vec::new(),
        );
        shared.register(
            Guid::from_name("Vec2"),
            2,
            TypeDescriptor {
                name_hash: 0xABC,
                field_start: 0,
                field_count: 0,
                alignment: 4,
                flags: TypeFlags::new(TypeCode::Struct, TypeCategory::Scalar),
                size: 8,
                reserved: 0,
            },
            vec![
                field(TypeCode::Float32, (-1i16) as u16, 0),
                field(TypeCode::Float32, (-1i16) as u16, 4),
            ],
        );
        shared
    }

    #[test]
    fn test_local_resolution() {
        let types = [scalar_type(0x1, TypeCode::Int32, 4)];
        let fields = [field(TypeCode::Int32, 0, 0)];
        let resolver = DescriptorResolver::new(&types, &fields, None);

        let rt = resolver.resolve_type(0).expect("resolve");
        assert!(!rt.shared_fields);
        assert_eq!(rt.desc.name_hash, 0x1);
        assert!(resolver.resolve_type(1).is_err());
        assert!(resolver.resolve_field(1).is_err());
    }

    #[test]
    fn test_key_stub_resolves_through_shared() {
        let shared = shared_with_vec2();
        let stub = TypeDescriptor::from_shared_key(Guid::from_name("Vec2"));
        let types = [stub];
        let resolver = DescriptorResolver::new(&types, &[], Some(&shared));

        let rt = resolver.resolve_type(0).expect("resolve stub");
        assert!(rt.shared_fields);
        assert_eq!(rt.shared_index, Some(1));
        assert_eq!(rt.desc.name_hash, 0xABC);

        let fields = resolver.fields_of(&rt).expect("fields");
        assert_eq!(fields.len(), 2);
        let elem = resolver
            .resolve_type_from_field(&fields[0], &rt)
            .expect("delta resolve");
        assert_eq!(elem.shared_index, Some(0));
        assert_eq!(elem.desc.flags.code(), Some(TypeCode::Float32));
    }

    #[test]
    fn test_stub_without_shared_table_fails() {
        let stub = TypeDescriptor::from_shared_key(Guid::from_name("Vec2"));
        let types = [stub];
        let resolver = DescriptorResolver::new(&types, &[], None);
        assert!(resolver.resolve_type(0).is_err());
    }

    #[test]
    fn test_empty_local_field_pool_uses_shared_absolutes() {
        let shared = shared_with_vec2();
        // full local entry for Vec2, fields stored only in the shared pool
        let mut local = *shared.type_at(1).expect("vec2");
        local.field_start = 0;
        local.field_count = 2;
        let types = [local];
        let resolver = DescriptorResolver::new(&types, &[], Some(&shared));

        let rt = resolver.resolve_type(0).expect("resolve");
        assert!(rt.shared_fields);
        assert_eq!(rt.shared_index, Some(1));

        let fd = resolver.resolve_field(1).expect("absolute shared field");
        assert_eq!(fd.data_offset, 4);
    }

    #[test]
    fn test_delta_escape_is_an_error() {
        let shared = shared_with_vec2();
        let stub = TypeDescriptor::from_shared_key(Guid::from_name("Float32"));
        let types = [stub];
        let resolver = DescriptorResolver::new(&types, &[], Some(&shared));
        let rt = resolver.resolve_type(0).expect("resolve");

        let bad = field(TypeCode::Float32, (-5i16) as u16, 0);
        assert!(resolver.resolve_type_from_field(&bad, &rt).is_err());
    }
}
