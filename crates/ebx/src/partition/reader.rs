// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flat partition decoding.
//!
//! Sections are walked in file order: imports, type names, descriptor
//! tables, instance runs, then the array and boxed tables. Instance images
//! decode in a second pass once every descriptor is in hand, so pointer
//! words can be bounds-checked against the full arena up front.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{PartitionVersion, POINTER_IMPORT_BIT, SECTION_ALIGN};
use crate::core::strings::read_cstring;
use crate::core::{name_hash, Cursor, Guid};
use crate::descriptor::{
    read_import, ArrayEntry, BoxedEntry, DescriptorResolver, FieldDescriptor, ResolvedType,
    SharedTypeDescriptors, TypeCode, TypeDescriptor, TypeFlags,
};
use crate::error::{Error, Result};
use crate::field_codec::{
    decode_fields, BoxedPayload, BoxedTypeRef, BoxedWire, DecodeCtx, ValueSource,
};
use crate::graph::{ImportRef, Instance, ObjectGraph, PointerRef, StructValue, TypeRef};
use crate::partition::header::PartitionHeader;
use crate::schema::{FieldTable, TypeId, TypeSchema};

/// Decodes flat partition files against a schema.
///
/// Files whose local type descriptors are key stubs need the matching shared
/// table attached via [`with_shared`](PartitionReader::with_shared).
pub struct PartitionReader<'a> {
    schema: &'a dyn TypeSchema,
    shared: Option<&'a SharedTypeDescriptors>,
}

impl<'a> PartitionReader<'a> {
    pub fn new(schema: &'a dyn TypeSchema) -> Self {
        Self {
            schema,
            shared: None,
        }
    }

    pub fn with_shared(mut self, shared: &'a SharedTypeDescriptors) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Decode one partition file into an object graph.
    pub fn read(&self, bytes: &[u8]) -> Result<ObjectGraph> {
        let mut cur = Cursor::new(bytes);
        let header = PartitionHeader::read(&mut cur)?;
        let version = header.version()?;
        log::debug!(
            "[PARTITION] reading {:?} file, {} instance runs, {} types",
            version,
            header.instance_count,
            header.type_desc_count
        );

        let mut imports = Vec::with_capacity(header.import_count as usize);
        for _ in 0..header.import_count {
            imports.push(read_import(&mut cur)?);
        }

        let type_names = read_type_names(&mut cur, header.type_names_len as usize)?;

        let mut fields = Vec::with_capacity(header.field_desc_count as usize);
        for _ in 0..header.field_desc_count {
            fields.push(FieldDescriptor::read(&mut cur)?);
        }
        let mut types = Vec::with_capacity(header.type_desc_count as usize);
        for _ in 0..header.type_desc_count {
            types.push(TypeDescriptor::read(&mut cur)?);
        }

        // Runs are laid out exported-first; a run is exported while the
        // cumulative object count stays inside the header's exported total.
        let mut runs = Vec::with_capacity(header.instance_count as usize);
        let mut object_total: u32 = 0;
        for _ in 0..header.instance_count {
            let type_ref = cur.read_u16_le()?;
            let count = cur.read_u16_le()?;
            object_total += u32::from(count);
            runs.push((
                type_ref,
                count,
                object_total <= u32::from(header.exported_count),
            ));
        }

        cur.align(SECTION_ALIGN as u8)?;
        let mut arrays = Vec::with_capacity(header.array_count as usize);
        for _ in 0..header.array_count {
            arrays.push(ArrayEntry::read(&mut cur)?);
        }

        let mut boxed = Vec::new();
        if version == PartitionVersion::BoxedValues {
            cur.align(SECTION_ALIGN as u8)?;
            boxed.reserve(header.boxed_count as usize);
            for _ in 0..header.boxed_count {
                boxed.push(BoxedEntry::read(&mut cur)?);
            }
        }

        let strings_base = header.strings_offset as usize;
        let data_base = strings_base + header.strings_len as usize;
        let array_base = data_base + header.data_len as usize;

        let resolver = DescriptorResolver::new(&types, &fields, self.shared);

        // Pass 1: resolve every run against the schema. A type the schema
        // does not know at instance level leaves the whole image opaque, so
        // that miss is fatal rather than skippable.
        let mut plans = Vec::with_capacity(runs.len());
        for &(type_ref, count, exported) in &runs {
            let rt = resolver.resolve_type(type_ref as usize)?;
            let lookup = match type_names.get(&rt.desc.name_hash) {
                Some(name) => TypeId::Name(name.clone()),
                None => TypeId::NameHash(rt.desc.name_hash),
            };
            let layout = self
                .schema
                .resolve(&lookup)
                .ok_or_else(|| Error::missing_type(&lookup))?;
            let id = layout.type_id();
            let table = self
                .schema
                .field_table(&id)
                .ok_or_else(|| Error::missing_type(&id))?;
            let blank = self
                .schema
                .instantiate(&id)
                .ok_or_else(|| Error::missing_type(&id))?;
            plans.push(RunPlan {
                rt,
                count,
                exported,
                table,
                blank,
            });
        }

        // Pass 2: decode images in arena order.
        let src = PartitionSource {
            strings_base,
            array_base,
            boxed_base: header.boxed_offset as usize,
            instance_count: object_total,
            imports: &imports,
            arrays: &arrays,
            boxed: &boxed,
        };
        let ctx = DecodeCtx {
            schema: self.schema,
            resolver: &resolver,
        };
        let mut graph = ObjectGraph::new(header.file_guid);
        cur.seek(data_base)?;
        for plan in &plans {
            for _ in 0..plan.count {
                cur.align(plan.rt.desc.alignment.max(1))?;
                let guid = if plan.exported {
                    Some(Guid::read(&mut cur)?)
                } else {
                    None
                };
                let start = cur.offset();
                let mut value = plan.blank.clone();
                decode_fields(&ctx, &src, &mut cur, &plan.rt, start, &plan.table, &mut value)?;
                cur.seek(start + plan.rt.desc.size as usize)?;
                graph.add_instance(match guid {
                    Some(guid) => Instance::exported(guid, value),
                    None => Instance::internal(value),
                });
            }
        }

        graph.recount_refs();
        Ok(graph)
    }
}

struct RunPlan<'r> {
    rt: ResolvedType<'r>,
    count: u16,
    exported: bool,
    table: Arc<FieldTable>,
    blank: StructValue,
}

/// NUL-terminated name block, indexed by name hash for diagnostics.
fn read_type_names(cur: &mut Cursor<'_>, len: usize) -> Result<HashMap<u32, Arc<str>>> {
    let bytes = cur.read_bytes(len)?;
    let mut names = HashMap::new();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] == 0 {
            pos += 1;
            continue;
        }
        let end = bytes[pos..]
            .iter()
            .position(|&b| b == 0)
            .map_or(bytes.len(), |nul| pos + nul);
        let name = String::from_utf8_lossy(&bytes[pos..end]);
        names.insert(name_hash(&name), Arc::from(name.as_ref()));
        pos = end + 1;
    }
    Ok(names)
}

/// Section-relative reference decoding for the flat layout.
struct PartitionSource<'b> {
    strings_base: usize,
    array_base: usize,
    boxed_base: usize,
    instance_count: u32,
    imports: &'b [ImportRef],
    arrays: &'b [ArrayEntry],
    boxed: &'b [BoxedEntry],
}

impl PartitionSource<'_> {
    fn array_entry(&self, at: usize, index: usize) -> Result<&ArrayEntry> {
        self.arrays.get(index).ok_or_else(|| {
            Error::corrupt(
                at,
                format!(
                    "array index {index} out of range (table has {})",
                    self.arrays.len()
                ),
            )
        })
    }
}

impl ValueSource for PartitionSource<'_> {
    fn read_pointer(&self, cur: &mut Cursor<'_>) -> Result<PointerRef> {
        let at = cur.offset();
        let word = cur.read_u32_le()?;
        if word == 0 {
            return Ok(PointerRef::Null);
        }
        if word & POINTER_IMPORT_BIT != 0 {
            let index = (word & !POINTER_IMPORT_BIT) as usize;
            let import = self.imports.get(index).copied().ok_or_else(|| {
                Error::corrupt(
                    at,
                    format!(
                        "import index {index} out of range ({} imports)",
                        self.imports.len()
                    ),
                )
            })?;
            return Ok(PointerRef::External(import));
        }
        let index = word - 1;
        if index >= self.instance_count {
            return Err(Error::corrupt(
                at,
                format!(
                    "instance index {index} out of range ({} instances)",
                    self.instance_count
                ),
            ));
        }
        Ok(PointerRef::Internal(index))
    }

    fn read_string(&self, cur: &mut Cursor<'_>) -> Result<String> {
        let offset = cur.read_u32_le()? as usize;
        read_cstring(cur, self.strings_base + offset)
    }

    fn read_array(&self, cur: &mut Cursor<'_>) -> Result<(usize, u32)> {
        let at = cur.offset();
        let index = cur.read_u32_le()? as usize;
        let entry = self.array_entry(at, index)?;
        Ok((self.array_base + entry.offset as usize, entry.count))
    }

    fn read_type_ref(&self, cur: &mut Cursor<'_>) -> Result<TypeRef> {
        let at = cur.offset();
        let disc = cur.read_u32_le()?;
        let payload = cur.read_u32_le()?;
        match disc {
            0 => Ok(TypeRef::Null),
            1 => u8::try_from(payload)
                .ok()
                .and_then(TypeCode::from_bits)
                .map(TypeRef::Primitive)
                .ok_or_else(|| {
                    Error::corrupt(at, format!("type ref names unknown primitive {payload:#x}"))
                }),
            2 => Ok(TypeRef::Named(payload)),
            other => Err(Error::corrupt(
                at,
                format!("unknown type ref discriminant {other}"),
            )),
        }
    }

    fn read_boxed(&self, cur: &mut Cursor<'_>) -> Result<Option<BoxedWire>> {
        let at = cur.offset();
        let index = cur.read_i32_le()?;
        if index < 0 {
            return Ok(None);
        }
        let entry = self.boxed.get(index as usize).copied().ok_or_else(|| {
            Error::corrupt(
                at,
                format!(
                    "boxed index {index} out of range (table has {})",
                    self.boxed.len()
                ),
            )
        })?;
        let payload_at = self.boxed_base + entry.offset as usize;
        let payload = if entry.flags.is_array() {
            // array payloads are one array-table reference word
            let array_index = cur.at(payload_at, |c| c.read_u32_le())? as usize;
            let array = self.array_entry(payload_at, array_index)?;
            BoxedPayload::Block {
                pos: self.array_base + array.offset as usize,
                count: array.count,
            }
        } else {
            BoxedPayload::At(payload_at)
        };
        Ok(Some(BoxedWire {
            flags: entry.flags,
            elem_flags: TypeFlags::default(),
            type_ref: BoxedTypeRef::Local(entry.type_ref),
            payload,
        }))
    }
}
