// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RIFF partition decoding.
//!
//! Every reference inside the data chunk is a self-relative word, so decode
//! needs no section bases: pointer targets resolve through an
//! offset-to-instance map built from the fixup table in a first pass. The
//! optional `EBXX` chunk is cross-checked tolerantly, a failed checksum
//! logs a warning and decoding continues.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::strings::read_cstring;
use crate::core::{Cursor, Guid};
use crate::descriptor::{DescriptorResolver, ResolvedType, SharedTypeDescriptors, TypeCode, TypeFlags};
use crate::error::{Error, Result};
use crate::field_codec::{
    array_member, decode_fields, BoxedPayload, BoxedTypeRef, BoxedWire, DecodeCtx, ValueSource,
};
use crate::graph::{ImportRef, Instance, ObjectGraph, PointerRef, StructValue, TypeRef};
use crate::riff::chunks::parse_container;
use crate::riff::fixup::{content_hash, ExtraEntry, ExtraTable, FixupTable};
use crate::schema::{FieldTable, TypeId, TypeSchema};

/// Decodes RIFF partition containers against a schema and its shared
/// descriptor table.
pub struct RiffReader<'a> {
    schema: &'a dyn TypeSchema,
    shared: &'a SharedTypeDescriptors,
}

impl<'a> RiffReader<'a> {
    pub fn new(schema: &'a dyn TypeSchema, shared: &'a SharedTypeDescriptors) -> Self {
        Self { schema, shared }
    }

    /// Decode one container into an object graph.
    pub fn read(&self, bytes: &[u8]) -> Result<ObjectGraph> {
        let chunks = parse_container(bytes)?;
        let fix = FixupTable::parse(chunks.fixup)?;
        if fix.type_guids.len() != fix.instance_offsets.len()
            || fix.signatures.len() != fix.instance_offsets.len()
        {
            return Err(Error::corrupt(
                0,
                format!(
                    "fixup lists disagree: {} offsets, {} type guids, {} signatures",
                    fix.instance_offsets.len(),
                    fix.type_guids.len(),
                    fix.signatures.len()
                ),
            ));
        }
        if fix.exported_count as usize > fix.instance_offsets.len() {
            return Err(Error::corrupt(0, "exported count exceeds the instance list"));
        }
        log::debug!(
            "[RIFF] reading {} instances ({} exported), {} imports, {} pointer words",
            fix.instance_offsets.len(),
            fix.exported_count,
            fix.imports.len(),
            fix.pointer_offsets.len()
        );

        let resolver = DescriptorResolver::new(&[], &[], Some(self.shared));
        if let Some(extra_bytes) = chunks.extra {
            if !extra_bytes.is_empty() {
                match ExtraTable::parse(extra_bytes) {
                    Ok(extra) => validate_extra(&resolver, chunks.data, &extra),
                    Err(e) => log::warn!("[RIFF] unreadable EBXX chunk: {e}"),
                }
            }
        }

        // Pass 1: resolve every instance slot. A type the schema does not
        // know at instance level leaves the whole image opaque, so that
        // miss is fatal rather than skippable.
        let mut plans = Vec::with_capacity(fix.instance_offsets.len());
        let mut by_offset: HashMap<usize, u32> =
            HashMap::with_capacity(fix.instance_offsets.len());
        for (i, &offset) in fix.instance_offsets.iter().enumerate() {
            let offset = offset as usize;
            let exported = (i as u32) < fix.exported_count;
            let shared_index =
                self.shared
                    .resolve_checked(&fix.type_guids[i], fix.signatures[i], offset)?;
            let rt = resolver.resolve_shared(shared_index)?;
            let lookup = TypeId::NameHash(rt.desc.name_hash);
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
            // pointer words target the image, behind the identity guid of
            // exported slots
            let image = offset + if exported { 16 } else { 0 };
            by_offset.insert(image, i as u32);
            plans.push(SlotPlan {
                rt,
                exported,
                offset,
                image,
                table,
                blank,
            });
        }

        // Pass 2: decode images in slot order.
        let src = RiffSource {
            imports: &fix.imports,
            by_offset: &by_offset,
        };
        let ctx = DecodeCtx {
            schema: self.schema,
            resolver: &resolver,
        };
        let mut graph = ObjectGraph::new(fix.partition_guid);
        let mut cur = Cursor::new(chunks.data);
        for plan in &plans {
            cur.seek(plan.offset)?;
            let guid = if plan.exported {
                Some(Guid::read(&mut cur)?)
            } else {
                None
            };
            let mut value = plan.blank.clone();
            decode_fields(&ctx, &src, &mut cur, &plan.rt, plan.image, &plan.table, &mut value)?;
            graph.add_instance(match guid {
                Some(guid) => Instance::exported(guid, value),
                None => Instance::internal(value),
            });
        }

        graph.recount_refs();
        Ok(graph)
    }
}

struct SlotPlan<'r> {
    rt: ResolvedType<'r>,
    exported: bool,
    offset: usize,
    image: usize,
    table: Arc<FieldTable>,
    blank: StructValue,
}

/// Cross-check `EBXX` entries against the final bytes. Entries whose type
/// does not resolve are skipped; a bad checksum logs a warning, never an
/// error.
fn validate_extra(resolver: &DescriptorResolver<'_>, data: &[u8], extra: &ExtraTable) {
    for entry in &extra.arrays {
        let Some(stride) = array_stride(resolver, entry.type_ref) else {
            log::debug!(
                "[RIFF] skipping checksum for array block at {:#x}, type {:#06x} unresolved",
                entry.offset,
                entry.type_ref
            );
            continue;
        };
        check_block(data, entry, entry.count as usize * stride, "array");
    }
    for entry in &extra.boxed {
        let Some(span) = boxed_span(resolver, entry) else {
            log::debug!(
                "[RIFF] skipping checksum for boxed block at {:#x}, kind {:#06x} unresolved",
                entry.offset,
                entry.flags.bits()
            );
            continue;
        };
        check_block(data, entry, span, "boxed");
    }
}

fn array_stride(resolver: &DescriptorResolver<'_>, type_ref: u16) -> Option<usize> {
    let rt = resolver.resolve_shared(usize::from(type_ref)).ok()?;
    let member = array_member(resolver, &rt).ok()?;
    Some(member.stride)
}

/// Image size of a boxed payload, mirroring the slot the writer reserved.
fn boxed_span(resolver: &DescriptorResolver<'_>, entry: &ExtraEntry) -> Option<usize> {
    match entry.flags.code()? {
        TypeCode::Struct => {
            let rt = resolver.resolve_shared(usize::from(entry.type_ref)).ok()?;
            Some(rt.desc.size as usize)
        }
        code => code.fixed_slot().map(|(size, _)| usize::from(size)),
    }
}

fn check_block(data: &[u8], entry: &ExtraEntry, span: usize, what: &str) {
    let start = entry.offset as usize;
    let bytes = start
        .checked_add(span)
        .and_then(|end| data.get(start..end));
    let Some(bytes) = bytes else {
        log::warn!("[RIFF] {what} block at {start:#x} runs past the data chunk");
        return;
    };
    let hash = content_hash(bytes);
    if hash != entry.content_hash {
        log::warn!(
            "[RIFF] {what} block at {start:#x} fails its checksum ({hash:#010x} != {:#010x})",
            entry.content_hash
        );
    }
}

/// Resolve a self-relative reference word read at `at`. The low 32 bits
/// carry a signed delta from the word's own position.
fn rel_target(at: usize, word: u64) -> Result<usize> {
    let rel = i64::from(word as u32 as i32);
    let target = at as i64 + rel;
    if target < 0 {
        return Err(Error::corrupt(
            at,
            "relative reference before the data section",
        ));
    }
    Ok(target as usize)
}

struct RiffSource<'r> {
    imports: &'r [ImportRef],
    by_offset: &'r HashMap<usize, u32>,
}

impl ValueSource for RiffSource<'_> {
    fn read_pointer(&self, cur: &mut Cursor<'_>) -> Result<PointerRef> {
        let at = cur.offset();
        let word = cur.read_u64_le()?;
        if word == 0 {
            return Ok(PointerRef::Null);
        }
        if word & 1 == 1 {
            let index = (word >> 1) as usize;
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
        let target = rel_target(at, word)?;
        self.by_offset
            .get(&target)
            .map(|&index| PointerRef::Internal(index))
            .ok_or_else(|| {
                Error::corrupt(at, format!("pointer targets {target:#x}, not an instance"))
            })
    }

    fn read_string(&self, cur: &mut Cursor<'_>) -> Result<String> {
        let at = cur.offset();
        let word = cur.read_u64_le()?;
        if word == 0 {
            return Ok(String::new());
        }
        read_cstring(cur, rel_target(at, word)?)
    }

    fn read_array(&self, cur: &mut Cursor<'_>) -> Result<(usize, u32)> {
        let at = cur.offset();
        let word = cur.read_u64_le()?;
        if word == 0 {
            log::debug!("[RIFF] null array word at {at:#x}");
            return Ok((0, 0));
        }
        let target = rel_target(at, word)?;
        let count_at = target.checked_sub(4).ok_or_else(|| {
            Error::corrupt(at, "array block before its count prefix")
        })?;
        let count = cur.at(count_at, |c| c.read_u32_le())?;
        Ok((target, count))
    }

    fn read_type_ref(&self, cur: &mut Cursor<'_>) -> Result<TypeRef> {
        let at = cur.offset();
        let word = cur.read_u64_le()?;
        if word == 0 {
            return Ok(TypeRef::Null);
        }
        if word & 1 == 1 {
            let code = u8::try_from(word >> 1)
                .ok()
                .and_then(TypeCode::from_bits)
                .ok_or_else(|| Error::corrupt(at, "type ref names unknown primitive"))?;
            return Ok(TypeRef::Primitive(code));
        }
        Ok(TypeRef::Named((word >> 1) as u32))
    }

    fn read_boxed(&self, cur: &mut Cursor<'_>) -> Result<Option<BoxedWire>> {
        let word = cur.read_u64_le()?;
        if word == 0 {
            return Ok(None);
        }
        let flags = TypeFlags::from_bits(word as u16);
        let elem_flags = TypeFlags::from_bits((word >> 16) as u16);
        let hash = (word >> 32) as u32;
        let payload_at = cur.offset();
        let payload_word = cur.read_u64_le()?;
        if payload_word == 0 {
            return Err(Error::corrupt(payload_at, "boxed payload pointer is null"));
        }
        let target = rel_target(payload_at, payload_word)?;
        let payload = if flags.is_array() {
            let count_at = target.checked_sub(4).ok_or_else(|| {
                Error::corrupt(payload_at, "array block before its count prefix")
            })?;
            let count = cur.at(count_at, |c| c.read_u32_le())?;
            BoxedPayload::Block { pos: target, count }
        } else {
            BoxedPayload::At(target)
        };
        Ok(Some(BoxedWire {
            flags,
            elem_flags,
            type_ref: BoxedTypeRef::NameHash(hash),
            payload,
        }))
    }
}
