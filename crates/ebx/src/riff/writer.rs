// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RIFF partition encoding.
//!
//! Sections are built in side buffers with placeholder words wherever a
//! value references another section. Once every section base is known, a
//! fixup pass rewrites each placeholder into a self-relative word and
//! records its position in the `EFIX` lists. `EBXX` entries hash the final
//! bytes of every out-of-line block, so they are computed last.

use std::collections::HashMap;

use crate::config::{EMPTY_ARRAY_SENTINEL, SECTION_ALIGN};
use crate::core::strings::StringTable;
use crate::core::{align_up, pad_to, CursorMut, Guid};
use crate::descriptor::{
    DescriptorResolver, ResolvedType, SharedTypeDescriptors, TypeFlags, TypeTableBuilder,
};
use crate::error::{Error, Result};
use crate::field_codec::{
    array_member, boxed_info, boxed_payload_ref, encode_fields, encode_value, image_slot, put_at,
    Dest, EncodeCtx, ValueSink,
};
use crate::graph::{walk_value, BoxedValue, ImportRef, ObjectGraph, PointerRef, TypeRef, Value};
use crate::riff::chunks::build_container;
use crate::riff::fixup::{content_hash, shared_ref_of, ExtraEntry, ExtraTable, FixupTable};
use crate::schema::{TypeId, TypeSchema};

/// Encodes object graphs into RIFF partition containers.
///
/// Every type the graph uses must already be registered in the shared
/// descriptor table; the container itself carries no descriptors, only the
/// `(guid, signature)` pairs that key into it.
pub struct RiffWriter<'a> {
    schema: &'a dyn TypeSchema,
    shared: &'a SharedTypeDescriptors,
}

impl<'a> RiffWriter<'a> {
    pub fn new(schema: &'a dyn TypeSchema, shared: &'a SharedTypeDescriptors) -> Self {
        Self { schema, shared }
    }

    /// Encode `graph` into a complete RIFF container.
    pub fn write(&self, graph: &ObjectGraph) -> Result<Vec<u8>> {
        if let Some(root) = graph.root() {
            if !root.is_exported() {
                return Err(Error::invalid_graph(
                    "root instance must carry an identity guid",
                ));
            }
        }

        let mut builder = TypeTableBuilder::with_shared(self.schema, self.shared);
        let mut type_refs: Vec<Option<u16>> = Vec::with_capacity(graph.len());
        for (index, instance) in graph.instances().iter().enumerate() {
            match builder.add_instance_types(instance) {
                Ok(type_ref) => type_refs.push(Some(type_ref)),
                Err(Error::MissingType { id }) if index > 0 => {
                    log::warn!("[RIFF] dropping instance {index}: type {id} not in schema");
                    type_refs.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        let table = builder.finish();
        // the container has no descriptor section of its own, every type
        // must resolve through the shared table
        for (desc, name) in table.types.iter().zip(&table.names) {
            if !desc.is_shared_key() {
                return Err(Error::invalid_graph(format!(
                    "type {name} is not in the shared descriptor table"
                )));
            }
        }

        let sequence = riff_order(graph, &type_refs);
        let mut order_of = vec![None::<u32>; graph.len()];
        for (pos, &index) in sequence.iter().enumerate() {
            order_of[index as usize] = Some(pos as u32);
        }

        let mut imports: Vec<ImportRef> = Vec::new();
        let mut import_index: HashMap<ImportRef, u32> = HashMap::new();
        for &index in &sequence {
            let instance = &graph.instances()[index as usize];
            for field in &instance.value.fields {
                walk_value(field, &mut |value| {
                    if let Value::Pointer(PointerRef::External(import)) = value {
                        if !import_index.contains_key(import) {
                            import_index.insert(*import, imports.len() as u32);
                            imports.push(*import);
                        }
                    }
                });
            }
        }

        let resolver = DescriptorResolver::new(&table.types, &table.fields, Some(self.shared));
        let ctx = EncodeCtx {
            schema: self.schema,
            table: &table,
            resolver: &resolver,
            order: &order_of,
            import_index: &import_index,
        };

        let mut sink = RiffSink::new();
        let mut meta = InstanceMeta::default();
        for &index in &sequence {
            let instance = &graph.instances()[index as usize];
            let Some(type_ref) = type_refs[index as usize] else {
                continue;
            };
            let rt = resolver.resolve_type(type_ref as usize)?;
            pad_to(&mut sink.data, usize::from(rt.desc.alignment.max(1)));
            meta.offsets.push(sink.data.len() as u32);
            if let Some(guid) = instance.guid {
                sink.data.extend_from_slice(guid.as_bytes());
                meta.exported += 1;
            }
            let start = sink.data.len();
            sink.data.resize(start + rt.desc.size as usize, 0);
            let id = TypeId::Name(table.names[type_ref as usize].clone());
            let field_table = self
                .schema
                .field_table(&id)
                .ok_or_else(|| Error::missing_type(&id))?;
            encode_fields(
                &ctx,
                &mut sink,
                Dest::Data,
                start,
                &rt,
                &field_table,
                &instance.value,
            )?;
            meta.type_guids.push(table.guids[type_ref as usize]);
            meta.signatures.push(table.signatures[type_ref as usize]);
        }

        self.assemble(graph, imports, meta, sink)
    }

    fn assemble(
        &self,
        graph: &ObjectGraph,
        imports: Vec<ImportRef>,
        meta: InstanceMeta,
        sink: RiffSink,
    ) -> Result<Vec<u8>> {
        let RiffSink {
            data: mut payload,
            arrays,
            boxed,
            strings,
            marks,
            array_extras,
            boxed_extras,
        } = sink;

        pad_to(&mut payload, SECTION_ALIGN);
        let array_base = payload.len();
        payload.extend_from_slice(&arrays);
        pad_to(&mut payload, SECTION_ALIGN);
        let boxed_base = payload.len();
        payload.extend_from_slice(&boxed);
        pad_to(&mut payload, SECTION_ALIGN);
        let string_base = payload.len();
        payload.extend_from_slice(strings.as_bytes());

        let mut fixup = FixupTable {
            partition_guid: graph.file_guid(),
            type_guids: meta.type_guids,
            signatures: meta.signatures,
            exported_count: meta.exported,
            instance_offsets: meta.offsets,
            pointer_offsets: Vec::new(),
            resource_ref_offsets: Vec::new(),
            imports,
            import_offsets: Vec::new(),
            type_info_offsets: Vec::new(),
            array_offset: array_base as u32,
            boxed_offset: boxed_base as u32,
            string_offset: string_base as u32,
        };

        // Section-relative mark positions become absolute before sorting;
        // only pointer marks still hold placeholders to patch.
        let mut relocs: Vec<(usize, Reloc)> = Vec::new();
        for mark in &marks {
            let pos = match mark.dest {
                Dest::Data => mark.at,
                Dest::Arrays => array_base + mark.at,
                Dest::Boxed => boxed_base + mark.at,
            };
            match mark.kind {
                MarkKind::Pointer(reloc) => {
                    fixup.pointer_offsets.push(pos as u32);
                    relocs.push((pos, reloc));
                }
                MarkKind::Import => fixup.import_offsets.push(pos as u32),
                MarkKind::TypeInfo => fixup.type_info_offsets.push(pos as u32),
                MarkKind::ResourceRef => fixup.resource_ref_offsets.push(pos as u32),
            }
        }
        fixup.pointer_offsets.sort_unstable();
        fixup.import_offsets.sort_unstable();
        fixup.type_info_offsets.sort_unstable();
        fixup.resource_ref_offsets.sort_unstable();

        let mut patch = CursorMut::new(&mut payload);
        for (pos, reloc) in relocs {
            let temp = patch.peek_u64_le(pos)?;
            let target = match reloc {
                Reloc::Instance => {
                    let index = temp as usize;
                    let offset =
                        fixup.instance_offsets.get(index).copied().ok_or_else(|| {
                            Error::invalid_graph(format!(
                                "pointer to missing instance slot {index}"
                            ))
                        })?;
                    // exported slots open with the identity guid; pointers
                    // target the image behind it
                    let skip = if (index as u32) < fixup.exported_count {
                        16
                    } else {
                        0
                    };
                    offset as usize + skip
                }
                Reloc::Array => array_base + temp as usize,
                Reloc::Boxed => boxed_base + temp as usize,
                Reloc::Str => string_base + temp as usize,
            };
            let rel = (target as i64 - pos as i64) as i32;
            patch.seek(pos)?;
            patch.write_u64_le(rel as u32 as u64)?;
        }

        let mut extra = ExtraTable::default();
        for pending in &array_extras {
            extra.arrays.push(self.extra_entry(&payload, array_base, pending)?);
        }
        for pending in &boxed_extras {
            extra.boxed.push(self.extra_entry(&payload, boxed_base, pending)?);
        }

        let file = build_container(&payload, &fixup.to_bytes(), &extra.to_bytes());
        log::debug!(
            "[RIFF] wrote {} bytes, {} instances, {} pointer words, {} type words",
            file.len(),
            fixup.instance_offsets.len(),
            fixup.pointer_offsets.len(),
            fixup.type_info_offsets.len()
        );
        Ok(file)
    }

    /// Checksum entry over a block's final bytes.
    fn extra_entry(
        &self,
        payload: &[u8],
        base: usize,
        pending: &PendingExtra,
    ) -> Result<ExtraEntry> {
        let start = base + pending.offset as usize;
        let bytes = payload
            .get(start..start + pending.span)
            .ok_or_else(|| Error::corrupt(start, "checksum block runs past the data section"))?;
        Ok(ExtraEntry {
            offset: start as u32,
            count: pending.count,
            content_hash: content_hash(bytes),
            flags: pending.flags,
            type_ref: shared_ref_of(self.shared, pending.type_hash),
        })
    }
}

/// Graph indices in file order: root first, remaining exported instances by
/// guid sort key, internals in declared order.
fn riff_order(graph: &ObjectGraph, type_refs: &[Option<u16>]) -> Vec<u32> {
    let mut sequence = Vec::with_capacity(graph.len());
    if !graph.is_empty() {
        sequence.push(0);
    }
    let kept = |index: &u32| type_refs[*index as usize].is_some();

    let mut exported: Vec<u32> = (1..graph.len() as u32)
        .filter(kept)
        .filter(|&i| graph.instances()[i as usize].is_exported())
        .collect();
    exported.sort_by_key(|&i| {
        graph.instances()[i as usize]
            .guid
            .map_or(0, |guid| guid.sort_key())
    });
    sequence.extend(exported);

    sequence.extend(
        (1..graph.len() as u32)
            .filter(kept)
            .filter(|&i| !graph.instances()[i as usize].is_exported()),
    );
    sequence
}

/// Per-instance side data the fixup table is written from.
#[derive(Default)]
struct InstanceMeta {
    offsets: Vec<u32>,
    type_guids: Vec<Guid>,
    signatures: Vec<u32>,
    exported: u32,
}

#[derive(Clone, Copy)]
struct Mark {
    dest: Dest,
    at: usize,
    kind: MarkKind,
}

#[derive(Clone, Copy)]
enum MarkKind {
    Pointer(Reloc),
    Import,
    TypeInfo,
    ResourceRef,
}

/// Section base a pointer placeholder resolves against.
#[derive(Clone, Copy)]
enum Reloc {
    Instance,
    Array,
    Boxed,
    Str,
}

/// An out-of-line block awaiting its checksum entry.
struct PendingExtra {
    /// Block start, section-relative.
    offset: u32,
    count: u32,
    span: usize,
    flags: TypeFlags,
    type_hash: u32,
}

/// Section buffers plus the marks the fixup pass patches. Pointer words
/// hold section-relative placeholders until the bases are known.
struct RiffSink {
    data: Vec<u8>,
    arrays: Vec<u8>,
    boxed: Vec<u8>,
    strings: StringTable,
    marks: Vec<Mark>,
    array_extras: Vec<PendingExtra>,
    boxed_extras: Vec<PendingExtra>,
}

impl RiffSink {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            arrays: Vec::new(),
            boxed: Vec::new(),
            strings: StringTable::new(),
            marks: Vec::new(),
            array_extras: Vec::new(),
            boxed_extras: Vec::new(),
        }
    }

    fn mark(&mut self, dest: Dest, at: usize, kind: MarkKind) {
        self.marks.push(Mark { dest, at, kind });
    }

    /// A zeroed block opens the element section so empty arrays have a
    /// count of zero to point past.
    fn ensure_sentinel(&mut self) {
        if self.arrays.is_empty() {
            self.arrays.resize(EMPTY_ARRAY_SENTINEL, 0);
        }
    }
}

impl ValueSink for RiffSink {
    fn buf(&mut self, dest: Dest) -> &mut Vec<u8> {
        match dest {
            Dest::Data => &mut self.data,
            Dest::Arrays => &mut self.arrays,
            Dest::Boxed => &mut self.boxed,
        }
    }

    fn write_pointer(
        &mut self,
        ctx: &EncodeCtx<'_>,
        dest: Dest,
        at: usize,
        ptr: &PointerRef,
    ) -> Result<()> {
        match ptr {
            // the null word is already in the zeroed image
            PointerRef::Null => Ok(()),
            PointerRef::Internal(index) => match ctx.order.get(*index as usize) {
                Some(Some(position)) => {
                    put_at(self.buf(dest), at, &u64::from(*position).to_le_bytes())?;
                    self.mark(dest, at, MarkKind::Pointer(Reloc::Instance));
                    Ok(())
                }
                // the target was dropped from the batch; null is all that is
                // left to write
                Some(None) => Ok(()),
                None => Err(Error::invalid_graph(format!(
                    "pointer to missing instance {index}"
                ))),
            },
            PointerRef::External(import) => {
                let index = ctx.import_index.get(import).copied().ok_or_else(|| {
                    Error::invalid_graph("external pointer missing from the import pass")
                })?;
                put_at(
                    self.buf(dest),
                    at,
                    &(u64::from(index) * 2 + 1).to_le_bytes(),
                )?;
                self.mark(dest, at, MarkKind::Import);
                Ok(())
            }
        }
    }

    fn write_string(&mut self, dest: Dest, at: usize, value: &str) -> Result<()> {
        let offset = self.strings.intern(value);
        put_at(self.buf(dest), at, &u64::from(offset).to_le_bytes())?;
        self.mark(dest, at, MarkKind::Pointer(Reloc::Str));
        Ok(())
    }

    fn write_type_ref(&mut self, dest: Dest, at: usize, value: &TypeRef) -> Result<()> {
        let word: u64 = match value {
            TypeRef::Null => 0,
            TypeRef::Primitive(code) => (u64::from(code.bits()) << 1) | 1,
            TypeRef::Named(hash) => u64::from(*hash) << 1,
        };
        put_at(self.buf(dest), at, &word.to_le_bytes())?;
        // null type words stay null at load time, the runtime only
        // swizzles the listed ones
        if !matches!(value, TypeRef::Null) {
            self.mark(dest, at, MarkKind::TypeInfo);
        }
        Ok(())
    }

    fn write_resource_ref(&mut self, dest: Dest, at: usize, value: u64) -> Result<()> {
        put_at(self.buf(dest), at, &value.to_le_bytes())?;
        if value != 0 {
            self.mark(dest, at, MarkKind::ResourceRef);
        }
        Ok(())
    }

    fn write_array(
        &mut self,
        ctx: &EncodeCtx<'_>,
        dest: Dest,
        at: usize,
        rt: &ResolvedType<'_>,
        elems: &[Value],
    ) -> Result<()> {
        self.ensure_sentinel();
        if elems.is_empty() {
            put_at(
                self.buf(dest),
                at,
                &(EMPTY_ARRAY_SENTINEL as u64).to_le_bytes(),
            )?;
            self.mark(dest, at, MarkKind::Pointer(Reloc::Array));
            return Ok(());
        }
        let member = array_member(ctx.resolver, rt)?;
        // the element count sits in the four bytes before the block
        let start = align_up(self.arrays.len() + 4, member.align.max(4));
        self.arrays.resize(start + elems.len() * member.stride, 0);
        put_at(
            &mut self.arrays,
            start - 4,
            &(elems.len() as u32).to_le_bytes(),
        )?;
        put_at(self.buf(dest), at, &(start as u64).to_le_bytes())?;
        self.mark(dest, at, MarkKind::Pointer(Reloc::Array));
        self.array_extras.push(PendingExtra {
            offset: start as u32,
            count: elems.len() as u32,
            span: elems.len() * member.stride,
            flags: member.fr.flags,
            type_hash: rt.desc.name_hash,
        });
        for (i, elem) in elems.iter().enumerate() {
            encode_value(
                ctx,
                self,
                Dest::Arrays,
                start + i * member.stride,
                &member.fr,
                elem,
            )?;
        }
        Ok(())
    }

    fn write_boxed(
        &mut self,
        ctx: &EncodeCtx<'_>,
        dest: Dest,
        at: usize,
        value: Option<&BoxedValue>,
    ) -> Result<()> {
        let Some(boxed) = value else {
            // both words of the slot stay zero
            return Ok(());
        };
        let info = boxed_info(ctx, &boxed.kind)?;
        let word = (u64::from(info.name_hash) << 32)
            | (u64::from(info.elem_flags.bits()) << 16)
            | u64::from(info.flags.bits());
        put_at(self.buf(dest), at, &word.to_le_bytes())?;
        self.mark(dest, at, MarkKind::TypeInfo);
        if info.flags.is_array() {
            let Value::Array(elems) = &boxed.value else {
                return Err(Error::invalid_graph(format!(
                    "boxed array payload holds {} instead of an array",
                    boxed.value.kind_name()
                )));
            };
            let rt = ctx.resolver.resolve_type(usize::from(info.type_ref))?;
            self.write_array(ctx, dest, at + 8, &rt, elems)
        } else {
            let fr = boxed_payload_ref(ctx, &info)?;
            let (size, align) = image_slot(&fr)?;
            pad_to(&mut self.boxed, align.max(1));
            let start = self.boxed.len();
            self.boxed.resize(start + size, 0);
            put_at(self.buf(dest), at + 8, &(start as u64).to_le_bytes())?;
            self.mark(dest, at + 8, MarkKind::Pointer(Reloc::Boxed));
            self.boxed_extras.push(PendingExtra {
                offset: start as u32,
                count: 1,
                span: size,
                flags: info.flags,
                type_hash: info.name_hash,
            });
            encode_value(ctx, self, Dest::Boxed, start, &fr, &boxed.value)
        }
    }
}
