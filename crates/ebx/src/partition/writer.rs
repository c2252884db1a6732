// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flat partition encoding.
//!
//! Instances are reordered into the canonical batch layout (root, then the
//! remaining exported objects by guid sort key, then internals by type
//! name), sections are built in side buffers, and the header is patched in
//! once every length is known. Re-encoding a freshly decoded graph must
//! reproduce the input file byte for byte.

use std::collections::{HashMap, HashSet};

use crate::config::{
    PartitionVersion, WriteOptions, PARTITION_HEADER_LEN, PARTITION_HEADER_LEN_BOXED,
    PARTITION_MAGIC, PARTITION_MAGIC_BOXED, POINTER_IMPORT_BIT, SECTION_ALIGN,
};
use crate::core::strings::StringTable;
use crate::core::{pad_to, CursorMut};
use crate::descriptor::{
    write_import, ArrayEntry, BoxedEntry, DescriptorResolver, ResolvedType, SharedTypeDescriptors,
    TypeCategory, TypeCode, TypeFlags, TypeTable, TypeTableBuilder,
};
use crate::error::{Error, Result};
use crate::field_codec::{
    array_member, boxed_info, boxed_payload_ref, encode_fields, encode_value, image_slot,
    local_type_ref, put_at, Dest, EncodeCtx, ValueSink,
};
use crate::graph::{walk_value, BoxedValue, ImportRef, ObjectGraph, PointerRef, TypeRef, Value};
use crate::partition::header::PartitionHeader;
use crate::schema::{TypeId, TypeSchema};

/// Encodes object graphs into flat partition files.
pub struct PartitionWriter<'a> {
    schema: &'a dyn TypeSchema,
    options: WriteOptions,
    shared: Option<&'a SharedTypeDescriptors>,
}

impl<'a> PartitionWriter<'a> {
    pub fn new(schema: &'a dyn TypeSchema) -> Self {
        Self {
            schema,
            options: WriteOptions::default(),
            shared: None,
        }
    }

    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Emit key stubs for types the shared table already carries. Requires
    /// `shared_descriptors` in the options to take effect.
    pub fn with_shared(mut self, shared: &'a SharedTypeDescriptors) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Encode `graph` into a complete partition file.
    pub fn write(&self, graph: &ObjectGraph) -> Result<Vec<u8>> {
        let version = self.options.version;
        if self.options.shared_descriptors && self.shared.is_none() {
            return Err(Error::invalid_graph(
                "shared descriptor emission needs a shared table",
            ));
        }
        if let Some(root) = graph.root() {
            if !root.is_exported() {
                return Err(Error::invalid_graph(
                    "root instance must carry an identity guid",
                ));
            }
        }

        let mut builder = match (self.options.shared_descriptors, self.shared) {
            (true, Some(shared)) => TypeTableBuilder::with_shared(self.schema, shared),
            _ => TypeTableBuilder::new(self.schema),
        };

        // Type-table indices per graph index; None marks instances dropped
        // because the schema no longer carries their type. The root is never
        // droppable, there is no file without it.
        let mut type_refs: Vec<Option<u16>> = Vec::with_capacity(graph.len());
        for (index, instance) in graph.instances().iter().enumerate() {
            match builder.add_instance_types(instance) {
                Ok(type_ref) => type_refs.push(Some(type_ref)),
                Err(Error::MissingType { id }) if index > 0 => {
                    log::warn!("[PARTITION] dropping instance {index}: type {id} not in schema");
                    type_refs.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        let table = builder.finish();

        let sequence = batch_order(graph, &table, &type_refs);
        let mut order_of = vec![None::<u32>; graph.len()];
        for (pos, &index) in sequence.iter().enumerate() {
            order_of[index as usize] = Some(pos as u32);
        }

        // Imports are indexed before any pointer word is written; first
        // encounter over the final instance order fixes the table order.
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

        let resolver = DescriptorResolver::new(&table.types, &table.fields, self.shared);
        let ctx = EncodeCtx {
            schema: self.schema,
            table: &table,
            resolver: &resolver,
            order: &order_of,
            import_index: &import_index,
        };

        let mut sink = PartitionSink::new(version);
        // (type_ref, exported) per file position, for runs and header counts
        let mut emitted: Vec<(u16, bool)> = Vec::with_capacity(sequence.len());
        for &index in &sequence {
            let instance = &graph.instances()[index as usize];
            let Some(type_ref) = type_refs[index as usize] else {
                continue;
            };
            let rt = resolver.resolve_type(type_ref as usize)?;
            pad_to(&mut sink.data, usize::from(rt.desc.alignment.max(1)));
            if let Some(guid) = instance.guid {
                sink.data.extend_from_slice(guid.as_bytes());
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
            emitted.push((type_ref, instance.is_exported()));
        }

        let runs = coalesce_runs(&emitted);
        let exported_total = emitted.iter().filter(|(_, exported)| *exported).count();
        if table.types.len() > usize::from(u16::MAX) || table.fields.len() > usize::from(u16::MAX)
        {
            return Err(Error::invalid_graph(
                "descriptor tables exceed the header fields",
            ));
        }
        if runs.len() > usize::from(u16::MAX) || exported_total > usize::from(u16::MAX) {
            return Err(Error::invalid_graph(
                "instance counts exceed the header fields",
            ));
        }

        self.assemble(version, graph, &table, &imports, &runs, exported_total, sink)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        version: PartitionVersion,
        graph: &ObjectGraph,
        table: &TypeTable,
        imports: &[ImportRef],
        runs: &[InstanceRun],
        exported_total: usize,
        mut sink: PartitionSink,
    ) -> Result<Vec<u8>> {
        let header_len = match version {
            PartitionVersion::Original => PARTITION_HEADER_LEN,
            PartitionVersion::BoxedValues => PARTITION_HEADER_LEN_BOXED,
        };
        let mut file = vec![0u8; header_len];

        for import in imports {
            write_import(&mut file, import);
        }

        let names_start = file.len();
        for (desc, name) in table.types.iter().zip(&table.names) {
            // stub entries resolve through the shared table, names travel
            // with the full descriptors only
            if desc.is_shared_key() {
                continue;
            }
            file.extend_from_slice(name.as_bytes());
            file.push(0);
        }
        let type_names_len = file.len() - names_start;
        if type_names_len > usize::from(u16::MAX) {
            return Err(Error::invalid_graph(
                "type name block exceeds the header field",
            ));
        }

        for field in &table.fields {
            field.write_to(&mut file);
        }
        for desc in &table.types {
            desc.write_to(&mut file);
        }
        for run in runs {
            file.extend_from_slice(&run.type_ref.to_le_bytes());
            file.extend_from_slice(&run.count.to_le_bytes());
        }

        pad_to(&mut file, SECTION_ALIGN);
        for entry in &sink.array_entries {
            entry.write_to(&mut file);
        }
        pad_to(&mut file, SECTION_ALIGN);
        if version == PartitionVersion::BoxedValues {
            for entry in &sink.boxed_entries {
                entry.write_to(&mut file);
            }
            pad_to(&mut file, SECTION_ALIGN);
        }

        let strings_offset = file.len();
        file.extend_from_slice(sink.strings.as_bytes());
        pad_to(&mut file, SECTION_ALIGN);
        let strings_len = file.len() - strings_offset;

        pad_to(&mut sink.data, SECTION_ALIGN);
        let data_len = sink.data.len();
        file.extend_from_slice(&sink.data);

        file.extend_from_slice(&sink.arrays);
        pad_to(&mut file, SECTION_ALIGN);
        let boxed_offset = if sink.boxed.is_empty() {
            0
        } else {
            let offset = file.len();
            file.extend_from_slice(&sink.boxed);
            offset as u32
        };

        let unique: HashSet<u16> = runs.iter().map(|run| run.type_ref).collect();
        let header = PartitionHeader {
            magic: match version {
                PartitionVersion::Original => PARTITION_MAGIC,
                PartitionVersion::BoxedValues => PARTITION_MAGIC_BOXED,
            },
            strings_offset: strings_offset as u32,
            strings_and_data_len: (file.len() - strings_offset) as u32,
            import_count: imports.len() as u32,
            instance_count: runs.len() as u16,
            exported_count: exported_total as u16,
            unique_type_count: unique.len() as u16,
            type_desc_count: table.types.len() as u16,
            field_desc_count: table.fields.len() as u16,
            type_names_len: type_names_len as u16,
            strings_len: strings_len as u32,
            array_count: sink.array_entries.len() as u32,
            data_len: data_len as u32,
            file_guid: graph.file_guid(),
            boxed_count: sink.boxed_entries.len() as u32,
            boxed_offset,
        };
        let mut patch = CursorMut::new(&mut file);
        header.write(&mut patch)?;
        log::debug!(
            "[PARTITION] wrote {} bytes, {} runs, {} imports, {} arrays",
            file.len(),
            runs.len(),
            imports.len(),
            sink.array_entries.len()
        );
        Ok(file)
    }
}

/// Graph indices in file order: root first, remaining exported instances by
/// guid sort key, internals by type name. Both sorts are stable so an order
/// that already satisfies the layout survives a rewrite unchanged.
fn batch_order(graph: &ObjectGraph, table: &TypeTable, type_refs: &[Option<u16>]) -> Vec<u32> {
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

    let mut internal: Vec<u32> = (1..graph.len() as u32)
        .filter(kept)
        .filter(|&i| !graph.instances()[i as usize].is_exported())
        .collect();
    internal.sort_by_key(|&i| type_refs[i as usize].map(|t| table.names[t as usize].clone()));
    sequence.extend(internal);
    sequence
}

struct InstanceRun {
    type_ref: u16,
    count: u16,
    exported: bool,
}

/// Adjacent instances of one type fold into a run; a run never mixes
/// exported and internal objects and never overflows its u16 count.
fn coalesce_runs(emitted: &[(u16, bool)]) -> Vec<InstanceRun> {
    let mut runs: Vec<InstanceRun> = Vec::new();
    for &(type_ref, exported) in emitted {
        match runs.last_mut() {
            Some(run)
                if run.type_ref == type_ref
                    && run.exported == exported
                    && run.count < u16::MAX =>
            {
                run.count += 1;
            }
            _ => runs.push(InstanceRun {
                type_ref,
                count: 1,
                exported,
            }),
        }
    }
    runs
}

/// Section buffers plus the reference tables the flat layout serializes.
struct PartitionSink {
    version: PartitionVersion,
    data: Vec<u8>,
    arrays: Vec<u8>,
    boxed: Vec<u8>,
    strings: StringTable,
    array_entries: Vec<ArrayEntry>,
    boxed_entries: Vec<BoxedEntry>,
}

impl PartitionSink {
    fn new(version: PartitionVersion) -> Self {
        Self {
            version,
            data: Vec::new(),
            arrays: Vec::new(),
            boxed: Vec::new(),
            strings: StringTable::new(),
            array_entries: Vec::new(),
            boxed_entries: Vec::new(),
        }
    }

    /// Entry 0 is the reserved empty entry; it exists as soon as any array
    /// field is written so zero-length arrays have something to alias.
    fn ensure_empty_entry(&mut self) {
        if self.array_entries.is_empty() {
            self.array_entries.push(ArrayEntry::default());
        }
    }
}

impl ValueSink for PartitionSink {
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
        let word: u32 = match ptr {
            PointerRef::Null => 0,
            PointerRef::Internal(index) => match ctx.order.get(*index as usize) {
                Some(Some(position)) => position + 1,
                // the target was dropped from the batch; null is all that is
                // left to write
                Some(None) => 0,
                None => {
                    return Err(Error::invalid_graph(format!(
                        "pointer to missing instance {index}"
                    )))
                }
            },
            PointerRef::External(import) => {
                let index = ctx.import_index.get(import).copied().ok_or_else(|| {
                    Error::invalid_graph("external pointer missing from the import pass")
                })?;
                index | POINTER_IMPORT_BIT
            }
        };
        put_at(self.buf(dest), at, &word.to_le_bytes())
    }

    fn write_string(&mut self, dest: Dest, at: usize, value: &str) -> Result<()> {
        let offset = self.strings.intern(value);
        put_at(self.buf(dest), at, &offset.to_le_bytes())
    }

    fn write_type_ref(&mut self, dest: Dest, at: usize, value: &TypeRef) -> Result<()> {
        let (disc, payload): (u32, u32) = match value {
            TypeRef::Null => (0, 0),
            TypeRef::Primitive(code) => (1, u32::from(code.bits())),
            TypeRef::Named(hash) => (2, *hash),
        };
        put_at(self.buf(dest), at, &disc.to_le_bytes())?;
        put_at(self.buf(dest), at + 4, &payload.to_le_bytes())
    }

    fn write_resource_ref(&mut self, dest: Dest, at: usize, value: u64) -> Result<()> {
        put_at(self.buf(dest), at, &value.to_le_bytes())
    }

    fn write_array(
        &mut self,
        ctx: &EncodeCtx<'_>,
        dest: Dest,
        at: usize,
        rt: &ResolvedType<'_>,
        elems: &[Value],
    ) -> Result<()> {
        self.ensure_empty_entry();
        if elems.is_empty() {
            return put_at(self.buf(dest), at, &0u32.to_le_bytes());
        }
        let member = array_member(ctx.resolver, rt)?;
        pad_to(&mut self.arrays, member.align);
        let start = self.arrays.len();
        self.arrays.resize(start + elems.len() * member.stride, 0);
        let index = self.array_entries.len() as u32;
        self.array_entries.push(ArrayEntry {
            offset: start as u32,
            count: elems.len() as u32,
            type_ref: u32::from(local_type_ref(ctx, rt)?),
        });
        put_at(self.buf(dest), at, &index.to_le_bytes())?;
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
        if self.version == PartitionVersion::Original {
            // the 16-byte slot and the boxed table only exist under the
            // newer layout
            return Err(Error::unsupported(
                TypeFlags::new(TypeCode::BoxedValueRef, TypeCategory::Scalar).bits(),
                "boxed values under the original partition layout",
            ));
        }
        let Some(boxed) = value else {
            return put_at(self.buf(dest), at, &(-1i32).to_le_bytes());
        };
        let info = boxed_info(ctx, &boxed.kind)?;
        let index = self.boxed_entries.len() as i32;
        if info.flags.is_array() {
            let Value::Array(elems) = &boxed.value else {
                return Err(Error::invalid_graph(format!(
                    "boxed array payload holds {} instead of an array",
                    boxed.value.kind_name()
                )));
            };
            // the payload is one array-table reference word
            pad_to(&mut self.boxed, 4);
            let offset = self.boxed.len();
            self.boxed.resize(offset + 4, 0);
            self.boxed_entries.push(BoxedEntry {
                offset: offset as u32,
                type_ref: info.type_ref,
                flags: info.flags,
            });
            put_at(self.buf(dest), at, &index.to_le_bytes())?;
            let rt = ctx.resolver.resolve_type(usize::from(info.type_ref))?;
            self.write_array(ctx, Dest::Boxed, offset, &rt, elems)
        } else {
            let fr = boxed_payload_ref(ctx, &info)?;
            let (size, align) = image_slot(&fr)?;
            pad_to(&mut self.boxed, align);
            let offset = self.boxed.len();
            self.boxed.resize(offset + size, 0);
            self.boxed_entries.push(BoxedEntry {
                offset: offset as u32,
                type_ref: info.type_ref,
                flags: info.flags,
            });
            put_at(self.buf(dest), at, &index.to_le_bytes())?;
            encode_value(ctx, self, Dest::Boxed, offset, &fr, &boxed.value)
        }
    }
}
