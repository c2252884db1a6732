// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared Type Descriptor Table: full descriptors keyed by 16-byte guids,
//! referenced from partition files through stub entries.
//!
//! Field type refs inside the shared pools are signed self-relative deltas
//! (field's target shared index minus its owning type's shared index), so
//! blocks of descriptors stay valid wherever they land in the table.

use std::collections::HashMap;

use crate::config::SHARED_TABLE_TAG;
use crate::core::{Cursor, Guid};
use crate::descriptor::table_builder::{TypeTable, TypeTableBuilder};
use crate::descriptor::wire::{FieldDescriptor, TypeDescriptor};
use crate::error::{Error, Result};
use crate::graph::ObjectGraph;
use crate::schema::{TypeId, TypeSchema};

#[derive(Debug, Clone, Default)]
pub struct SharedTypeDescriptors {
    types: Vec<TypeDescriptor>,
    fields: Vec<FieldDescriptor>,
    keys: Vec<Guid>,
    signatures: Vec<u32>,
    by_key: HashMap<Guid, usize>,
    by_hash: HashMap<u32, usize>,
}

impl SharedTypeDescriptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn lookup(&self, key: &Guid) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn lookup_by_name_hash(&self, hash: u32) -> Option<usize> {
        self.by_hash.get(&hash).copied()
    }

    pub fn type_at(&self, index: usize) -> Option<&TypeDescriptor> {
        self.types.get(index)
    }

    pub fn field_at(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn key_at(&self, index: usize) -> Option<&Guid> {
        self.keys.get(index)
    }

    pub fn signature_at(&self, index: usize) -> Option<u32> {
        self.signatures.get(index).copied()
    }

    /// Field block of one type, `None` when the entry or its declared range
    /// is out of bounds.
    pub fn fields_of(&self, index: usize) -> Option<&[FieldDescriptor]> {
        let desc = self.types.get(index)?;
        self.field_range(desc.field_start as usize, desc.field_count as usize)
    }

    /// Arbitrary slice of the field pool. Legacy files that lean on a shared
    /// table keep their own `field_start` values pointing in here.
    pub fn field_range(&self, start: usize, count: usize) -> Option<&[FieldDescriptor]> {
        let end = start.checked_add(count)?;
        self.fields.get(start..end)
    }

    /// Resolve a `(key, signature)` pair as the RIFF fixup table records it.
    ///
    /// `at` is the file position of the record, used for error reporting.
    pub fn resolve_checked(&self, key: &Guid, signature: u32, at: usize) -> Result<usize> {
        let index = self
            .lookup(key)
            .ok_or_else(|| Error::missing_type(TypeId::Guid(*key)))?;
        let expected = self.signatures[index];
        if expected != signature {
            return Err(Error::corrupt(
                at,
                format!(
                    "type signature mismatch for {key}: file has {signature:#010x}, \
                     shared table has {expected:#010x}"
                ),
            ));
        }
        Ok(index)
    }

    /// Append one full descriptor under its key.
    ///
    /// `fields` must already carry self-relative type refs; `field_start` and
    /// `field_count` are overwritten from the pool position.
    pub fn register(
        &mut self,
        key: Guid,
        signature: u32,
        mut desc: TypeDescriptor,
        fields: Vec<FieldDescriptor>,
    ) -> usize {
        let index = self.types.len();
        desc.field_start = self.fields.len() as u32;
        desc.field_count = fields.len() as u8;
        self.fields.extend(fields);
        self.by_key.insert(key, index);
        self.by_hash.entry(desc.name_hash).or_insert(index);
        self.keys.push(key);
        self.signatures.push(signature);
        self.types.push(desc);
        index
    }

    /// Register every type a graph touches, resolved through `schema`.
    ///
    /// The usual way to populate a table before writing or reading files
    /// that lean on shared descriptors.
    pub fn ingest(&mut self, schema: &dyn TypeSchema, graph: &ObjectGraph) -> Result<()> {
        let mut builder = TypeTableBuilder::new(schema);
        builder.add_graph(graph)?;
        self.ingest_table(&builder.finish());
        Ok(())
    }

    /// Merge every type of a freshly built local table, converting its
    /// absolute field refs to self-relative deltas. Types already present by
    /// key are kept as-is.
    pub(crate) fn ingest_table(&mut self, table: &TypeTable) {
        // Pass 1: final shared index for every local type.
        let mut shared_of = Vec::with_capacity(table.types.len());
        let mut next = self.types.len();
        for guid in &table.guids {
            match self.by_key.get(guid) {
                Some(&existing) => shared_of.push(existing),
                None => {
                    shared_of.push(next);
                    next += 1;
                }
            }
        }

        // Pass 2: append the new ones with converted field refs.
        for (local, desc) in table.types.iter().enumerate() {
            let owner = shared_of[local];
            if owner < self.types.len() {
                log::debug!(
                    "[TYPES] shared table already holds {} ({:#010x}), skipping",
                    table.guids[local],
                    desc.name_hash
                );
                continue;
            }
            let start = desc.field_start as usize;
            let end = start + desc.field_count as usize;
            let fields = table.fields[start..end]
                .iter()
                .map(|fd| {
                    let mut fd = *fd;
                    let target = shared_of[fd.type_ref as usize];
                    fd.type_ref = (target as i64 - owner as i64) as i16 as u16;
                    fd
                })
                .collect();
            self.register(table.guids[local], table.signatures[local], *desc, fields);
        }
    }

    /// Serialize the whole table.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&SHARED_TABLE_TAG);
        out.extend_from_slice(&(self.types.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.fields.len() as u32).to_le_bytes());
        for key in &self.keys {
            out.extend_from_slice(key.as_bytes());
        }
        for signature in &self.signatures {
            out.extend_from_slice(&signature.to_le_bytes());
        }
        for desc in &self.types {
            desc.write_to(&mut out);
        }
        for field in &self.fields {
            field.write_to(&mut out);
        }
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let tag = cur.read_bytes(4)?;
        if tag != SHARED_TABLE_TAG {
            return Err(Error::corrupt(0, "bad shared descriptor table tag"));
        }
        let type_count = cur.read_u32_le()? as usize;
        let field_count = cur.read_u32_le()? as usize;

        let mut table = Self::new();
        for _ in 0..type_count {
            table.keys.push(Guid::read(&mut cur)?);
        }
        for _ in 0..type_count {
            table.signatures.push(cur.read_u32_le()?);
        }
        for index in 0..type_count {
            let desc = TypeDescriptor::read(&mut cur)?;
            table.by_key.insert(table.keys[index], index);
            table.by_hash.entry(desc.name_hash).or_insert(index);
            table.types.push(desc);
        }
        for _ in 0..field_count {
            table.fields.push(FieldDescriptor::read(&mut cur)?);
        }
        for (index, desc) in table.types.iter().enumerate() {
            let start = desc.field_start as usize;
            if start + desc.field_count as usize > table.fields.len() {
                return Err(Error::corrupt(
                    cur.offset(),
                    format!("shared descriptor {index} declares fields out of range"),
                ));
            }
        }
        Ok(table)
    }
}
