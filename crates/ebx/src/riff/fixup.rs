// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The fixup (`EFIX`) and content-hash (`EBXX`) side tables.
//!
//! Every offset in both tables is relative to the start of the data section.
//! The relocation lists are runtime patch tables, so they are kept sorted
//! ascending on disk.

use md5::{Digest, Md5};

use crate::config::NO_SHARED_TYPE;
use crate::core::{Cursor, Guid};
use crate::descriptor::{SharedTypeDescriptors, TypeFlags};
use crate::error::{Error, Result};
use crate::graph::ImportRef;

/// Parsed `EFIX` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FixupTable {
    pub partition_guid: Guid,
    /// Shared-table key guid per instance slot.
    pub type_guids: Vec<Guid>,
    /// Layout signature per instance slot, checked against the shared table.
    pub signatures: Vec<u32>,
    pub exported_count: u32,
    /// Per-slot offsets: the identity guid for exported instances, the
    /// image for internal ones.
    pub instance_offsets: Vec<u32>,
    /// Positions of relative reference words (pointers, strings, arrays,
    /// boxed payloads).
    pub pointer_offsets: Vec<u32>,
    pub resource_ref_offsets: Vec<u32>,
    pub imports: Vec<ImportRef>,
    /// Positions of import pointer words; their value is `index * 2 + 1`.
    pub import_offsets: Vec<u32>,
    /// Positions of type words (TypeRef, Delegate and boxed type words).
    pub type_info_offsets: Vec<u32>,
    pub array_offset: u32,
    pub boxed_offset: u32,
    pub string_offset: u32,
}

impl FixupTable {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let partition_guid = Guid::read(&mut cur)?;
        let type_guids = read_guid_list(&mut cur)?;
        let signatures = read_u32_list(&mut cur)?;
        let exported_count = cur.read_u32_le()?;
        let instance_offsets = read_u32_list(&mut cur)?;
        let pointer_offsets = read_u32_list(&mut cur)?;
        let resource_ref_offsets = read_u32_list(&mut cur)?;
        let imports = read_import_list(&mut cur)?;
        let import_offsets = read_u32_list(&mut cur)?;
        let type_info_offsets = read_u32_list(&mut cur)?;
        let array_offset = cur.read_u32_le()?;
        let boxed_offset = cur.read_u32_le()?;
        let string_offset = cur.read_u32_le()?;
        Ok(Self {
            partition_guid,
            type_guids,
            signatures,
            exported_count,
            instance_offsets,
            pointer_offsets,
            resource_ref_offsets,
            imports,
            import_offsets,
            type_info_offsets,
            array_offset,
            boxed_offset,
            string_offset,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.partition_guid.as_bytes());
        out.extend_from_slice(&(self.type_guids.len() as u32).to_le_bytes());
        for guid in &self.type_guids {
            out.extend_from_slice(guid.as_bytes());
        }
        write_u32_list(&mut out, &self.signatures);
        out.extend_from_slice(&self.exported_count.to_le_bytes());
        write_u32_list(&mut out, &self.instance_offsets);
        write_u32_list(&mut out, &self.pointer_offsets);
        write_u32_list(&mut out, &self.resource_ref_offsets);
        out.extend_from_slice(&(self.imports.len() as u32).to_le_bytes());
        for import in &self.imports {
            out.extend_from_slice(import.file_guid.as_bytes());
            out.extend_from_slice(import.instance_guid.as_bytes());
        }
        write_u32_list(&mut out, &self.import_offsets);
        write_u32_list(&mut out, &self.type_info_offsets);
        out.extend_from_slice(&self.array_offset.to_le_bytes());
        out.extend_from_slice(&self.boxed_offset.to_le_bytes());
        out.extend_from_slice(&self.string_offset.to_le_bytes());
        out
    }
}

/// One `EBXX` record: a checksummed out-of-line block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraEntry {
    /// Block offset, data-relative.
    pub offset: u32,
    /// Element count for array blocks, 1 for boxed payload images.
    pub count: u32,
    pub content_hash: u32,
    /// Element flags for array blocks, payload flags for boxed images.
    pub flags: TypeFlags,
    /// Shared-table index of the block's type, [`NO_SHARED_TYPE`] when the
    /// type does not resolve through the shared table.
    pub type_ref: u16,
}

impl ExtraEntry {
    pub const WIRE_LEN: usize = 16;

    fn read(cur: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            offset: cur.read_u32_le()?,
            count: cur.read_u32_le()?,
            content_hash: cur.read_u32_le()?,
            flags: TypeFlags::from_bits(cur.read_u16_le()?),
            type_ref: cur.read_u16_le()?,
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.content_hash.to_le_bytes());
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
        out.extend_from_slice(&self.type_ref.to_le_bytes());
    }
}

/// Parsed `EBXX` payload: array entries first, then boxed payload entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraTable {
    pub arrays: Vec<ExtraEntry>,
    pub boxed: Vec<ExtraEntry>,
}

impl ExtraTable {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let array_count = read_count(&mut cur, ExtraEntry::WIRE_LEN)?;
        let boxed_count = read_count(&mut cur, ExtraEntry::WIRE_LEN)?;
        let mut table = Self::default();
        for _ in 0..array_count {
            table.arrays.push(ExtraEntry::read(&mut cur)?);
        }
        for _ in 0..boxed_count {
            table.boxed.push(ExtraEntry::read(&mut cur)?);
        }
        Ok(table)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.arrays.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.boxed.len() as u32).to_le_bytes());
        for entry in &self.arrays {
            entry.write_to(&mut out);
        }
        for entry in &self.boxed {
            entry.write_to(&mut out);
        }
        out
    }
}

/// Truncated md5 over a block's final on-disk bytes.
pub(crate) fn content_hash(bytes: &[u8]) -> u32 {
    let digest = Md5::digest(bytes);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Shared-table index for an `EBXX` entry, by type name hash.
pub(crate) fn shared_ref_of(shared: &SharedTypeDescriptors, type_hash: u32) -> u16 {
    if type_hash == 0 {
        return NO_SHARED_TYPE;
    }
    shared
        .lookup_by_name_hash(type_hash)
        .and_then(|index| u16::try_from(index).ok())
        .unwrap_or(NO_SHARED_TYPE)
}

fn read_count(cur: &mut Cursor<'_>, width: usize) -> Result<usize> {
    let at = cur.offset();
    let count = cur.read_u32_le()? as usize;
    if count.saturating_mul(width) > cur.remaining() {
        return Err(Error::corrupt(
            at,
            format!("list of {count} entries runs past the chunk"),
        ));
    }
    Ok(count)
}

fn read_u32_list(cur: &mut Cursor<'_>) -> Result<Vec<u32>> {
    let count = read_count(cur, 4)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(cur.read_u32_le()?);
    }
    Ok(out)
}

fn read_guid_list(cur: &mut Cursor<'_>) -> Result<Vec<Guid>> {
    let count = read_count(cur, 16)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(Guid::read(cur)?);
    }
    Ok(out)
}

fn read_import_list(cur: &mut Cursor<'_>) -> Result<Vec<ImportRef>> {
    let count = read_count(cur, 32)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let file_guid = Guid::read(cur)?;
        let instance_guid = Guid::read(cur)?;
        out.push(ImportRef::new(file_guid, instance_guid));
    }
    Ok(out)
}

fn write_u32_list(out: &mut Vec<u8>, values: &[u32]) {
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}
